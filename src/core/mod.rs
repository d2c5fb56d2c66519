//! # Core Module
//!
//! The GUI-agnostic catalog engine.
//!
//! ## Modules
//! - `scanner` - Walks scan roots and reconciles them with the catalog
//! - `duplicates` - Fills in content hashes and groups identical files
//! - `query` - Filtered, sorted and paginated catalog reads
//! - `organize` - Year/month move plans and their application
//! - `edit` - Single-photo rename/move/copy/delete and label edits
//! - `catalog` - Persistence of scan roots and photo assets
//! - `metadata` - Extracts EXIF metadata from photos

pub mod cancel;
pub mod catalog;
pub mod duplicates;
pub mod edit;
pub mod metadata;
pub mod model;
pub mod organize;
pub mod paths;
pub mod query;
pub mod scanner;
pub mod storage;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use catalog::{CatalogStore, InMemoryCatalog, SqliteCatalog};
pub use duplicates::{DuplicateDetector, DuplicateGroup};
pub use edit::PhotoEditor;
pub use metadata::{ExifMetadataExtractor, MetadataExtractor, PhotoMetadata};
pub use model::{DateTakenSource, PhotoAsset, ScanRoot};
pub use organize::{OrganizeExecutor, OrganizePlanner, OrganizerAuditLog};
pub use query::{PhotoQueryFilter, PhotoSortOption, QueryEngine};
pub use scanner::{ScanOptions, Scanner};
pub use storage::StoragePaths;
