//! Photo organization module.
//!
//! Two phases: [`OrganizePlanner`] proposes year/month moves from the
//! catalog without touching any photo, and [`OrganizeExecutor`] applies a
//! (possibly stale) plan to the filesystem and the catalog. Both append to
//! the organizer log.

mod audit;
mod executor;
mod planner;
mod types;

pub use audit::OrganizerAuditLog;
pub use executor::{move_file, OrganizeExecutor};
pub use planner::{target_folder, OrganizePlanner};
pub use types::*;

/// Catalog updates per committed batch while applying
pub const APPLY_BATCH_SIZE: usize = 50;
/// Error lines kept in an apply result and its log block
pub const MAX_APPLY_ERRORS: usize = 50;
