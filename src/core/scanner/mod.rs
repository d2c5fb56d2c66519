//! # Scanner Module
//!
//! Registers scan roots and reconciles the catalog with what is on disk.
//!
//! ## Supported Formats
//! - JPEG (.jpg, .jpeg)
//! - PNG (.png)
//! - HEIC (.heic) - iPhone photos
//!
//! ## Reconciliation
//! Every supported file found by the walk is compared with the catalog row
//! for the same path:
//! - no row: metadata is extracted and a row inserted (indexed)
//! - same size and last-write time: nothing to do (skipped)
//! - otherwise: metadata is re-extracted and the row updated (updated)
//!
//! Rows whose path was not seen by the walk are removed at the end.
//!
//! ## Example
//! ```rust,ignore
//! let scanner = Scanner::new(store, Arc::new(ExifMetadataExtractor));
//! let root = scanner.get_or_create_root(Path::new("/Users/me/Pictures"), true)?;
//! let summary = scanner.scan(root.id, &ScanOptions::default(), &null_sender(), &CancellationToken::new())?;
//! ```

mod filter;
mod walker;

pub use filter::{ImageFilter, SUPPORTED_EXTENSIONS};
pub use walker::{DirectoryWalker, ScanOptions, WalkOutcome};

use crate::core::cancel::CancellationToken;
use crate::core::catalog::{AssetScope, CatalogStore, CatalogWrite, WriteBatch};
use crate::core::duplicates::sha256_file;
use crate::core::metadata::MetadataExtractor;
use crate::core::model::{FileStamp, PhotoAsset, ScanRoot};
use crate::core::paths::normalize_path;
use crate::error::{CatalogError, HashError, Result, ScanError};
use crate::events::{Event, EventSender, ScanEvent, ScanProgress, ScanSummary};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Catalog mutations per committed batch
pub const SCAN_BATCH_SIZE: usize = 100;

/// What happened to one discovered file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Indexed,
    Updated,
    Unchanged,
}

/// Scan root registry and filesystem reconciliation
pub struct Scanner {
    store: Arc<dyn CatalogStore>,
    extractor: Arc<dyn MetadataExtractor>,
}

impl Scanner {
    pub fn new(store: Arc<dyn CatalogStore>, extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self { store, extractor }
    }

    /// All registered roots ordered by path
    pub fn list_roots(&self) -> Result<Vec<ScanRoot>> {
        Ok(self.store.list_roots()?)
    }

    /// Look up the root for `path`, registering it on first use.
    ///
    /// The path is made absolute and cleaned. An existing root gets its
    /// duplicate detection flag updated when it differs.
    pub fn get_or_create_root(
        &self,
        path: &Path,
        enable_duplicate_detection: bool,
    ) -> Result<ScanRoot> {
        if path.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(CatalogError::InvalidInput("Root path is required.".to_string()));
        }

        let normalized = normalize_path(path)?;

        if let Some(mut existing) = self.store.find_root_by_path(&normalized)? {
            if existing.enable_duplicate_detection != enable_duplicate_detection {
                existing.enable_duplicate_detection = enable_duplicate_detection;
                self.store.update_root(&existing)?;
            }
            return Ok(existing);
        }

        let mut root = ScanRoot::new(normalized, enable_duplicate_detection);
        root.id = self.store.insert_root(&root)?;
        tracing::info!("Registered scan root {} ({})", root.root_path.display(), root.id);
        Ok(root)
    }

    pub fn set_duplicate_detection(&self, scan_root_id: i64, enabled: bool) -> Result<ScanRoot> {
        let mut root = self.root(scan_root_id)?;
        root.enable_duplicate_detection = enabled;
        self.store.update_root(&root)?;
        Ok(root)
    }

    /// Walk the root and bring the catalog in line with the filesystem.
    ///
    /// Fails before any work when the root is unknown or its directory is
    /// missing. Per-file failures are counted as skipped. On cancellation the
    /// uncommitted batch is discarded and `Cancelled` is returned.
    pub fn scan(
        &self,
        scan_root_id: i64,
        options: &ScanOptions,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<ScanSummary> {
        let mut root = self.root(scan_root_id)?;
        if !root.root_path.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.root_path.clone(),
            }
            .into());
        }

        let start_time = Instant::now();
        tracing::info!("Scanning {}", root.root_path.display());
        events.send(Event::Scan(ScanEvent::Started {
            scan_root_id,
            root: root.root_path.clone(),
        }));

        let report = |progress: &mut ScanProgress, current: &Path| {
            progress.current_file = current.to_path_buf();
            progress.elapsed_ms = start_time.elapsed().as_millis() as u64;
            events.send(Event::Scan(ScanEvent::Progress(progress.clone())));
        };
        // Zeroed snapshot before the walk
        let mut progress = ScanProgress::default();
        report(&mut progress, Path::new(""));

        let walk = DirectoryWalker::new(*options).walk(&root.root_path, cancel)?;

        let existing_rows = self.store.list_assets(AssetScope::Root(scan_root_id))?;
        let mut existing: HashMap<PathBuf, PhotoAsset> = existing_rows
            .into_iter()
            .map(|asset| (asset.full_path.clone(), asset))
            .collect();

        progress.found = walk.files.len();
        report(&mut progress, Path::new(""));

        let mut seen: HashSet<PathBuf> = HashSet::with_capacity(walk.files.len());
        let mut batch = WriteBatch::new(SCAN_BATCH_SIZE);

        for path in &walk.files {
            if cancel.is_cancelled() {
                let dropped = batch.discard();
                tracing::info!("Scan cancelled, {} uncommitted changes dropped", dropped);
                return Err(CatalogError::Cancelled);
            }

            if !seen.insert(path.clone()) {
                progress.skipped += 1;
            } else {
                match self.reconcile_file(&root, path, &mut existing, &mut batch) {
                    Ok(FileOutcome::Indexed) => progress.indexed += 1,
                    Ok(FileOutcome::Updated) => progress.updated += 1,
                    Ok(FileOutcome::Unchanged) => progress.skipped += 1,
                    Err(message) => {
                        tracing::debug!("Skipping {}: {}", path.display(), message);
                        events.send(Event::Scan(ScanEvent::Error {
                            path: path.clone(),
                            message,
                        }));
                        progress.skipped += 1;
                    }
                }
            }

            if batch.is_full() {
                batch.flush(self.store.as_ref())?;
            }

            report(&mut progress, path);
        }

        cancel.check()?;

        let stale: Vec<i64> = existing
            .values()
            .filter(|asset| asset.id != 0 && !seen.contains(&asset.full_path))
            .map(|asset| asset.id)
            .collect();
        if !stale.is_empty() {
            progress.removed = stale.len();
            batch.push(CatalogWrite::DeleteAssets(stale));
        }

        root.last_scan_utc = Some(Utc::now());
        root.total_files_last_scan = progress.found;
        batch.push(CatalogWrite::UpdateRoot(root.clone()));
        batch.flush(self.store.as_ref())?;

        report(&mut progress, Path::new(""));

        let summary = ScanSummary {
            directories_skipped: walk.directories_skipped,
            ..ScanSummary::from(&progress)
        };
        tracing::info!(
            "Scan of {} complete: found={} indexed={} updated={} skipped={} removed={} in {}ms",
            root.root_path.display(),
            summary.found,
            summary.indexed,
            summary.updated,
            summary.skipped,
            summary.removed,
            summary.duration_ms
        );
        events.send(Event::Scan(ScanEvent::Completed(summary.clone())));
        Ok(summary)
    }

    fn root(&self, scan_root_id: i64) -> Result<ScanRoot> {
        self.store
            .get_root(scan_root_id)?
            .ok_or(CatalogError::UnknownScanRoot { id: scan_root_id })
    }

    /// Compare one file with its catalog row and queue the needed write.
    ///
    /// Errors are per-file and returned as messages for the skipped count.
    fn reconcile_file(
        &self,
        root: &ScanRoot,
        path: &Path,
        existing: &mut HashMap<PathBuf, PhotoAsset>,
        batch: &mut WriteBatch,
    ) -> std::result::Result<FileOutcome, String> {
        let stamp = FileStamp::read(path).map_err(|e| e.to_string())?;

        match existing.get_mut(path) {
            Some(row) if row.is_unchanged(&stamp) => Ok(FileOutcome::Unchanged),
            Some(row) => {
                let mut updated = row.clone();
                self.populate(&mut updated, root, &stamp, false)
                    .map_err(|e| e.to_string())?;
                batch.push(CatalogWrite::UpdateAsset(updated.clone()));
                *row = updated;
                Ok(FileOutcome::Updated)
            }
            None => {
                let mut asset = PhotoAsset::new(root.id, path, Utc::now());
                self.populate(&mut asset, root, &stamp, true)
                    .map_err(|e| e.to_string())?;
                batch.push(CatalogWrite::InsertAsset(asset));
                Ok(FileOutcome::Indexed)
            }
        }
    }

    fn populate(
        &self,
        asset: &mut PhotoAsset,
        root: &ScanRoot,
        stamp: &FileStamp,
        is_new: bool,
    ) -> std::result::Result<(), HashError> {
        let metadata = self.extractor.extract(&asset.full_path);
        let now = Utc::now();

        asset.apply_stamp(stamp);
        asset.apply_metadata(&metadata);
        asset.updated_utc = now;
        if is_new {
            asset.indexed_utc = now;
        }

        if root.enable_duplicate_detection {
            asset.sha256 = Some(sha256_file(&asset.full_path)?);
        } else if !is_new {
            asset.sha256 = None;
        }
        Ok(())
    }
}
