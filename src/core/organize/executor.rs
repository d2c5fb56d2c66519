//! Executor for organization plans.

use super::audit::OrganizerAuditLog;
use super::types::*;
use super::{APPLY_BATCH_SIZE, MAX_APPLY_ERRORS};
use crate::core::cancel::CancellationToken;
use crate::core::catalog::{AssetScope, CatalogStore, CatalogWrite};
use crate::core::model::{FileStamp, PhotoAsset, ScanRoot};
use crate::core::paths::{ensure_inside_root, normalize_path, resolve_unique_path};
use crate::error::{CatalogError, Result};
use crate::events::{Event, EventSender, OrganizeEvent};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Applies organization plans to the filesystem and the catalog
pub struct OrganizeExecutor {
    store: Arc<dyn CatalogStore>,
    audit: OrganizerAuditLog,
}

enum ItemOutcome {
    Moved,
    Skipped(Option<String>),
    Failed(String),
}

/// A moved file whose catalog row is not committed yet
struct PendingMove {
    photo_id: i64,
    source: PathBuf,
    destination: PathBuf,
    write: CatalogWrite,
}

/// Mutable state of one apply run
struct ApplyState {
    assets: HashMap<i64, PhotoAsset>,
    occupied: HashSet<PathBuf>,
    pending: Vec<PendingMove>,
}

impl OrganizeExecutor {
    pub fn new(store: Arc<dyn CatalogStore>, audit: OrganizerAuditLog) -> Self {
        Self { store, audit }
    }

    /// Move every item's file and re-point its catalog row.
    ///
    /// Items are re-validated against the live filesystem, so a plan can be
    /// applied late or twice. Per-item problems are counted, never raised.
    /// On cancellation the rows of files already moved are committed and
    /// logged before `Cancelled` is returned.
    pub fn apply_plan(
        &self,
        scan_root_id: i64,
        items: &[OrganizerPlanItem],
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<OrganizerApplyResult> {
        let root = self
            .store
            .get_root(scan_root_id)?
            .ok_or(CatalogError::UnknownScanRoot { id: scan_root_id })?;

        // Every cataloged path in the root is taken, not only the planned ones
        let wanted: HashSet<i64> = items.iter().map(|i| i.photo_id).collect();
        let mut occupied = HashSet::new();
        let mut assets = HashMap::new();
        for asset in self.store.list_assets(AssetScope::Root(scan_root_id))? {
            occupied.insert(asset.full_path.clone());
            if wanted.contains(&asset.id) {
                assets.insert(asset.id, asset);
            }
        }
        let mut state = ApplyState {
            assets,
            occupied,
            pending: Vec::with_capacity(APPLY_BATCH_SIZE),
        };

        let mut result = OrganizerApplyResult::default();
        let mut cancelled = false;

        for item in items {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            result.attempted += 1;

            match self.apply_item(&root, item, &mut state) {
                ItemOutcome::Moved => result.moved += 1,
                ItemOutcome::Skipped(reason) => {
                    result.skipped += 1;
                    if let Some(reason) = reason {
                        record_error(&mut result.errors, reason);
                    }
                }
                ItemOutcome::Failed(reason) => {
                    result.failed += 1;
                    tracing::debug!("{}", reason);
                    record_error(&mut result.errors, reason);
                }
            }

            if state.pending.len() >= APPLY_BATCH_SIZE {
                self.flush(&mut state, &mut result);
            }

            events.send(Event::Organize(OrganizeEvent::ApplyProgress {
                attempted: result.attempted,
                total: items.len(),
                current_path: item.source_path.clone(),
            }));
        }

        self.flush(&mut state, &mut result);

        if let Err(e) = self.audit.record_apply(&root.root_path, &result) {
            tracing::warn!("{}", e);
        }

        tracing::info!(
            "Applied organizer plan to {}: attempted={} moved={} skipped={} failed={}",
            root.root_path.display(),
            result.attempted,
            result.moved,
            result.skipped,
            result.failed
        );
        events.send(Event::Organize(OrganizeEvent::ApplyCompleted {
            attempted: result.attempted,
            moved: result.moved,
            skipped: result.skipped,
            failed: result.failed,
        }));

        if cancelled {
            return Err(CatalogError::Cancelled);
        }
        Ok(result)
    }

    fn apply_item(
        &self,
        root: &ScanRoot,
        item: &OrganizerPlanItem,
        state: &mut ApplyState,
    ) -> ItemOutcome {
        let id = item.photo_id;
        if item.source_path.as_os_str().is_empty() || item.destination_path.as_os_str().is_empty() {
            return ItemOutcome::Skipped(Some(format!(
                "Skipped photo {}: missing source or destination path.",
                id
            )));
        }

        let (source, destination) = match (
            normalize_path(&item.source_path),
            normalize_path(&item.destination_path),
        ) {
            (Ok(source), Ok(destination)) => (source, destination),
            (Err(e), _) | (_, Err(e)) => return ItemOutcome::Failed(format!("Failed photo {}: {}", id, e)),
        };
        if source == destination {
            return ItemOutcome::Skipped(None);
        }

        if !source.is_file() {
            return ItemOutcome::Skipped(Some(format!(
                "Skipped photo {}: source file not found -> {}",
                id,
                source.display()
            )));
        }

        let destination = match ensure_inside_root(&destination, &root.root_path) {
            Ok(destination) => destination,
            Err(e) => return ItemOutcome::Failed(format!("Failed photo {}: {}", id, e)),
        };
        let Some(folder) = destination.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return ItemOutcome::Skipped(Some(format!(
                "Skipped photo {}: invalid destination path -> {}",
                id,
                destination.display()
            )));
        };

        if let Err(e) = fs::create_dir_all(folder) {
            return ItemOutcome::Failed(format!("Failed photo {}: {}", id, e));
        }

        let destination = if state.occupied.contains(&destination) || destination.exists() {
            resolve_unique_path(&destination, &state.occupied, None)
        } else {
            destination
        };

        if let Err(e) = move_file(&source, &destination) {
            return ItemOutcome::Failed(format!("Failed photo {}: {}", id, e));
        }
        state.occupied.remove(&source);
        state.occupied.insert(destination.clone());

        if let Some(asset) = state.assets.get_mut(&id) {
            asset.set_path(&destination);
            match FileStamp::read(&destination) {
                Ok(stamp) => asset.apply_stamp(&stamp),
                Err(e) => tracing::debug!("Could not stat {}: {}", destination.display(), e),
            }
            asset.updated_utc = Utc::now();
            state.pending.push(PendingMove {
                photo_id: id,
                source,
                destination,
                write: CatalogWrite::UpdateAsset(asset.clone()),
            });
        }

        ItemOutcome::Moved
    }

    /// Commit the rows of moved files.
    ///
    /// A rejected batch is retried row by row. A row the store still refuses
    /// has its file moved back and the item is counted as failed, so every
    /// other row in the batch keeps its new path.
    fn flush(&self, state: &mut ApplyState, result: &mut OrganizerApplyResult) {
        if state.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut state.pending);
        let writes: Vec<CatalogWrite> = pending.iter().map(|p| p.write.clone()).collect();
        let Err(e) = self.store.commit(&writes) else {
            return;
        };
        tracing::warn!("Organizer batch rejected, retrying rows one at a time: {}", e);

        for moved in pending {
            let Err(e) = self.store.commit(std::slice::from_ref(&moved.write)) else {
                continue;
            };
            result.moved = result.moved.saturating_sub(1);
            result.failed += 1;

            let reason = match move_file(&moved.destination, &moved.source) {
                Ok(()) => {
                    state.occupied.remove(&moved.destination);
                    state.occupied.insert(moved.source.clone());
                    if let Some(asset) = state.assets.get_mut(&moved.photo_id) {
                        asset.set_path(&moved.source);
                    }
                    format!("Failed photo {}: {}", moved.photo_id, e)
                }
                Err(undo) => format!(
                    "Failed photo {}: {}; file left at {} ({})",
                    moved.photo_id,
                    e,
                    moved.destination.display(),
                    undo
                ),
            };
            tracing::warn!("{}", reason);
            record_error(&mut result.errors, reason);
        }
    }
}

fn record_error(errors: &mut Vec<String>, error: String) {
    if errors.len() < MAX_APPLY_ERRORS {
        errors.push(error);
    }
}

/// Move a file, falling back to copy and delete when a rename is not
/// possible (different filesystems). The source is only removed once the
/// copy has the same size.
pub fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    let source_size = fs::metadata(source)?.len();
    fs::copy(source, destination)?;

    let dest_size = fs::metadata(destination)?.len();
    if dest_size != source_size {
        let _ = fs::remove_file(destination);
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!(
                "Copy verification failed: source {} bytes, dest {} bytes",
                source_size, dest_size
            ),
        ));
    }

    fs::remove_file(source)
}
