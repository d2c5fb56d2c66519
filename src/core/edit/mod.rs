//! # Edit Module
//!
//! Single-photo operations outside bulk organization: rename, move, copy,
//! delete, re-locating a row whose file moved, and tag/subject edits.
//!
//! Every file destination must stay inside the photo's scan root; a
//! violation is rejected with [`OrganizeError::OutsideScanRoot`]. A missing
//! photo id is `Ok(None)`, never an error.

use crate::core::cancel::CancellationToken;
use crate::core::catalog::{AssetScope, CatalogStore, CatalogWrite};
use crate::core::duplicates::sha256_file;
use crate::core::model::{normalize_extension, FileStamp, PhotoAsset, ScanRoot};
use crate::core::organize::move_file;
use crate::core::paths::{ensure_inside_root, normalize_path, resolve_unique_path, sanitize_file_stem};
use crate::error::{CatalogError, OrganizeError, Result};
use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Same-name files considered when repairing a location
pub const MAX_REPAIR_CANDIDATES: usize = 500;
/// Tags, people or animals kept per photo
pub const MAX_LABELS: usize = 100;

const IDENTIFIER_SEPARATORS: &[char] = &[' ', '\t', '\r', '\n', ',', ';', ':', '/', '\\'];

/// Applies single-photo edits to the filesystem and the catalog
pub struct PhotoEditor {
    store: Arc<dyn CatalogStore>,
}

impl PhotoEditor {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Rename in place. A name without extension keeps the current one;
    /// characters that are invalid in file names become `_`.
    pub fn rename(&self, photo_id: i64, new_name: &str) -> Result<Option<PhotoAsset>> {
        let requested = new_name.trim();
        if requested.is_empty() {
            return Err(CatalogError::InvalidInput("New file name is required.".to_string()));
        }
        let Some(asset) = self.store.get_asset(photo_id)? else {
            return Ok(None);
        };

        let requested_path = Path::new(requested);
        let extension = match requested_path.extension() {
            Some(ext) => normalize_extension(&ext.to_string_lossy()),
            None => normalize_extension(&asset.extension),
        };
        let stem = requested_path
            .file_stem()
            .map(|s| sanitize_file_stem(&s.to_string_lossy()))
            .unwrap_or_default();
        if stem.is_empty() {
            return Err(OrganizeError::InvalidFileName(new_name.to_string()).into());
        }

        let destination = asset.folder_path.join(format!("{}{}", stem, extension));
        self.relocate_asset(asset, &destination).map(Some)
    }

    /// Move into `folder`, keeping the file name.
    pub fn move_to_folder(&self, photo_id: i64, folder: &Path) -> Result<Option<PhotoAsset>> {
        require_path(folder, "Destination folder is required.")?;
        let Some(asset) = self.store.get_asset(photo_id)? else {
            return Ok(None);
        };
        let destination = normalize_path(folder)?.join(&asset.file_name);
        self.relocate_asset(asset, &destination).map(Some)
    }

    /// Move to an exact destination path (suffixed on collision).
    pub fn relocate(&self, photo_id: i64, destination: &Path) -> Result<Option<PhotoAsset>> {
        require_path(destination, "Destination path is required.")?;
        let Some(asset) = self.store.get_asset(photo_id)? else {
            return Ok(None);
        };
        self.relocate_asset(asset, destination).map(Some)
    }

    /// Copy into `folder` and catalog the copy with the original's metadata.
    pub fn copy_to_folder(&self, photo_id: i64, folder: &Path) -> Result<Option<PhotoAsset>> {
        require_path(folder, "Destination folder is required.")?;
        let Some(asset) = self.store.get_asset(photo_id)? else {
            return Ok(None);
        };
        let root = self.root_of(&asset)?;
        let folder = ensure_inside_root(&normalize_path(folder)?, &root.root_path)?;
        let destination = folder.join(&asset.file_name);
        self.copy_asset(&asset, &destination).map(Some)
    }

    /// Copy next to the original as `<name>_copy.<ext>`.
    pub fn duplicate(&self, photo_id: i64) -> Result<Option<PhotoAsset>> {
        let Some(asset) = self.store.get_asset(photo_id)? else {
            return Ok(None);
        };
        let root = self.root_of(&asset)?;
        let folder = ensure_inside_root(&asset.folder_path, &root.root_path)?;

        let stem = Path::new(&asset.file_name)
            .file_stem()
            .map(|s| sanitize_file_stem(&s.to_string_lossy()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "photo".to_string());
        let destination = folder.join(format!("{}_copy{}", stem, normalize_extension(&asset.extension)));
        self.copy_asset(&asset, &destination).map(Some)
    }

    /// Remove the row, and the file too when asked. File deletion is best
    /// effort; the row goes either way. Returns whether a row existed.
    pub fn delete(&self, photo_id: i64, delete_file: bool) -> Result<bool> {
        let Some(asset) = self.store.get_asset(photo_id)? else {
            return Ok(false);
        };

        if delete_file && asset.full_path.is_file() {
            if let Err(e) = fs::remove_file(&asset.full_path) {
                tracing::warn!("Could not delete {}: {}", asset.full_path.display(), e);
            }
        }

        self.store.commit(&[CatalogWrite::DeleteAssets(vec![photo_id])])?;
        tracing::info!("Removed photo {} from the catalog", photo_id);
        Ok(true)
    }

    /// Find a vanished file again by name inside its scan root.
    ///
    /// Candidates are narrowed by size, then by content hash; the row is
    /// re-pointed only when exactly one candidate remains. `Ok(None)` when
    /// the photo is unknown or no unique match exists.
    pub fn repair_location(
        &self,
        photo_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<PhotoAsset>> {
        let Some(mut asset) = self.store.get_asset(photo_id)? else {
            return Ok(None);
        };
        if asset.full_path.is_file() {
            return Ok(Some(asset));
        }

        let Some(root) = self.store.get_root(asset.scan_root_id)? else {
            return Ok(None);
        };
        if !root.root_path.is_dir() || asset.file_name.is_empty() {
            return Ok(None);
        }

        let candidates: Vec<PathBuf> = WalkDir::new(&root.root_path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file() && entry.file_name().to_string_lossy() == asset.file_name
            })
            .map(|entry| entry.into_path())
            .take(MAX_REPAIR_CANDIDATES)
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut narrowed = candidates.clone();
        if asset.file_size_bytes > 0 {
            narrowed.retain(|path| {
                fs::metadata(path).is_ok_and(|m| m.len() == asset.file_size_bytes)
            });
            if narrowed.is_empty() {
                narrowed = candidates;
            }
        }

        if narrowed.len() > 1 {
            if let Some(expected) = asset.sha256.clone().filter(|h| !h.is_empty()) {
                let mut matches = Vec::new();
                for path in &narrowed {
                    cancel.check()?;
                    // Unreadable candidates just do not match.
                    if sha256_file(path).is_ok_and(|hash| hash.eq_ignore_ascii_case(&expected)) {
                        matches.push(path.clone());
                    }
                }
                if !matches.is_empty() {
                    narrowed = matches;
                }
            }
        }

        let [found] = narrowed.as_slice() else {
            tracing::debug!(
                "No unique match for photo {} ({} candidates)",
                photo_id,
                narrowed.len()
            );
            return Ok(None);
        };

        tracing::info!("Photo {} found again at {}", photo_id, found.display());
        apply_path_state(&mut asset, found);
        self.store.commit(&[CatalogWrite::UpdateAsset(asset.clone())])?;
        Ok(Some(asset))
    }

    /// Point the row at `path` without touching the filesystem.
    pub fn update_path_reference(&self, photo_id: i64, path: &Path) -> Result<Option<PhotoAsset>> {
        require_path(path, "Path is required.")?;
        let Some(mut asset) = self.store.get_asset(photo_id)? else {
            return Ok(None);
        };
        let path = normalize_path(path)?;
        apply_path_state(&mut asset, &path);
        self.store.commit(&[CatalogWrite::UpdateAsset(asset.clone())])?;
        Ok(Some(asset))
    }

    /// Replace the tag set.
    pub fn replace_tags(&self, photo_id: i64, tags: &[String]) -> Result<Option<PhotoAsset>> {
        self.edit_labels(photo_id, |asset| {
            asset.tags = normalize_labels(tags, normalize_tag);
        })
    }

    /// Replace the people and animal identifier sets.
    pub fn update_subjects(
        &self,
        photo_id: i64,
        people_ids: &[String],
        animal_ids: &[String],
    ) -> Result<Option<PhotoAsset>> {
        self.edit_labels(photo_id, |asset| {
            asset.people_ids = normalize_labels(people_ids, normalize_identifier);
            asset.animal_ids = normalize_labels(animal_ids, normalize_identifier);
        })
    }

    fn edit_labels(
        &self,
        photo_id: i64,
        edit: impl FnOnce(&mut PhotoAsset),
    ) -> Result<Option<PhotoAsset>> {
        let Some(mut asset) = self.store.get_asset(photo_id)? else {
            return Ok(None);
        };
        edit(&mut asset);
        asset.updated_utc = Utc::now();
        self.store.commit(&[CatalogWrite::UpdateAsset(asset.clone())])?;
        Ok(Some(asset))
    }

    fn root_of(&self, asset: &PhotoAsset) -> Result<ScanRoot> {
        self.store
            .get_root(asset.scan_root_id)?
            .ok_or(CatalogError::UnknownScanRoot {
                id: asset.scan_root_id,
            })
    }

    /// Paths cataloged in the root, whether or not their files still exist
    fn cataloged_paths(&self, scan_root_id: i64, except: Option<i64>) -> Result<HashSet<PathBuf>> {
        Ok(self
            .store
            .list_assets(AssetScope::Root(scan_root_id))?
            .into_iter()
            .filter(|a| Some(a.id) != except)
            .map(|a| a.full_path)
            .collect())
    }

    fn relocate_asset(&self, mut asset: PhotoAsset, destination: &Path) -> Result<PhotoAsset> {
        let source = normalize_path(&asset.full_path)?;
        if !source.is_file() {
            return Err(OrganizeError::SourceMissing { path: source }.into());
        }

        let root = self.root_of(&asset)?;
        let destination = ensure_inside_root(&normalize_path(destination)?, &root.root_path)?;
        if destination == source {
            return Ok(asset);
        }

        let folder = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| OrganizeError::InvalidDestination {
                path: destination.clone(),
            })?;
        fs::create_dir_all(folder).map_err(|source| OrganizeError::Io {
            path: folder.to_path_buf(),
            source,
        })?;

        let occupied = self.cataloged_paths(asset.scan_root_id, Some(asset.id))?;
        let destination = resolve_unique_path(&destination, &occupied, Some(&source));
        move_file(&source, &destination).map_err(|e| OrganizeError::Io {
            path: destination.clone(),
            source: e,
        })?;

        apply_path_state(&mut asset, &destination);
        if let Err(e) = self.store.commit(&[CatalogWrite::UpdateAsset(asset.clone())]) {
            // Put the file back where its row still points
            if let Err(undo) = move_file(&destination, &source) {
                tracing::warn!(
                    "Could not move {} back to {}: {}",
                    destination.display(),
                    source.display(),
                    undo
                );
            }
            return Err(e.into());
        }
        tracing::info!(
            "Moved photo {}: {} -> {}",
            asset.id,
            source.display(),
            destination.display()
        );
        Ok(asset)
    }

    fn copy_asset(&self, original: &PhotoAsset, destination: &Path) -> Result<PhotoAsset> {
        let source = normalize_path(&original.full_path)?;
        if !source.is_file() {
            return Err(OrganizeError::SourceMissing { path: source }.into());
        }

        let folder = destination
            .parent()
            .ok_or_else(|| OrganizeError::InvalidDestination {
                path: destination.to_path_buf(),
            })?;
        fs::create_dir_all(folder).map_err(|source| OrganizeError::Io {
            path: folder.to_path_buf(),
            source,
        })?;

        let occupied = self.cataloged_paths(original.scan_root_id, None)?;
        let destination = resolve_unique_path(destination, &occupied, None);
        fs::copy(&source, &destination).map_err(|e| OrganizeError::Io {
            path: destination.clone(),
            source: e,
        })?;

        let now = Utc::now();
        let mut copy = original.clone();
        copy.id = 0;
        copy.indexed_utc = now;
        apply_path_state(&mut copy, &destination);
        copy.updated_utc = now;

        let ids = match self.store.commit(&[CatalogWrite::InsertAsset(copy.clone())]) {
            Ok(ids) => ids,
            Err(e) => {
                if let Err(undo) = fs::remove_file(&destination) {
                    tracing::warn!("Could not remove uncataloged copy {}: {}", destination.display(), undo);
                }
                return Err(e.into());
            }
        };
        copy.id = ids.first().copied().unwrap_or_default();
        tracing::info!(
            "Copied photo {} to {} as photo {}",
            original.id,
            destination.display(),
            copy.id
        );
        Ok(copy)
    }
}

fn require_path(path: &Path, message: &str) -> Result<()> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(CatalogError::InvalidInput(message.to_string()));
    }
    Ok(())
}

/// Point `asset` at `path` and refresh size and times when the file exists.
fn apply_path_state(asset: &mut PhotoAsset, path: &Path) {
    asset.set_path(path);
    if let Ok(stamp) = FileStamp::read(path) {
        asset.apply_stamp(&stamp);
    }
    asset.updated_utc = Utc::now();
}

/// Normalize, drop blanks and case-insensitive repeats, keep the first 100.
fn normalize_labels(values: &[String], normalize: fn(&str) -> String) -> BTreeSet<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| normalize(v))
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .take(MAX_LABELS)
        .collect()
}

/// Commas removed, whitespace collapsed to single spaces.
pub fn normalize_tag(tag: &str) -> String {
    tag.replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Separator runs collapsed to `_` (`"Anna Smith"` -> `"Anna_Smith"`).
pub fn normalize_identifier(id: &str) -> String {
    id.split(IDENTIFIER_SEPARATORS)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
