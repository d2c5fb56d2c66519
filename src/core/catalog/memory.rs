//! In-memory catalog backend for testing.

use super::{AssetScope, CatalogStore, CatalogWrite};
use crate::core::model::{PhotoAsset, ScanRoot};
use crate::error::StoreError;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default)]
struct State {
    roots: BTreeMap<i64, ScanRoot>,
    assets: BTreeMap<i64, PhotoAsset>,
    paths: HashMap<(i64, PathBuf), i64>,
    next_root_id: i64,
    next_asset_id: i64,
}

impl State {
    fn apply(&mut self, write: &CatalogWrite, inserted: &mut Vec<i64>) -> Result<(), StoreError> {
        match write {
            CatalogWrite::InsertAsset(asset) => {
                if !self.roots.contains_key(&asset.scan_root_id) {
                    return Err(StoreError::Constraint(format!(
                        "scan root {} does not exist",
                        asset.scan_root_id
                    )));
                }
                let key = (asset.scan_root_id, asset.full_path.clone());
                if self.paths.contains_key(&key) {
                    return Err(duplicate_path(asset));
                }
                self.next_asset_id += 1;
                let id = self.next_asset_id;
                let mut stored = asset.clone();
                stored.id = id;
                self.paths.insert(key, id);
                self.assets.insert(id, stored);
                inserted.push(id);
            }
            CatalogWrite::UpdateAsset(asset) => {
                let Some(existing) = self.assets.get(&asset.id) else {
                    return Ok(());
                };
                let old_key = (existing.scan_root_id, existing.full_path.clone());
                let new_key = (asset.scan_root_id, asset.full_path.clone());
                if old_key != new_key && self.paths.contains_key(&new_key) {
                    return Err(duplicate_path(asset));
                }
                let mut stored = asset.clone();
                stored.indexed_utc = existing.indexed_utc;
                self.paths.remove(&old_key);
                self.paths.insert(new_key, asset.id);
                self.assets.insert(asset.id, stored);
            }
            CatalogWrite::DeleteAssets(ids) => {
                for id in ids {
                    if let Some(removed) = self.assets.remove(id) {
                        self.paths.remove(&(removed.scan_root_id, removed.full_path));
                    }
                }
            }
            CatalogWrite::UpdateRoot(root) => {
                if self
                    .roots
                    .values()
                    .any(|r| r.id != root.id && r.root_path == root.root_path)
                {
                    return Err(duplicate_root(&root.root_path));
                }
                if let Some(existing) = self.roots.get_mut(&root.id) {
                    *existing = root.clone();
                }
            }
        }
        Ok(())
    }
}

fn duplicate_path(asset: &PhotoAsset) -> StoreError {
    StoreError::Constraint(format!(
        "photo_assets.scan_root_id, photo_assets.full_path: {} already cataloged in root {}",
        asset.full_path.display(),
        asset.scan_root_id
    ))
}

fn duplicate_root(path: &Path) -> StoreError {
    StoreError::Constraint(format!("scan_roots.root_path: {}", path.display()))
}

/// In-memory catalog backend
///
/// Same constraints as the SQLite backend. Useful for testing and scenarios
/// where persistence isn't needed.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<State>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| StoreError::Corrupted {
            path: PathBuf::from("memory"),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| StoreError::Corrupted {
            path: PathBuf::from("memory"),
        })
    }
}

impl CatalogStore for InMemoryCatalog {
    fn insert_root(&self, root: &ScanRoot) -> Result<i64, StoreError> {
        let mut state = self.write()?;
        if state.roots.values().any(|r| r.root_path == root.root_path) {
            return Err(duplicate_root(&root.root_path));
        }
        state.next_root_id += 1;
        let id = state.next_root_id;
        let mut stored = root.clone();
        stored.id = id;
        state.roots.insert(id, stored);
        Ok(id)
    }

    fn get_root(&self, id: i64) -> Result<Option<ScanRoot>, StoreError> {
        Ok(self.read()?.roots.get(&id).cloned())
    }

    fn find_root_by_path(&self, path: &Path) -> Result<Option<ScanRoot>, StoreError> {
        Ok(self
            .read()?
            .roots
            .values()
            .find(|r| r.root_path == path)
            .cloned())
    }

    fn list_roots(&self) -> Result<Vec<ScanRoot>, StoreError> {
        let mut roots: Vec<ScanRoot> = self.read()?.roots.values().cloned().collect();
        roots.sort_by(|a, b| a.root_path.cmp(&b.root_path).then(a.id.cmp(&b.id)));
        Ok(roots)
    }

    fn get_asset(&self, id: i64) -> Result<Option<PhotoAsset>, StoreError> {
        Ok(self.read()?.assets.get(&id).cloned())
    }

    fn list_assets(&self, scope: AssetScope) -> Result<Vec<PhotoAsset>, StoreError> {
        Ok(self
            .read()?
            .assets
            .values()
            .filter(|asset| scope.contains(asset))
            .cloned()
            .collect())
    }

    fn commit(&self, writes: &[CatalogWrite]) -> Result<Vec<i64>, StoreError> {
        let mut state = self.write()?;
        // Apply to a copy so a failing write leaves nothing behind.
        let mut staged = state.clone();
        let mut inserted = Vec::new();
        for write in writes {
            staged.apply(write, &mut inserted)?;
        }
        *state = staged;
        Ok(inserted)
    }
}
