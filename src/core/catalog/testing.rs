//! Store doubles for tests of services that must survive rejected writes.

use super::{AssetScope, CatalogStore, CatalogWrite, InMemoryCatalog};
use crate::core::model::{PhotoAsset, ScanRoot};
use crate::error::StoreError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// In-memory catalog that rejects chosen writes with a constraint error.
pub(crate) struct RefusingStore {
    inner: InMemoryCatalog,
    refused_update: AtomicI64,
    refuse_inserts: AtomicBool,
}

impl RefusingStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: InMemoryCatalog::new(),
            refused_update: AtomicI64::new(-1),
            refuse_inserts: AtomicBool::new(false),
        }
    }

    /// Reject any commit that updates the row `id`.
    pub(crate) fn refuse_updates_of(&self, id: i64) {
        self.refused_update.store(id, Ordering::SeqCst);
    }

    /// Reject any commit that inserts a row.
    pub(crate) fn refuse_inserts(&self) {
        self.refuse_inserts.store(true, Ordering::SeqCst);
    }
}

impl CatalogStore for RefusingStore {
    fn insert_root(&self, root: &ScanRoot) -> Result<i64, StoreError> {
        self.inner.insert_root(root)
    }

    fn get_root(&self, id: i64) -> Result<Option<ScanRoot>, StoreError> {
        self.inner.get_root(id)
    }

    fn find_root_by_path(&self, path: &Path) -> Result<Option<ScanRoot>, StoreError> {
        self.inner.find_root_by_path(path)
    }

    fn list_roots(&self) -> Result<Vec<ScanRoot>, StoreError> {
        self.inner.list_roots()
    }

    fn get_asset(&self, id: i64) -> Result<Option<PhotoAsset>, StoreError> {
        self.inner.get_asset(id)
    }

    fn list_assets(&self, scope: AssetScope) -> Result<Vec<PhotoAsset>, StoreError> {
        self.inner.list_assets(scope)
    }

    fn commit(&self, writes: &[CatalogWrite]) -> Result<Vec<i64>, StoreError> {
        let refused = self.refused_update.load(Ordering::SeqCst);
        let inserts = self.refuse_inserts.load(Ordering::SeqCst);
        for write in writes {
            match write {
                CatalogWrite::UpdateAsset(asset) if asset.id == refused => {
                    return Err(StoreError::Constraint(format!("row {} is locked", refused)));
                }
                CatalogWrite::InsertAsset(asset) if inserts => {
                    return Err(StoreError::Constraint(format!(
                        "{} rejected",
                        asset.full_path.display()
                    )));
                }
                _ => {}
            }
        }
        self.inner.commit(writes)
    }
}
