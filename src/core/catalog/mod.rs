//! # Catalog Module
//!
//! Persistence of scan roots and photo assets.
//!
//! ## Backends
//! - `SqliteCatalog` - Persistent storage using SQLite
//! - `InMemoryCatalog` - For testing
//!
//! Services queue [`CatalogWrite`]s (usually in a [`WriteBatch`]) and commit
//! them together, so a failure or cancellation leaves the catalog as of the
//! last committed batch.

mod memory;
mod sqlite;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use memory::InMemoryCatalog;
pub use sqlite::SqliteCatalog;
pub use traits::CatalogStore;

use crate::core::model::{PhotoAsset, ScanRoot};
use crate::error::StoreError;

/// Which assets a read covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetScope {
    All,
    Root(i64),
}

impl AssetScope {
    pub fn contains(&self, asset: &PhotoAsset) -> bool {
        match self {
            AssetScope::All => true,
            AssetScope::Root(id) => asset.scan_root_id == *id,
        }
    }
}

impl From<Option<i64>> for AssetScope {
    fn from(root: Option<i64>) -> Self {
        root.map_or(AssetScope::All, AssetScope::Root)
    }
}

/// One queued mutation
#[derive(Debug, Clone)]
pub enum CatalogWrite {
    /// Insert a new row; its `id` is ignored and assigned by the store
    InsertAsset(PhotoAsset),
    /// Replace every column of the row with the same `id`
    UpdateAsset(PhotoAsset),
    DeleteAssets(Vec<i64>),
    UpdateRoot(ScanRoot),
}

/// Pending writes flushed in one transaction
#[derive(Debug)]
pub struct WriteBatch {
    writes: Vec<CatalogWrite>,
    capacity: usize,
}

impl WriteBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            writes: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, write: CatalogWrite) {
        self.writes.push(write);
    }

    /// True once the batch reached its flush threshold
    pub fn is_full(&self) -> bool {
        self.writes.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Commit everything queued so far. Returns the ids of inserted assets
    /// in queue order.
    pub fn flush(&mut self, store: &dyn CatalogStore) -> Result<Vec<i64>, StoreError> {
        if self.writes.is_empty() {
            return Ok(Vec::new());
        }
        let writes = std::mem::take(&mut self.writes);
        store.commit(&writes)
    }

    /// Drop queued writes without committing them.
    pub fn discard(&mut self) -> usize {
        let dropped = self.writes.len();
        self.writes.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::{Path, PathBuf};

    #[test]
    fn batch_reports_full_at_capacity() {
        let mut batch = WriteBatch::new(2);
        assert!(!batch.is_full());
        batch.push(CatalogWrite::DeleteAssets(vec![1]));
        assert!(!batch.is_full());
        batch.push(CatalogWrite::DeleteAssets(vec![2]));
        assert!(batch.is_full());
    }

    #[test]
    fn flush_commits_and_empties() {
        let store = InMemoryCatalog::new();
        let root_id = store
            .insert_root(&ScanRoot::new(PathBuf::from("/photos"), false))
            .unwrap();

        let mut batch = WriteBatch::new(10);
        batch.push(CatalogWrite::InsertAsset(PhotoAsset::new(
            root_id,
            Path::new("/photos/a.jpg"),
            Utc::now(),
        )));
        let ids = batch.flush(&store).unwrap();

        assert_eq!(ids.len(), 1);
        assert!(batch.is_empty());
        assert!(store.get_asset(ids[0]).unwrap().is_some());
    }

    #[test]
    fn discard_drops_pending_writes() {
        let store = InMemoryCatalog::new();
        let root_id = store
            .insert_root(&ScanRoot::new(PathBuf::from("/photos"), false))
            .unwrap();

        let mut batch = WriteBatch::new(10);
        batch.push(CatalogWrite::InsertAsset(PhotoAsset::new(
            root_id,
            Path::new("/photos/a.jpg"),
            Utc::now(),
        )));
        assert_eq!(batch.discard(), 1);
        batch.flush(&store).unwrap();

        assert!(store.list_assets(AssetScope::Root(root_id)).unwrap().is_empty());
    }

    #[test]
    fn scope_from_optional_root() {
        assert_eq!(AssetScope::from(None), AssetScope::All);
        assert_eq!(AssetScope::from(Some(3)), AssetScope::Root(3));
    }
}
