//! Catalog store trait definition.

use super::{AssetScope, CatalogWrite};
use crate::core::model::{PhotoAsset, ScanRoot};
use crate::error::StoreError;
use std::collections::HashMap;
use std::path::Path;

/// Trait for catalog backends
///
/// Backends must enforce uniqueness of `(scan_root_id, full_path)` and of
/// `root_path`, and apply each `commit` atomically.
pub trait CatalogStore: Send + Sync {
    /// Register a root and return its id
    fn insert_root(&self, root: &ScanRoot) -> Result<i64, StoreError>;

    fn update_root(&self, root: &ScanRoot) -> Result<(), StoreError> {
        self.commit(&[CatalogWrite::UpdateRoot(root.clone())])
            .map(|_| ())
    }

    fn get_root(&self, id: i64) -> Result<Option<ScanRoot>, StoreError>;

    /// Exact match on the normalized root path
    fn find_root_by_path(&self, path: &Path) -> Result<Option<ScanRoot>, StoreError>;

    /// All roots ordered by path
    fn list_roots(&self) -> Result<Vec<ScanRoot>, StoreError>;

    fn get_asset(&self, id: i64) -> Result<Option<PhotoAsset>, StoreError>;

    /// Assets in scope ordered by id
    fn list_assets(&self, scope: AssetScope) -> Result<Vec<PhotoAsset>, StoreError>;

    /// Assets of a root whose hash is null or empty, ordered by id
    fn assets_missing_hash(&self, scan_root_id: i64) -> Result<Vec<PhotoAsset>, StoreError> {
        Ok(self
            .list_assets(AssetScope::Root(scan_root_id))?
            .into_iter()
            .filter(|asset| !asset.has_hash())
            .collect())
    }

    /// `(sha256, count)` for every non-empty hash carried by two or more
    /// assets in scope, unordered
    fn shared_hashes(&self, scope: AssetScope) -> Result<Vec<(String, usize)>, StoreError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for asset in self.list_assets(scope)? {
            if let Some(hash) = asset.sha256.filter(|h| !h.is_empty()) {
                *counts.entry(hash).or_default() += 1;
            }
        }
        Ok(counts.into_iter().filter(|(_, count)| *count >= 2).collect())
    }

    /// Apply all writes in one transaction.
    ///
    /// Returns the ids assigned to `InsertAsset` writes, in order. On error
    /// nothing from this call is persisted. Updating a row that no longer
    /// exists is a no-op.
    fn commit(&self, writes: &[CatalogWrite]) -> Result<Vec<i64>, StoreError>;
}
