//! # Duplicates Module
//!
//! Byte-identical duplicate detection by SHA-256.
//!
//! ## Flow
//! 1. `compute_missing_hashes` fills in hashes the scan did not compute
//!    (for example after duplicate detection was switched on)
//! 2. `duplicate_groups` groups the hashed assets of a root

mod hasher;

pub use hasher::sha256_file;

use crate::core::cancel::CancellationToken;
use crate::core::catalog::{AssetScope, CatalogStore, CatalogWrite};
use crate::core::model::PhotoAsset;
use crate::error::{CatalogError, HashError, Result};
use crate::events::{Event, EventSender, HashEvent, HashProgress};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Concurrent file hashes, bounded to limit disk contention
pub const HASH_CONCURRENCY: usize = 4;

/// Candidates hashed between two catalog commits
const HASH_CHUNK_SIZE: usize = 100;

/// Assets sharing one content hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub sha256: String,
    /// Always at least 2
    pub count: usize,
}

/// Fills in content hashes and groups assets by them
pub struct DuplicateDetector {
    store: Arc<dyn CatalogStore>,
    pool: rayon::ThreadPool,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn CatalogStore>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(HASH_CONCURRENCY)
            .thread_name(|i| format!("sha256-{}", i))
            .build()
            .map_err(|e| CatalogError::Config(format!("cannot start hash workers: {}", e)))?;
        Ok(Self { store, pool })
    }

    /// Hash every asset of the root that has no hash yet.
    ///
    /// Files that no longer exist are skipped silently, unreadable ones are
    /// reported and skipped. Returns the number of assets hashed.
    pub fn compute_missing_hashes(
        &self,
        scan_root_id: i64,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if self.store.get_root(scan_root_id)?.is_none() {
            return Err(CatalogError::UnknownScanRoot { id: scan_root_id });
        }

        let candidates = self.store.assets_missing_hash(scan_root_id)?;
        let total = candidates.len();
        tracing::info!("Hashing {} assets of scan root {}", total, scan_root_id);
        events.send(Event::Hash(HashEvent::Started { total }));

        let mut completed = 0;
        let mut hashed = 0;

        for chunk in candidates.chunks(HASH_CHUNK_SIZE) {
            cancel.check()?;

            // Workers only read files; catalog writes stay on this thread.
            let results: Vec<Option<std::result::Result<String, HashError>>> =
                self.pool.install(|| {
                    chunk
                        .par_iter()
                        .map(|asset| {
                            if cancel.is_cancelled() || !asset.full_path.is_file() {
                                None
                            } else {
                                Some(sha256_file(&asset.full_path))
                            }
                        })
                        .collect()
                });

            let now = Utc::now();
            let mut writes = Vec::new();
            for (asset, result) in chunk.iter().zip(results) {
                completed += 1;
                match result {
                    Some(Ok(sha256)) => {
                        writes.push(CatalogWrite::UpdateAsset(with_hash(asset, sha256, now)));
                        hashed += 1;
                    }
                    Some(Err(e)) => {
                        tracing::debug!("Hash failed: {}", e);
                        events.send(Event::Hash(HashEvent::Error {
                            path: asset.full_path.clone(),
                            message: e.to_string(),
                        }));
                    }
                    None => {}
                }
                events.send(Event::Hash(HashEvent::Progress(HashProgress {
                    completed,
                    total,
                    current_path: asset.full_path.clone(),
                })));
            }

            if !writes.is_empty() {
                self.store.commit(&writes)?;
            }
            cancel.check()?;
        }

        events.send(Event::Hash(HashEvent::Completed { hashed }));
        tracing::info!("Hashed {} of {} assets", hashed, total);
        Ok(hashed)
    }

    /// Groups of two or more assets in the root sharing a hash, largest
    /// group first, ties broken by hash.
    pub fn duplicate_groups(&self, scan_root_id: i64) -> Result<Vec<DuplicateGroup>> {
        let mut groups: Vec<DuplicateGroup> = self
            .store
            .shared_hashes(AssetScope::Root(scan_root_id))?
            .into_iter()
            .filter(|(_, count)| *count >= 2)
            .map(|(sha256, count)| DuplicateGroup { sha256, count })
            .collect();

        groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.sha256.cmp(&b.sha256)));
        Ok(groups)
    }
}

fn with_hash(asset: &PhotoAsset, sha256: String, now: chrono::DateTime<Utc>) -> PhotoAsset {
    let mut updated = asset.clone();
    updated.sha256 = Some(sha256);
    updated.updated_utc = now;
    updated
}
