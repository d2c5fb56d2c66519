//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by long-running catalog operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Scan/reconcile events
    Scan(ScanEvent),
    /// Missing-hash fill events
    Hash(HashEvent),
    /// Organizer plan/apply events
    Organize(OrganizeEvent),
}

/// Events during a scan of one scan root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { scan_root_id: i64, root: PathBuf },
    /// Snapshot of the running counters
    Progress(ScanProgress),
    /// A file or directory failed but scanning continues
    Error { path: PathBuf, message: String },
    /// Scanning completed
    Completed(ScanSummary),
}

/// Running counters of a scan.
///
/// Counts never decrease between two snapshots of the same scan, and the
/// last snapshot equals the returned [`ScanSummary`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub found: usize,
    pub indexed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub removed: usize,
    /// File being processed, empty before and after the walk
    pub current_file: PathBuf,
    pub elapsed_ms: u64,
}

/// Final outcome of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub found: usize,
    pub indexed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub removed: usize,
    /// Directories that could not be listed and were left out
    pub directories_skipped: usize,
    pub duration_ms: u64,
}

/// Events while filling in missing content hashes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HashEvent {
    /// Hashing has started
    Started { total: usize },
    /// Progress update during hashing
    Progress(HashProgress),
    /// A file could not be hashed; it keeps an empty hash
    Error { path: PathBuf, message: String },
    /// Hashing completed
    Completed { hashed: usize },
}

/// Progress information during hashing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashProgress {
    /// Number of candidates processed so far
    pub completed: usize,
    /// Total number of candidates
    pub total: usize,
    /// Candidate just processed
    pub current_path: PathBuf,
}

/// Events from the organizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrganizeEvent {
    /// A plan was generated
    PlanCreated {
        plan_id: String,
        evaluated: usize,
        moves: usize,
    },
    /// One plan item was processed
    ApplyProgress {
        attempted: usize,
        total: usize,
        current_path: PathBuf,
    },
    /// Plan application finished
    ApplyCompleted {
        attempted: usize,
        moved: usize,
        skipped: usize,
        failed: usize,
    },
}

impl From<&ScanProgress> for ScanSummary {
    fn from(progress: &ScanProgress) -> Self {
        Self {
            found: progress.found,
            indexed: progress.indexed,
            updated: progress.updated,
            skipped: progress.skipped,
            removed: progress.removed,
            directories_skipped: 0,
            duration_ms: progress.elapsed_ms,
        }
    }
}
