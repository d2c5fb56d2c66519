//! Types for the organize module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reason attached to every year/month move
pub const YEAR_MONTH_REASON: &str = "Sort to Year/Month folders";

/// One proposed move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerPlanItem {
    pub photo_id: i64,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub reason: String,
}

/// The organization plan (preview)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizerPlan {
    pub id: String,
    pub scan_root_id: i64,
    pub generated_utc: DateTime<Utc>,
    /// Assets looked at, including those already in place
    pub total_evaluated: usize,
    pub total_moves: usize,
    pub items: Vec<OrganizerPlanItem>,
}

/// Result of applying a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerApplyResult {
    pub attempted: usize,
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// At most [`MAX_APPLY_ERRORS`](super::MAX_APPLY_ERRORS) lines
    pub errors: Vec<String>,
}
