//! Append-only, human-readable record of plans and applies.

use super::{OrganizerApplyResult, OrganizerPlan, MAX_APPLY_ERRORS};
use crate::error::OrganizeError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The organizer log file
#[derive(Debug, Clone)]
pub struct OrganizerAuditLog {
    path: PathBuf,
}

impl OrganizerAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `[ts] Root=.. Evaluated=.. Moves=..` then one `PLAN:` line per item.
    pub fn record_plan(&self, root: &Path, plan: &OrganizerPlan) -> Result<(), OrganizeError> {
        let mut block = format!(
            "[{}] Root={} Evaluated={} Moves={}\n",
            timestamp(plan.generated_utc),
            root.display(),
            plan.total_evaluated,
            plan.total_moves
        );
        for item in &plan.items {
            let _ = writeln!(
                block,
                "PLAN: {} => {}",
                item.source_path.display(),
                item.destination_path.display()
            );
        }
        self.append(&block)
    }

    /// `[ts] APPLY Root=.. Attempted=.. Moved=.. Skipped=.. Failed=..` then
    /// up to 50 `APPLY-ERROR:` lines.
    pub fn record_apply(
        &self,
        root: &Path,
        result: &OrganizerApplyResult,
    ) -> Result<(), OrganizeError> {
        let mut block = format!(
            "[{}] APPLY Root={} Attempted={} Moved={} Skipped={} Failed={}\n",
            timestamp(Utc::now()),
            root.display(),
            result.attempted,
            result.moved,
            result.skipped,
            result.failed
        );
        for error in result.errors.iter().take(MAX_APPLY_ERRORS) {
            let _ = writeln!(block, "APPLY-ERROR: {}", error);
        }
        self.append(&block)
    }

    fn append(&self, block: &str) -> Result<(), OrganizeError> {
        let wrap = |source: std::io::Error| OrganizeError::AuditLog {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(wrap)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(wrap)?;
        file.write_all(block.as_bytes()).map_err(wrap)
    }
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
