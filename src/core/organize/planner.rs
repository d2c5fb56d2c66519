//! Plan generator for year/month organization.

use super::audit::OrganizerAuditLog;
use super::types::*;
use crate::core::cancel::CancellationToken;
use crate::core::catalog::{AssetScope, CatalogStore};
use crate::core::paths::resolve_unique_path;
use crate::error::{CatalogError, Result};
use crate::events::{Event, EventSender, OrganizeEvent};
use chrono::{DateTime, Datelike, Local, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Generates organization plans
pub struct OrganizePlanner {
    store: Arc<dyn CatalogStore>,
    audit: OrganizerAuditLog,
}

impl OrganizePlanner {
    pub fn new(store: Arc<dyn CatalogStore>, audit: OrganizerAuditLog) -> Self {
        Self { store, audit }
    }

    /// Propose a move into `root/YYYY/YYYY-MM/` for every asset of the root
    /// that is not already there. Nothing on disk changes except the
    /// organizer log, which receives one block per plan.
    pub fn create_plan(
        &self,
        scan_root_id: i64,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<OrganizerPlan> {
        let root = self
            .store
            .get_root(scan_root_id)?
            .ok_or(CatalogError::UnknownScanRoot { id: scan_root_id })?;
        let assets = self.store.list_assets(AssetScope::Root(scan_root_id))?;

        // Every cataloged path starts out taken, so no item lands on a file
        // that stays where it is.
        let mut occupied: HashSet<PathBuf> =
            assets.iter().map(|a| a.full_path.clone()).collect();
        let mut items = Vec::new();

        for asset in &assets {
            cancel.check()?;
            if asset.file_name.is_empty() || asset.full_path.as_os_str().is_empty() {
                continue;
            }

            let target = target_folder(&root.root_path, asset.effective_date()).join(&asset.file_name);
            if target == asset.full_path {
                continue;
            }

            occupied.remove(&asset.full_path);
            let destination = resolve_unique_path(&target, &occupied, None);
            occupied.insert(destination.clone());

            items.push(OrganizerPlanItem {
                photo_id: asset.id,
                source_path: asset.full_path.clone(),
                destination_path: destination,
                reason: YEAR_MONTH_REASON.to_string(),
            });
        }

        let plan = OrganizerPlan {
            id: Uuid::new_v4().to_string(),
            scan_root_id,
            generated_utc: Utc::now(),
            total_evaluated: assets.len(),
            total_moves: items.len(),
            items,
        };

        self.audit.record_plan(&root.root_path, &plan)?;

        tracing::info!(
            "Organizer plan {} for {}: evaluated={} moves={}",
            plan.id,
            root.root_path.display(),
            plan.total_evaluated,
            plan.total_moves
        );
        events.send(Event::Organize(OrganizeEvent::PlanCreated {
            plan_id: plan.id.clone(),
            evaluated: plan.total_evaluated,
            moves: plan.total_moves,
        }));
        Ok(plan)
    }
}

/// `root/YYYY/YYYY-MM` for the local calendar date of `date`.
pub fn target_folder(root: &Path, date: DateTime<Utc>) -> PathBuf {
    let local = date.with_timezone(&Local);
    let year = format!("{:04}", local.year());
    let month = format!("{:04}-{:02}", local.year(), local.month());
    root.join(year).join(month)
}
