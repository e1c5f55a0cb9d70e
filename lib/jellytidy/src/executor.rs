//! Applies a [`MergePlan`] against a catalog.
//!
//! Operations run strictly in plan order. The first remote failure stops
//! the run: already applied operations stay applied (the catalog has no
//! transactions) and the rest are reported as not attempted. Nothing is
//! retried; the operator decides what to re-run from the report.

use shared::merge::{
    ExecutionReport, MergeOperation, MergePlan, OperationOutcome, OperationReport,
};
use tracing::{error, info, warn};

use crate::error::{CatalogError, Result};
use crate::planner;
use crate::traits::CatalogApi;

pub struct MergeExecutor<'a> {
    catalog: &'a dyn CatalogApi,
    refresh_after: bool,
}

impl<'a> MergeExecutor<'a> {
    pub fn new(catalog: &'a dyn CatalogApi) -> Self {
        Self {
            catalog,
            refresh_after: false,
        }
    }

    /// Trigger a metadata refresh of the canonical entry once every
    /// operation succeeded.
    pub fn refresh_after(mut self, refresh: bool) -> Self {
        self.refresh_after = refresh;
        self
    }

    /// Runs `plan` and reports every operation.
    ///
    /// Only a plan breaking the ordering rules is an error; remote failures
    /// end up in the report.
    pub async fn execute(&self, plan: &MergePlan) -> Result<ExecutionReport> {
        planner::validate(plan)?;

        info!(
            "Executing {} operations on {} keeping '{}'",
            plan.operations.len(),
            self.catalog.name(),
            plan.canonical_name
        );

        let mut reports = Vec::with_capacity(plan.operations.len());
        let mut aborted = false;

        for operation in &plan.operations {
            let outcome = if aborted {
                OperationOutcome::NotAttempted
            } else {
                match self.apply(operation).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("{} failed: {}", operation, e);
                        aborted = true;
                        OperationOutcome::Failed(e.to_string())
                    }
                }
            };
            reports.push(OperationReport {
                operation: operation.clone(),
                outcome,
            });
        }

        let mut report = ExecutionReport {
            canonical_id: plan.canonical_id.clone(),
            operations: reports,
            refreshed: false,
        };

        if self.refresh_after && report.is_complete() {
            match self.catalog.refresh_metadata(Some(&plan.canonical_id)).await {
                Ok(()) => report.refreshed = true,
                Err(e) => warn!("Metadata refresh of {} failed: {}", plan.canonical_id, e),
            }
        }

        Ok(report)
    }

    /// Checks the current remote state first so that re-running a plan that
    /// already went through reports no-ops instead of errors.
    async fn apply(&self, operation: &MergeOperation) -> Result<OperationOutcome> {
        match operation {
            MergeOperation::Rename { entry_id, new_name } => {
                let entry = self.catalog.get_entry(entry_id).await?;
                if entry.name == *new_name {
                    return Ok(OperationOutcome::AlreadySatisfied);
                }
                info!("Renaming {} '{}' -> '{}'", entry_id, entry.name, new_name);
                self.catalog.rename_entry(entry_id, new_name).await?;
            }
            MergeOperation::ReassignTrack {
                track_id,
                to_artist_id,
                ..
            } => {
                let track = self.catalog.get_entry(track_id).await?;
                if track.parent_id.as_deref() == Some(to_artist_id.as_str()) {
                    return Ok(OperationOutcome::AlreadySatisfied);
                }
                info!("Reassigning track {} to {}", track_id, to_artist_id);
                self.catalog.reassign_track(track_id, to_artist_id).await?;
            }
            MergeOperation::Delete { entry_id } => {
                match self.catalog.get_entry(entry_id).await {
                    Err(e) if e.is_not_found() => {
                        return Ok(OperationOutcome::AlreadySatisfied);
                    }
                    Err(e) => return Err(e),
                    Ok(_) => {}
                }
                info!("Deleting {}", entry_id);
                match self.catalog.delete_entry(entry_id).await {
                    Err(CatalogError::NotFound { .. }) => {
                        return Ok(OperationOutcome::AlreadySatisfied)
                    }
                    other => other?,
                }
            }
        }
        Ok(OperationOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;
    use crate::planner::{plan, PlanOptions};
    use shared::{
        catalog::{CatalogEntry, EntryKind},
        duplicates::DuplicateGroup,
        merge::MergeMode,
    };

    fn library() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::artist("keep", "AC/DC").with_track_count(1),
            CatalogEntry::artist("drop", "AC-DC").with_track_count(2),
            CatalogEntry::track("t1", "Thunderstruck", Some("drop".into())),
            CatalogEntry::track("t2", "Back in Black", Some("drop".into())),
            CatalogEntry::track("t3", "Highway to Hell", Some("keep".into())),
        ]
    }

    fn acdc_group(entries: &[CatalogEntry]) -> DuplicateGroup {
        DuplicateGroup {
            kind: EntryKind::Artist,
            members: entries[..2].to_vec(),
            suggested_name: "AC/DC".into(),
            average_score: 1.0,
            min_score: 1.0,
            needs_review: false,
        }
    }

    fn three_renames() -> MergePlan {
        MergePlan {
            kind: EntryKind::Artist,
            mode: MergeMode::RenameOnly,
            canonical_id: "c".into(),
            canonical_name: "Canon".into(),
            operations: ["x", "y", "z"]
                .iter()
                .map(|id| MergeOperation::Rename {
                    entry_id: id.to_string(),
                    new_name: "Canon".into(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn merge_moves_tracks_then_deletes() {
        let entries = library();
        let catalog = MemoryCatalog::new(entries.clone());
        let tracks: Vec<CatalogEntry> = entries[2..].to_vec();
        // "drop" owns more tracks, so choose the other member explicitly.
        let plan = plan(
            &acdc_group(&entries),
            &tracks,
            &PlanOptions::default().prefer("keep"),
        )
        .unwrap();

        let report = MergeExecutor::new(&catalog)
            .refresh_after(true)
            .execute(&plan)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.applied(), 3);
        assert!(report.refreshed);
        assert!(catalog.entry("drop").await.is_none());
        assert_eq!(catalog.entry("keep").await.unwrap().track_count, 3);
        assert_eq!(
            catalog.calls().await,
            vec![
                "reassign t1 keep",
                "reassign t2 keep",
                "delete drop",
                "refresh keep"
            ]
        );
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let catalog = MemoryCatalog::new([
            CatalogEntry::artist("c", "Canon"),
            CatalogEntry::artist("x", "canon"),
            CatalogEntry::artist("y", "CANON"),
            CatalogEntry::artist("z", "Canon."),
        ]);
        catalog.fail_on("y", "permission denied").await;

        let report = MergeExecutor::new(&catalog)
            .execute(&three_renames())
            .await
            .unwrap();

        let outcomes: Vec<&OperationOutcome> =
            report.operations.iter().map(|r| &r.outcome).collect();
        assert_eq!(outcomes[0], &OperationOutcome::Applied);
        assert!(
            matches!(outcomes[1], OperationOutcome::Failed(message) if message.contains("permission denied"))
        );
        assert_eq!(outcomes[2], &OperationOutcome::NotAttempted);
        assert!(!report.is_complete());
        assert_eq!(catalog.entry("z").await.unwrap().name, "Canon.");

        let remaining = report.remaining_plan(&three_renames());
        let targets: Vec<&str> = remaining.operations.iter().map(|op| op.target()).collect();
        assert_eq!(targets, vec!["y", "z"]);
    }

    #[tokio::test]
    async fn rerunning_an_applied_plan_is_a_no_op() {
        let entries = library();
        let catalog = MemoryCatalog::new(entries.clone());
        let plan = plan(
            &acdc_group(&entries),
            &entries[2..],
            &PlanOptions::default().prefer("keep"),
        )
        .unwrap();
        let executor = MergeExecutor::new(&catalog);

        executor.execute(&plan).await.unwrap();
        let calls_after_first = catalog.calls().await.len();
        let second = executor.execute(&plan).await.unwrap();

        assert!(second
            .operations
            .iter()
            .all(|r| r.outcome == OperationOutcome::AlreadySatisfied));
        assert_eq!(catalog.calls().await.len(), calls_after_first);
    }

    #[tokio::test]
    async fn vanished_rename_target_is_a_failure() {
        let catalog = MemoryCatalog::new([CatalogEntry::artist("c", "Canon")]);
        let report = MergeExecutor::new(&catalog)
            .execute(&three_renames())
            .await
            .unwrap();
        assert!(matches!(
            report.operations[0].outcome,
            OperationOutcome::Failed(_)
        ));
        assert_eq!(report.operations[1].outcome, OperationOutcome::NotAttempted);
    }

    #[tokio::test]
    async fn refuses_plans_that_break_ordering() {
        let catalog = MemoryCatalog::default();
        let bad = MergePlan {
            operations: vec![MergeOperation::Delete {
                entry_id: "c".into(),
            }],
            ..three_renames()
        };
        assert!(matches!(
            MergeExecutor::new(&catalog).execute(&bad).await,
            Err(CatalogError::InvalidPlan(_))
        ));
        assert!(catalog.calls().await.is_empty());
    }
}
