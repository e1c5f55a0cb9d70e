use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::EntryKind;

/// How a duplicate group is resolved against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Re-point child tracks at the canonical entry, then delete the losers.
    #[default]
    Merge,
    /// Degraded merge: rename the losers to the canonical name and keep them.
    RenameOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MergeOperation {
    Rename {
        entry_id: String,
        new_name: String,
    },
    ReassignTrack {
        track_id: String,
        from_artist_id: String,
        to_artist_id: String,
    },
    Delete {
        entry_id: String,
    },
}

impl MergeOperation {
    /// Id of the entry this operation mutates.
    pub fn target(&self) -> &str {
        match self {
            MergeOperation::Rename { entry_id, .. } => entry_id,
            MergeOperation::ReassignTrack { track_id, .. } => track_id,
            MergeOperation::Delete { entry_id } => entry_id,
        }
    }
}

impl fmt::Display for MergeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOperation::Rename { entry_id, new_name } => {
                write!(f, "rename {entry_id} -> '{new_name}'")
            }
            MergeOperation::ReassignTrack {
                track_id,
                from_artist_id,
                to_artist_id,
            } => write!(f, "reassign track {track_id}: {from_artist_id} -> {to_artist_id}"),
            MergeOperation::Delete { entry_id } => write!(f, "delete {entry_id}"),
        }
    }
}

/// Ordered operations resolving one duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePlan {
    pub kind: EntryKind,
    pub mode: MergeMode,
    pub canonical_id: String,
    pub canonical_name: String,
    pub operations: Vec<MergeOperation>,
}

impl MergePlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn deletes(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().filter_map(|op| match op {
            MergeOperation::Delete { entry_id } => Some(entry_id.as_str()),
            _ => None,
        })
    }

    pub fn renames(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().filter_map(|op| match op {
            MergeOperation::Rename { entry_id, .. } => Some(entry_id.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum OperationOutcome {
    Applied,
    /// The catalog already reflected the operation; nothing was sent.
    AlreadySatisfied,
    Failed(String),
    NotAttempted,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            OperationOutcome::Applied | OperationOutcome::AlreadySatisfied
        )
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationOutcome::Applied => write!(f, "ok"),
            OperationOutcome::AlreadySatisfied => write!(f, "already done"),
            OperationOutcome::Failed(message) => write!(f, "failed: {message}"),
            OperationOutcome::NotAttempted => write!(f, "not attempted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    pub operation: MergeOperation,
    pub outcome: OperationOutcome,
}

/// Per-operation result of executing one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub canonical_id: String,
    pub operations: Vec<OperationReport>,
    #[serde(default)]
    pub refreshed: bool,
}

impl ExecutionReport {
    pub fn is_complete(&self) -> bool {
        self.operations.iter().all(|r| r.outcome.is_success())
    }

    pub fn applied(&self) -> usize {
        self.operations
            .iter()
            .filter(|r| r.outcome == OperationOutcome::Applied)
            .count()
    }

    pub fn failure(&self) -> Option<&OperationReport> {
        self.operations
            .iter()
            .find(|r| matches!(r.outcome, OperationOutcome::Failed(_)))
    }

    /// Failed and never-attempted operations, in plan order.
    pub fn unresolved(&self) -> Vec<MergeOperation> {
        self.operations
            .iter()
            .filter(|r| !r.outcome.is_success())
            .map(|r| r.operation.clone())
            .collect()
    }

    /// The suffix of `plan` still to run, for a manual retry.
    pub fn remaining_plan(&self, plan: &MergePlan) -> MergePlan {
        MergePlan {
            operations: self.unresolved(),
            ..plan.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_serialize_with_op_tag() {
        let op = MergeOperation::ReassignTrack {
            track_id: "t1".into(),
            from_artist_id: "a2".into(),
            to_artist_id: "a1".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "reassign_track");
        assert_eq!(json["to_artist_id"], "a1");
        assert_eq!(op.target(), "t1");
    }

    #[test]
    fn unresolved_operations_form_the_remaining_plan() {
        let delete = |id: &str| MergeOperation::Delete { entry_id: id.into() };
        let plan = MergePlan {
            kind: EntryKind::Artist,
            mode: MergeMode::Merge,
            canonical_id: "a1".into(),
            canonical_name: "Blur".into(),
            operations: vec![delete("a2"), delete("a3"), delete("a4")],
        };
        let report = ExecutionReport {
            canonical_id: "a1".into(),
            operations: vec![
                OperationReport { operation: delete("a2"), outcome: OperationOutcome::AlreadySatisfied },
                OperationReport { operation: delete("a3"), outcome: OperationOutcome::Failed("boom".into()) },
                OperationReport { operation: delete("a4"), outcome: OperationOutcome::NotAttempted },
            ],
            refreshed: false,
        };

        assert!(!report.is_complete());
        assert_eq!(report.applied(), 0);
        assert_eq!(report.failure().unwrap().operation, delete("a3"));
        assert_eq!(report.remaining_plan(&plan).operations, vec![delete("a3"), delete("a4")]);
    }
}
