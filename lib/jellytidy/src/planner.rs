//! Turns an approved duplicate group into an ordered [`MergePlan`].

use std::collections::HashSet;

use shared::{
    catalog::{CatalogEntry, EntryKind},
    duplicates::DuplicateGroup,
    merge::{MergeMode, MergeOperation, MergePlan},
};
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::similarity;

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub mode: MergeMode,
    /// Operator override: id or exact name of the member to keep.
    pub preferred: Option<String>,
}

impl PlanOptions {
    pub fn rename_only() -> Self {
        Self {
            mode: MergeMode::RenameOnly,
            preferred: None,
        }
    }

    pub fn prefer(mut self, id_or_name: impl Into<String>) -> Self {
        self.preferred = Some(id_or_name.into());
        self
    }
}

/// Picks the entry that survives a merge.
///
/// In order, until one rule leaves a single candidate:
/// 1. most tracks (artists) or most complete metadata (tracks);
/// 2. a name free of import artifacts;
/// 3. the smallest id.
pub fn select_canonical(members: &[CatalogEntry]) -> Option<&CatalogEntry> {
    let richness = |e: &CatalogEntry| match e.kind {
        EntryKind::Artist => e.track_count,
        EntryKind::Track => e.metadata_completeness,
    };
    let best = members.iter().map(richness).max()?;

    let mut candidates: Vec<&CatalogEntry> =
        members.iter().filter(|e| richness(e) == best).collect();

    if candidates.len() > 1 {
        let clean: Vec<&CatalogEntry> = candidates
            .iter()
            .copied()
            .filter(|e| !has_name_artifacts(&e.name))
            .collect();
        if !clean.is_empty() {
            candidates = clean;
        }
    }

    candidates.into_iter().min_by(|a, b| a.id.cmp(&b.id))
}

/// True for names that look like import debris: "Alice_In_Chains_",
/// padded or doubled whitespace, dangling separators, "Last, First".
pub fn has_name_artifacts(name: &str) -> bool {
    const DANGLING: [char; 8] = ['-', '_', ',', '/', ';', ':', '~', '|'];

    if name.is_empty() || name.trim() != name {
        return true;
    }
    if name.contains('_') || name.contains("  ") || name.contains('\u{FFFD}') {
        return true;
    }
    if name.starts_with(&DANGLING[..]) || name.ends_with(&DANGLING[..]) || name.starts_with('.') {
        return true;
    }
    similarity::is_last_first(name)
}

/// Builds the operations that fold every non-canonical member into the
/// canonical one.
///
/// In [`MergeMode::Merge`] each loser's tracks are re-pointed first and the
/// loser is deleted afterwards. In [`MergeMode::RenameOnly`] losers are only
/// renamed to the canonical name. The canonical entry is never a target.
pub fn plan(
    group: &DuplicateGroup,
    tracks: &[CatalogEntry],
    options: &PlanOptions,
) -> Result<MergePlan> {
    validate_group(group)?;

    let canonical = match &options.preferred {
        Some(preferred) => {
            let preferred = preferred.trim();
            group
                .members
                .iter()
                .find(|m| m.id == preferred)
                .or_else(|| group.members.iter().find(|m| m.name == preferred))
                .ok_or_else(|| {
                    CatalogError::InvalidGroup(format!("'{preferred}' is not a member of the group"))
                })?
        }
        None => select_canonical(&group.members)
            .ok_or_else(|| CatalogError::InvalidGroup("group is empty".to_string()))?,
    };

    let mut operations = Vec::new();
    let mut seen_tracks = HashSet::new();

    for loser in group.members.iter().filter(|m| m.id != canonical.id) {
        match options.mode {
            MergeMode::Merge => {
                if group.kind == EntryKind::Artist {
                    for track in tracks.iter().filter(|t| {
                        t.kind == EntryKind::Track && t.parent_id.as_deref() == Some(loser.id.as_str())
                    }) {
                        if seen_tracks.insert(track.id.as_str()) {
                            operations.push(MergeOperation::ReassignTrack {
                                track_id: track.id.clone(),
                                from_artist_id: loser.id.clone(),
                                to_artist_id: canonical.id.clone(),
                            });
                        }
                    }
                }
                operations.push(MergeOperation::Delete {
                    entry_id: loser.id.clone(),
                });
            }
            MergeMode::RenameOnly => {
                if loser.name != canonical.name {
                    operations.push(MergeOperation::Rename {
                        entry_id: loser.id.clone(),
                        new_name: canonical.name.clone(),
                    });
                }
            }
        }
    }

    let plan = MergePlan {
        kind: group.kind,
        mode: options.mode,
        canonical_id: canonical.id.clone(),
        canonical_name: canonical.name.clone(),
        operations,
    };
    validate(&plan)?;

    debug!(
        "Planned {} operations keeping '{}' ({})",
        plan.operations.len(),
        plan.canonical_name,
        plan.canonical_id
    );
    Ok(plan)
}

/// Deletes entries that have no surviving counterpart, such as junk artists.
///
/// The plan has no canonical entry, so it must not contain reassignments.
pub fn deletion_plan<'a>(
    kind: EntryKind,
    entries: impl IntoIterator<Item = &'a CatalogEntry>,
) -> Result<MergePlan> {
    let mut ids = HashSet::new();
    let mut operations = Vec::new();
    for entry in entries {
        if entry.kind != kind {
            return Err(CatalogError::AmbiguousGroup {
                first: format!("{kind} deletion"),
                second: format!("{} '{}'", entry.kind, entry.name),
            });
        }
        if ids.insert(entry.id.as_str()) {
            operations.push(MergeOperation::Delete {
                entry_id: entry.id.clone(),
            });
        }
    }
    let plan = MergePlan {
        kind,
        mode: MergeMode::Merge,
        canonical_id: String::new(),
        canonical_name: String::new(),
        operations,
    };
    validate(&plan)?;
    Ok(plan)
}

fn validate_group(group: &DuplicateGroup) -> Result<()> {
    let Some(first) = group.members.first() else {
        return Err(CatalogError::InvalidGroup("group is empty".to_string()));
    };
    if group.members.len() < 2 {
        return Err(CatalogError::InvalidGroup(format!(
            "group around '{}' has a single member",
            first.name
        )));
    }
    if let Some(stray) = group.members.iter().find(|m| m.kind != group.kind) {
        return Err(CatalogError::AmbiguousGroup {
            first: format!("{} group", group.kind),
            second: format!("{} '{}'", stray.kind, stray.name),
        });
    }
    let mut ids = HashSet::new();
    if let Some(dup) = group.members.iter().find(|m| !ids.insert(m.id.as_str())) {
        return Err(CatalogError::InvalidGroup(format!(
            "entry {} appears twice",
            dup.id
        )));
    }
    Ok(())
}

/// Checks the ordering and safety rules of a plan.
///
/// The canonical entry is never renamed or deleted, reassigned tracks always
/// land on it, and no artist is deleted before every track moving away from
/// it has been reassigned.
pub fn validate(plan: &MergePlan) -> Result<()> {
    let mut deleted: HashSet<&str> = HashSet::new();

    for op in &plan.operations {
        if deleted.contains(op.target()) {
            return Err(CatalogError::InvalidPlan(format!(
                "{op} targets an entry deleted earlier in the plan"
            )));
        }
        match op {
            MergeOperation::Rename { entry_id, .. } | MergeOperation::Delete { entry_id }
                if *entry_id == plan.canonical_id =>
            {
                return Err(CatalogError::InvalidPlan(format!(
                    "{op} targets the canonical entry"
                )));
            }
            MergeOperation::ReassignTrack {
                from_artist_id,
                to_artist_id,
                ..
            } => {
                if *to_artist_id != plan.canonical_id {
                    return Err(CatalogError::InvalidPlan(format!(
                        "{op} does not point at the canonical entry"
                    )));
                }
                if deleted.contains(from_artist_id.as_str()) {
                    return Err(CatalogError::InvalidPlan(format!(
                        "{op} runs after its artist was deleted"
                    )));
                }
            }
            MergeOperation::Delete { entry_id } => {
                deleted.insert(entry_id.as_str());
            }
            MergeOperation::Rename { .. } => {}
        }
    }
    Ok(())
}
