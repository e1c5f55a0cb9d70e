use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntry, EntryKind};

/// Entries believed to denote the same real-world artist or track.
///
/// Members are clustered transitively, so two members may score below the
/// threshold against each other while both score above it against a third.
/// Such groups carry `needs_review` and are never merged without an operator
/// confirming them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub kind: EntryKind,
    pub members: Vec<CatalogEntry>,
    pub suggested_name: String,
    pub average_score: f64,
    pub min_score: f64,
    pub needs_review: bool,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn total_tracks(&self) -> u32 {
        self.members.iter().map(|m| m.track_count).sum()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.id == id)
    }
}

/// Result of a duplicate scan over one kind of entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub kind: EntryKind,
    pub threshold: f64,
    pub entries_scanned: usize,
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateReport {
    pub fn duplicate_entries(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    pub fn flagged(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.iter().filter(|g| g.needs_review)
    }
}
