//! Duplicate grouping.
//!
//! Every pair of same-kind entries is scored; pairs at or above the
//! threshold are joined and each connected component with two or more
//! members becomes a [`DuplicateGroup`]. Clustering is transitive: A~B and
//! B~C put A, B and C together even when A and C score low. That can
//! over-group chained spelling variants, so such groups are flagged with
//! `needs_review` and left for the operator to confirm.

use std::collections::BTreeMap;

use itertools::Itertools;
use shared::{
    catalog::{CatalogEntry, EntryKind},
    duplicates::{DuplicateGroup, DuplicateReport},
};
use tracing::{debug, info};

use crate::error::{CatalogError, Result};
use crate::planner;
use crate::similarity::{normalize_name, score_normalized};

pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// Groups `entries` with the built-in name scorer.
pub fn group(entries: &[CatalogEntry], threshold: f64) -> Result<Vec<DuplicateGroup>> {
    let normalized: Vec<String> = entries.iter().map(|e| normalize_name(&e.name)).collect();
    cluster(entries, threshold, |i, j| {
        score_normalized(&normalized[i], &normalized[j])
    })
}

/// Groups `entries` with a caller supplied scorer.
pub fn group_with<F>(entries: &[CatalogEntry], threshold: f64, scorer: F) -> Result<Vec<DuplicateGroup>>
where
    F: Fn(&CatalogEntry, &CatalogEntry) -> f64,
{
    cluster(entries, threshold, |i, j| scorer(&entries[i], &entries[j]))
}

pub fn report(entries: &[CatalogEntry], kind: EntryKind, threshold: f64) -> Result<DuplicateReport> {
    let scoped: Vec<CatalogEntry> = entries.iter().filter(|e| e.kind == kind).cloned().collect();
    let groups = group(&scoped, threshold)?;
    Ok(DuplicateReport {
        kind,
        threshold,
        entries_scanned: scoped.len(),
        groups,
    })
}

fn cluster<F>(entries: &[CatalogEntry], threshold: f64, pair_score: F) -> Result<Vec<DuplicateGroup>>
where
    F: Fn(usize, usize) -> f64,
{
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(CatalogError::InvalidThreshold(threshold));
    }

    let mut by_kind: BTreeMap<EntryKind, Vec<usize>> = BTreeMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        by_kind.entry(entry.kind).or_default().push(idx);
    }

    let mut sets = DisjointSet::new(entries.len());
    for indices in by_kind.values() {
        for (&i, &j) in indices.iter().tuple_combinations() {
            if pair_score(i, j) >= threshold {
                sets.union(i, j);
            }
        }
    }

    // Components keyed by their smallest index keep input order.
    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for idx in 0..entries.len() {
        let root = sets.find(idx);
        components.entry(root).or_default().push(idx);
    }
    let mut components: Vec<Vec<usize>> = components
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect();
    components.sort_by_key(|members| members[0]);

    let mut groups = Vec::with_capacity(components.len());
    for members in components {
        groups.push(build_group(entries, &members, threshold, &pair_score)?);
    }

    groups.sort_by(|a, b| b.total_tracks().cmp(&a.total_tracks()));

    info!(
        "Scanned {} entries, found {} duplicate groups ({} flagged for review)",
        entries.len(),
        groups.len(),
        groups.iter().filter(|g| g.needs_review).count()
    );
    Ok(groups)
}

fn build_group<F>(
    entries: &[CatalogEntry],
    members: &[usize],
    threshold: f64,
    pair_score: &F,
) -> Result<DuplicateGroup>
where
    F: Fn(usize, usize) -> f64,
{
    let first = &entries[members[0]];
    if let Some(stray) = members.iter().map(|&i| &entries[i]).find(|e| e.kind != first.kind) {
        return Err(CatalogError::AmbiguousGroup {
            first: format!("{} '{}'", first.kind, first.name),
            second: format!("{} '{}'", stray.kind, stray.name),
        });
    }

    let scores: Vec<f64> = members
        .iter()
        .tuple_combinations()
        .map(|(&i, &j)| pair_score(i, j))
        .collect();
    let min_score = scores.iter().copied().fold(1.0, f64::min);
    let average_score = scores.iter().sum::<f64>() / scores.len() as f64;

    let members: Vec<CatalogEntry> = members.iter().map(|&i| entries[i].clone()).collect();
    let suggested_name = planner::select_canonical(&members)
        .map(|e| e.name.clone())
        .unwrap_or_else(|| first.name.clone());

    let needs_review = min_score < threshold;
    if needs_review {
        debug!(
            "Group around '{}' is chained (min pair score {:.2} < {:.2})",
            suggested_name, min_score, threshold
        );
    }

    Ok(DuplicateGroup {
        kind: first.kind,
        members,
        suggested_name,
        average_score,
        min_score,
        needs_review,
    })
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}
