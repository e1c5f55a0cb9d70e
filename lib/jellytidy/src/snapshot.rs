use std::collections::HashMap;

use shared::catalog::{CatalogEntry, EntryKind};
use tracing::{debug, info};

use crate::error::Result;
use crate::memory::MemoryCatalog;
use crate::traits::CatalogApi;

/// Artists and tracks of a catalog at one point in time.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub artists: Vec<CatalogEntry>,
    pub tracks: Vec<CatalogEntry>,
}

impl CatalogSnapshot {
    pub async fn fetch(catalog: &dyn CatalogApi) -> Result<Self> {
        let mut artists = catalog.list_entries(EntryKind::Artist).await?;
        let tracks = catalog.list_entries(EntryKind::Track).await?;
        count_tracks(&mut artists, &tracks);
        info!(
            "Snapshot of {}: {} artists, {} tracks",
            catalog.name(),
            artists.len(),
            tracks.len()
        );
        Ok(Self { artists, tracks })
    }

    pub fn entries(&self, kind: EntryKind) -> &[CatalogEntry] {
        match kind {
            EntryKind::Artist => &self.artists,
            EntryKind::Track => &self.tracks,
        }
    }

    /// An in-memory copy to rehearse merges against.
    pub fn to_memory(&self) -> MemoryCatalog {
        MemoryCatalog::new(self.artists.iter().chain(&self.tracks).cloned())
    }
}

/// Servers that report no song count for an artist get one from the track list.
fn count_tracks(artists: &mut [CatalogEntry], tracks: &[CatalogEntry]) {
    let mut owned: HashMap<&str, u32> = HashMap::new();
    for parent in tracks.iter().filter_map(|t| t.parent_id.as_deref()) {
        *owned.entry(parent).or_default() += 1;
    }
    for artist in artists.iter_mut().filter(|a| a.track_count == 0) {
        if let Some(count) = owned.get(artist.id.as_str()) {
            debug!("Counted {} tracks for {}", count, artist.name);
            artist.track_count = *count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fills_missing_track_counts() {
        let catalog = MemoryCatalog::new([
            CatalogEntry::artist("a1", "Blur"),
            CatalogEntry::artist("a2", "Oasis").with_track_count(9),
            CatalogEntry::track("t1", "Song 2", Some("a1".into())),
            CatalogEntry::track("t2", "Parklife", Some("a1".into())),
            CatalogEntry::track("t3", "Wonderwall", Some("a2".into())),
        ]);

        let snapshot = CatalogSnapshot::fetch(&catalog).await.unwrap();

        assert_eq!(snapshot.artists[0].track_count, 2);
        assert_eq!(snapshot.artists[1].track_count, 9);
        assert_eq!(snapshot.entries(EntryKind::Track).len(), 3);
        assert_eq!(snapshot.to_memory().entries().await.len(), 5);
    }
}
