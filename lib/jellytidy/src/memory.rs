//! A catalog held entirely in memory.
//!
//! Used for dry runs against a snapshot of the real server and as the
//! catalog in tests. Deleting an artist that still owns tracks is refused,
//! so plans that break ordering fail here the same way they would corrupt
//! a real library.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use shared::catalog::{CatalogEntry, CatalogSummary, EntryKind};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::similarity::normalize_name;
use crate::traits::{CatalogApi, PlaylistApi};

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub track_ids: Vec<String>,
}

#[derive(Default)]
struct State {
    entries: BTreeMap<String, CatalogEntry>,
    playlists: Vec<Playlist>,
    failures: HashMap<String, String>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<State>,
}

impl MemoryCatalog {
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let entries = entries.into_iter().map(|e| (e.id.clone(), e)).collect();
        Self {
            state: Mutex::new(State {
                entries,
                ..Default::default()
            }),
        }
    }

    /// Makes every mutation of `id` fail with `message`.
    pub async fn fail_on(&self, id: &str, message: &str) {
        self.state
            .lock()
            .await
            .failures
            .insert(id.to_string(), message.to_string());
    }

    pub async fn entry(&self, id: &str) -> Option<CatalogEntry> {
        self.state.lock().await.entries.get(id).cloned()
    }

    pub async fn entries(&self) -> Vec<CatalogEntry> {
        self.state.lock().await.entries.values().cloned().collect()
    }

    pub async fn playlists(&self) -> Vec<Playlist> {
        self.state.lock().await.playlists.clone()
    }

    /// Mutating calls received so far, e.g. `delete a2`.
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }
}

impl State {
    fn mutate(&mut self, id: &str, call: String) -> Result<()> {
        debug!("memory catalog: {call}");
        self.calls.push(call);
        if let Some(message) = self.failures.get(id) {
            return Err(CatalogError::RemoteRejected {
                status: 500,
                message: message.clone(),
            });
        }
        if !self.entries.contains_key(id) {
            return Err(CatalogError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn owned_tracks(&self, artist_id: &str) -> usize {
        self.entries
            .values()
            .filter(|e| e.kind == EntryKind::Track && e.parent_id.as_deref() == Some(artist_id))
            .count()
    }
}

#[async_trait]
impl CatalogApi for MemoryCatalog {
    fn id(&self) -> &'static str {
        "memory"
    }

    fn name(&self) -> &'static str {
        "In-memory catalog"
    }

    async fn summary(&self) -> Result<CatalogSummary> {
        let state = self.state.lock().await;
        let count = |kind| state.entries.values().filter(|e| e.kind == kind).count();
        Ok(CatalogSummary {
            server_name: Some(self.name().to_string()),
            user_id: "local".to_string(),
            artists: count(EntryKind::Artist),
            tracks: count(EntryKind::Track),
        })
    }

    async fn list_entries(&self, kind: EntryKind) -> Result<Vec<CatalogEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .entries
            .values()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect())
    }

    async fn get_entry(&self, id: &str) -> Result<CatalogEntry> {
        self.entry(id)
            .await
            .ok_or_else(|| CatalogError::NotFound { id: id.to_string() })
    }

    async fn rename_entry(&self, id: &str, new_name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.mutate(id, format!("rename {id} {new_name}"))?;
        if let Some(entry) = state.entries.get_mut(id) {
            entry.name = new_name.to_string();
            entry.sort_name = Some(new_name.to_string());
        }
        Ok(())
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.mutate(id, format!("delete {id}"))?;
        let owned = state.owned_tracks(id);
        if owned > 0 {
            return Err(CatalogError::RemoteRejected {
                status: 409,
                message: format!("artist {id} still owns {owned} tracks"),
            });
        }
        state.entries.remove(id);
        Ok(())
    }

    async fn reassign_track(&self, track_id: &str, artist_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.mutate(track_id, format!("reassign {track_id} {artist_id}"))?;

        let artist_name = match state.entries.get(artist_id) {
            Some(artist) if artist.kind == EntryKind::Artist => artist.name.clone(),
            Some(_) => {
                return Err(CatalogError::RemoteRejected {
                    status: 400,
                    message: format!("{artist_id} is not an artist"),
                })
            }
            None => {
                return Err(CatalogError::NotFound {
                    id: artist_id.to_string(),
                })
            }
        };

        let previous = match state.entries.get_mut(track_id) {
            Some(track) if track.kind == EntryKind::Track => {
                track.artist_name = Some(artist_name);
                track.parent_id.replace(artist_id.to_string())
            }
            _ => {
                return Err(CatalogError::RemoteRejected {
                    status: 400,
                    message: format!("{track_id} is not a track"),
                })
            }
        };

        if let Some(previous) = previous {
            if let Some(artist) = state.entries.get_mut(&previous) {
                artist.track_count = artist.track_count.saturating_sub(1);
            }
        }
        if let Some(artist) = state.entries.get_mut(artist_id) {
            artist.track_count += 1;
        }
        Ok(())
    }

    async fn refresh_metadata(&self, id: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().await;
        match id {
            Some(id) => state.mutate(id, format!("refresh {id}")),
            None => {
                state.calls.push("refresh library".to_string());
                Ok(())
            }
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
impl PlaylistApi for MemoryCatalog {
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<CatalogEntry>> {
        let query = normalize_name(query);
        Ok(self
            .state
            .lock()
            .await
            .entries
            .values()
            .filter(|e| e.kind == EntryKind::Track && normalize_name(&e.name).contains(&query))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_playlist(&self, name: &str, track_ids: &[String]) -> Result<String> {
        let mut state = self.state.lock().await;
        let id = format!("playlist-{}", state.playlists.len() + 1);
        state.calls.push(format!("create playlist {name}"));
        state.playlists.push(Playlist {
            id: id.clone(),
            name: name.to_string(),
            track_ids: track_ids.to_vec(),
        });
        Ok(id)
    }

    async fn add_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().await;
        let playlist = state
            .playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or_else(|| CatalogError::NotFound {
                id: playlist_id.to_string(),
            })?;
        playlist.track_ids.extend_from_slice(track_ids);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new([
            CatalogEntry::artist("a1", "Blur").with_track_count(1),
            CatalogEntry::artist("a2", "Blur.").with_track_count(1),
            CatalogEntry::track("t1", "Song 2", Some("a2".into())),
            CatalogEntry::track("t2", "Parklife", Some("a1".into())),
        ])
    }

    #[tokio::test]
    async fn refuses_to_delete_artist_with_tracks() {
        let catalog = catalog();
        let err = catalog.delete_entry("a2").await.unwrap_err();
        assert!(matches!(err, CatalogError::RemoteRejected { status: 409, .. }));

        catalog.reassign_track("t1", "a1").await.unwrap();
        catalog.delete_entry("a2").await.unwrap();

        assert!(catalog.entry("a2").await.is_none());
        assert_eq!(catalog.entry("a1").await.unwrap().track_count, 2);
        assert_eq!(
            catalog.entry("t1").await.unwrap().parent_id.as_deref(),
            Some("a1")
        );
    }

    #[tokio::test]
    async fn injected_failures_surface_as_remote_rejections() {
        let catalog = catalog();
        catalog.fail_on("a1", "permission denied").await;
        let err = catalog.rename_entry("a1", "Blur").await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn missing_entries_are_not_found() {
        let catalog = catalog();
        assert!(catalog.get_entry("nope").await.unwrap_err().is_not_found());
        assert!(catalog.delete_entry("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn playlists_and_search() {
        let catalog = catalog();
        let found = catalog.search_tracks("song-2", 10).await.unwrap();
        assert_eq!(found.len(), 1);

        let id = catalog
            .create_playlist("Why Blur Slaps", &["t1".to_string()])
            .await
            .unwrap();
        catalog.add_to_playlist(&id, &["t2".to_string()]).await.unwrap();
        assert_eq!(catalog.playlists().await[0].track_ids, vec!["t1", "t2"]);
    }
}
