use async_trait::async_trait;
use shared::{
    catalog::{CatalogEntry, CatalogSummary, EntryKind},
    discovery::{DiscoveryTrack, TimePeriod},
};

use crate::error::Result;

/// The media server's catalog, seen as a set of capabilities.
///
/// Mutations are applied remotely and observed by fetching again; nothing
/// is cached between calls.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;

    async fn summary(&self) -> Result<CatalogSummary>;
    async fn list_entries(&self, kind: EntryKind) -> Result<Vec<CatalogEntry>>;
    async fn get_entry(&self, id: &str) -> Result<CatalogEntry>;
    async fn rename_entry(&self, id: &str, new_name: &str) -> Result<()>;
    async fn delete_entry(&self, id: &str) -> Result<()>;
    async fn reassign_track(&self, track_id: &str, artist_id: &str) -> Result<()>;
    /// Refreshes one item, or the whole library when `id` is `None`.
    async fn refresh_metadata(&self, id: Option<&str>) -> Result<()>;
    async fn health_check(&self) -> bool;
}

#[async_trait]
pub trait PlaylistApi: Send + Sync {
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<CatalogEntry>>;
    async fn create_playlist(&self, name: &str, track_ids: &[String]) -> Result<String>;
    async fn add_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;
}

/// An external service that ranks an artist's tracks.
#[async_trait]
pub trait DiscoveryApi: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;

    async fn top_tracks(
        &self,
        artist: &str,
        period: &TimePeriod,
        limit: usize,
    ) -> Result<Vec<DiscoveryTrack>>;

    async fn health_check(&self) -> bool;
}
