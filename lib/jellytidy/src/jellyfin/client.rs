use super::models::{
    BaseItem, CreatePlaylist, ItemsResponse, NameIdPair, PlaylistCreated, PublicSystemInfo,
    UserDto,
};
use crate::{
    error::{CatalogError, Result},
    traits::{CatalogApi, PlaylistApi},
};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::catalog::{CatalogEntry, CatalogSummary, EntryKind};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const ITEM_FIELDS: &str =
    "ChildCount,SortName,Overview,Genres,ProductionYear,ProviderIds,ImageTags,Album,AlbumArtist";
const PAGE_SIZE: usize = 5000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct JellyfinClient {
    base_url: Url,
    api_key: String,
    user_id: String,
    client: Client,
}

#[derive(Default)]
pub struct JellyfinClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    user_id: Option<String>,
    timeout_seconds: Option<u64>,
}

impl JellyfinClientBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.trim().to_string());
        self
    }

    pub fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.trim().to_string());
        self
    }

    /// Without one, the first user the server lists is used.
    pub fn user_id(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from);
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub async fn connect(self) -> Result<JellyfinClient> {
        let base_url_str = self
            .base_url
            .ok_or(CatalogError::NotConfigured("Jellyfin URL"))?;
        if !base_url_str.starts_with("http://") && !base_url_str.starts_with("https://") {
            return Err(CatalogError::InvalidUrl(format!(
                "{base_url_str} (must start with http:// or https://)"
            )));
        }
        // A trailing slash keeps any base path (e.g. /jellyfin) when joining.
        let base_url = Url::parse(&format!("{}/", base_url_str.trim_end_matches('/')))?;
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or(CatalogError::NotConfigured("Jellyfin API key"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(
                self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()?;

        let mut jellyfin = JellyfinClient {
            base_url,
            api_key,
            user_id: String::new(),
            client,
        };

        jellyfin.user_id = match self.user_id {
            Some(id) => id,
            None => jellyfin.first_user_id().await?,
        };
        info!("Connected to Jellyfin at {} as user {}", jellyfin.base_url, jellyfin.user_id);
        Ok(jellyfin)
    }
}

impl JellyfinClient {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn make_request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<B>,
    ) -> Result<T> {
        let url = self.base_url.join(endpoint)?;
        debug!("Request: {} {}", method, url);
        let mut request = self
            .client
            .request(method, url)
            .header("X-Emby-Token", &self.api_key)
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(b) = body {
            request = request.json(&b);
        }
        let response = request.send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            let text = response.text().await?;
            let body: &str = if text.trim().is_empty() {
                "null"
            } else {
                text.as_str()
            };
            serde_json::from_str(body).map_err(|e| CatalogError::RemoteRejected {
                status: status.as_u16(),
                message: format!("JSON parse error: {e}"),
            })
        } else {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            let message = if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                text
            };
            Err(CatalogError::RemoteRejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        self.make_request(Method::GET, endpoint, query, None::<()>)
            .await
    }

    async fn first_user_id(&self) -> Result<String> {
        let users: Vec<UserDto> = self.get("Users", &[]).await?;
        let user = users.into_iter().next().ok_or_else(|| {
            CatalogError::NotConfigured("Jellyfin user id (server lists no users)")
        })?;
        debug!("Using first Jellyfin user '{}'", user.name);
        Ok(user.id)
    }

    fn item_type(kind: EntryKind) -> &'static str {
        match kind {
            EntryKind::Artist => "MusicArtist",
            EntryKind::Track => "Audio",
        }
    }

    /// Item DTO exactly as the server returns it, for read-modify-write updates.
    async fn raw_item(&self, id: &str) -> Result<Value> {
        self.get(&format!("Users/{}/Items/{}", self.user_id, id), &[])
            .await
            .map_err(|e| not_found_as(e, id))
    }

    async fn update_item(&self, id: &str, item: &Value) -> Result<()> {
        self.make_request::<(), _>(Method::POST, &format!("Items/{id}"), &[], Some(item))
            .await
    }

    async fn count(&self, kind: EntryKind) -> Result<usize> {
        let response: ItemsResponse = self
            .get(
                "Items",
                &[
                    ("IncludeItemTypes", Self::item_type(kind).to_string()),
                    ("Recursive", "true".to_string()),
                    ("UserId", self.user_id.clone()),
                    ("Limit", "0".to_string()),
                    ("EnableTotalRecordCount", "true".to_string()),
                ],
            )
            .await?;
        Ok(response.total_record_count)
    }
}

/// Maps an HTTP 404 for `id` to [`CatalogError::NotFound`].
fn not_found_as(error: CatalogError, id: &str) -> CatalogError {
    match error {
        CatalogError::RemoteRejected { status: 404, .. } => CatalogError::NotFound { id: id.to_string() },
        other => other,
    }
}

/// Points the track's primary artist at `artist`, keeping featured artists.
/// A short or empty page ends paging, as does reaching the reported total.
fn is_last_page(fetched: usize, collected: usize, total_record_count: usize) -> bool {
    fetched < PAGE_SIZE || (total_record_count > 0 && collected >= total_record_count)
}

pub(crate) fn repoint_primary_artist(track: &mut Value, artist: &NameIdPair) -> Result<()> {
    let Some(item) = track.as_object_mut() else {
        return Err(CatalogError::RemoteRejected {
            status: 200,
            message: "item is not a JSON object".to_string(),
        });
    };

    let previous_name = item
        .get("ArtistItems")
        .and_then(|a| a.get(0))
        .and_then(|a| a.get("Name"))
        .and_then(Value::as_str)
        .map(String::from);
    let pair = serde_json::to_value(artist)?;

    let artist_items = item
        .entry("ArtistItems")
        .or_insert_with(|| Value::Array(vec![]));
    match artist_items.as_array_mut() {
        Some(items) if !items.is_empty() => items[0] = pair.clone(),
        Some(items) => items.push(pair.clone()),
        None => *artist_items = Value::Array(vec![pair.clone()]),
    }

    let artists = item.entry("Artists").or_insert_with(|| Value::Array(vec![]));
    match artists.as_array_mut() {
        Some(names) if !names.is_empty() => names[0] = Value::from(artist.name.as_str()),
        Some(names) => names.push(Value::from(artist.name.as_str())),
        None => *artists = Value::Array(vec![Value::from(artist.name.as_str())]),
    }

    if let Some(previous_name) = previous_name {
        if let Some(album_artists) = item.get_mut("AlbumArtists").and_then(Value::as_array_mut) {
            for entry in album_artists.iter_mut() {
                if entry.get("Name").and_then(Value::as_str) == Some(previous_name.as_str()) {
                    *entry = pair.clone();
                }
            }
        }
        if item.get("AlbumArtist").and_then(Value::as_str) == Some(previous_name.as_str()) {
            item.insert("AlbumArtist".to_string(), Value::from(artist.name.as_str()));
        }
    }
    Ok(())
}

#[async_trait]
impl CatalogApi for JellyfinClient {
    fn id(&self) -> &'static str {
        "jellyfin"
    }

    fn name(&self) -> &'static str {
        "Jellyfin"
    }

    async fn summary(&self) -> Result<CatalogSummary> {
        let info: PublicSystemInfo = self.get("System/Info/Public", &[]).await?;
        debug!(
            "Jellyfin server {:?} version {:?}",
            info.server_name, info.version
        );
        Ok(CatalogSummary {
            server_name: info.server_name,
            user_id: self.user_id.clone(),
            artists: self.count(EntryKind::Artist).await?,
            tracks: self.count(EntryKind::Track).await?,
        })
    }

    async fn list_entries(&self, kind: EntryKind) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        loop {
            let mut query = vec![
                ("IncludeItemTypes", Self::item_type(kind).to_string()),
                ("Recursive", "true".to_string()),
                ("Fields", ITEM_FIELDS.to_string()),
                ("UserId", self.user_id.clone()),
                ("StartIndex", entries.len().to_string()),
                ("Limit", PAGE_SIZE.to_string()),
            ];
            if kind == EntryKind::Artist {
                query.push(("SortBy", "SortName".to_string()));
            }
            let page: ItemsResponse = self.get("Items", &query).await?;
            let fetched = page.items.len();
            entries.extend(page.items.into_iter().map(BaseItem::into_entry));
            if is_last_page(fetched, entries.len(), page.total_record_count) {
                break;
            }
        }
        info!("Fetched {} {} entries from Jellyfin", entries.len(), kind);
        Ok(entries)
    }

    async fn get_entry(&self, id: &str) -> Result<CatalogEntry> {
        let item: BaseItem = self
            .get(&format!("Users/{}/Items/{}", self.user_id, id), &[])
            .await
            .map_err(|e| not_found_as(e, id))?;
        Ok(item.into_entry())
    }

    async fn rename_entry(&self, id: &str, new_name: &str) -> Result<()> {
        let mut item = self.raw_item(id).await?;
        if let Some(fields) = item.as_object_mut() {
            fields.insert("Name".to_string(), Value::from(new_name));
            fields.insert("SortName".to_string(), Value::from(new_name));
            fields.insert("ForcedSortName".to_string(), Value::from(new_name));
        }
        info!("Renaming Jellyfin item {} to '{}'", id, new_name);
        self.update_item(id, &item).await
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        info!("Deleting Jellyfin item {}", id);
        self.make_request::<(), ()>(Method::DELETE, &format!("Items/{id}"), &[], None)
            .await
            .map_err(|e| not_found_as(e, id))
    }

    async fn reassign_track(&self, track_id: &str, artist_id: &str) -> Result<()> {
        let artist = self.get_entry(artist_id).await?;
        if artist.kind != EntryKind::Artist {
            return Err(CatalogError::RemoteRejected {
                status: 400,
                message: format!("{artist_id} is not an artist"),
            });
        }
        let mut track = self.raw_item(track_id).await?;
        repoint_primary_artist(
            &mut track,
            &NameIdPair {
                name: artist.name,
                id: artist.id,
            },
        )?;
        info!("Reassigning Jellyfin track {} to artist {}", track_id, artist_id);
        self.update_item(track_id, &track).await
    }

    async fn refresh_metadata(&self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) => {
                info!("Refreshing metadata of {}", id);
                self.make_request::<(), ()>(
                    Method::POST,
                    &format!("Items/{id}/Refresh"),
                    &[
                        ("Recursive", "true".to_string()),
                        ("MetadataRefreshMode", "FullRefresh".to_string()),
                        ("ImageRefreshMode", "Default".to_string()),
                        ("ReplaceAllMetadata", "false".to_string()),
                    ],
                    None,
                )
                .await
                .map_err(|e| not_found_as(e, id))
            }
            None => {
                info!("Triggering a Jellyfin library scan");
                self.make_request::<(), ()>(Method::POST, "Library/Refresh", &[], None)
                    .await
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.get::<Value>("System/Info", &[]).await.is_ok()
    }
}

#[async_trait]
impl PlaylistApi for JellyfinClient {
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<CatalogEntry>> {
        let response: ItemsResponse = self
            .get(
                "Items",
                &[
                    ("SearchTerm", query.to_string()),
                    ("IncludeItemTypes", "Audio".to_string()),
                    ("Recursive", "true".to_string()),
                    ("Fields", ITEM_FIELDS.to_string()),
                    ("UserId", self.user_id.clone()),
                    ("Limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(response.items.into_iter().map(BaseItem::into_entry).collect())
    }

    async fn create_playlist(&self, name: &str, track_ids: &[String]) -> Result<String> {
        let body = CreatePlaylist {
            name,
            ids: track_ids,
            user_id: &self.user_id,
            media_type: "Audio",
        };
        info!("Creating playlist '{}' with {} tracks", name, track_ids.len());
        let created: PlaylistCreated = self
            .make_request(Method::POST, "Playlists", &[], Some(&body))
            .await?;
        Ok(created.id)
    }

    async fn add_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        self.make_request::<(), ()>(
            Method::POST,
            &format!("Playlists/{playlist_id}/Items"),
            &[
                ("Ids", track_ids.join(",")),
                ("UserId", self.user_id.clone()),
            ],
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repoints_primary_artist_and_matching_album_artist() {
        let mut track = json!({
            "Id": "t1",
            "Name": "Thunderstruck",
            "Artists": ["AC-DC", "Guest"],
            "ArtistItems": [{"Name": "AC-DC", "Id": "old"}, {"Name": "Guest", "Id": "g"}],
            "AlbumArtists": [{"Name": "AC-DC", "Id": "old"}],
            "AlbumArtist": "AC-DC"
        });
        let artist = NameIdPair {
            name: "AC/DC".into(),
            id: "new".into(),
        };

        repoint_primary_artist(&mut track, &artist).unwrap();

        assert_eq!(track["Artists"], json!(["AC/DC", "Guest"]));
        assert_eq!(track["ArtistItems"][0], json!({"Name": "AC/DC", "Id": "new"}));
        assert_eq!(track["ArtistItems"][1]["Id"], "g");
        assert_eq!(track["AlbumArtists"][0]["Id"], "new");
        assert_eq!(track["AlbumArtist"], "AC/DC");
    }

    #[test]
    fn repoint_fills_missing_artist_lists() {
        let mut track = json!({"Id": "t1", "Name": "Untitled"});
        let artist = NameIdPair {
            name: "Blur".into(),
            id: "a1".into(),
        };

        repoint_primary_artist(&mut track, &artist).unwrap();

        assert_eq!(track["Artists"], json!(["Blur"]));
        assert_eq!(track["ArtistItems"], json!([{"Name": "Blur", "Id": "a1"}]));
    }

    #[test]
    fn paging_stops_at_the_reported_total() {
        assert!(!is_last_page(PAGE_SIZE, PAGE_SIZE, 3 * PAGE_SIZE));
        assert!(is_last_page(PAGE_SIZE, 3 * PAGE_SIZE, 3 * PAGE_SIZE));
        // A server ignoring StartIndex keeps returning full pages
        assert!(is_last_page(PAGE_SIZE, 2 * PAGE_SIZE, PAGE_SIZE));
        assert!(is_last_page(0, 0, 0));
        assert!(is_last_page(12, 12, 0));
    }

    #[test]
    fn maps_404_to_not_found() {
        let err = not_found_as(
            CatalogError::RemoteRejected {
                status: 404,
                message: "gone".into(),
            },
            "a1",
        );
        assert!(matches!(err, CatalogError::NotFound { id } if id == "a1"));
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let err = JellyfinClientBuilder::new()
            .base_url("ftp://media.local")
            .api_key("k")
            .user_id(Some("u"))
            .connect()
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn requires_an_api_key() {
        let err = JellyfinClientBuilder::new()
            .base_url("http://media.local:8096")
            .user_id(Some("u"))
            .connect()
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotConfigured(_)));
    }
}
