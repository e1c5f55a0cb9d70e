use super::models::{
    release_year, AlbumRef, Artist, ArtistSearch, Paging, SimpleTrack, TokenResponse, TopTracks,
    Track, TrackBatch,
};
use crate::{
    error::{CatalogError, Result},
    traits::DiscoveryApi,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::discovery::{DiscoveryTrack, TimePeriod};
use std::{collections::HashSet, future::Future, time::Duration};
use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, info, warn};
use url::Url;

const API_BASE: &str = "https://api.spotify.com/v1/";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const MARKET: &str = "US";

/// Timeout for individual Spotify requests (15 seconds)
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Maximum attempts for transient errors
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const BASE_DELAY_MS: u64 = 500;

/// Maximum backoff delay cap (milliseconds)
const MAX_BACKOFF_MS: u64 = 5000;

/// Albums and singles inspected when top tracks fall short.
const ALBUM_PAGE: usize = 20;
/// Upper bound of the `/tracks?ids=` endpoint.
const TRACK_BATCH: usize = 50;

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    api_base: Url,
    client: Client,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(CatalogError::NotConfigured("Spotify credentials"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
            api_base: Url::parse(API_BASE)?,
            client,
            token: Mutex::new(None),
        })
    }

    /// Client-credentials token, fetched again shortly before it expires.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Spotify access token");
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: TokenResponse = Self::handle_response(response).await?;

        let lifetime = (token.expires_in - 60).max(0);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(lifetime),
        });
        Ok(token.access_token)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.api_base.join(endpoint)?;
        with_retry(&format!("Spotify GET {endpoint}"), || async {
            let token = self.access_token().await?;
            debug!("Request: GET {}", url);
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(token)
                .query(query)
                .send()
                .await?;
            Self::handle_response(response).await
        })
        .await
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            Err(CatalogError::RemoteRejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn search_artist(&self, name: &str) -> Result<Option<Artist>> {
        let mut candidates = self.artist_candidates(&format!("artist:\"{name}\"")).await?;
        if candidates.is_empty() {
            candidates = self.artist_candidates(name).await?;
        }
        Ok(pick_artist(name, candidates))
    }

    async fn artist_candidates(&self, query: &str) -> Result<Vec<Artist>> {
        let found: ArtistSearch = self
            .get(
                "search",
                &[
                    ("q", query.to_string()),
                    ("type", "artist".to_string()),
                    ("limit", "5".to_string()),
                ],
            )
            .await?;
        Ok(found.artists.map(|p| p.items).unwrap_or_default())
    }

    /// Adds full tracks from the artist's albums and singles until `wanted`
    /// tracks inside `period` were collected.
    async fn fill_from_albums(
        &self,
        artist_id: &str,
        period: &TimePeriod,
        wanted: usize,
        tracks: &mut Vec<Track>,
        seen: &mut HashSet<String>,
    ) -> Result<()> {
        let albums: Paging<AlbumRef> = self
            .get(
                &format!("artists/{artist_id}/albums"),
                &[
                    ("include_groups", "album,single".to_string()),
                    ("market", MARKET.to_string()),
                    ("limit", ALBUM_PAGE.to_string()),
                ],
            )
            .await?;

        for album in albums.items {
            if tracks.len() >= wanted {
                break;
            }
            if !period.contains(release_year(&album.release_date)) {
                continue;
            }
            let listing: Paging<SimpleTrack> = match self
                .get(
                    &format!("albums/{}/tracks", album.id),
                    &[("limit", TRACK_BATCH.to_string())],
                )
                .await
            {
                Ok(listing) => listing,
                Err(e) => {
                    warn!("Skipping album {}: {}", album.name, e);
                    continue;
                }
            };
            let ids: Vec<String> = listing
                .items
                .into_iter()
                .filter_map(|t| t.id)
                .filter(|id| !seen.contains(id))
                .collect();
            if ids.is_empty() {
                continue;
            }
            let batch: TrackBatch = self
                .get(
                    "tracks",
                    &[("ids", ids.join(",")), ("market", MARKET.to_string())],
                )
                .await?;
            for track in batch.tracks.into_iter().flatten() {
                if tracks.len() >= wanted {
                    break;
                }
                if seen.insert(track.id.clone()) {
                    tracks.push(track);
                }
            }
        }
        Ok(())
    }
}

/// Exact case-insensitive match first, otherwise the most followed artist.
pub(crate) fn pick_artist(name: &str, candidates: Vec<Artist>) -> Option<Artist> {
    let wanted = name.to_lowercase();
    if let Some(exact) = candidates.iter().find(|a| a.name.to_lowercase() == wanted) {
        return Some(exact.clone());
    }
    candidates.into_iter().max_by_key(Artist::follower_count)
}

/// Filters to `period`, drops repeated ids, most popular first, at most `limit`.
pub(crate) fn rank(tracks: Vec<Track>, period: &TimePeriod, limit: usize) -> Vec<Track> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<Track> = tracks
        .into_iter()
        .filter(|t| period.contains(t.release_year()))
        .filter(|t| seen.insert(t.id.clone()))
        .collect();
    ranked.sort_by(|a, b| b.popularity.cmp(&a.popularity));
    ranked.truncate(limit);
    ranked
}

fn is_retryable_error(error: &CatalogError) -> bool {
    match error {
        CatalogError::RemoteRejected { status, .. } => *status == 429 || *status >= 500,
        CatalogError::Request(e) => e.is_timeout() || e.is_connect(),
        CatalogError::Timeout(_) => true,
        _ => false,
    }
}

/// Retries an async read with exponential backoff and a per-attempt timeout.
/// Client errors other than 429 are returned immediately.
async fn with_retry<T, F, Fut>(operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        let error = match tokio::time::timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            operation(),
        )
        .await
        {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_elapsed) => CatalogError::Timeout(operation_name.to_string()),
        };

        attempt += 1;
        if !is_retryable_error(&error) {
            warn!("{} failed with non-retryable error: {}", operation_name, error);
            return Err(error);
        }
        if attempt >= MAX_RETRIES {
            warn!("{} failed after {} attempts: {}", operation_name, MAX_RETRIES, error);
            return Err(error);
        }

        let delay = std::cmp::min(BASE_DELAY_MS * 2u64.pow(attempt - 1), MAX_BACKOFF_MS);
        warn!(
            "{} failed (attempt {}/{}), retrying in {}ms: {}",
            operation_name, attempt, MAX_RETRIES, delay, error
        );
        sleep(Duration::from_millis(delay)).await;
    }
}

#[async_trait]
impl DiscoveryApi for SpotifyClient {
    fn id(&self) -> &'static str {
        "spotify"
    }

    fn name(&self) -> &'static str {
        "Spotify"
    }

    async fn top_tracks(
        &self,
        artist: &str,
        period: &TimePeriod,
        limit: usize,
    ) -> Result<Vec<DiscoveryTrack>> {
        let Some(found) = self.search_artist(artist).await? else {
            info!("Spotify has no artist matching '{}'", artist);
            return Ok(vec![]);
        };
        debug!("Resolved '{}' to Spotify artist {} ({})", artist, found.name, found.id);

        let mut seen = HashSet::new();
        let mut tracks: Vec<Track> = match self
            .get::<TopTracks>(
                &format!("artists/{}/top-tracks", found.id),
                &[("market", MARKET.to_string())],
            )
            .await
        {
            Ok(top) => top
                .tracks
                .into_iter()
                .filter(|t| period.contains(t.release_year()))
                .filter(|t| seen.insert(t.id.clone()))
                .collect(),
            Err(e) => {
                warn!("Top tracks of {} unavailable: {}", found.name, e);
                Vec::new()
            }
        };

        if tracks.len() < limit {
            if let Err(e) = self
                .fill_from_albums(&found.id, period, limit, &mut tracks, &mut seen)
                .await
            {
                warn!("Could not read albums of {}: {}", found.name, e);
            }
        }

        let ranked = rank(tracks, period, limit);
        info!("Spotify returned {} tracks for '{}'", ranked.len(), found.name);
        Ok(ranked
            .into_iter()
            .map(|t| t.into_discovery(&found.name))
            .collect())
    }

    async fn health_check(&self) -> bool {
        self.access_token().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotify::models::Followers;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn artist(id: &str, name: &str, followers: u64) -> Artist {
        Artist {
            id: id.into(),
            name: name.into(),
            followers: Some(Followers { total: followers }),
        }
    }

    fn track(id: &str, popularity: u32, released: &str) -> Track {
        Track {
            id: id.into(),
            name: format!("Song {id}"),
            popularity,
            album: Some(AlbumRef {
                id: "al".into(),
                name: "Album".into(),
                release_date: released.into(),
            }),
            artists: vec![],
        }
    }

    #[test]
    fn prefers_exact_artist_name() {
        let picked = pick_artist(
            "blur",
            vec![artist("1", "Blurry", 900), artist("2", "Blur", 10)],
        );
        assert_eq!(picked.unwrap().id, "2");
    }

    #[test]
    fn falls_back_to_most_followed() {
        let picked = pick_artist(
            "The Beatles Tribute",
            vec![artist("1", "Beatles Revival", 5), artist("2", "The Beatles", 5000)],
        );
        assert_eq!(picked.unwrap().id, "2");
        assert!(pick_artist("x", vec![]).is_none());
    }

    #[test]
    fn ranks_by_popularity_within_period() {
        let tracks = vec![
            track("a", 40, "1995-01-01"),
            track("b", 90, "2005"),
            track("c", 70, "1999-06"),
            track("c", 70, "1999-06"),
            track("d", 99, ""),
        ];
        let period = TimePeriod::between(Some(1990), Some(1999));
        let ranked: Vec<String> = rank(tracks.clone(), &period, 10)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ranked, vec!["c", "a"]);

        let open: Vec<String> = rank(tracks, &TimePeriod::any(), 2)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(open, vec!["d", "b"]);
    }

    #[test]
    fn retry_classification() {
        let rejected = |status| CatalogError::RemoteRejected {
            status,
            message: String::new(),
        };
        assert!(is_retryable_error(&rejected(429)));
        assert!(is_retryable_error(&rejected(503)));
        assert!(!is_retryable_error(&rejected(404)));
        assert!(is_retryable_error(&CatalogError::Timeout("x".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry("flaky", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CatalogError::RemoteRejected {
                    status: 502,
                    message: "bad gateway".into(),
                })
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_client_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("bad", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CatalogError::RemoteRejected {
                status: 400,
                message: "nope".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn requires_credentials() {
        assert!(matches!(
            SpotifyClient::new("", "secret"),
            Err(CatalogError::NotConfigured(_))
        ));
    }
}
