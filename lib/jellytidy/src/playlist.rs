//! Builds playlists from an external service's ranking, limited to
//! tracks the catalog actually holds.

use std::collections::HashSet;

use shared::{
    catalog::CatalogEntry,
    discovery::{DiscoveryTrack, PlaylistPreview, PlaylistRequest, PlaylistTrack},
};
use tracing::{debug, info};

use crate::error::{CatalogError, Result};
use crate::similarity;
use crate::traits::{DiscoveryApi, PlaylistApi};

/// Minimum similarity between a catalog track's artist and the requested one.
pub const ARTIST_MATCH_THRESHOLD: f64 = 0.85;
const MIN_TITLE_SCORE: f64 = 0.5;
const SEARCH_LIMIT: usize = 50;
/// Discovery tracks fetched per requested track, since many won't be in the catalog.
const OVERFETCH: usize = 3;

/// Splits "Blur, Oasis and Pulp" or "Blur & Oasis" into artist names.
pub fn parse_artists(input: &str) -> Vec<String> {
    input
        .replace(" and ", ",")
        .replace(" & ", ",")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Takes one item from each list in turn until all are drained.
fn round_robin<T>(lists: Vec<Vec<T>>) -> Vec<T> {
    let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
    let mut merged = Vec::new();
    loop {
        let before = merged.len();
        for iter in iters.iter_mut() {
            if let Some(item) = iter.next() {
                merged.push(item);
            }
        }
        if merged.len() == before {
            return merged;
        }
    }
}

pub struct PlaylistGenerator<'a> {
    catalog: &'a dyn PlaylistApi,
    discovery: &'a dyn DiscoveryApi,
}

impl<'a> PlaylistGenerator<'a> {
    pub fn new(catalog: &'a dyn PlaylistApi, discovery: &'a dyn DiscoveryApi) -> Self {
        Self { catalog, discovery }
    }

    pub async fn preview(&self, request: &PlaylistRequest) -> Result<PlaylistPreview> {
        let artists = parse_artists(&request.artists);
        if artists.is_empty() {
            return Err(CatalogError::InvalidRequest(
                "no artist names given".to_string(),
            ));
        }
        if request.track_count == 0 {
            return Err(CatalogError::InvalidRequest(
                "track count must be at least 1".to_string(),
            ));
        }

        let mut used = HashSet::new();
        let mut per_artist = Vec::with_capacity(artists.len());
        let mut unmatched = Vec::new();

        for artist in &artists {
            let ranked = self
                .discovery
                .top_tracks(artist, &request.period, request.track_count.saturating_mul(OVERFETCH))
                .await?;
            debug!("{} ranked {} tracks for {}", self.discovery.name(), ranked.len(), artist);

            let mut matched = Vec::new();
            for track in ranked {
                if matched.len() >= request.track_count {
                    break;
                }
                match self.find_in_catalog(artist, &track).await? {
                    Some(entry) if used.insert(entry.id.clone()) => matched.push(PlaylistTrack {
                        catalog_id: entry.id,
                        title: entry.name,
                        artist: artist.clone(),
                        popularity: track.popularity,
                    }),
                    Some(_) => {}
                    None => unmatched.push(format!("{} - {}", track.name, artist)),
                }
            }
            info!("Matched {} catalog tracks for {}", matched.len(), artist);
            per_artist.push(matched);
        }

        let mut tracks = round_robin(per_artist);
        tracks.truncate(request.track_count);
        if tracks.is_empty() {
            return Err(CatalogError::NoMatches(format!(
                "none of the top tracks of {} are in the catalog",
                artists.join(", ")
            )));
        }

        Ok(PlaylistPreview {
            name: request.style.title(&artists),
            artists,
            tracks,
            unmatched,
        })
    }

    /// Best catalog candidate for a discovery track by `artist`.
    async fn find_in_catalog(
        &self,
        artist: &str,
        track: &DiscoveryTrack,
    ) -> Result<Option<CatalogEntry>> {
        let candidates = self.catalog.search_tracks(&track.name, SEARCH_LIMIT).await?;
        let mut best: Option<(f64, CatalogEntry)> = None;
        for candidate in candidates {
            let by_artist = candidate
                .artist_name
                .as_deref()
                .is_some_and(|name| similarity::score(name, artist) >= ARTIST_MATCH_THRESHOLD);
            if !by_artist {
                continue;
            }
            let title_score = similarity::score(&candidate.name, &track.name);
            if title_score < MIN_TITLE_SCORE {
                continue;
            }
            if best.as_ref().is_none_or(|(score, _)| title_score > *score) {
                best = Some((title_score, candidate));
            }
        }
        Ok(best.map(|(_, entry)| entry))
    }

    /// Creates the playlist in the catalog and returns its id.
    pub async fn save(&self, preview: &PlaylistPreview) -> Result<String> {
        if preview.tracks.is_empty() {
            return Err(CatalogError::NoMatches(format!(
                "playlist '{}' has no tracks",
                preview.name
            )));
        }
        let id = self
            .catalog
            .create_playlist(&preview.name, &preview.track_ids())
            .await?;
        info!("Saved playlist '{}' as {}", preview.name, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;
    use async_trait::async_trait;
    use shared::discovery::{PlaylistStyle, TimePeriod};
    use std::collections::HashMap;

    struct FakeDiscovery {
        ranked: HashMap<String, Vec<&'static str>>,
    }

    impl FakeDiscovery {
        fn new(ranked: &[(&str, Vec<&'static str>)]) -> Self {
            Self {
                ranked: ranked
                    .iter()
                    .map(|(artist, titles)| (artist.to_string(), titles.clone()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl DiscoveryApi for FakeDiscovery {
        fn id(&self) -> &'static str {
            "fake"
        }

        fn name(&self) -> &'static str {
            "Fake"
        }

        async fn top_tracks(
            &self,
            artist: &str,
            _period: &TimePeriod,
            limit: usize,
        ) -> Result<Vec<DiscoveryTrack>> {
            let titles = self.ranked.get(artist).cloned().unwrap_or_default();
            Ok(titles
                .into_iter()
                .take(limit)
                .enumerate()
                .map(|(i, title)| DiscoveryTrack {
                    id: format!("{artist}-{i}"),
                    name: title.to_string(),
                    artist: artist.to_string(),
                    album: String::new(),
                    popularity: 100 - i as u32,
                    release_date: String::new(),
                    release_year: None,
                })
                .collect())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn track(id: &str, title: &str, artist: &str) -> CatalogEntry {
        CatalogEntry::track(id, title, Some(format!("artist-{artist}"))).with_artist_name(artist)
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new([
            track("b1", "Song 2", "Blur"),
            track("b2", "Parklife", "Blur"),
            track("b3", "Girls & Boys", "Blur"),
            track("o1", "Wonderwall", "Oasis"),
            track("o2", "Live Forever", "Oasis"),
            track("x1", "Wonderwall", "Cat Power"),
        ])
    }

    fn request(artists: &str, count: usize) -> PlaylistRequest {
        PlaylistRequest {
            artists: artists.to_string(),
            style: PlaylistStyle::default(),
            track_count: count,
            period: TimePeriod::any(),
        }
    }

    #[test]
    fn splits_artist_input() {
        assert_eq!(parse_artists("Blur, Oasis and Pulp"), vec!["Blur", "Oasis", "Pulp"]);
        assert_eq!(parse_artists("Blur & Oasis"), vec!["Blur", "Oasis"]);
        assert!(parse_artists(" , ").is_empty());
    }

    #[test]
    fn round_robin_drains_uneven_lists() {
        assert_eq!(
            round_robin(vec![vec![1, 2, 3], vec![10], vec![20, 21]]),
            vec![1, 10, 20, 2, 21, 3]
        );
    }

    #[tokio::test]
    async fn interleaves_artists_and_names_playlist() {
        let catalog = catalog();
        let discovery = FakeDiscovery::new(&[
            ("Blur", vec!["Song 2", "Beetlebum", "Parklife", "Girls & Boys"]),
            ("Oasis", vec!["Wonderwall", "Live Forever"]),
        ]);

        let preview = PlaylistGenerator::new(&catalog, &discovery)
            .preview(&request("Blur & Oasis", 4))
            .await
            .unwrap();

        assert_eq!(preview.name, "Why Blur & Oasis Slaps");
        assert_eq!(preview.track_ids(), vec!["b1", "o1", "b2", "o2"]);
        assert_eq!(preview.unmatched, vec!["Beetlebum - Blur"]);
    }

    #[tokio::test]
    async fn ignores_same_title_by_other_artist() {
        let catalog = MemoryCatalog::new([track("x1", "Wonderwall", "Cat Power")]);
        let discovery = FakeDiscovery::new(&[("Oasis", vec!["Wonderwall"])]);

        let err = PlaylistGenerator::new(&catalog, &discovery)
            .preview(&request("Oasis", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NoMatches(_)));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let catalog = catalog();
        let discovery = FakeDiscovery::new(&[]);
        let err = PlaylistGenerator::new(&catalog, &discovery)
            .preview(&request("  ", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn huge_track_count_does_not_overflow() {
        let catalog = catalog();
        let discovery = FakeDiscovery::new(&[("Oasis", vec!["Wonderwall", "Live Forever"])]);

        let preview = PlaylistGenerator::new(&catalog, &discovery)
            .preview(&request("Oasis", usize::MAX))
            .await
            .unwrap();
        assert_eq!(preview.track_ids(), vec!["o1", "o2"]);
    }

    #[tokio::test]
    async fn save_creates_playlist_with_preview_tracks() {
        let catalog = catalog();
        let discovery = FakeDiscovery::new(&[("Blur", vec!["Parklife", "Song 2"])]);
        let generator = PlaylistGenerator::new(&catalog, &discovery);

        let mut req = request("Blur", 2);
        req.style = PlaylistStyle::Experience;
        let preview = generator.preview(&req).await.unwrap();
        let id = generator.save(&preview).await.unwrap();

        let playlists = catalog.playlists().await;
        assert_eq!(playlists[0].id, id);
        assert_eq!(playlists[0].name, "The Blur Experience");
        assert_eq!(playlists[0].track_ids, vec!["b2", "b1"]);
    }
}
