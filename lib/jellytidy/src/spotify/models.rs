use serde::Deserialize;
use shared::discovery::DiscoveryTrack;

#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expiry")]
    pub expires_in: i64,
}

fn default_expiry() -> i64 {
    3600
}

#[derive(Deserialize, Debug)]
pub(crate) struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ArtistSearch {
    pub artists: Option<Paging<Artist>>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct Artist {
    pub id: String,
    pub name: String,
    pub followers: Option<Followers>,
}

impl Artist {
    pub fn follower_count(&self) -> u64 {
        self.followers.as_ref().map(|f| f.total).unwrap_or(0)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct Followers {
    #[serde(default)]
    pub total: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct AlbumRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_date: String,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct ArtistRef {
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub popularity: u32,
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct TopTracks {
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Album tracklists carry no popularity, only ids.
#[derive(Deserialize, Debug)]
pub(crate) struct SimpleTrack {
    pub id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct TrackBatch {
    #[serde(default)]
    pub tracks: Vec<Option<Track>>,
}

/// Year prefix of a Spotify release date ("1990", "1990-09" or "1990-09-24").
pub(crate) fn release_year(release_date: &str) -> Option<i32> {
    release_date.get(..4)?.parse().ok()
}

impl Track {
    pub fn release_year(&self) -> Option<i32> {
        self.album.as_ref().and_then(|a| release_year(&a.release_date))
    }

    pub fn into_discovery(self, fallback_artist: &str) -> DiscoveryTrack {
        let release_year = self.release_year();
        let (album, release_date) = match self.album {
            Some(album) => (album.name, album.release_date),
            None => ("Unknown".to_string(), String::new()),
        };
        DiscoveryTrack {
            id: self.id,
            name: self.name,
            artist: self
                .artists
                .into_iter()
                .next()
                .map(|a| a.name)
                .unwrap_or_else(|| fallback_artist.to_string()),
            album,
            popularity: self.popularity,
            release_date,
            release_year,
        }
    }
}
