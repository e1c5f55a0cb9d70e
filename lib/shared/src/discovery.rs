use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A track as the discovery service ranks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryTrack {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub popularity: u32,
    pub release_date: String,
    pub release_year: Option<i32>,
}

/// Inclusive release-year window; an open side matches everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimePeriod {
    pub from_year: Option<i32>,
    pub to_year: Option<i32>,
}

impl TimePeriod {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn between(from_year: Option<i32>, to_year: Option<i32>) -> Self {
        Self { from_year, to_year }
    }

    pub fn is_open(&self) -> bool {
        self.from_year.is_none() && self.to_year.is_none()
    }

    /// Tracks without a known year only pass an open window.
    pub fn contains(&self, year: Option<i32>) -> bool {
        if self.is_open() {
            return true;
        }
        let Some(year) = year else {
            return false;
        };
        self.from_year.is_none_or(|from| year >= from) && self.to_year.is_none_or(|to| year <= to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistStyle {
    Experience,
    Bangers,
    #[default]
    Slaps,
}

impl PlaylistStyle {
    pub fn title(&self, artists: &[String]) -> String {
        let joined = artists.join(" & ");
        match self {
            PlaylistStyle::Experience => format!("The {joined} Experience"),
            PlaylistStyle::Bangers => format!("Certified {joined} Bangers"),
            PlaylistStyle::Slaps => format!("Why {joined} Slaps"),
        }
    }
}

impl FromStr for PlaylistStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "experience" => Ok(PlaylistStyle::Experience),
            "bangers" => Ok(PlaylistStyle::Bangers),
            "slaps" => Ok(PlaylistStyle::Slaps),
            other => Err(format!("unknown playlist style '{other}'")),
        }
    }
}

impl fmt::Display for PlaylistStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaylistStyle::Experience => write!(f, "experience"),
            PlaylistStyle::Bangers => write!(f, "bangers"),
            PlaylistStyle::Slaps => write!(f, "slaps"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistRequest {
    /// Free-form artist list, e.g. "Blur, Oasis & Pulp".
    pub artists: String,
    pub style: PlaylistStyle,
    pub track_count: usize,
    pub period: TimePeriod,
}

/// A discovery track resolved to a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    pub catalog_id: String,
    pub title: String,
    pub artist: String,
    pub popularity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistPreview {
    pub name: String,
    pub artists: Vec<String>,
    pub tracks: Vec<PlaylistTrack>,
    /// Discovery tracks with no catalog counterpart, as "title - artist".
    pub unmatched: Vec<String>,
}

impl PlaylistPreview {
    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.catalog_id.clone()).collect()
    }
}
