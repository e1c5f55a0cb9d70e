use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Artist,
    Track,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Artist => write!(f, "artist"),
            EntryKind::Track => write!(f, "track"),
        }
    }
}

impl From<String> for EntryKind {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "track" | "tracks" | "audio" => EntryKind::Track,
            _ => EntryKind::Artist,
        }
    }
}

/// An artist or track as the remote catalog reports it.
///
/// Entries are fetched fresh for every operation and never mutated locally;
/// every change goes through the catalog and is observed by re-fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
    /// Owning artist for a track.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Display name of the owning artist, when the catalog reports one.
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub sort_name: Option<String>,
    #[serde(default)]
    pub album_count: u32,
    #[serde(default)]
    pub track_count: u32,
    /// Number of populated descriptive fields, used to break ties.
    #[serde(default)]
    pub metadata_completeness: u32,
}

impl CatalogEntry {
    pub fn artist(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntryKind::Artist,
            parent_id: None,
            artist_name: None,
            sort_name: None,
            album_count: 0,
            track_count: 0,
            metadata_completeness: 0,
        }
    }

    pub fn track(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntryKind::Track,
            parent_id,
            artist_name: None,
            sort_name: None,
            album_count: 0,
            track_count: 0,
            metadata_completeness: 0,
        }
    }

    pub fn with_track_count(mut self, track_count: u32) -> Self {
        self.track_count = track_count;
        self
    }

    pub fn with_completeness(mut self, completeness: u32) -> Self {
        self.metadata_completeness = completeness;
        self
    }

    pub fn with_artist_name(mut self, artist_name: impl Into<String>) -> Self {
        self.artist_name = Some(artist_name.into());
        self
    }
}

/// Quick summary shown after connecting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub server_name: Option<String>,
    pub user_id: String,
    pub artists: usize,
    pub tracks: usize,
}
