use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shared::catalog::{CatalogEntry, EntryKind};

// Internal structs for deserializing raw API responses
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<BaseItem>,
    #[serde(default)]
    pub total_record_count: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NameIdPair {
    #[serde(default)]
    pub name: String,
    pub id: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BaseItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub item_type: Option<String>,
    pub sort_name: Option<String>,
    pub child_count: Option<u32>,
    pub album_count: Option<u32>,
    pub song_count: Option<u32>,
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub production_year: Option<i32>,
    #[serde(default)]
    pub image_tags: HashMap<String, String>,
    #[serde(default)]
    pub provider_ids: HashMap<String, Option<String>>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub artist_items: Vec<NameIdPair>,
    #[serde(default)]
    pub album_artists: Vec<NameIdPair>,
}

impl BaseItem {
    pub fn kind(&self) -> EntryKind {
        match self.item_type.as_deref() {
            Some("Audio") => EntryKind::Track,
            _ => EntryKind::Artist,
        }
    }

    /// Number of populated descriptive fields.
    pub fn completeness(&self) -> u32 {
        let filled = |present: bool| u32::from(present);
        filled(self.overview.as_deref().is_some_and(|o| !o.trim().is_empty()))
            + filled(!self.genres.is_empty())
            + filled(self.production_year.is_some())
            + filled(self.sort_name.as_deref().is_some_and(|s| !s.is_empty()))
            + filled(!self.image_tags.is_empty())
            + filled(self.provider_ids.values().any(|v| v.is_some()))
            + filled(self.album.as_deref().is_some_and(|a| !a.is_empty()))
            + filled(self.album_artist.as_deref().is_some_and(|a| !a.is_empty()))
    }

    pub fn into_entry(self) -> CatalogEntry {
        let kind = self.kind();
        let completeness = self.completeness();
        let (parent_id, artist_name) = match kind {
            EntryKind::Track => {
                let primary = self.artist_items.first().or(self.album_artists.first());
                (
                    primary.map(|p| p.id.clone()),
                    self.artists
                        .first()
                        .cloned()
                        .or_else(|| primary.map(|p| p.name.clone()))
                        .or_else(|| self.album_artist.clone()),
                )
            }
            EntryKind::Artist => (None, None),
        };

        CatalogEntry {
            id: self.id,
            name: self.name,
            kind,
            parent_id,
            artist_name,
            sort_name: self.sort_name,
            album_count: self.album_count.or(self.child_count).unwrap_or(0),
            track_count: self.song_count.unwrap_or(0),
            metadata_completeness: completeness,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct UserDto {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PublicSystemInfo {
    pub server_name: Option<String>,
    pub version: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreatePlaylist<'a> {
    pub name: &'a str,
    pub ids: &'a [String],
    pub user_id: &'a str,
    pub media_type: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PlaylistCreated {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_item_becomes_track_owned_by_first_artist() {
        let raw = r#"{
            "Id": "t1",
            "Name": "Thunderstruck",
            "Type": "Audio",
            "Album": "The Razors Edge",
            "Artists": ["AC/DC"],
            "ArtistItems": [{"Name": "AC/DC", "Id": "a1"}],
            "AlbumArtists": [{"Name": "AC/DC", "Id": "a1"}],
            "ProductionYear": 1990,
            "ProviderIds": {"MusicBrainzTrack": "x", "Isrc": null}
        }"#;
        let entry = serde_json::from_str::<BaseItem>(raw).unwrap().into_entry();

        assert_eq!(entry.kind, EntryKind::Track);
        assert_eq!(entry.parent_id.as_deref(), Some("a1"));
        assert_eq!(entry.artist_name.as_deref(), Some("AC/DC"));
        assert_eq!(entry.metadata_completeness, 3);
    }

    #[test]
    fn artist_item_uses_song_and_album_counts() {
        let raw = r#"{"Id": "a1", "Name": "AC-DC", "Type": "MusicArtist",
                      "ChildCount": 4, "SongCount": 37, "SortName": "ac-dc"}"#;
        let entry = serde_json::from_str::<BaseItem>(raw).unwrap().into_entry();

        assert_eq!(entry.kind, EntryKind::Artist);
        assert_eq!(entry.album_count, 4);
        assert_eq!(entry.track_count, 37);
        assert_eq!(entry.parent_id, None);
    }
}
