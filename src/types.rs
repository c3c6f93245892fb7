//!
//! src/types.rs
//!
//! Payload shapes returned by the Spotify Web API. Every field is
//! optional so a partial or sparse response still decodes.
//!

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawArtist {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAlbum {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// A track object as it appears in top-tracks and playlist responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Option<Vec<RawArtist>>,
    #[serde(default)]
    pub album: Option<RawAlbum>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

impl RawTrack {
    /// Name of the first listed performer, if any
    pub fn first_artist(&self) -> Option<&str> {
        self.artists
            .as_deref()
            .and_then(|a| a.first())
            .and_then(|a| a.name.as_deref())
    }

    pub fn album_name(&self) -> Option<&str> {
        self.album.as_ref().and_then(|a| a.name.as_deref())
    }

    pub fn release_date(&self) -> Option<&str> {
        self.album.as_ref().and_then(|a| a.release_date.as_deref())
    }
}

/// GET /v1/artists/{id}/top-tracks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopTracksPayload {
    #[serde(default)]
    pub tracks: Option<Vec<RawTrack>>,
}

impl TopTracksPayload {
    pub fn into_tracks(self) -> Vec<RawTrack> {
        self.tracks.unwrap_or_default()
    }
}

/// One playlist entry; `track` is null for removed or local-only items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<RawTrack>,
}

/// GET /v1/playlists/{id}/tracks (a single page)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Option<Vec<PlaylistItem>>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
}

impl PlaylistPage {
    /// True when the playlist continues past this page
    pub fn is_truncated(&self) -> bool {
        self.next.is_some()
    }

    pub fn into_items(self) -> Vec<PlaylistItem> {
        self.items.unwrap_or_default()
    }
}

/// POST /api/token (client credentials)
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}
