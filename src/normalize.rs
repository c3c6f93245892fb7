//!
//! src/normalize.rs
//!
//! Flattens decoded API payloads into one row per track. Two schemas:
//! artist top tracks (with duration and a parsed release date) and
//! playlist tracks (release date kept as the raw string).
//!

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{PlaylistItem, RawTrack};

pub const MS_PER_MINUTE: f64 = 60000.0;

/// Ordered rows produced by one fetch
#[derive(Debug, Clone, PartialEq)]
pub struct TrackTable<R> {
    rows: Vec<R>,
}

impl<R> TrackTable<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistTrackRecord {
    pub track_id: Option<String>,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub popularity: Option<i64>,
    pub duration_ms: Option<i64>,
    pub duration_min: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistTrackRecord {
    pub track_id: Option<String>,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<i64>,
}

/// Parses full, year-month or year-only dates.
/// Partial dates resolve to the first day of the period; anything else is None.
/// Year 0000 is the API's placeholder for an unknown date and is rejected.
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    fn digits(s: &str, min: usize, max: usize) -> Option<u32> {
        let ok = (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit());
        if ok { s.parse().ok() } else { None }
    }

    let mut parts = raw.trim().split('-');

    let year = digits(parts.next()?, 4, 4).filter(|y| *y > 0)? as i32;
    let month = match parts.next() {
        Some(m) => digits(m, 1, 2)?,
        None => 1,
    };
    let day = match parts.next() {
        Some(d) => digits(d, 1, 2)?,
        None => 1,
    };
    if parts.next().is_some() {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn duration_minutes(duration_ms: i64) -> f64 {
    duration_ms as f64 / MS_PER_MINUTE
}

fn artist_record(track: &RawTrack) -> ArtistTrackRecord {
    ArtistTrackRecord {
        track_id: track.id.clone(),
        name: track.name.clone(),
        artist: track.first_artist().map(str::to_string),
        album: track.album_name().map(str::to_string),
        release_date: track.release_date().and_then(parse_release_date),
        popularity: track.popularity,
        duration_ms: track.duration_ms,
        duration_min: track.duration_ms.map(duration_minutes),
    }
}

fn playlist_record(track: Option<&RawTrack>) -> PlaylistTrackRecord {
    match track {
        Some(t) => PlaylistTrackRecord {
            track_id: t.id.clone(),
            name: t.name.clone(),
            artist: t.first_artist().map(str::to_string),
            album: t.album_name().map(str::to_string),
            release_date: t.release_date().map(str::to_string),
            popularity: t.popularity,
        },
        None => PlaylistTrackRecord {
            track_id: None,
            name: None,
            artist: None,
            album: None,
            release_date: None,
            popularity: None,
        },
    }
}

/// One record per track, in input order
pub fn artist_tracks(tracks: &[RawTrack]) -> TrackTable<ArtistTrackRecord> {
    TrackTable::new(tracks.iter().map(artist_record).collect())
}

/// One record per playlist item; the nested track is unwrapped first
pub fn playlist_tracks(items: &[PlaylistItem]) -> TrackTable<PlaylistTrackRecord> {
    TrackTable::new(
        items.iter()
            .map(|item| playlist_record(item.track.as_ref()))
            .collect()
    )
}
