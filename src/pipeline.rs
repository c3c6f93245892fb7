//!
//! src/pipeline.rs
//!
//! Linear run for each pipeline: fetch -> normalize -> replace table.
//! Not-found and empty results end the run without touching storage;
//! the sqlite file is only opened once there is something to write.
//!

use tracing::{debug, info, warn};

use crate::config::{ArtistSettings, PlaylistSettings};
use crate::errors::ReportError;
use crate::fetch::TrackSource;
use crate::normalize::{self, ArtistTrackRecord, PlaylistTrackRecord, TrackTable};
use crate::persistent::{Persistent, TableName, TrackRow};

/// Result of a single fetch + normalize step
#[derive(Debug)]
pub enum Fetched<R> {
    Success(TrackTable<R>),
    NotFound(String),
    TransportFailure(ReportError),
}

impl<R> Fetched<R> {
    fn from_result<P>(
        result: Result<P, ReportError>,
        resource_id: &str,
        normalize: impl FnOnce(P) -> TrackTable<R>,
    ) -> Self {
        match result {
            Ok(payload) => Fetched::Success(normalize(payload)),
            Err(ReportError::NotFound(_)) => Fetched::NotFound(resource_id.to_string()),
            Err(e) => Fetched::TransportFailure(e),
        }
    }
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Persisted { table: String, rows: u64 },
    NoData,
    NotFound(String),
}

pub async fn fetch_artist_tracks<S: TrackSource + ?Sized>(
    source: &S,
    artist_id: &str,
    market: &str,
) -> Fetched<ArtistTrackRecord> {
    let result = source.artist_top_tracks(artist_id, market).await;
    Fetched::from_result(result, artist_id, |payload| {
        normalize::artist_tracks(&payload.into_tracks())
    })
}

pub async fn fetch_playlist_tracks<S: TrackSource + ?Sized>(
    source: &S,
    playlist_id: &str,
    limit: u32,
) -> Fetched<PlaylistTrackRecord> {
    let result = source.playlist_items(playlist_id, limit).await;
    Fetched::from_result(result, playlist_id, |page| {
        if page.is_truncated() {
            debug!(playlist_id, total = ?page.total, "fetch.playlist.first_page_only");
        }
        normalize::playlist_tracks(&page.into_items())
    })
}

/// Opens `db_url`, replaces `table` with `rows` and closes the pool again
pub async fn persist<R: TrackRow>(
    db_url: &str,
    table: &TableName,
    rows: &TrackTable<R>,
) -> Result<u64, ReportError> {
    let db = Persistent::init(db_url).await?;
    let written = replace_and_verify(&db, table, rows).await;
    db.close().await;
    written
}

async fn replace_and_verify<R: TrackRow>(
    db: &Persistent,
    table: &TableName,
    rows: &TrackTable<R>,
) -> Result<u64, ReportError> {
    let replacing = db.table_exists(table).await?;
    let written = db.replace_table(table, rows.rows()).await?;
    let stored = db.count_rows(table).await?;
    debug!(table = %table, replacing, written, stored, "persist.verify");
    Ok(written)
}

/// Persists a successful fetch; everything else short-circuits
async fn settle<R: TrackRow>(
    fetched: Fetched<R>,
    kind: &str,
    resource_id: &str,
    db_url: &str,
    table: &TableName,
) -> Result<RunOutcome, ReportError> {
    let rows = match fetched {
        Fetched::Success(rows) => rows,
        Fetched::NotFound(id) => {
            warn!(kind, resource = %id, "fetch.not_found");
            return Ok(RunOutcome::NotFound(id));
        }
        Fetched::TransportFailure(e) => return Err(e),
    };

    if rows.is_empty() {
        warn!(kind, resource = %resource_id, "fetch.empty");
        return Ok(RunOutcome::NoData);
    }

    info!(kind, resource = %resource_id, tracks = rows.len(), "fetch.ok");
    let written = persist(db_url, table, &rows).await?;
    Ok(RunOutcome::Persisted { table: table.to_string(), rows: written })
}

pub async fn run_artist<S: TrackSource + ?Sized>(
    source: &S,
    db_url: &str,
    settings: &ArtistSettings,
) -> Result<RunOutcome, ReportError> {
    let table = TableName::parse(&settings.table)?;
    let fetched = fetch_artist_tracks(source, &settings.artist_id, &settings.market).await;
    settle(fetched, "artist", &settings.artist_id, db_url, &table).await
}

pub async fn run_playlist<S: TrackSource + ?Sized>(
    source: &S,
    db_url: &str,
    settings: &PlaylistSettings,
) -> Result<RunOutcome, ReportError> {
    let table = TableName::parse(&settings.table)?;
    let fetched = fetch_playlist_tracks(source, &settings.playlist_id, settings.limit).await;
    settle(fetched, "playlist", &settings.playlist_id, db_url, &table).await
}
