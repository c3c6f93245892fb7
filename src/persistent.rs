//!
//! src/persistent.rs
//!
//! Persists normalized track tables to sqlite. Each write replaces the
//! destination table wholesale (drop, create, insert) in one transaction.
//!

use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tracing::{debug, info};

use crate::errors::ReportError;
use crate::normalize::{ArtistTrackRecord, PlaylistTrackRecord};

pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Column name and sqlite affinity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
}

const fn col(name: &'static str, sql_type: &'static str) -> Column {
    Column { name, sql_type }
}

/// A record schema that can be written to and read back from a table
pub trait TrackRow: Sized + Send + Sync {
    const COLUMNS: &'static [Column];

    /// Binds this row's values in `COLUMNS` order
    fn bind_row<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;

    fn from_row(row: &SqliteRow) -> Result<Self, ReportError>;
}

fn date_to_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn text_to_date(text: Option<String>) -> Result<Option<NaiveDate>, ReportError> {
    text.map(|t| NaiveDate::parse_from_str(&t, "%Y-%m-%d")
            .map_err(|e| ReportError::Parse(format!("release_date {t:?}: {e}"))))
        .transpose()
}

impl TrackRow for ArtistTrackRecord {
    const COLUMNS: &'static [Column] = &[
        col("track_id", "TEXT"),
        col("name", "TEXT"),
        col("artist", "TEXT"),
        col("album", "TEXT"),
        col("release_date", "TEXT"),
        col("popularity", "INTEGER"),
        col("duration_ms", "INTEGER"),
        col("duration_min", "REAL"),
    ];

    fn bind_row<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.track_id.clone())
            .bind(self.name.clone())
            .bind(self.artist.clone())
            .bind(self.album.clone())
            .bind(date_to_text(self.release_date))
            .bind(self.popularity)
            .bind(self.duration_ms)
            .bind(self.duration_min)
    }

    fn from_row(row: &SqliteRow) -> Result<Self, ReportError> {
        Ok(Self {
            track_id: row.try_get("track_id")?,
            name: row.try_get("name")?,
            artist: row.try_get("artist")?,
            album: row.try_get("album")?,
            release_date: text_to_date(row.try_get("release_date")?)?,
            popularity: row.try_get("popularity")?,
            duration_ms: row.try_get("duration_ms")?,
            duration_min: row.try_get("duration_min")?,
        })
    }
}

impl TrackRow for PlaylistTrackRecord {
    const COLUMNS: &'static [Column] = &[
        col("track_id", "TEXT"),
        col("name", "TEXT"),
        col("artist", "TEXT"),
        col("album", "TEXT"),
        col("release_date", "TEXT"),
        col("popularity", "INTEGER"),
    ];

    fn bind_row<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.track_id.clone())
            .bind(self.name.clone())
            .bind(self.artist.clone())
            .bind(self.album.clone())
            .bind(self.release_date.clone())
            .bind(self.popularity)
    }

    fn from_row(row: &SqliteRow) -> Result<Self, ReportError> {
        Ok(Self {
            track_id: row.try_get("track_id")?,
            name: row.try_get("name")?,
            artist: row.try_get("artist")?,
            album: row.try_get("album")?,
            release_date: row.try_get("release_date")?,
            popularity: row.try_get("popularity")?,
        })
    }
}

/// Destination table name; only plain identifiers since it is spliced into DDL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn parse(name: &str) -> Result<Self, ReportError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if !valid {
            return Err(ReportError::Db(format!("invalid table name: {name:?}")));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn create_sql<R: TrackRow>(table: &TableName) -> String {
    let cols: Vec<String> = R::COLUMNS.iter()
        .map(|c| format!("{} {}", c.name, c.sql_type))
        .collect();
    format!("CREATE TABLE {} ({});", table.quoted(), cols.join(", "))
}

fn insert_sql<R: TrackRow>(table: &TableName) -> String {
    let names: Vec<&str> = R::COLUMNS.iter().map(|c| c.name).collect();
    let params: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        table.quoted(), names.join(", "), params.join(", ")
    )
}

fn select_sql<R: TrackRow>(table: &TableName) -> String {
    let names: Vec<&str> = R::COLUMNS.iter().map(|c| c.name).collect();
    format!("SELECT {} FROM {} ORDER BY rowid;", names.join(", "), table.quoted())
}

pub struct Persistent {
    pool: Pool<Sqlite>
}

impl Persistent {

    pub async fn init(database_url: &str) -> Result<Self, ReportError> {
        let is_memory = database_url.starts_with("sqlite::memory:");

        let mut opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true);

        // WAL is file-only; don't set it for in-memory
        if !is_memory {
            opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                       .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        }

        // in-memory databases live per connection, so pin to one
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(if is_memory {1} else {4})
            .connect_with(opts)
            .await?;

        debug!(db = %database_url, "persist.open");
        Ok(Self { pool })
    }

    /// Discards whatever `table` held and writes `rows` in its place
    pub async fn replace_table<R: TrackRow>(&self, table: &TableName, rows: &[R]) ->
        Result<u64, ReportError> {
        let drop_sql = format!("DROP TABLE IF EXISTS {};", table.quoted());
        let create = create_sql::<R>(table);
        let insert = insert_sql::<R>(table);

        let mut tx = self.pool.begin().await?;

        sqlx::query(&drop_sql).execute(&mut *tx).await?;
        sqlx::query(&create).execute(&mut *tx).await?;

        let mut written = 0_u64;
        for row in rows {
            written += row.bind_row(sqlx::query(&insert))
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;

        info!(table = %table, rows = written, "persist.replace");
        Ok(written)
    }

    /// Reads every row of `table` back, in insertion order
    pub async fn load_table<R: TrackRow>(&self, table: &TableName) ->
        Result<Vec<R>, ReportError> {
        let select = select_sql::<R>(table);
        let rows = sqlx::query(&select)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(R::from_row).collect()
    }

    pub async fn count_rows(&self, table: &TableName) -> Result<i64, ReportError> {
        let sql = format!("SELECT COUNT(*) FROM {};", table.quoted());
        let count = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn table_exists(&self, table: &TableName) -> Result<bool, ReportError> {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1;"
        )
        .bind(table.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Waits for open connections to finish and closes the pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist_row(id: &str, popularity: i64, duration_ms: i64) -> ArtistTrackRecord {
        ArtistTrackRecord {
            track_id: Some(id.to_string()),
            name: Some(format!("Song {id}")),
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            release_date: NaiveDate::from_ymd_opt(2020, 2, 14),
            popularity: Some(popularity),
            duration_ms: Some(duration_ms),
            duration_min: Some(duration_ms as f64 / 60000.0),
        }
    }

    async fn memory_db() -> Result<Persistent, ReportError> {
        Persistent::init("sqlite::memory:").await
    }

    #[test]
    fn table_names_are_plain_identifiers() {
        assert!(TableName::parse("artist_tracks").is_ok());
        assert!(TableName::parse("_t2").is_ok());
        for bad in ["", "2tracks", "artist tracks", "x;DROP TABLE y", "a\"b", "tracks-1"] {
            assert!(TableName::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn generated_sql_follows_column_order() {
        let table = TableName::parse("playlist_tracks").unwrap();
        assert_eq!(
            create_sql::<PlaylistTrackRecord>(&table),
            "CREATE TABLE \"playlist_tracks\" (track_id TEXT, name TEXT, artist TEXT, \
             album TEXT, release_date TEXT, popularity INTEGER);"
        );
        assert_eq!(
            insert_sql::<PlaylistTrackRecord>(&table),
            "INSERT INTO \"playlist_tracks\" (track_id, name, artist, album, \
             release_date, popularity) VALUES (?1, ?2, ?3, ?4, ?5, ?6);"
        );
    }

    #[tokio::test]
    async fn replace_then_load_round_trips_rows() -> Result<(), ReportError> {
        let db = memory_db().await?;
        let table = TableName::parse("artist_tracks")?;
        let rows = vec![artist_row("a", 50, 180000), artist_row("b", 70, 240000)];

        let written = db.replace_table(&table, &rows).await?;
        assert_eq!(written, 2);

        let loaded: Vec<ArtistTrackRecord> = db.load_table(&table).await?;
        assert_eq!(loaded, rows);
        Ok(())
    }

    #[tokio::test]
    async fn absent_fields_round_trip_as_null() -> Result<(), ReportError> {
        let db = memory_db().await?;
        let table = TableName::parse("artist_tracks")?;
        let sparse = ArtistTrackRecord {
            track_id: None,
            name: None,
            artist: None,
            album: None,
            release_date: None,
            popularity: None,
            duration_ms: None,
            duration_min: None,
        };

        db.replace_table(&table, std::slice::from_ref(&sparse)).await?;
        let loaded: Vec<ArtistTrackRecord> = db.load_table(&table).await?;
        assert_eq!(loaded, vec![sparse]);
        Ok(())
    }

    #[tokio::test]
    async fn second_write_overwrites_not_appends() -> Result<(), ReportError> {
        let db = memory_db().await?;
        let table = TableName::parse("artist_tracks")?;

        let first = vec![artist_row("a", 10, 60000), artist_row("b", 20, 60000)];
        db.replace_table(&table, &first).await?;

        let latest = vec![artist_row("a", 99, 120000)];
        db.replace_table(&table, &latest).await?;
        db.replace_table(&table, &latest).await?;

        assert_eq!(db.count_rows(&table).await?, 1);
        let loaded: Vec<ArtistTrackRecord> = db.load_table(&table).await?;
        assert_eq!(loaded, latest);
        Ok(())
    }

    #[tokio::test]
    async fn overwrite_replaces_schema_of_other_pipeline() -> Result<(), ReportError> {
        let db = memory_db().await?;
        let table = TableName::parse("tracks")?;

        db.replace_table(&table, &[artist_row("a", 1, 1000)]).await?;

        let playlist = vec![PlaylistTrackRecord {
            track_id: Some("p".to_string()),
            name: Some("Playlist song".to_string()),
            artist: None,
            album: Some("Alb".to_string()),
            release_date: Some("2010-05".to_string()),
            popularity: Some(5),
        }];
        db.replace_table(&table, &playlist).await?;

        let loaded: Vec<PlaylistTrackRecord> = db.load_table(&table).await?;
        assert_eq!(loaded, playlist);
        Ok(())
    }

    #[tokio::test]
    async fn table_exists_tracks_writes() -> Result<(), ReportError> {
        let db = memory_db().await?;
        let table = TableName::parse("playlist_tracks")?;
        assert!(!db.table_exists(&table).await?);

        db.replace_table::<PlaylistTrackRecord>(&table, &[]).await?;
        assert!(db.table_exists(&table).await?);
        assert_eq!(db.count_rows(&table).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn file_backed_overwrite_survives_reopen() -> Result<(), ReportError> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite://{}", dir.path().join("report.db").display());
        let table = TableName::parse("artist_tracks")?;

        let db = Persistent::init(&url).await?;
        db.replace_table(&table, &[artist_row("a", 1, 1000), artist_row("b", 2, 2000)])
            .await?;
        db.close().await;

        let db = Persistent::init(&url).await?;
        db.replace_table(&table, &[artist_row("c", 3, 3000)]).await?;
        db.close().await;

        let db = Persistent::init(&url).await?;
        let loaded: Vec<ArtistTrackRecord> = db.load_table(&table).await?;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].track_id.as_deref(), Some("c"));
        db.close().await;
        Ok(())
    }
}
