//!
//! src/bin/artist_tracks.rs
//!
//! Downloads an artist's top tracks, replaces the artist_tracks table,
//! then reads it back and plots duration against popularity
//!

use spotify_track_report::{
    config::{self, AppConfig},
    fetch::SpotifyClient,
    logging,
    normalize::ArtistTrackRecord,
    persistent::{Persistent, TableName},
    pipeline::{self, RunOutcome},
    report,
    ReportError,
};

const HEAD_ROWS: usize = 5;

/// Reloads the stored table, prints its head, then shows the scatter chart
async fn show_report(cfgs: &AppConfig, table: &str) -> Result<(), ReportError> {
    let db = Persistent::init(&cfgs.persistence.db_url()).await?;
    let rows = db.load_table::<ArtistTrackRecord>(&TableName::parse(table)?).await;
    db.close().await;
    let rows = rows?;

    println!("{}", report::head_table(&rows, HEAD_ROWS));

    // the chart blocks on terminal input until a key is pressed
    tokio::task::spawn_blocking(move || report::duration_popularity_plot(&rows))
        .await
        .map_err(|e| ReportError::Io(std::io::Error::other(e)))?
}

#[tokio::main]
async fn main() -> Result<(), ReportError> {
    let cfgs = config::load_config()?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service="artist-tracks",
        version=%env!("CARGO_PKG_VERSION"),
        artist_id=%cfgs.artist.artist_id,
        "starting"
    );

    let spotify = SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
    let session = spotify.authenticate().await?;

    let db_url = cfgs.persistence.db_url();
    match pipeline::run_artist(&session, &db_url, &cfgs.artist).await? {
        RunOutcome::Persisted { table, rows } => {
            println!("Downloaded {rows} tracks for artist {}", cfgs.artist.artist_id);
            println!("Saved to {} -> table {table}", cfgs.persistence.db_path);
            show_report(&cfgs, &table).await?;
        }
        RunOutcome::NoData => {
            println!("No tracks found for artist {}.", cfgs.artist.artist_id);
        }
        RunOutcome::NotFound(id) => {
            println!("Artist not found: {id}");
        }
    }

    tracing::info!("finished");
    Ok(())
}
