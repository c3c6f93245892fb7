//!
//! src/bin/playlist_tracks.rs
//!
//! Downloads the first page of a playlist and replaces the
//! playlist_tracks table with it
//!

use spotify_track_report::{
    config,
    fetch::SpotifyClient,
    logging,
    pipeline::{self, RunOutcome},
    ReportError,
};

#[tokio::main]
async fn main() -> Result<(), ReportError> {
    let cfgs = config::load_config()?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service="playlist-tracks",
        version=%env!("CARGO_PKG_VERSION"),
        playlist_id=%cfgs.playlist.playlist_id,
        "starting"
    );

    let spotify = SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
    let session = spotify.authenticate().await?;

    let db_url = cfgs.persistence.db_url();
    match pipeline::run_playlist(&session, &db_url, &cfgs.playlist).await? {
        RunOutcome::Persisted { table, rows } => {
            println!("Downloaded {rows} tracks from playlist {}", cfgs.playlist.playlist_id);
            println!("Saved to {} -> table {table}", cfgs.persistence.db_path);
        }
        RunOutcome::NoData => {
            println!("No tracks found in playlist {}.", cfgs.playlist.playlist_id);
        }
        RunOutcome::NotFound(id) => {
            println!("Playlist not found: {id}");
        }
    }

    tracing::info!("finished");
    Ok(())
}
