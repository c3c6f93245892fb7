//!
//! src/config.rs
//!
//! Builds the configuration for both pipelines from the process
//! environment (and a .env file if one is present)
//!

use std::time;
use url::Url;
use crate::errors::ReportError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 4;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1/";
pub const DEFAULT_ARTIST_ID: &str = "66q6iqbR9rh3jJNlGEnQvB";
pub const DEFAULT_PLAYLIST_ID: &str = "37i9dQZF1DXcBWIGoYBM5M";
pub const DEFAULT_MARKET: &str = "US";
pub const DEFAULT_DB_PATH: &str = "spotify_data.db";

/// Spotify caps a single playlist page at 100 items
pub const PLAYLIST_PAGE_MAX: u32 = 100;

pub const ARTIST_TABLE: &str = "artist_tracks";
pub const PLAYLIST_TABLE: &str = "playlist_tracks";

/// Looks up a variable, treating blank values as unset
fn lookup_nonblank(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    get(key).filter(|v| !v.trim().is_empty())
}

/// Returns the first set variable among `keys` or a config error naming the first
fn env_check(get: &impl Fn(&str) -> Option<String>, keys: &[&str]) ->
    Result<String, ReportError> {
    keys.iter()
        .find_map(|k| lookup_nonblank(get, k))
        .ok_or_else(|| ReportError::Config(format!("{} was not set", keys[0])))
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

fn parse_url(raw: &str, key: &str, expected_host: &str) -> Result<Url, ReportError> {
    let url = Url::parse(raw)
        .map_err(|e| ReportError::Config(format!("{key} invalid {e}")))?;
    ensure_https(&url).map_err(ReportError::Config)?;
    ensure_host(&url, expected_host).map_err(ReportError::Config)?;
    Ok(url)
}

/// Configuration that Spotify expects when hitting endpoints
#[derive(Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: Url,
    pub api_base: Url,
}

// keep the secret out of `println!("{:#?}")` and log output
impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("token_url", &self.token_url.as_str())
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

fn build_spotify(get: &impl Fn(&str) -> Option<String>) ->
    Result<SpotifyConfig, ReportError> {
    let client_id     = env_check(get, &["SPOTIFY_CLIENT_ID", "SPOTIPY_CLIENT_ID"])?;
    let client_secret = env_check(
        get, &["SPOTIFY_CLIENT_SECRET", "SPOTIPY_CLIENT_SECRET"]
    )?;

    let token_url = lookup_nonblank(get, "SPOTIFY_TOKEN_URL")
        .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());
    let api_base  = lookup_nonblank(get, "SPOTIFY_API_BASE")
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    let token_url    = parse_url(&token_url, "SPOTIFY_TOKEN_URL", "accounts.spotify.com")?;
    let mut api_base = parse_url(&api_base, "SPOTIFY_API_BASE", "api.spotify.com")?;

    // ensure trailing slash so Url::join keeps the /v1 segment
    if !api_base.path().ends_with('/') {
        let mut path = api_base.path().to_string();
        path.push('/');
        api_base.set_path(&path);
    }

    Ok( SpotifyConfig { client_id, client_secret, token_url, api_base } )
}

///
/// Configuration for what each pipeline fetches
///
#[derive(Debug, Clone)]
pub struct ArtistSettings {
    pub artist_id: String,
    pub market: String,
    pub table: String,
}

#[derive(Debug, Clone)]
pub struct PlaylistSettings {
    pub playlist_id: String,
    pub limit: u32,
    pub table: String,
}

fn build_artist(get: &impl Fn(&str) -> Option<String>) -> ArtistSettings {
    ArtistSettings {
        artist_id: lookup_nonblank(get, "SPOTIFY_ARTIST_ID")
            .unwrap_or_else(|| DEFAULT_ARTIST_ID.to_string()),
        market: lookup_nonblank(get, "SPOTIFY_MARKET")
            .unwrap_or_else(|| DEFAULT_MARKET.to_string()),
        table: ARTIST_TABLE.to_string(),
    }
}

fn build_playlist(get: &impl Fn(&str) -> Option<String>) -> PlaylistSettings {
    let limit = lookup_nonblank(get, "SPOTIFY_PLAYLIST_LIMIT")
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(PLAYLIST_PAGE_MAX)
        .clamp(1, PLAYLIST_PAGE_MAX);

    PlaylistSettings {
        playlist_id: lookup_nonblank(get, "SPOTIFY_PLAYLIST_ID")
            .unwrap_or_else(|| DEFAULT_PLAYLIST_ID.to_string()),
        limit,
        table: PLAYLIST_TABLE.to_string(),
    }
}

///
/// Configuration for Http timeouts, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Configuration for the sqlite file both pipelines write to
///
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub db_path: String,
}

impl PersistenceConfig {
    /// sqlx connection url for the configured path
    pub fn db_url(&self) -> String {
        if self.db_path.starts_with("sqlite:") {
            self.db_path.clone()
        } else {
            format!("sqlite://{}", self.db_path)
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { db_path: DEFAULT_DB_PATH.to_string() }
    }
}

fn build_persistence(get: &impl Fn(&str) -> Option<String>) -> PersistenceConfig {
    match lookup_nonblank(get, "SPOTIFY_DB_PATH") {
        Some(db_path) => PersistenceConfig { db_path },
        None => PersistenceConfig::default(),
    }
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,spotify_track_report=debug,sqlx=warn,reqwest=warn"
                .to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: false,
            include_target: true,
        }
    }
}

fn build_logging(get: &impl Fn(&str) -> Option<String>) -> LoggingConfig {
    let mut logging = LoggingConfig::default();
    if let Some(format) = lookup_nonblank(get, "LOG_FORMAT") {
        if format.trim().eq_ignore_ascii_case("json") {
            logging.format = LogFormat::Json;
            logging.with_ansi = false;
            logging.include_file_line = true;
        }
    }
    logging
}

///
/// AppConfig which holds everything either pipeline needs
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spotify: SpotifyConfig,
    pub artist: ArtistSettings,
    pub playlist: PlaylistSettings,
    pub http: HttpConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig
}

/// Builds the config from an arbitrary variable lookup
pub fn load_config_from(get: impl Fn(&str) -> Option<String>) ->
    Result<AppConfig, ReportError> {
    let spotify     = build_spotify(&get)?;
    let artist      = build_artist(&get);
    let playlist    = build_playlist(&get);
    let http        = HttpConfig::default();
    let persistence = build_persistence(&get);
    let logging     = build_logging(&get);

    Ok( AppConfig { spotify, artist, playlist, http, persistence, logging } )
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, ReportError> {
    dotenvy::dotenv().ok();
    load_config_from(|key| std::env::var(key).ok())
}
