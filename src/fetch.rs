//!
//! src/fetch.rs
//!
//! Defines the Spotify client, the client-credentials handshake and
//! the `TrackSource` seam the pipelines fetch through. One request per
//! call; no retries and no paging past the first page.
//!

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, header, redirect};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::config::{HttpConfig, SpotifyConfig, PLAYLIST_PAGE_MAX};
use crate::errors::ReportError;
use crate::types::{PlaylistPage, TokenResponse, TopTracksPayload};

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, ReportError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .build()
        .map_err(|e| ReportError::Http(format!("build client: {e}")))
}

/// Sends `request` and decodes a JSON body; a 404 becomes `NotFound(resource)`
async fn send_json<T: DeserializeOwned>(request: RequestBuilder, resource: &str) ->
    Result<T, ReportError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(ReportError::NotFound(resource.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ReportError::Http(format!("{resource}: status {status}: {body}")));
    }

    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Where the pipelines get their raw payloads from
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// GET /v1/artists/{id}/top-tracks?market=
    async fn artist_top_tracks(&self, artist_id: &str, market: &str) ->
        Result<TopTracksPayload, ReportError>;

    /// GET /v1/playlists/{id}/tracks?limit= (first page only)
    async fn playlist_items(&self, playlist_id: &str, limit: u32) ->
        Result<PlaylistPage, ReportError>;
}

#[derive(Clone, Debug)]
pub struct SpotifyClient {
    pub http: Client,
    pub cfg: SpotifyConfig
}

impl SpotifyClient {
    pub fn new(http_config: &HttpConfig, cfg: &SpotifyConfig) ->
        Result<Self, ReportError> {

        let http = base_client(http_config)?;
        Ok( Self {
            http,
            cfg: cfg.clone()
        })
    }

    pub fn token_request(&self) -> RequestBuilder {
        self.http
            .post(self.cfg.token_url.clone())
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
    }

    /// Exchanges the client credentials for a bearer token
    pub async fn authenticate(&self) -> Result<SpotifySession, ReportError> {
        let response = self.token_request().send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Auth(format!("token status {status}: {body}")));
        }

        let token: TokenResponse = serde_json::from_str(&response.text().await?)?;
        info!(expires_in = ?token.expires_in, "spotify.auth.ok");

        Ok(SpotifySession {
            client: self.clone(),
            bearer: token.access_token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ReportError> {
        self.cfg.api_base.join(path)
            .map_err(|e| ReportError::Config(format!("bad endpoint {path}: {e}")))
    }

    /// GET /v1/artists/{id}/top-tracks
    pub fn artist_top_tracks(&self, artist_id: &str, market: &str, bearer: &str) ->
        Result<RequestBuilder, ReportError> {
        let url = self.endpoint(&format!("artists/{artist_id}/top-tracks"))?;
        Ok(self.http.get(url).bearer_auth(bearer).query(&[("market", market)]))
    }

    /// GET /v1/playlists/{id}/tracks
    pub fn playlist_tracks(&self, playlist_id: &str, limit: u32, bearer: &str) ->
        Result<RequestBuilder, ReportError> {
        let url = self.endpoint(&format!("playlists/{playlist_id}/tracks"))?;
        let limit = limit.clamp(1, PLAYLIST_PAGE_MAX).to_string();
        Ok(self.http.get(url).bearer_auth(bearer).query(&[
            ("limit", limit.as_str()),
            ("offset", "0"),
        ]))
    }
}

/// An authenticated client, scoped to a single run
#[derive(Clone)]
pub struct SpotifySession {
    client: SpotifyClient,
    bearer: String,
}

impl std::fmt::Debug for SpotifySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifySession")
            .field("client", &self.client)
            .field("bearer", &"***")
            .finish()
    }
}

#[async_trait]
impl TrackSource for SpotifySession {
    async fn artist_top_tracks(&self, artist_id: &str, market: &str) ->
        Result<TopTracksPayload, ReportError> {
        debug!(artist_id, market, "fetch.artist");
        let request = self.client.artist_top_tracks(artist_id, market, &self.bearer)?;
        send_json(request, &format!("artist {artist_id}")).await
    }

    async fn playlist_items(&self, playlist_id: &str, limit: u32) ->
        Result<PlaylistPage, ReportError> {
        debug!(playlist_id, limit, "fetch.playlist");
        let request = self.client.playlist_tracks(playlist_id, limit, &self.bearer)?;
        send_json(request, &format!("playlist {playlist_id}")).await
    }
}

/// Unit Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
    }

    fn test_client() -> SpotifyClient {
        let cfg = config::load_config_from(|key| match key {
            "SPOTIFY_CLIENT_ID" => Some("id".to_string()),
            "SPOTIFY_CLIENT_SECRET" => Some("secret".to_string()),
            _ => None,
        }).unwrap();
        SpotifyClient::new(&cfg.http, &cfg.spotify).unwrap()
    }

    #[test]
    fn top_tracks_request_targets_artist_endpoint() {
        let client = test_client();
        let request = client.artist_top_tracks("66q6iqbR9rh3jJNlGEnQvB", "US", "tok")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://api.spotify.com/v1/artists/66q6iqbR9rh3jJNlGEnQvB/top-tracks?market=US"
        );
        assert_eq!(
            request.headers().get(header::AUTHORIZATION).unwrap(),
            "Bearer tok"
        );
    }

    #[test]
    fn playlist_request_is_single_bounded_page() {
        let client = test_client();
        let request = client.playlist_tracks("37i9dQZF1DXcBWIGoYBM5M", 500, "tok")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://api.spotify.com/v1/playlists/37i9dQZF1DXcBWIGoYBM5M/tracks?limit=100&offset=0"
        );
    }

    #[test]
    fn token_request_uses_client_credentials() {
        let client = test_client();
        let request = client.token_request().build().unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().as_str(), "https://accounts.spotify.com/api/token");
        let auth = request.headers().get(header::AUTHORIZATION).unwrap();
        assert!(auth.to_str().unwrap().starts_with("Basic "));
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, b"grant_type=client_credentials");
    }

    #[test]
    fn session_debug_hides_bearer() {
        let session = SpotifySession {
            client: test_client(),
            bearer: "very-secret-bearer".to_string(),
        };
        assert!(!format!("{session:?}").contains("very-secret-bearer"));
    }

    /// Answers every connection on a loopback port with `status` and `body`
    async fn canned_server(status: &'static str, body: &'static str) -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0_u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        addr
    }

    fn session_at(addr: std::net::SocketAddr) -> SpotifySession {
        let mut client = test_client();
        client.http = Client::builder().no_proxy().build().unwrap();
        client.cfg.api_base = Url::parse(&format!("http://{addr}/v1/")).unwrap();
        client.cfg.token_url = Url::parse(&format!("http://{addr}/api/token")).unwrap();
        SpotifySession { client, bearer: "tok".to_string() }
    }

    #[tokio::test]
    async fn status_404_becomes_not_found() {
        let addr = canned_server("404 Not Found", r#"{"error":{"status":404}}"#).await;
        let session = session_at(addr);

        let err = session.artist_top_tracks("0000000000000000000000", "US").await
            .unwrap_err();
        match err {
            ReportError::NotFound(resource) => {
                assert_eq!(resource, "artist 0000000000000000000000")
            }
            other => panic!("expected not found, got {other:?}"),
        }

        let err = session.playlist_items("gone", 10).await.unwrap_err();
        assert!(matches!(err, ReportError::NotFound(ref r) if r == "playlist gone"));
    }

    #[tokio::test]
    async fn other_error_statuses_become_http_errors() {
        let addr = canned_server("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let session = session_at(addr);

        let err = session.playlist_items("37i9dQZF1DXcBWIGoYBM5M", 10).await.unwrap_err();
        match err {
            ReportError::Http(msg) => {
                assert!(msg.contains("500"), "{msg}");
                assert!(msg.contains("boom"), "{msg}");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_body_is_decoded() -> Result<(), ReportError> {
        let addr = canned_server("200 OK", r#"{"tracks":[{"id":"a","popularity":7}]}"#).await;
        let session = session_at(addr);

        let tracks = session.artist_top_tracks("x", "US").await?.into_tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].popularity, Some(7));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let addr = canned_server("200 OK", "<html>not json</html>").await;
        let err = session_at(addr).artist_top_tracks("x", "US").await.unwrap_err();
        assert!(matches!(err, ReportError::Parse(_)));
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_errors() {
        let addr = canned_server("401 Unauthorized", r#"{"error":"invalid_client"}"#).await;
        let session = session_at(addr);

        let err = session.client.authenticate().await.unwrap_err();
        assert!(matches!(err, ReportError::Auth(ref m) if m.contains("invalid_client")));
    }

    #[tokio::test]
    async fn missing_artist_run_ends_without_writing() -> Result<(), ReportError> {
        let addr = canned_server("404 Not Found", r#"{"error":{"status":404}}"#).await;
        let session = session_at(addr);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("spotify_data.db");
        let url = format!("sqlite://{}", path.display());
        let settings = config::ArtistSettings {
            artist_id: "missing".to_string(),
            market: "US".to_string(),
            table: config::ARTIST_TABLE.to_string(),
        };

        let outcome = crate::pipeline::run_artist(&session, &url, &settings).await?;
        assert_eq!(outcome, crate::pipeline::RunOutcome::NotFound("missing".to_string()));
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    #[allow(dead_code)]
    async fn spotify_artist_top_tracks_testbench() -> Result<(), ReportError> {
        dotenvy::dotenv().ok();

        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = config::load_config()?;
        let spotify = SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
        let session = spotify.authenticate().await?;

        let payload = session.artist_top_tracks(&cfgs.artist.artist_id, &cfgs.artist.market)
            .await?;
        println!("tracks: {}", serde_json::to_string_pretty(&payload)?);
        assert!(!payload.into_tracks().is_empty());

        let missing = session.artist_top_tracks("0000000000000000000000", "US").await;
        println!("missing artist: {missing:?}");

        Ok(())
    }
}
