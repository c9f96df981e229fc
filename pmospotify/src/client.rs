//! HTTP client for the Spotify Web API player endpoints.
//!
//! The client covers exactly the surface a playback controller needs:
//! reading the current playback state and device list, resolving an album
//! or playlist to its track list, and issuing transport commands
//! (play/pause/seek/repeat/shuffle/volume/transfer).
//!
//! Authentication is a bearer token supplied by the caller; acquiring and
//! refreshing tokens is out of scope for this crate.
//!
//! # Example
//!
//! ```no_run
//! use pmospotify::SpotifyClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SpotifyClient::new("BQD...token")?;
//!
//!     if let Some(state) = client.playback_state().await? {
//!         if let Some(item) = state.item {
//!             println!("Now playing: {}", item.name);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::error::{Result, SpotifyError};
use crate::models::{
    AlbumPayload, Collection, CollectionKind, Device, DevicesResponse, PlayTarget,
    PlaylistPayload, RemotePlaybackState, RepeatState,
};

/// Canonical Spotify Web API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";

/// Default timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("pmospotify/", env!("CARGO_PKG_VERSION"));

/// Builder for [`SpotifyClient`].
#[derive(Debug, Default)]
pub struct SpotifyClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl SpotifyClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the API base URL.
    ///
    /// Useful for talking to a proxy that forwards to the Spotify API
    /// after injecting credentials, or to a mock server in tests.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the OAuth bearer token sent with every request.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Overrides the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client, validating the configured base URL.
    pub fn build(self) -> Result<SpotifyClient> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Url::parse(&base_url)?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(SpotifyClient {
            http,
            base_url,
            token: Arc::new(RwLock::new(self.token)),
        })
    }
}

/// Asynchronous Spotify Web API client.
///
/// Cheap to clone; clones share the HTTP connection pool and the token,
/// so a [`set_token`](SpotifyClient::set_token) on one clone is visible
/// to all of them.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl SpotifyClient {
    /// Creates a client against the canonical API with the given token.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::builder().token(token).build()
    }

    pub fn builder() -> SpotifyClientBuilder {
        SpotifyClientBuilder::new()
    }

    /// The base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replaces the bearer token, e.g. after an external refresh.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap() = Some(token.into());
    }

    // ========================================================================
    // Read endpoints
    // ========================================================================

    /// Current playback state, or `None` when nothing is playing
    /// anywhere (the API answers 204 in that case).
    pub async fn playback_state(&self) -> Result<Option<RemotePlaybackState>> {
        debug!("Fetching current playback state");
        let response = self.request(Method::GET, "/me/player").send().await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let response = Self::handle_response(response).await?;
        Ok(Some(response.json().await?))
    }

    /// Devices currently known to the remote service.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        debug!("Fetching available devices");
        let response = self.request(Method::GET, "/me/player/devices").send().await?;
        let response = Self::handle_response(response).await?;
        let payload: DevicesResponse = response.json().await?;
        Ok(payload.devices)
    }

    /// Resolves a collection href to its normalized track list.
    ///
    /// `href` is the absolute URL carried by a playback context; canonical
    /// API hrefs are rewritten onto the configured base URL first so proxy
    /// deployments keep working.
    pub async fn collection(&self, href: &str, kind: CollectionKind) -> Result<Collection> {
        let url = self.rewrite_href(href);
        debug!(url = %url, ?kind, "Fetching collection");
        let response = self.request_url(Method::GET, &url).send().await?;
        let response = Self::handle_response(response).await?;
        let collection = match kind {
            CollectionKind::Album => Collection::from(response.json::<AlbumPayload>().await?),
            CollectionKind::Playlist => {
                Collection::from(response.json::<PlaylistPayload>().await?)
            }
        };
        Ok(collection)
    }

    // ========================================================================
    // Transport commands
    // ========================================================================

    /// Starts or resumes playback, optionally targeting a device.
    pub async fn play(&self, target: &PlayTarget, device_id: Option<&str>) -> Result<()> {
        debug!(
            position_ms = target.position_ms,
            context = target.context_uri.as_deref().unwrap_or("<current>"),
            "Issuing play command"
        );
        let response = self
            .request(Method::PUT, "/me/player/play")
            .query(&device_query(device_id))
            .json(target)
            .send()
            .await?;
        Self::handle_response(response).await?;
        Ok(())
    }

    /// Pauses playback.
    pub async fn pause(&self, device_id: Option<&str>) -> Result<()> {
        debug!("Issuing pause command");
        let response = self
            .request(Method::PUT, "/me/player/pause")
            .query(&device_query(device_id))
            .send()
            .await?;
        Self::handle_response(response).await?;
        Ok(())
    }

    /// Seeks within the current item.
    pub async fn seek(&self, position_ms: u64, device_id: Option<&str>) -> Result<()> {
        debug!(position_ms, "Issuing seek command");
        let mut query = vec![("position_ms", position_ms.to_string())];
        query.extend(device_query(device_id));
        let response = self
            .request(Method::PUT, "/me/player/seek")
            .query(&query)
            .send()
            .await?;
        Self::handle_response(response).await?;
        Ok(())
    }

    /// Sets the repeat mode.
    pub async fn set_repeat(&self, state: RepeatState, device_id: Option<&str>) -> Result<()> {
        debug!(state = state.as_str(), "Issuing repeat command");
        let mut query = vec![("state", state.as_str().to_string())];
        query.extend(device_query(device_id));
        let response = self
            .request(Method::PUT, "/me/player/repeat")
            .query(&query)
            .send()
            .await?;
        Self::handle_response(response).await?;
        Ok(())
    }

    /// Enables or disables shuffle.
    pub async fn set_shuffle(&self, shuffle: bool, device_id: Option<&str>) -> Result<()> {
        debug!(shuffle, "Issuing shuffle command");
        let mut query = vec![("state", shuffle.to_string())];
        query.extend(device_query(device_id));
        let response = self
            .request(Method::PUT, "/me/player/shuffle")
            .query(&query)
            .send()
            .await?;
        Self::handle_response(response).await?;
        Ok(())
    }

    /// Sets the device volume, clamped to 0..=100.
    pub async fn set_volume(&self, volume_percent: u8, device_id: Option<&str>) -> Result<()> {
        let volume_percent = volume_percent.min(100);
        debug!(volume_percent, "Issuing volume command");
        let mut query = vec![("volume_percent", volume_percent.to_string())];
        query.extend(device_query(device_id));
        let response = self
            .request(Method::PUT, "/me/player/volume")
            .query(&query)
            .send()
            .await?;
        Self::handle_response(response).await?;
        Ok(())
    }

    /// Transfers playback to another device.
    pub async fn transfer_playback(&self, device_id: &str) -> Result<()> {
        debug!(device_id, "Transferring playback");
        let body = serde_json::json!({ "device_ids": [device_id] });
        let response = self
            .request(Method::PUT, "/me/player")
            .json(&body)
            .send()
            .await?;
        Self::handle_response(response).await?;
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.request_url(method, &url)
    }

    fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(token) = self.token.read().unwrap().as_deref() {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Redirects canonical API hrefs onto the configured base URL so that
    /// collection references resolve against the same deployment that
    /// produced them.
    fn rewrite_href(&self, href: &str) -> String {
        if self.base_url != DEFAULT_BASE_URL {
            if let Some(rest) = href.strip_prefix(DEFAULT_BASE_URL) {
                return format!("{}{}", self.base_url, rest);
            }
        }
        href.to_string()
    }

    /// Turns non-success responses into typed errors, extracting the
    /// message from the API's `{"error": {...}}` envelope when present.
    async fn handle_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = extract_api_message(&body).unwrap_or(body);
        Err(SpotifyError::from_status_code(code, message))
    }
}

fn device_query(device_id: Option<&str>) -> Vec<(&'static str, String)> {
    match device_id {
        Some(id) => vec![("device_id", id.to_string())],
        None => Vec::new(),
    }
}

fn extract_api_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_owned)
}
