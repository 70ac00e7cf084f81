//! # Core Configuration Module
//!
//! Builder-validated configuration for the overlay core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds the bridges the core needs (HTTP, durable storage,
//! clock) and the per-provider OAuth settings. It is built once at startup
//! and handed to `CoreService::bootstrap`. Validation is fail-fast: a config
//! that cannot produce a working sign-in URL is rejected here, not on first
//! use.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - desktop default: reqwest
//! - `SecureStore` - desktop default: JSON file in the user data directory
//!
//! When the `desktop-shims` feature is enabled, these defaults are injected
//! automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, TwitchConfig};
//!
//! let config = CoreConfig::builder()
//!     .twitch(TwitchConfig::new("my-client-id", "http://localhost:8080/#/oauth/twitch"))
//!     .max_pages(200)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, SecureStore, SystemClock};
use std::sync::Arc;
use std::time::Duration;

use crate::events::DEFAULT_EVENT_BUFFER_SIZE;

pub const TWITCH_AUTHORIZE_URL: &str = "https://id.twitch.tv/oauth2/authorize";
pub const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

pub const DEFAULT_TWITCH_SCOPES: &[&str] =
    &["chat:read", "chat:edit", "moderator:manage:announcements"];
pub const DEFAULT_SPOTIFY_SCOPES: &[&str] = &[
    "user-read-playback-position",
    "user-read-playback-state",
    "user-read-currently-playing",
];

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_PAGES: usize = 1000;
pub const DEFAULT_MAX_REFRESH_FAILURES: u32 = 3;

/// Implicit-grant settings for Twitch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchConfig {
    /// Public client id. Sent on every Helix call as `Client-Id`.
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
}

impl TwitchConfig {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_TWITCH_SCOPES.iter().map(|s| s.to_string()).collect(),
            authorize_url: TWITCH_AUTHORIZE_URL.to_string(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Reads `TWITCH_CLIENT_ID` and `TWITCH_REDIRECT_URI`.
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("TWITCH_CLIENT_ID").map_err(|e| Error::Env {
            var: "TWITCH_CLIENT_ID",
            reason: e.to_string(),
        })?;
        let redirect_uri = std::env::var("TWITCH_REDIRECT_URI")
            .unwrap_or_else(|_| TwitchConfig::default().redirect_uri);
        Ok(Self::new(client_id, redirect_uri))
    }
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self::new("", "http://localhost:8080/#/oauth/twitch")
    }
}

/// Authorization-code settings for Spotify.
///
/// The client id and secret are normally supplied at runtime through
/// `AuthorizationCodeClient::set_app`; the optional values here only seed an
/// empty store.
#[derive(Clone, PartialEq, Eq)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
}

impl SpotifyConfig {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SPOTIFY_SCOPES.iter().map(|s| s.to_string()).collect(),
            authorize_url: SPOTIFY_AUTHORIZE_URL.to_string(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
        }
    }

    pub fn with_app(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080/#/oauth/spotify")
    }
}

impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Core configuration. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
    pub clock: Arc<dyn Clock>,
    pub twitch: TwitchConfig,
    pub spotify: SpotifyConfig,
    /// Applied to every outbound request.
    pub request_timeout: Duration,
    /// Ceiling on pages drained by one paginated fetch.
    pub max_pages: usize,
    /// Consecutive refresh rejections before stored tokens are dropped.
    pub max_refresh_failures: u32,
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("twitch", &self.twitch)
            .field("spotify", &self.spotify)
            .field("request_timeout", &self.request_timeout)
            .field("max_pages", &self.max_pages)
            .field("max_refresh_failures", &self.max_refresh_failures)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks value ranges and URL shapes.
    ///
    /// An empty Twitch client id is allowed here; requesting a sign-in URL
    /// without one fails with a configuration error at that point instead.
    pub fn validate(&self) -> Result<()> {
        for (name, uri) in [
            ("twitch.redirect_uri", &self.twitch.redirect_uri),
            ("spotify.redirect_uri", &self.spotify.redirect_uri),
            ("twitch.authorize_url", &self.twitch.authorize_url),
            ("spotify.authorize_url", &self.spotify.authorize_url),
            ("spotify.token_url", &self.spotify.token_url),
        ] {
            if uri.trim().is_empty() {
                return Err(Error::Config(format!("{} cannot be empty", name)));
            }
            if !(uri.starts_with("http://") || uri.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, uri
                )));
            }
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.max_pages == 0 {
            return Err(Error::Config("max_pages must be at least 1".to_string()));
        }

        if self.max_refresh_failures == 0 {
            return Err(Error::Config(
                "max_refresh_failures must be at least 1".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(timeout)?);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "An HttpClient implementation is required for OAuth and Helix calls. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Other hosts: inject an adapter with .http_client()."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "A SecureStore implementation is required for credential persistence. \
                 Desktop: enable the 'desktop-shims' feature to use KeyringSecureStore. \
                 Hosts without a keychain: inject JsonFileStore or other durable \
                 storage with .secure_store()."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    clock: Option<Arc<dyn Clock>>,
    twitch: Option<TwitchConfig>,
    spotify: Option<SpotifyConfig>,
    request_timeout: Option<Duration>,
    max_pages: Option<usize>,
    max_refresh_failures: Option<u32>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn twitch(mut self, twitch: TwitchConfig) -> Self {
        self.twitch = Some(twitch);
        self
    }

    pub fn spotify(mut self, spotify: SpotifyConfig) -> Self {
        self.spotify = Some(spotify);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn max_refresh_failures(mut self, failures: u32) -> Self {
        self.max_refresh_failures = Some(failures);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Fills defaults, injects desktop bridges when available and validates.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a bridge is absent and no default exists
    /// - [`Error::Config`] when a value is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = CoreConfig {
            http_client,
            secure_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            twitch: self.twitch.unwrap_or_default(),
            spotify: self.spotify.unwrap_or_default(),
            request_timeout,
            max_pages: self.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            max_refresh_failures: self
                .max_refresh_failures
                .unwrap_or(DEFAULT_MAX_REFRESH_FAILURES),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
