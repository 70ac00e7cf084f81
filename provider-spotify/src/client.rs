//! Spotify Web API client
//!
//! Only the endpoint the overlay needs for sign-in: the current user's
//! profile. Playback endpoints live with the widgets that use them.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_auth::{ProfileFetcher, ProviderKind};
use core_runtime::config::DEFAULT_REQUEST_TIMEOUT;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SpotifyError};
use crate::types::{ErrorEnvelope, SpotifyUser};

/// Web API base URL
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

pub struct SpotifyClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    request_timeout: Duration,
}

impl SpotifyClient {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: SPOTIFY_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// `GET /me`
    #[instrument(skip(self, access_token))]
    pub async fn current_user(&self, access_token: &str) -> Result<SpotifyUser> {
        let url = format!("{}/me", self.base_url.trim_end_matches('/'));
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(access_token)
            .header("Accept", "application/json")
            .timeout(self.request_timeout);

        let response = self.http_client.execute(request).await?;
        debug!(status = response.status, "Web API response");

        if response.is_success() {
            return response
                .json::<SpotifyUser>()
                .map_err(|e| SpotifyError::Parse(format!("/me response: {}", e)));
        }

        let message = response
            .json::<ErrorEnvelope>()
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| response.text_lossy());

        match response.status {
            401 => {
                warn!(%message, "Web API rejected the access token");
                Err(SpotifyError::Unauthorized(message))
            }
            429 => {
                let retry_after = response
                    .header("Retry-After")
                    .and_then(|value| value.trim().parse().ok())
                    .unwrap_or(1);
                Err(SpotifyError::Throttled(retry_after))
            }
            status => Err(SpotifyError::Api { status, message }),
        }
    }
}

/// Resolves a Spotify token to its owner.
pub struct SpotifyUserFetcher {
    client: Arc<SpotifyClient>,
}

impl SpotifyUserFetcher {
    pub fn new(client: Arc<SpotifyClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileFetcher for SpotifyUserFetcher {
    type Profile = SpotifyUser;

    fn provider(&self) -> ProviderKind {
        ProviderKind::Spotify
    }

    async fn fetch_profile(&self, access_token: &str) -> core_auth::Result<SpotifyUser> {
        Ok(self.client.current_user(access_token).await?)
    }

    fn describe(profile: &SpotifyUser) -> (String, String) {
        (profile.id.clone(), profile.name().to_string())
    }
}
