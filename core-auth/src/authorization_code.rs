//! # Authorization Code Grant (Spotify)
//!
//! The redirect carries a one-time `code` that is exchanged at the token
//! endpoint for an access token and a refresh token. The exchange
//! authenticates the app with HTTP Basic (`client_id:client_secret`).
//!
//! ## Stored record
//!
//! One [`Credential`] under `auth.spotify` holds the app configuration and
//! the tokens together. A forged callback or an exhausted refresh drops
//! the tokens but keeps the app configuration; logout drops everything.
//!
//! ## Refresh
//!
//! [`AuthorizationCodeClient::valid_access_token`] refreshes shortly before
//! the expiry estimate. A failed refresh keeps the old token. After
//! `max_refresh_failures` consecutive 4xx rejections from the token endpoint
//! the tokens are dropped and the user must sign in again; transport errors
//! and 5xx answers do not count towards that limit.
//!
//! Logout, `set_app` and a forged callback invalidate any token request
//! still in flight; its response is discarded instead of recreating the
//! record.

use crate::callback::{CallbackParams, CodeCallback};
use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::session::{AccessTokenSource, Session};
use crate::state::{self, SigninStateSlot};
use crate::types::{AuthState, CallbackOutcome, Credential, ProviderKind};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::Clock;
use chrono::Duration;
use core_runtime::config::SpotifyConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_query;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const PROVIDER: ProviderKind = ProviderKind::Spotify;

/// Refresh this long before the expiry estimate.
const REFRESH_BUFFER_SECS: i64 = 60;

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Absent on most refresh responses; the previous one stays valid.
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct AuthorizationCodeClient {
    config: SpotifyConfig,
    session: Session,
    state_slot: SigninStateSlot,
    http_client: Arc<dyn HttpClient>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    request_timeout: std::time::Duration,
    max_refresh_failures: u32,
    refresh_failures: AtomicU32,
    refresh_lock: Mutex<()>,
}

impl AuthorizationCodeClient {
    pub fn new(
        config: SpotifyConfig,
        store: CredentialStore,
        http_client: Arc<dyn HttpClient>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            state_slot: SigninStateSlot::new(PROVIDER, store.clone()),
            session: Session::new(PROVIDER, store),
            http_client,
            event_bus,
            clock,
            request_timeout: core_runtime::config::DEFAULT_REQUEST_TIMEOUT,
            max_refresh_failures: core_runtime::config::DEFAULT_MAX_REFRESH_FAILURES,
            refresh_failures: AtomicU32::new(0),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_refresh_failures(mut self, failures: u32) -> Self {
        self.max_refresh_failures = failures.max(1);
        self
    }

    /// Restore the persisted record. An empty store is seeded with the app
    /// configuration from [`SpotifyConfig`], when it has one.
    pub async fn load(&self) -> Result<AuthState> {
        let stored = self.session.load().await?;
        if stored.is_none() {
            if let (Some(id), Some(secret)) = (&self.config.client_id, &self.config.client_secret) {
                debug!(provider = PROVIDER.as_str(), "Seeding app configuration");
                self.session.commit(Some(Credential::app(id, secret))).await?;
            }
        }
        Ok(self.session.auth_state().await)
    }

    /// Replace the stored record with a new app configuration.
    ///
    /// Tokens issued to the previous app are discarded.
    #[instrument(skip(self, client_secret), fields(provider = "spotify"))]
    pub async fn set_app(&self, client_id: &str, client_secret: &str) -> Result<()> {
        self.session
            .reset(Some(Credential::app(client_id, client_secret)))
            .await?;
        self.refresh_failures.store(0, Ordering::SeqCst);
        self.session.settle().await;
        info!("App configuration updated");
        Ok(())
    }

    /// Replace the whole stored record, tokens included.
    pub async fn set_local_auth(&self, credential: Credential) -> Result<()> {
        self.session.reset(Some(credential)).await?;
        self.refresh_failures.store(0, Ordering::SeqCst);
        self.session.settle().await;
        Ok(())
    }

    /// Build the authorize URL and arm the state slot.
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`] when the app id or secret is missing.
    #[instrument(skip(self), fields(provider = "spotify"))]
    pub async fn signin_url(&self) -> Result<String> {
        let credential = self.session.credential().await.unwrap_or_default();
        if !credential.has_app() {
            return Err(self.not_configured());
        }
        let client_id = credential.client_id.unwrap_or_default();

        let mut url = Url::parse(&self.config.authorize_url).map_err(|e| {
            AuthError::Configuration {
                provider: PROVIDER.display_name().to_string(),
                reason: format!("invalid authorize URL: {}", e),
            }
        })?;

        let nonce = self.state_slot.begin().await?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &client_id)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("state", &nonce);

        let url = url.to_string();
        self.session.set_auth_state(AuthState::AwaitingCallback).await;
        self.emit(AuthEvent::SigningIn {
            provider: PROVIDER.as_str().to_string(),
        });
        debug!(url = %redact_query(&url), "Built sign-in URL");
        Ok(url)
    }

    /// Convenience wrapper taking the raw redirect URL.
    pub async fn handle_callback_url(&self, raw: &str) -> Result<CallbackOutcome> {
        self.handle_callback(CodeCallback::from(CallbackParams::parse(raw)))
            .await
    }

    /// Handle the redirect parameters and exchange the code.
    ///
    /// The stored state is cleared whatever the outcome. On a mismatch the
    /// tokens are dropped and the app configuration kept.
    ///
    /// # Errors
    ///
    /// Transport and token-endpoint failures propagate; the stored record is
    /// left as it was.
    #[instrument(skip(self, callback), fields(provider = "spotify"))]
    pub async fn handle_callback(&self, callback: CodeCallback) -> Result<CallbackOutcome> {
        let expected = self.state_slot.consume().await?;

        if !state::validate(callback.state.as_deref(), expected.as_deref()) {
            warn!("Callback state does not match the issued one, dropping tokens");
            let kept = self
                .session
                .credential()
                .await
                .map(|c| c.without_tokens())
                .filter(|c| c.client_id.is_some() || c.client_secret.is_some());
            self.session.reset(kept).await?;
            self.session.set_auth_state(AuthState::SignedOut).await;
            self.emit(AuthEvent::SigninRejected {
                provider: PROVIDER.as_str().to_string(),
            });
            return Ok(CallbackOutcome::Rejected);
        }

        let Some(code) = callback.code else {
            info!(error = ?callback.error, "Authorization was not granted");
            self.session.settle().await;
            return Ok(CallbackOutcome::Denied {
                error: callback.error,
            });
        };

        let _guard = self.refresh_lock.lock().await;
        let epoch = self.session.epoch();
        let current = self.session.credential().await.unwrap_or_default();
        if !current.has_app() {
            self.session.settle().await;
            return Err(self.not_configured());
        }

        info!("Exchanging authorization code");
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let response = match self.request_token(&current, &form).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Code exchange failed");
                self.emit(AuthEvent::AuthError {
                    provider: PROVIDER.as_str().to_string(),
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                self.session.settle().await;
                return Err(e);
            }
        };

        let updated = self.apply_token_response(current, response);
        if !self.session.commit_if(epoch, Some(updated)).await? {
            warn!("Credential changed during the code exchange, discarding tokens");
            self.session.settle().await;
            return Err(AuthError::Cancelled {
                provider: PROVIDER.display_name().to_string(),
            });
        }
        self.refresh_failures.store(0, Ordering::SeqCst);
        self.session.set_auth_state(AuthState::SignedIn).await;
        self.emit(AuthEvent::SignedIn {
            provider: PROVIDER.as_str().to_string(),
        });

        info!("Signed in");
        Ok(CallbackOutcome::SignedIn)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns `Ok(false)` without a network call when no refresh token is
    /// held.
    #[instrument(skip(self), fields(provider = "spotify"))]
    pub async fn refresh(&self) -> Result<bool> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<bool> {
        let epoch = self.session.epoch();
        let current = self.session.credential().await.unwrap_or_default();
        let Some(refresh_token) = current.refresh_token.clone() else {
            debug!("No refresh token held");
            return Ok(false);
        };
        if !current.has_app() {
            return Err(self.not_configured());
        }

        self.session.set_auth_state(AuthState::Refreshing).await;
        self.emit(AuthEvent::TokenRefreshing {
            provider: PROVIDER.as_str().to_string(),
        });

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        match self.request_token(&current, &form).await {
            Ok(response) => {
                let updated = self.apply_token_response(current, response);
                let expires_at = updated.expires_at.map(|at| at.timestamp());
                if !self.session.commit_if(epoch, Some(updated)).await? {
                    info!("Credential changed during the refresh, discarding tokens");
                    self.session.settle().await;
                    return Ok(false);
                }
                self.refresh_failures.store(0, Ordering::SeqCst);
                self.session.set_auth_state(AuthState::SignedIn).await;
                self.emit(AuthEvent::TokenRefreshed {
                    provider: PROVIDER.as_str().to_string(),
                    expires_at,
                });
                info!("Token refreshed");
                Ok(true)
            }
            Err(e) if self.session.epoch() != epoch => {
                debug!(error = %e, "Refresh failed after the credential changed");
                self.session.settle().await;
                Err(e)
            }
            Err(e) => {
                let rejected = e.is_rejection();
                let failures = if rejected {
                    self.refresh_failures.fetch_add(1, Ordering::SeqCst) + 1
                } else {
                    self.refresh_failures.load(Ordering::SeqCst)
                };

                if rejected && failures >= self.max_refresh_failures {
                    error!(failures, error = %e, "Refresh keeps failing, dropping tokens");
                    self.session
                        .commit_if(epoch, Some(current.without_tokens()))
                        .await?;
                    self.refresh_failures.store(0, Ordering::SeqCst);
                    self.session.set_auth_state(AuthState::SignedOut).await;
                    self.emit(AuthEvent::AuthError {
                        provider: PROVIDER.as_str().to_string(),
                        message: e.to_string(),
                        recoverable: false,
                    });
                } else {
                    warn!(failures, error = %e, "Refresh failed, keeping current token");
                    self.session.settle().await;
                    self.emit(AuthEvent::AuthError {
                        provider: PROVIDER.as_str().to_string(),
                        message: e.to_string(),
                        recoverable: true,
                    });
                }
                Err(e)
            }
        }
    }

    /// The held access token, refreshed first when it expires within a
    /// minute and a refresh token is available.
    ///
    /// A failed refresh is logged and the held token returned anyway; the
    /// provider has the final say on whether it still works.
    pub async fn valid_access_token(&self) -> Result<Option<String>> {
        let needs_refresh = |credential: &Credential| {
            credential.refresh_token.is_some()
                && credential.expires_within(self.clock.now(), Duration::seconds(REFRESH_BUFFER_SECS))
        };

        let Some(credential) = self.session.credential().await else {
            return Ok(None);
        };
        if !needs_refresh(&credential) {
            return Ok(credential.access_token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while this one waited.
        let still_due = self
            .session
            .credential()
            .await
            .is_some_and(|credential| needs_refresh(&credential));
        if still_due {
            if let Err(e) = self.refresh_locked().await {
                warn!(provider = PROVIDER.as_str(), error = %e, "Proactive refresh failed");
            }
        }
        Ok(self.session.access_token().await)
    }

    /// Forget the whole record, app configuration included, and any
    /// outstanding state.
    #[instrument(skip(self), fields(provider = "spotify"))]
    pub async fn logout(&self) -> Result<()> {
        self.state_slot.clear().await?;
        self.session.reset(None).await?;
        self.refresh_failures.store(0, Ordering::SeqCst);
        self.session.set_auth_state(AuthState::SignedOut).await;
        self.emit(AuthEvent::SignedOut {
            provider: PROVIDER.as_str().to_string(),
        });
        info!("Signed out");
        Ok(())
    }

    pub async fn is_signed_in(&self) -> bool {
        self.session.access_token().await.is_some()
    }

    /// True when both client id and secret are stored.
    pub async fn has_app(&self) -> bool {
        self.session
            .credential()
            .await
            .is_some_and(|c| c.has_app())
    }

    pub async fn access_token(&self) -> Option<String> {
        self.session.access_token().await
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.session.credential().await
    }

    pub async fn auth_state(&self) -> AuthState {
        self.session.auth_state().await
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.session.subscribe()
    }

    async fn request_token(
        &self,
        app: &Credential,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse> {
        let basic = STANDARD.encode(format!(
            "{}:{}",
            app.client_id.as_deref().unwrap_or_default(),
            app.client_secret.as_deref().unwrap_or_default()
        ));
        let request = HttpRequest::new(HttpMethod::Post, &self.config.token_url)
            .header("Authorization", format!("Basic {}", basic))
            .header("Accept", "application/json")
            .form(&form)?
            .timeout(self.request_timeout);

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            let body = response.text_lossy();
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(description) => format!("{}: {}", e.error, description),
                    None => e.error,
                })
                .unwrap_or(body);
            return Err(AuthError::TokenExchange {
                provider: PROVIDER.display_name().to_string(),
                status: response.status,
                message,
            });
        }

        response
            .json::<TokenResponse>()
            .map_err(|e| AuthError::Serialization(format!("Invalid token response: {}", e)))
    }

    fn apply_token_response(&self, previous: Credential, response: TokenResponse) -> Credential {
        debug!(scope = ?response.scope, expires_in = ?response.expires_in, "Token response received");
        Credential {
            access_token: Some(response.access_token),
            refresh_token: response.refresh_token.or(previous.refresh_token),
            expires_at: response
                .expires_in
                .map(|secs| self.clock.now() + Duration::seconds(secs)),
            client_id: previous.client_id,
            client_secret: previous.client_secret,
        }
    }

    fn not_configured(&self) -> AuthError {
        AuthError::Configuration {
            provider: PROVIDER.display_name().to_string(),
            reason: "client id and secret must be set first".to_string(),
        }
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }
}

#[async_trait]
impl AccessTokenSource for AuthorizationCodeClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.session.subscribe()
    }

    async fn access_token(&self) -> Result<Option<String>> {
        self.valid_access_token().await
    }
}
