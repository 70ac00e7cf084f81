//! # Implicit Grant (Twitch)
//!
//! The provider returns the access token directly in the redirect fragment.
//! There is no refresh: an expired token means signing in again.
//!
//! ## Flow
//!
//! 1. [`ImplicitGrantClient::signin_url`] issues and persists a state token,
//!    then builds the authorize URL.
//! 2. The host opens the URL, the user consents, the provider redirects to
//!    `redirect_uri#access_token=...&state=...`.
//! 3. The host hands that redirect to [`ImplicitGrantClient::handle_callback`].
//!    The stored state is consumed; a match stores the token, anything else
//!    signs the client out.

use crate::callback::CallbackParams;
use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::session::{AccessTokenSource, Session};
use crate::state::{self, SigninStateSlot};
use crate::types::{AuthState, CallbackOutcome, Credential, ProviderKind};
use async_trait::async_trait;
use bridge_traits::Clock;
use chrono::Duration;
use core_runtime::config::TwitchConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_query;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

const PROVIDER: ProviderKind = ProviderKind::Twitch;

pub struct ImplicitGrantClient {
    config: TwitchConfig,
    session: Session,
    state_slot: SigninStateSlot,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl ImplicitGrantClient {
    pub fn new(
        config: TwitchConfig,
        store: CredentialStore,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            state_slot: SigninStateSlot::new(PROVIDER, store.clone()),
            session: Session::new(PROVIDER, store),
            event_bus,
            clock,
        }
    }

    /// Restore the persisted token, if any.
    pub async fn load(&self) -> Result<AuthState> {
        self.session.load().await?;
        Ok(self.session.auth_state().await)
    }

    /// Build the authorize URL and arm the state slot.
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`] when no client id is configured.
    #[instrument(skip(self), fields(provider = "twitch"))]
    pub async fn signin_url(&self) -> Result<String> {
        if self.config.client_id.trim().is_empty() {
            return Err(AuthError::Configuration {
                provider: PROVIDER.display_name().to_string(),
                reason: "client id is not set".to_string(),
            });
        }

        let mut url = Url::parse(&self.config.authorize_url).map_err(|e| {
            AuthError::Configuration {
                provider: PROVIDER.display_name().to_string(),
                reason: format!("invalid authorize URL: {}", e),
            }
        })?;

        let nonce = self.state_slot.begin().await?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "token")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &nonce);

        let url = url.to_string();
        self.session.set_auth_state(AuthState::AwaitingCallback).await;
        self.emit(AuthEvent::SigningIn {
            provider: PROVIDER.as_str().to_string(),
        });
        debug!(url = %redact_query(&url), "Built sign-in URL");
        Ok(url)
    }

    /// Handle the redirect the provider sent back.
    ///
    /// `raw` may be the full redirect URL or just its fragment. The stored
    /// state is cleared whatever the outcome.
    #[instrument(skip(self, raw), fields(provider = "twitch"))]
    pub async fn handle_callback(&self, raw: &str) -> Result<CallbackOutcome> {
        let params = CallbackParams::parse(raw);
        let expected = self.state_slot.consume().await?;

        if !state::validate(params.state.as_deref(), expected.as_deref()) {
            warn!("Callback state does not match the issued one, signing out");
            self.session.commit(None).await?;
            self.session.set_auth_state(AuthState::SignedOut).await;
            self.emit(AuthEvent::SigninRejected {
                provider: PROVIDER.as_str().to_string(),
            });
            return Ok(CallbackOutcome::Rejected);
        }

        let Some(access_token) = params.access_token.clone() else {
            let error = params.error_message();
            info!(error = ?error, "Authorization was not granted");
            self.session.settle().await;
            return Ok(CallbackOutcome::Denied { error });
        };

        let expires_at = params
            .expires_in
            .map(|secs| self.clock.now() + Duration::seconds(secs));
        self.session
            .commit(Some(Credential::bearer(access_token, expires_at)))
            .await?;
        self.session.set_auth_state(AuthState::SignedIn).await;
        self.emit(AuthEvent::SignedIn {
            provider: PROVIDER.as_str().to_string(),
        });

        info!("Signed in");
        Ok(CallbackOutcome::SignedIn)
    }

    /// Forget the token and any outstanding state.
    #[instrument(skip(self), fields(provider = "twitch"))]
    pub async fn logout(&self) -> Result<()> {
        self.state_slot.clear().await?;
        self.session.commit(None).await?;
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

    /// Sent as `Client-Id` alongside the bearer token on Helix calls.
    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }
}

#[async_trait]
impl AccessTokenSource for ImplicitGrantClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.session.subscribe()
    }

    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.session.access_token().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pairs, MemoryStore};
    use bridge_traits::FixedClock;
    use chrono::{TimeZone, Utc};

    fn client_with(backend: Arc<MemoryStore>, client_id: &str) -> (ImplicitGrantClient, EventBus) {
        let event_bus = EventBus::new(16);
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        let client = ImplicitGrantClient::new(
            TwitchConfig::new(client_id, "http://localhost:8080/#/oauth/twitch"),
            CredentialStore::new(backend),
            event_bus.clone(),
            clock,
        );
        (client, event_bus)
    }

    fn client() -> (ImplicitGrantClient, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        let (client, _) = client_with(backend.clone(), "abc123");
        (client, backend)
    }

    #[tokio::test]
    async fn test_signin_url_carries_required_parameters() {
        let (client, backend) = client();

        let url = client.signin_url().await.unwrap();
        let params = pairs(&url);

        assert!(url.starts_with("https://id.twitch.tv/oauth2/authorize?"));
        assert_eq!(params["client_id"], "abc123");
        assert_eq!(params["response_type"], "token");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/#/oauth/twitch");
        assert_eq!(
            params["scope"],
            "chat:read chat:edit moderator:manage:announcements"
        );
        assert_eq!(
            backend.read_json("auth.twitch.state").await,
            Some(serde_json::Value::String(params["state"].clone()))
        );
        assert_eq!(client.auth_state().await, AuthState::AwaitingCallback);
    }

    #[tokio::test]
    async fn test_signin_url_requires_client_id() {
        let backend = Arc::new(MemoryStore::new());
        let (client, _) = client_with(backend.clone(), "");

        let result = client.signin_url().await;

        assert!(matches!(result, Err(AuthError::Configuration { .. })));
        assert!(!backend.contains("auth.twitch.state").await);
    }

    #[tokio::test]
    async fn test_matching_callback_signs_in() {
        let (client, backend) = client();
        let mut tokens = client.subscribe();
        let url = client.signin_url().await.unwrap();
        let nonce = pairs(&url)["state"].clone();

        let outcome = client
            .handle_callback(&format!(
                "http://localhost:8080/#access_token=tok1&state={}&expires_in=3600&token_type=bearer",
                nonce
            ))
            .await
            .unwrap();

        assert_eq!(outcome, CallbackOutcome::SignedIn);
        assert!(client.is_signed_in().await);
        assert_eq!(client.access_token().await.as_deref(), Some("tok1"));
        assert_eq!(client.auth_state().await, AuthState::SignedIn);
        assert!(!backend.contains("auth.twitch.state").await);
        assert_eq!(tokens.borrow_and_update().as_deref(), Some("tok1"));

        let credential = client.credential().await.unwrap();
        assert_eq!(
            credential.expires_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap())
        );
        assert_eq!(
            backend.read_json("auth.twitch").await.unwrap()["access_token"],
            "tok1"
        );
    }

    #[tokio::test]
    async fn test_mismatched_callback_signs_out() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .insert_raw("auth.twitch", br#"{"access_token":"old"}"#)
            .await;
        let (client, event_bus) = client_with(backend.clone(), "abc123");
        let mut events = event_bus.subscribe();
        client.load().await.unwrap();
        client.signin_url().await.unwrap();

        let outcome = client
            .handle_callback("#access_token=evil&state=forged")
            .await
            .unwrap();

        assert_eq!(outcome, CallbackOutcome::Rejected);
        assert!(!client.is_signed_in().await);
        assert_eq!(client.auth_state().await, AuthState::SignedOut);
        assert!(!backend.contains("auth.twitch").await);
        assert!(!backend.contains("auth.twitch.state").await);

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SigningIn { .. })
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SigninRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_callback_without_issued_state_is_rejected() {
        let (client, _) = client();

        let outcome = client
            .handle_callback("#access_token=tok&state=anything")
            .await
            .unwrap();

        assert_eq!(outcome, CallbackOutcome::Rejected);
        assert!(client.access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let (client, _) = client();
        let url = client.signin_url().await.unwrap();
        let callback = format!("#access_token=tok&state={}", pairs(&url)["state"]);

        assert!(client.handle_callback(&callback).await.unwrap().is_signed_in());
        assert_eq!(
            client.handle_callback(&callback).await.unwrap(),
            CallbackOutcome::Rejected
        );
        assert!(!client.is_signed_in().await);
    }

    #[tokio::test]
    async fn test_denied_callback_keeps_credentials() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .insert_raw("auth.twitch", br#"{"access_token":"kept"}"#)
            .await;
        let (client, _) = client_with(backend, "abc123");
        client.load().await.unwrap();
        let url = client.signin_url().await.unwrap();

        let outcome = client
            .handle_callback(&format!(
                "?error=access_denied&error_description=The+user+denied+you+access&state={}",
                pairs(&url)["state"]
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, CallbackOutcome::Denied { error: Some(_) }));
        assert_eq!(client.access_token().await.as_deref(), Some("kept"));
        assert_eq!(client.auth_state().await, AuthState::SignedIn);
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_state() {
        let (client, backend) = client();
        let url = client.signin_url().await.unwrap();
        client
            .handle_callback(&format!("#access_token=tok&state={}", pairs(&url)["state"]))
            .await
            .unwrap();
        client.signin_url().await.unwrap();

        client.logout().await.unwrap();

        assert!(!client.is_signed_in().await);
        assert!(!backend.contains("auth.twitch").await);
        assert!(!backend.contains("auth.twitch.state").await);
        assert_eq!(*client.subscribe().borrow(), None);
    }

    #[tokio::test]
    async fn test_load_restores_persisted_token() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .insert_raw("auth.twitch", br#"{"access_token":"persisted"}"#)
            .await;
        let (client, _) = client_with(backend, "abc123");

        assert_eq!(client.load().await.unwrap(), AuthState::SignedIn);
        assert_eq!(
            AccessTokenSource::access_token(&client).await.unwrap().as_deref(),
            Some("persisted")
        );
    }
}
