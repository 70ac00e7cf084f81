//! Core service façade and bootstrap.
//!
//! [`CoreService`] is the one context object the host creates at startup.
//! It owns the two auth clients, the current-user projectors and the Helix
//! client, and is the only surface the UI layer talks to.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_runtime::config::{CoreConfig, TwitchConfig};
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .twitch(TwitchConfig::from_env()?)
//!     .build()?;
//! let core = CoreService::bootstrap(config).await?;
//!
//! let url = core.twitch().signin_url().await?;
//! // open `url`, wait for the redirect, then:
//! # let redirect = String::new();
//! core.twitch().handle_callback(&redirect).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_auth::{
    AccessTokenSource, AuthorizationCodeClient, CredentialStore, CurrentUserProjector,
    ImplicitGrantClient, ProfileFetcher, ProviderKind,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, Receiver};
use provider_spotify::{SpotifyClient, SpotifyUser, SpotifyUserFetcher};
use provider_twitch::{
    fetch_all, AnnouncementColor, Clip, ClipsQuery, Follow, FollowsQuery, Game, HelixClient,
    HelixRequest, TwitchUser, TwitchUserFetcher,
};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Primary façade exposed to host applications.
///
/// Cheap to clone; clones share everything. The projector tasks stop when
/// the last clone is dropped.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    event_bus: EventBus,
    max_pages: usize,
    twitch: Arc<ImplicitGrantClient>,
    spotify: Arc<AuthorizationCodeClient>,
    helix: Arc<HelixClient>,
    twitch_user: Arc<CurrentUserProjector<TwitchUserFetcher>>,
    spotify_user: Arc<CurrentUserProjector<SpotifyUserFetcher>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl CoreService {
    /// Build every component from `config`, restore persisted credentials
    /// and start the current-user projectors.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(config))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| CoreError::InitializationFailed(format!("no Tokio runtime: {}", e)))?;

        let store = CredentialStore::new(config.secure_store.clone());
        let event_bus = EventBus::new(config.event_buffer_size);

        let twitch = Arc::new(ImplicitGrantClient::new(
            config.twitch.clone(),
            store.clone(),
            event_bus.clone(),
            config.clock.clone(),
        ));
        let twitch_state = twitch.load().await?;

        let spotify = Arc::new(
            AuthorizationCodeClient::new(
                config.spotify.clone(),
                store.clone(),
                config.http_client.clone(),
                event_bus.clone(),
                config.clock.clone(),
            )
            .with_request_timeout(config.request_timeout)
            .with_max_refresh_failures(config.max_refresh_failures),
        );
        let spotify_state = spotify.load().await?;

        let helix = Arc::new(HelixClient::from_config(&config));
        let spotify_api = Arc::new(
            SpotifyClient::new(config.http_client.clone())
                .with_request_timeout(config.request_timeout),
        );

        let twitch_user = Arc::new(CurrentUserProjector::new(
            TwitchUserFetcher::new(helix.clone()),
            twitch.clone() as Arc<dyn AccessTokenSource>,
            store.clone(),
            event_bus.clone(),
        ));
        let spotify_user = Arc::new(CurrentUserProjector::new(
            SpotifyUserFetcher::new(spotify_api),
            spotify.clone() as Arc<dyn AccessTokenSource>,
            store,
            event_bus.clone(),
        ));

        restore(&twitch_user).await;
        restore(&spotify_user).await;

        let tasks = vec![
            runtime.spawn(twitch_user.clone().run()),
            runtime.spawn(spotify_user.clone().run()),
        ];

        info!(twitch = %twitch_state, spotify = %spotify_state, "Core service started");

        Ok(Self {
            inner: Arc::new(ServiceInner {
                event_bus,
                max_pages: config.max_pages,
                twitch,
                spotify,
                helix,
                twitch_user,
                spotify_user,
                tasks,
            }),
        })
    }

    /// Twitch sign-in: `signin_url`, `handle_callback`, `logout`, ...
    pub fn twitch(&self) -> &ImplicitGrantClient {
        &self.inner.twitch
    }

    /// Spotify sign-in: `set_app`, `signin_url`, `handle_callback`,
    /// `refresh`, `logout`, ...
    pub fn spotify(&self) -> &AuthorizationCodeClient {
        &self.inner.spotify
    }

    pub fn helix(&self) -> &HelixClient {
        &self.inner.helix
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    /// Events concerning `provider` only.
    pub fn provider_events(&self, provider: ProviderKind) -> EventStream {
        EventStream::new(self.subscribe_events())
            .filter(move |event| event.provider() == provider.as_str())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub async fn is_signed_in(&self, provider: ProviderKind) -> bool {
        match provider {
            ProviderKind::Twitch => self.inner.twitch.is_signed_in().await,
            ProviderKind::Spotify => self.inner.spotify.is_signed_in().await,
        }
    }

    /// The Twitch user for the held token, once it has been fetched.
    pub async fn twitch_user(&self) -> Option<TwitchUser> {
        self.inner.twitch_user.current().await
    }

    /// The Spotify user for the held token, once it has been fetched.
    pub async fn spotify_user(&self) -> Option<SpotifyUser> {
        self.inner.spotify_user.current().await
    }

    /// Fetch the current user again for the held token, outside the usual
    /// token-change trigger.
    pub async fn reload_current_user(&self, provider: ProviderKind) -> Result<()> {
        match provider {
            ProviderKind::Twitch => {
                let token = self.inner.twitch.access_token().await;
                self.inner.twitch_user.sync(token).await?;
            }
            ProviderKind::Spotify => {
                let token = self.inner.spotify.valid_access_token().await?;
                self.inner.spotify_user.sync(token).await?;
            }
        }
        Ok(())
    }

    /// Drain a paginated Helix endpoint with the held Twitch token.
    ///
    /// Fails with `Unauthorized` when signed out; never returns partial data.
    pub async fn fetch_all<T>(&self, initial: HelixRequest) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let token = self.inner.twitch.access_token().await;
        let request = initial.bearer(token.as_deref());
        Ok(fetch_all(self.inner.helix.as_ref(), request, self.inner.max_pages).await?)
    }

    pub async fn users(&self, ids: &[&str], logins: &[&str]) -> Result<Vec<TwitchUser>> {
        let token = self.inner.twitch.access_token().await;
        Ok(self.inner.helix.users(token.as_deref(), ids, logins).await?)
    }

    pub async fn follows(&self, query: FollowsQuery) -> Result<Vec<Follow>> {
        let token = self.inner.twitch.access_token().await;
        Ok(self.inner.helix.follows(token.as_deref(), query).await?)
    }

    pub async fn clips(&self, query: ClipsQuery) -> Result<Vec<Clip>> {
        let token = self.inner.twitch.access_token().await;
        Ok(self.inner.helix.clips(token.as_deref(), query).await?)
    }

    pub async fn games(&self, ids: &[&str], names: &[&str]) -> Result<Vec<Game>> {
        let token = self.inner.twitch.access_token().await;
        Ok(self.inner.helix.games(token.as_deref(), ids, names).await?)
    }

    /// Post an announcement in `broadcaster_id`'s chat as the signed-in user.
    pub async fn send_announcement(
        &self,
        broadcaster_id: &str,
        message: &str,
        color: AnnouncementColor,
    ) -> Result<()> {
        let token = self.inner.twitch.access_token().await;
        let moderator = self
            .twitch_user()
            .await
            .ok_or(core_auth::AuthError::NotAuthenticated)?;
        self.inner
            .helix
            .send_announcement(token.as_deref(), broadcaster_id, &moderator.id, message, color)
            .await?;
        Ok(())
    }
}

async fn restore<F: ProfileFetcher>(projector: &CurrentUserProjector<F>) {
    match projector.restore_cached().await {
        Ok(true) => debug!(provider = projector.provider().as_str(), "Showing cached user"),
        Ok(false) => {}
        Err(e) => warn!(provider = projector.provider().as_str(), error = %e, "Could not read cached user"),
    }
}
