//! # Current-User Projector
//!
//! Keeps a snapshot of the signed-in user consistent with a provider's
//! access token.
//!
//! ## Consistency
//!
//! - Each evaluation takes a new generation before fetching. A result is
//!   published only if no newer evaluation started meanwhile, so a slow
//!   response for an old token can never overwrite a newer one.
//! - Snapshots are stamped with a fingerprint of the token they were fetched
//!   with. [`CurrentUserProjector::current`] returns nothing when the held
//!   token differs, which covers the window between a token change and the
//!   next evaluation.
//! - [`CurrentUserProjector::run`] drives evaluations from the token watch
//!   channel and drops an in-flight fetch as soon as a newer token arrives.
//!
//! The snapshot is cached under the provider's `user_key`; this projector is
//! the only writer of that key.

use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::session::AccessTokenSource;
use crate::types::ProviderKind;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use core_runtime::events::{CoreEvent, EventBus, ProfileEvent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};

/// Fetches the profile of the user a token belongs to.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    type Profile: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    fn provider(&self) -> ProviderKind;

    /// # Errors
    ///
    /// A rejected token must surface as [`AuthError::ProfileFetch`] with
    /// `unauthorized: true`.
    async fn fetch_profile(&self, access_token: &str) -> Result<Self::Profile>;

    /// `(user id, display name)` for events and logs.
    fn describe(profile: &Self::Profile) -> (String, String);
}

#[derive(Clone, Serialize, Deserialize)]
struct Snapshot<P> {
    fingerprint: String,
    profile: P,
}

/// Stable, non-reversible tag of an access token.
pub fn token_fingerprint(access_token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(access_token.as_bytes()))
}

pub struct CurrentUserProjector<F: ProfileFetcher> {
    fetcher: F,
    tokens: Arc<dyn AccessTokenSource>,
    token_rx: watch::Receiver<Option<String>>,
    store: CredentialStore,
    event_bus: EventBus,
    generation: AtomicU64,
    snapshot: RwLock<Option<Snapshot<F::Profile>>>,
}

impl<F: ProfileFetcher> CurrentUserProjector<F> {
    pub fn new(
        fetcher: F,
        tokens: Arc<dyn AccessTokenSource>,
        store: CredentialStore,
        event_bus: EventBus,
    ) -> Self {
        let token_rx = tokens.subscribe();
        Self {
            fetcher,
            tokens,
            token_rx,
            store,
            event_bus,
            generation: AtomicU64::new(0),
            snapshot: RwLock::new(None),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.fetcher.provider()
    }

    /// The user for the token held right now, if known.
    pub async fn current(&self) -> Option<F::Profile> {
        let token = self.token_rx.borrow().clone()?;
        let fingerprint = token_fingerprint(&token);
        self.snapshot
            .read()
            .await
            .as_ref()
            .filter(|snapshot| snapshot.fingerprint == fingerprint)
            .map(|snapshot| snapshot.profile.clone())
    }

    /// Generation of the latest evaluation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Adopt the cached snapshot when it belongs to the held token.
    ///
    /// Returns `true` when a snapshot was adopted.
    pub async fn restore_cached(&self) -> Result<bool> {
        let key = self.provider().user_key();
        let Some(cached) = self.store.get::<Snapshot<F::Profile>>(key).await? else {
            return Ok(false);
        };

        let held = self.token_rx.borrow().clone();
        match held {
            Some(token) if token_fingerprint(&token) == cached.fingerprint => {
                debug!(provider = self.provider().as_str(), "Restored cached user");
                *self.snapshot.write().await = Some(cached);
                Ok(true)
            }
            _ => {
                // Stale or orphaned cache entry.
                self.store.clear(key).await?;
                Ok(false)
            }
        }
    }

    /// Evaluate the snapshot for `token`.
    ///
    /// Returns `Ok(false)` when a newer evaluation superseded this one and
    /// its result was discarded.
    ///
    /// # Errors
    ///
    /// Fetch failures propagate after the snapshot was updated: a 401
    /// clears it, anything else leaves it stamped with its old token.
    #[instrument(skip(self, token), fields(provider = self.provider().as_str()))]
    pub async fn sync(&self, token: Option<String>) -> Result<bool> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(token) = token else {
            return self.publish_cleared(generation).await;
        };

        debug!(generation, "Fetching current user");
        let fetched = self.fetcher.fetch_profile(&token).await;

        match fetched {
            Ok(profile) => {
                let mut snapshot = self.snapshot.write().await;
                if self.generation.load(Ordering::SeqCst) != generation {
                    debug!(generation, "Superseded, discarding profile");
                    return Ok(false);
                }

                let next = Snapshot {
                    fingerprint: token_fingerprint(&token),
                    profile,
                };
                self.store.set(self.provider().user_key(), &next).await?;
                let (user_id, display_name) = F::describe(&next.profile);
                *snapshot = Some(next);
                drop(snapshot);

                info!(user_id = %user_id, "Current user updated");
                let _ = self.event_bus.emit(CoreEvent::Profile(ProfileEvent::Updated {
                    provider: self.provider().as_str().to_string(),
                    user_id,
                    display_name,
                }));
                Ok(true)
            }
            Err(e @ AuthError::ProfileFetch { unauthorized: true, .. }) => {
                warn!(error = %e, "Token rejected while fetching current user");
                self.publish_cleared(generation).await?;
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch current user");
                Err(e)
            }
        }
    }

    async fn publish_cleared(&self, generation: u64) -> Result<bool> {
        let mut snapshot = self.snapshot.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(false);
        }

        let had_snapshot = snapshot.take().is_some();
        self.store.clear(self.provider().user_key()).await?;
        drop(snapshot);

        if had_snapshot {
            info!("Current user cleared");
            let _ = self.event_bus.emit(CoreEvent::Profile(ProfileEvent::Cleared {
                provider: self.provider().as_str().to_string(),
            }));
        }
        Ok(true)
    }

    /// Evaluate for the held token, then once per token change, until the
    /// token source is dropped.
    ///
    /// A fetch still running when the token changes is abandoned.
    pub async fn run(self: Arc<Self>) {
        let mut rx = self.tokens.subscribe();
        let mut token = rx.borrow_and_update().clone();

        loop {
            let superseded = tokio::select! {
                result = self.sync(token.clone()) => {
                    if let Err(e) = result {
                        debug!(provider = self.provider().as_str(), error = %e, "Evaluation failed");
                    }
                    false
                }
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    true
                }
            };

            if !superseded && rx.changed().await.is_err() {
                break;
            }
            token = rx.borrow_and_update().clone();
        }

        debug!(provider = self.provider().as_str(), "Token source closed, projector stopped");
    }
}
