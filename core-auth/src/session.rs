//! In-memory mirror of one provider's credential, plus its change channel.

use crate::credential_store::CredentialStore;
use crate::error::Result;
use crate::types::{AuthState, Credential, ProviderKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::debug;

/// Something that holds an access token and announces when it changes.
///
/// The current-user projectors and the service facade depend on this rather
/// than on a concrete auth client.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Receiver of the held access token. The current value is visible
    /// immediately; every later change marks the receiver as changed.
    fn subscribe(&self) -> watch::Receiver<Option<String>>;

    /// A token ready for an outbound call, refreshed first when the client
    /// knows how and the held one is about to expire.
    async fn access_token(&self) -> Result<Option<String>>;
}

/// Sole writer of a provider's credential key.
///
/// Writes are serialized. [`Session::reset`] advances the epoch, so a token
/// response obtained under an older epoch can be refused with
/// [`Session::commit_if`].
pub(crate) struct Session {
    provider: ProviderKind,
    store: CredentialStore,
    credential: RwLock<Option<Credential>>,
    auth_state: RwLock<AuthState>,
    token_tx: watch::Sender<Option<String>>,
    epoch: AtomicU64,
    write_lock: Mutex<()>,
}

impl Session {
    pub(crate) fn new(provider: ProviderKind, store: CredentialStore) -> Self {
        let (token_tx, _) = watch::channel(None);
        Self {
            provider,
            store,
            credential: RwLock::new(None),
            auth_state: RwLock::new(AuthState::SignedOut),
            token_tx,
            epoch: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// Pull the persisted credential into memory.
    pub(crate) async fn load(&self) -> Result<Option<Credential>> {
        let stored: Option<Credential> = self.store.get(self.provider.credential_key()).await?;
        self.apply(stored.clone()).await;
        *self.auth_state.write().await = Self::resting_state(stored.as_ref());
        debug!(
            provider = self.provider.as_str(),
            has_token = stored.as_ref().is_some_and(|c| c.access_token.is_some()),
            "Loaded credential"
        );
        Ok(stored)
    }

    /// Persist, then publish. A failed write leaves memory untouched.
    pub(crate) async fn commit(&self, credential: Option<Credential>) -> Result<()> {
        let _write = self.write_lock.lock().await;
        self.write(credential).await
    }

    /// Like [`Session::commit`], and also invalidates every token request
    /// started before this call.
    pub(crate) async fn reset(&self, credential: Option<Credential>) -> Result<()> {
        let _write = self.write_lock.lock().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.write(credential).await
    }

    /// Commit only if no [`Session::reset`] happened since `epoch` was read.
    /// Returns whether the credential was written.
    pub(crate) async fn commit_if(&self, epoch: u64, credential: Option<Credential>) -> Result<bool> {
        let _write = self.write_lock.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return Ok(false);
        }
        self.write(credential).await?;
        Ok(true)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    async fn write(&self, credential: Option<Credential>) -> Result<()> {
        self.store
            .put(self.provider.credential_key(), credential.as_ref())
            .await?;
        self.apply(credential).await;
        Ok(())
    }

    async fn apply(&self, credential: Option<Credential>) {
        let token = credential.as_ref().and_then(|c| c.access_token.clone());
        *self.credential.write().await = credential;
        self.token_tx.send_if_modified(|current| {
            if *current != token {
                *current = token;
                true
            } else {
                false
            }
        });
    }

    pub(crate) async fn credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    pub(crate) async fn access_token(&self) -> Option<String> {
        self.credential
            .read()
            .await
            .as_ref()
            .and_then(|c| c.access_token.clone())
    }

    pub(crate) async fn auth_state(&self) -> AuthState {
        *self.auth_state.read().await
    }

    pub(crate) async fn set_auth_state(&self, state: AuthState) {
        *self.auth_state.write().await = state;
    }

    /// Return to the state implied by the held credential.
    pub(crate) async fn settle(&self) {
        let credential = self.credential.read().await;
        *self.auth_state.write().await = Self::resting_state(credential.as_ref());
    }

    fn resting_state(credential: Option<&Credential>) -> AuthState {
        if credential.is_some_and(|c| c.access_token.is_some()) {
            AuthState::SignedIn
        } else {
            AuthState::SignedOut
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token_tx.subscribe()
    }
}
