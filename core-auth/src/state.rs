//! Anti-forgery state for authorization requests.
//!
//! A state token binds an authorization URL to the callback it produces.
//! Tokens are 16 bytes from the operating system CSPRNG, rendered as
//! URL-safe base64 without padding (22 characters).

use crate::credential_store::CredentialStore;
use crate::error::Result;
use crate::types::ProviderKind;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

const STATE_BYTES: usize = 16;

/// Produce a fresh state token.
pub fn issue() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Exact comparison. Nothing validates against an absent expectation.
pub fn validate(received: Option<&str>, expected: Option<&str>) -> bool {
    match (received, expected) {
        (Some(received), Some(expected)) => received == expected,
        _ => false,
    }
}

/// The persisted, single outstanding state token of one provider.
///
/// Sole writer of the provider's `state_key`.
#[derive(Clone)]
pub struct SigninStateSlot {
    provider: ProviderKind,
    store: CredentialStore,
}

impl SigninStateSlot {
    pub fn new(provider: ProviderKind, store: CredentialStore) -> Self {
        Self { provider, store }
    }

    /// Issue a token and persist it, replacing any stale one.
    pub async fn begin(&self) -> Result<String> {
        let state = issue();
        self.store.set(self.provider.state_key(), &state).await?;
        debug!(provider = self.provider.as_str(), "Issued sign-in state");
        Ok(state)
    }

    pub async fn peek(&self) -> Result<Option<String>> {
        self.store.get(self.provider.state_key()).await
    }

    /// Take the expected token out of storage. The slot is empty afterwards
    /// whatever the caller decides.
    pub async fn consume(&self) -> Result<Option<String>> {
        let expected = self.peek().await?;
        self.store.clear(self.provider.state_key()).await?;
        Ok(expected)
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear(self.provider.state_key()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_issue_is_url_safe_and_long_enough() {
        let state = issue();
        assert_eq!(state.len(), 22);
        assert!(state
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_issue_does_not_repeat() {
        let issued: HashSet<String> = (0..1000).map(|_| issue()).collect();
        assert_eq!(issued.len(), 1000);
    }

    #[test]
    fn test_validate() {
        assert!(validate(Some("abc"), Some("abc")));
        assert!(!validate(Some("abc"), Some("abd")));
        assert!(!validate(Some("abc"), None));
        assert!(!validate(None, Some("abc")));
        assert!(!validate(None, None));
        assert!(!validate(Some(""), None));
    }

    #[tokio::test]
    async fn test_slot_consume_clears() {
        let slot = SigninStateSlot::new(
            ProviderKind::Twitch,
            CredentialStore::new(Arc::new(MemoryStore::new())),
        );

        let state = slot.begin().await.unwrap();
        assert_eq!(slot.peek().await.unwrap(), Some(state.clone()));

        assert_eq!(slot.consume().await.unwrap(), Some(state));
        assert_eq!(slot.peek().await.unwrap(), None);
        assert_eq!(slot.consume().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_begin_replaces_stale_state() {
        let slot = SigninStateSlot::new(
            ProviderKind::Spotify,
            CredentialStore::new(Arc::new(MemoryStore::new())),
        );

        let first = slot.begin().await.unwrap();
        let second = slot.begin().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(slot.peek().await.unwrap(), Some(second));
    }
}
