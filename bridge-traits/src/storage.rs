//! Durable Storage Abstraction
//!
//! Byte-oriented key-value storage for auth material. Typed records are layered
//! on top by `core-auth`.

use async_trait::async_trait;

use crate::error::Result;

/// Durable key-value store for credentials and related auth state.
///
/// Backends:
/// - Desktop: JSON file in the user data directory, or the OS keychain
/// - Tests: in-memory maps
///
/// # Requirements
///
/// Implementations MUST:
/// - Keep writes durable across process restarts once `set_secret` returns
/// - Return `Ok(None)` for a key that was never written or was deleted
/// - Never log stored values
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_state(store: &dyn SecureStore, state: &str) -> Result<()> {
///     store.set_secret("auth.twitch.state", state.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a value, replacing any previous one.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a value
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a value. Deleting a missing key succeeds.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a value exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }

    /// List all stored keys (without values)
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Remove every stored value.
    async fn clear_all(&self) -> Result<()>;
}
