//! Typed Credential Storage
//!
//! JSON records over the byte-oriented [`SecureStore`] bridge.
//!
//! ## Contract
//!
//! - `get` returns `None` for a missing key **and** for a record that no longer
//!   deserializes; the corrupt record is deleted so it cannot shadow the next write
//! - `set` replaces the record; durability is the backend's job
//! - `clear` of a missing key succeeds
//!
//! Keys are provider-scoped (see [`ProviderKind`](crate::ProviderKind)). Each
//! key has exactly one writer; call sites say which.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{Credential, CredentialStore, ProviderKind};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let store = CredentialStore::new(secure_store);
//! let key = ProviderKind::Twitch.credential_key();
//!
//! store.set(key, &Credential::bearer("token", None)).await?;
//! let credential: Option<Credential> = store.get(key).await?;
//! store.clear(key).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use bridge_traits::storage::SecureStore;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Read and deserialize the record under `key`.
    ///
    /// # Errors
    ///
    /// Only backend failures are errors. Corrupt data reads as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self
            .secure_store
            .get_secret(key)
            .await
            .map_err(|e| AuthError::Storage(format!("Failed to read {}: {}", key, e)))?
        else {
            debug!(key, "No stored record");
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Stored record is corrupt, discarding");
                if let Err(e) = self.secure_store.delete_secret(key).await {
                    warn!(key, error = %e, "Failed to delete corrupt record");
                }
                Ok(None)
            }
        }
    }

    /// Serialize `value` and store it under `key`.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| AuthError::Serialization(format!("Failed to encode {}: {}", key, e)))?;

        self.secure_store
            .set_secret(key, &bytes)
            .await
            .map_err(|e| AuthError::Storage(format!("Failed to write {}: {}", key, e)))?;

        debug!(key, "Stored record");
        Ok(())
    }

    /// Store `Some(value)` or clear the key for `None`.
    pub async fn put<T: Serialize>(&self, key: &str, value: Option<&T>) -> Result<()> {
        match value {
            Some(value) => self.set(key, value).await,
            None => self.clear(key).await,
        }
    }

    pub async fn clear(&self, key: &str) -> Result<()> {
        self.secure_store
            .delete_secret(key)
            .await
            .map_err(|e| AuthError::Storage(format!("Failed to clear {}: {}", key, e)))?;

        debug!(key, "Cleared record");
        Ok(())
    }
}
