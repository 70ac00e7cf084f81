//! Credential storage in the OS keychain.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use keyring::Entry;
use tokio::sync::Mutex;
use tracing::{debug, error};

const INDEX_KEY: &str = "__keys";

/// Keyring-based implementation of [`SecureStore`].
///
/// Uses platform-specific secure storage:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service (libsecret)
///
/// The keychain cannot enumerate entries, so the set of written keys is kept
/// in an extra index entry.
pub struct KeyringSecureStore {
    service_name: String,
    index_lock: Mutex<()>,
}

impl KeyringSecureStore {
    pub fn new() -> Self {
        Self::with_service_name("overlay-core")
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            index_lock: Mutex::new(()),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service_name, key).map_err(Self::map_keyring_error)
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        BridgeError::StorageError(format!("Keyring error: {}", e))
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    fn read_index(&self) -> Result<Vec<String>> {
        Ok(self
            .read(INDEX_KEY)?
            .map(|raw| raw.lines().map(str::to_string).collect())
            .unwrap_or_default())
    }

    fn write_index(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return self.remove(INDEX_KEY);
        }
        self.entry(INDEX_KEY)?
            .set_password(&keys.join("\n"))
            .map_err(Self::map_keyring_error)
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.index_lock.lock().await;

        self.entry(key)?
            .set_password(&STANDARD.encode(value))
            .map_err(Self::map_keyring_error)?;

        let mut keys = self.read_index()?;
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
            self.write_index(&keys)?;
        }

        debug!(key, "Stored value in keyring");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.read(key)? {
            Some(encoded) => {
                let decoded = STANDARD.decode(&encoded).map_err(|e| {
                    error!(key, error = %e, "Failed to decode keyring value");
                    BridgeError::StorageError(format!("Failed to decode value: {}", e))
                })?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        self.remove(key)?;

        let mut keys = self.read_index()?;
        let before = keys.len();
        keys.retain(|k| k != key);
        if keys.len() != before {
            self.write_index(&keys)?;
        }

        debug!(key, "Deleted value from keyring");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.read_index()
    }

    async fn clear_all(&self) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        for key in self.read_index()? {
            self.remove(&key)?;
        }
        self.remove(INDEX_KEY)
    }
}
