//! Durable key-value store backed by a single JSON file.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const FILE_NAME: &str = "credentials.json";

/// JSON-file implementation of [`SecureStore`].
///
/// The whole map is rewritten on every mutation through a temp file and a
/// rename, so a crash mid-write leaves either the old or the new file. Values
/// are base64 encoded to keep arbitrary bytes valid JSON.
///
/// Values are not encrypted; on Unix the file is readable by its owner only.
/// Prefer `KeyringSecureStore` where a keychain is available.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl JsonFileStore {
    /// Store under `<data_dir>/overlay-core/credentials.json`.
    pub fn new() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("overlay-core");

        Self::with_path(dir.join(FILE_NAME))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => Ok(map),
                Err(e) => {
                    warn!(path = ?self.path, error = %e, "Credential file is corrupt, starting empty");
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| BridgeError::StorageError(format!("Failed to encode store: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&tmp).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // A leftover temp file keeps the mode it was created with.
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &self.path).await?;

        debug!(path = ?self.path, entries = entries.len(), "Persisted credential file");
        Ok(())
    }

    /// Run `f` against a copy of the loaded map. When it reports a change
    /// the copy is persisted and only then becomes the cached map, so a
    /// failed write leaves the cache as it was.
    async fn with_entries<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> (R, bool),
    ) -> Result<R> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }

        let mut entries = guard
            .clone()
            .ok_or_else(|| BridgeError::StorageError("store not loaded".to_string()))?;

        let (result, changed) = f(&mut entries);
        if changed {
            self.persist(&entries).await?;
            *guard = Some(entries);
        }
        Ok(result)
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for JsonFileStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let encoded = STANDARD.encode(value);
        self.with_entries(|entries| {
            entries.insert(key.to_string(), encoded);
            ((), true)
        })
        .await
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let encoded = self
            .with_entries(|entries| (entries.get(key).cloned(), false))
            .await?;

        match encoded {
            Some(encoded) => STANDARD.decode(encoded).map(Some).map_err(|e| {
                BridgeError::StorageError(format!("Failed to decode value for {}: {}", key, e))
            }),
            None => Ok(None),
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| ((), entries.remove(key).is_some()))
            .await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.with_entries(|entries| (entries.keys().cloned().collect(), false))
            .await
    }

    async fn clear_all(&self) -> Result<()> {
        self.with_entries(|entries| {
            let changed = !entries.is_empty();
            entries.clear();
            ((), changed)
        })
        .await
    }
}
