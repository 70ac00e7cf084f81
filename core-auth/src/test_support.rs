//! Shared doubles for this crate's unit tests.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::SecureStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory [`SecureStore`]; `failing()` rejects every call.
pub struct MemoryStore {
    storage: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub async fn insert_raw(&self, key: &str, value: &[u8]) {
        self.storage.lock().await.insert(key.to_string(), value.to_vec());
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.storage.lock().await.contains_key(key)
    }

    pub async fn read_json(&self, key: &str) -> Option<serde_json::Value> {
        let storage = self.storage.lock().await;
        storage
            .get(key)
            .map(|bytes| serde_json::from_slice(bytes).unwrap())
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            Err(BridgeError::StorageError("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check()?;
        self.storage.lock().await.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.storage.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.check()?;
        self.storage.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.check()?;
        Ok(self.storage.lock().await.keys().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.check()?;
        self.storage.lock().await.clear();
        Ok(())
    }
}

mockall::mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string())
}

/// Query or form pairs of a URL or `application/x-www-form-urlencoded` body.
pub fn pairs(input: &str) -> HashMap<String, String> {
    let query = input.split_once('?').map(|(_, q)| q).unwrap_or(input);
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
