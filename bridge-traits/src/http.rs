//! HTTP transport seam
//!
//! Value types for one request and its response, and the [`HttpClient`]
//! trait the host implements (reqwest on desktop).

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Immutable-by-convention request value.
///
/// Builders consume `self`, so two calls never share a header map. Every
/// outbound call gets its credentials passed in explicitly.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = Some(Bytes::from(json));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Encode `fields` as `application/x-www-form-urlencoded`.
    pub fn form<T: Serialize>(mut self, fields: &T) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(fields).map_err(|e| {
            BridgeError::OperationFailed(format!("Form encoding failed: {}", e))
        })?;
        self.body = Some(Bytes::from(encoded));
        self.headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Raw response. Any status, including 4xx and 5xx, is a successful
/// [`HttpClient::execute`]; interpreting it is up to the caller.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// Body as text for error messages, invalid UTF-8 replaced.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP seam.
///
/// One call is one attempt. Nothing in the core retries, so implementations
/// must not retry on their own either.
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
///
/// let request = HttpRequest::new(HttpMethod::Get, "https://api.twitch.tv/helix/users")
///     .bearer_token(token)
///     .header("Client-Id", client_id);
/// let response = client.execute(request).await?;
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// # Errors
    ///
    /// Only when no response was received: connection or TLS failure,
    /// [`BridgeError::Timeout`] when `request.timeout` elapsed.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com")
            .header("Client-Id", "abc")
            .bearer_token("secret")
            .timeout(Duration::from_secs(30));

        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.headers.get("Client-Id"), Some(&"abc".to_string()));
        assert_eq!(
            request.headers.get("Authorization"),
            Some(&"Bearer secret".to_string())
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_builders_do_not_share_headers() {
        let base = HttpRequest::new(HttpMethod::Get, "https://example.com");
        let first = base.clone().bearer_token("one");
        let second = base.bearer_token("two");

        assert_eq!(first.headers["Authorization"], "Bearer one");
        assert_eq!(second.headers["Authorization"], "Bearer two");
    }

    #[test]
    fn test_form_body_encoding() {
        let request = HttpRequest::new(HttpMethod::Post, "https://example.com/token")
            .form(&[("grant_type", "authorization_code"), ("code", "a b")])
            .unwrap();

        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            request.body.as_deref(),
            Some(&b"grant_type=authorization_code&code=a+b"[..])
        );
    }

    #[test]
    fn test_response_header_lookup_ignores_case() {
        let response = HttpResponse::new(429, "").with_header("Retry-After", "7");
        assert!(!response.is_success());
        assert_eq!(response.header("retry-after"), Some("7"));
        assert_eq!(response.header("Content-Type"), None);
    }

    #[test]
    fn test_http_response_json() {
        #[derive(Deserialize)]
        struct Body {
            id: String,
        }

        let response = HttpResponse::new(200, r#"{"id":"42"}"#);
        let body: Body = response.json().unwrap();
        assert_eq!(body.id, "42");

        let broken = HttpResponse::new(200, "not json");
        assert!(broken.json::<Body>().is_err());
    }
}
