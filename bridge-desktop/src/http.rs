//! [`HttpClient`] over reqwest.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use reqwest::{Client, Method, RequestBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = concat!("overlay-core/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pooled reqwest client. A timeout on the [`HttpRequest`] overrides the
/// client-wide one.
pub struct ReqwestHttpClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("reqwest client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Use a caller-built client, e.g. one with a proxy configured.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn prepare(&self, request: HttpRequest) -> RequestBuilder {
        let mut builder = self.client.request(method(request.method), &request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        match request.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    fn transport_error(&self, error: reqwest::Error, timeout: Option<Duration>) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Timeout(timeout.unwrap_or(self.timeout))
        } else if error.is_connect() {
            BridgeError::OperationFailed(format!("connection failed: {}", error))
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[instrument(skip_all, fields(method = ?request.method, host = host_of(&request.url)))]
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let timeout = request.timeout;

        let response = self.prepare(request).send().await.map_err(|e| {
            warn!(error = %e, "Request failed");
            self.transport_error(e, timeout)
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e, timeout))?;

        debug!(status, bytes = body.len(), "Response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Host part of `url` for log fields; paths and queries stay out of logs.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_carries_headers_body_and_timeout() {
        let client = ReqwestHttpClient::new().unwrap();
        let request = HttpRequest::new(HttpMethod::Post, "https://accounts.spotify.com/api/token")
            .header("Authorization", "Basic Y2lkOnNlY3JldA==")
            .form(&[("grant_type", "refresh_token"), ("refresh_token", "r1")])
            .unwrap()
            .timeout(Duration::from_secs(3));

        let built = client.prepare(request).build().unwrap();

        assert_eq!(built.method(), Method::POST);
        assert_eq!(built.headers()["Authorization"], "Basic Y2lkOnNlY3JldA==");
        assert_eq!(
            built.headers()["Content-Type"],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            built.body().and_then(|b| b.as_bytes()),
            Some(&b"grant_type=refresh_token&refresh_token=r1"[..])
        );
        assert_eq!(built.timeout(), Some(&Duration::from_secs(3)));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://api.twitch.tv/helix/users?id=1"), "api.twitch.tv");
        assert_eq!(host_of("http://127.0.0.1:9"), "127.0.0.1:9");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        let request = HttpRequest::new(HttpMethod::Get, "http://127.0.0.1:9/unreachable");

        assert!(matches!(
            client.execute(request).await,
            Err(BridgeError::OperationFailed(_)) | Err(BridgeError::Timeout(_))
        ));
    }
}
