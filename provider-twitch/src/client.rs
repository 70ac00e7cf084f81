//! Helix HTTP client
//!
//! Every call is described by an immutable [`HelixRequest`] that carries its
//! own access token. Nothing is shared between calls, so a token change can
//! never leak into a request built for the previous one.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::config::{CoreConfig, DEFAULT_MAX_PAGES, DEFAULT_REQUEST_TIMEOUT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{Result, TwitchError};
use crate::pagination::{fetch_all, PageSource};
use crate::types::{AnnouncementColor, Clip, Follow, Game, HelixErrorBody, HelixPage, TwitchUser};

/// Helix API base URL
pub const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";

/// Page size requested by the collection endpoints (Helix maximum).
const MAX_PAGE_SIZE: u32 = 100;

/// Cursor query parameter.
const CURSOR_PARAM: &str = "after";

/// One Helix call.
///
/// # Example
///
/// ```
/// use provider_twitch::HelixRequest;
///
/// let request = HelixRequest::get("users/follows")
///     .query("to_id", "23161357")
///     .bearer(Some("token"));
/// let next = request.with_cursor("eyJiIjpudWxs");
///
/// assert_eq!(next.cursor(), Some("eyJiIjpudWxs"));
/// assert_eq!(request.cursor(), None);
/// ```
#[derive(Clone, PartialEq)]
pub struct HelixRequest {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    access_token: Option<String>,
}

impl HelixRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(HttpMethod::Post, path)
        }
    }

    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into().trim_start_matches('/').to_string(),
            query: Vec::new(),
            body: None,
            access_token: None,
        }
    }

    /// Append a query parameter. Repeating a key is allowed (`id=1&id=2`).
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn bearer(mut self, access_token: Option<&str>) -> Self {
        self.access_token = access_token.map(str::to_string);
        self
    }

    /// A copy of this request continuing at `cursor`. Only the cursor
    /// parameter differs.
    pub fn with_cursor(&self, cursor: &str) -> Self {
        let mut next = self.clone();
        next.query.retain(|(key, _)| key != CURSOR_PARAM);
        next.query.push((CURSOR_PARAM.to_string(), cursor.to_string()));
        next
    }

    pub fn cursor(&self) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == CURSOR_PARAM)
            .map(|(_, value)| value.as_str())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn url(&self, base_url: &str) -> String {
        let mut url = format!("{}/{}", base_url.trim_end_matches('/'), self.path);
        for (i, (key, value)) in self.query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }
}

impl fmt::Debug for HelixRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelixRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Filters for `GET users/follows`. At least one id is required by Helix.
#[derive(Debug, Clone, Default)]
pub struct FollowsQuery {
    pub from_id: Option<String>,
    pub to_id: Option<String>,
}

impl FollowsQuery {
    pub fn followers_of(user_id: impl Into<String>) -> Self {
        Self {
            to_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn followed_by(user_id: impl Into<String>) -> Self {
        Self {
            from_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

/// Filters for `GET clips`. Exactly one of broadcaster, game or ids.
#[derive(Debug, Clone, Default)]
pub struct ClipsQuery {
    pub broadcaster_id: Option<String>,
    pub game_id: Option<String>,
    pub ids: Vec<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ClipsQuery {
    pub fn broadcaster(broadcaster_id: impl Into<String>) -> Self {
        Self {
            broadcaster_id: Some(broadcaster_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Serialize)]
struct AnnouncementBody<'a> {
    message: &'a str,
    color: AnnouncementColor,
}

/// Helix API client
///
/// Injects `Authorization: Bearer <token>` and `Client-Id` on every call,
/// decodes the `{ data, pagination }` envelope and maps error statuses.
/// Single attempt per request; callers decide about retries.
///
/// # Example
///
/// ```ignore
/// use provider_twitch::{FollowsQuery, HelixClient};
///
/// let helix = HelixClient::new(http_client, "my-client-id");
/// let followers = helix
///     .follows(Some(&token), FollowsQuery::followers_of("141981764"))
///     .await?;
/// ```
pub struct HelixClient {
    http_client: Arc<dyn HttpClient>,
    client_id: String,
    base_url: String,
    request_timeout: Duration,
    max_pages: usize,
}

impl HelixClient {
    pub fn new(http_client: Arc<dyn HttpClient>, client_id: impl Into<String>) -> Self {
        Self {
            http_client,
            client_id: client_id.into(),
            base_url: HELIX_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Client id, timeout and page ceiling from the core configuration.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.http_client.clone(), config.twitch.client_id.clone())
            .with_request_timeout(config.request_timeout)
            .with_max_pages(config.max_pages)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Page ceiling for [`fetch_all`]; at least one page is always read.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Execute `request` and return the raw response after status mapping.
    ///
    /// # Errors
    ///
    /// - [`TwitchError::Unauthorized`] without a token (no request is made) or on 401
    /// - [`TwitchError::Api`] on any other non-2xx status
    /// - [`TwitchError::Transport`] when the request never completed
    #[instrument(skip(self, request), fields(path = %request.path()))]
    pub async fn execute(&self, request: &HelixRequest) -> Result<HttpResponse> {
        let Some(token) = request.access_token() else {
            return Err(TwitchError::Unauthorized(
                "no access token for Helix request".to_string(),
            ));
        };

        let mut http_request = HttpRequest::new(request.method, request.url(&self.base_url))
            .bearer_token(token)
            .header("Client-Id", self.client_id.clone())
            .header("Accept", "application/json")
            .timeout(self.request_timeout);
        if let Some(body) = &request.body {
            http_request = http_request.json(body)?;
        }

        let response = self.http_client.execute(http_request).await?;
        debug!(status = response.status, "Helix response");

        if response.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<HelixErrorBody>()
            .map(|body| {
                if body.message.is_empty() {
                    body.error
                } else {
                    body.message
                }
            })
            .unwrap_or_else(|_| response.text_lossy());

        if response.status == 401 {
            warn!(%message, "Helix rejected the access token");
            return Err(TwitchError::Unauthorized(message));
        }

        warn!(status = response.status, %message, "Helix request failed");
        Err(TwitchError::Api {
            status: response.status,
            message,
        })
    }

    /// Execute `request` and decode the collection envelope.
    pub async fn send<T: DeserializeOwned>(&self, request: &HelixRequest) -> Result<HelixPage<T>> {
        let response = self.execute(request).await?;
        serde_json::from_slice(&response.body).map_err(|e| {
            TwitchError::Parse(format!("{} response: {}", request.path(), e))
        })
    }

    /// `GET users`. With no ids or logins Helix returns the token's owner.
    #[instrument(skip(self, access_token))]
    pub async fn users(
        &self,
        access_token: Option<&str>,
        ids: &[&str],
        logins: &[&str],
    ) -> Result<Vec<TwitchUser>> {
        let mut request = HelixRequest::get("users").bearer(access_token);
        for id in ids {
            request = request.query("id", *id);
        }
        for login in logins {
            request = request.query("login", *login);
        }
        Ok(self.send::<TwitchUser>(&request).await?.data)
    }

    /// The user the token belongs to.
    pub async fn current_user(&self, access_token: &str) -> Result<TwitchUser> {
        self.users(Some(access_token), &[], &[])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TwitchError::NotFound("user for the current token".to_string()))
    }

    /// Every follow relationship matching `query`, across all pages.
    #[instrument(skip(self, access_token))]
    pub async fn follows(&self, access_token: Option<&str>, query: FollowsQuery) -> Result<Vec<Follow>> {
        let request = HelixRequest::get("users/follows")
            .query_opt("from_id", query.from_id)
            .query_opt("to_id", query.to_id)
            .query("first", MAX_PAGE_SIZE.to_string())
            .bearer(access_token);
        fetch_all(self, request, self.max_pages).await
    }

    /// Every clip matching `query`, across all pages.
    #[instrument(skip(self, access_token))]
    pub async fn clips(&self, access_token: Option<&str>, query: ClipsQuery) -> Result<Vec<Clip>> {
        let mut request = HelixRequest::get("clips")
            .query_opt("broadcaster_id", query.broadcaster_id)
            .query_opt("game_id", query.game_id)
            .query_opt("started_at", query.started_at.map(|t| t.to_rfc3339()))
            .query_opt("ended_at", query.ended_at.map(|t| t.to_rfc3339()));
        for id in &query.ids {
            request = request.query("id", id.as_str());
        }
        let request = request
            .query("first", MAX_PAGE_SIZE.to_string())
            .bearer(access_token);
        fetch_all(self, request, self.max_pages).await
    }

    /// `GET games` by id and/or name.
    #[instrument(skip(self, access_token))]
    pub async fn games(
        &self,
        access_token: Option<&str>,
        ids: &[&str],
        names: &[&str],
    ) -> Result<Vec<Game>> {
        let mut request = HelixRequest::get("games").bearer(access_token);
        for id in ids {
            request = request.query("id", *id);
        }
        for name in names {
            request = request.query("name", *name);
        }
        Ok(self.send::<Game>(&request).await?.data)
    }

    /// `POST chat/announcements`. Requires `moderator:manage:announcements`.
    #[instrument(skip(self, access_token, message))]
    pub async fn send_announcement(
        &self,
        access_token: Option<&str>,
        broadcaster_id: &str,
        moderator_id: &str,
        message: &str,
        color: AnnouncementColor,
    ) -> Result<()> {
        let body = serde_json::to_value(AnnouncementBody { message, color })
            .map_err(|e| TwitchError::Parse(format!("announcement body: {}", e)))?;
        let request = HelixRequest::post("chat/announcements", body)
            .query("broadcaster_id", broadcaster_id)
            .query("moderator_id", moderator_id)
            .bearer(access_token);
        self.execute(&request).await?;
        Ok(())
    }
}

#[async_trait]
impl PageSource for HelixClient {
    async fn fetch_page<T>(&self, request: &HelixRequest) -> Result<HelixPage<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.send(request).await
    }
}
