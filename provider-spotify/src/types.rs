//! Spotify Web API response types

use serde::{Deserialize, Serialize};

/// `GET /v1/me` response.
///
/// See: https://developer.spotify.com/documentation/web-api/reference/get-current-users-profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,

    /// `null` for users who never set one.
    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub href: String,

    #[serde(default)]
    pub external_urls: ExternalUrls,

    #[serde(default)]
    pub followers: Option<Followers>,

    #[serde(default)]
    pub images: Vec<Image>,

    /// Requires `user-read-private`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Requires `user-read-email`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// `"premium"`, `"free"`, ...; requires `user-read-private`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

impl SpotifyUser {
    /// Display name, falling back to the user id.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Followers {
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Web API error body: `{ "error": { "status": 401, "message": "..." } }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}
