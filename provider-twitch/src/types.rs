//! Helix API response types
//!
//! Data structures for deserializing Twitch Helix responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Helix user resource.
///
/// See: https://dev.twitch.tv/docs/api/reference/#get-users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
    pub display_name: String,

    /// `"admin"`, `"global_mod"`, `"staff"` or empty.
    #[serde(rename = "type", default)]
    pub user_type: String,

    /// `"affiliate"`, `"partner"` or empty.
    #[serde(default)]
    pub broadcaster_type: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub profile_image_url: String,

    #[serde(default)]
    pub offline_image_url: String,

    /// Deprecated by Twitch, still present in responses.
    #[serde(default)]
    pub view_count: u64,

    /// Only with the `user:read:email` scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Helix follow relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub from_id: String,
    pub from_login: String,
    pub from_name: String,
    pub to_id: String,
    pub to_login: String,
    pub to_name: String,
    pub followed_at: DateTime<Utc>,
}

/// Helix clip resource.
///
/// See: https://dev.twitch.tv/docs/api/reference/#get-clips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    pub url: String,
    pub embed_url: String,
    pub broadcaster_id: String,
    pub broadcaster_name: String,
    pub creator_id: String,
    pub creator_name: String,
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub language: String,
    pub title: String,
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
    pub thumbnail_url: String,
    /// Seconds.
    pub duration: f64,
    /// Offset into the VOD in seconds; absent when the VOD is gone.
    #[serde(default)]
    pub vod_offset: Option<u64>,
}

/// Helix game / category resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub box_art_url: String,
    #[serde(default)]
    pub igdb_id: Option<String>,
}

/// Announcement banner colours accepted by `chat/announcements`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementColor {
    Blue,
    Green,
    Orange,
    Purple,
    /// The channel's accent colour.
    #[default]
    Primary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Helix collection envelope: `{ "data": [...], "pagination": { "cursor": ... } }`.
///
/// Single-resource endpoints omit `pagination`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelixPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> HelixPage<T> {
    /// Continuation cursor; an empty string means the last page.
    pub fn cursor(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|p| p.cursor.as_deref())
            .filter(|cursor| !cursor.is_empty())
    }
}

/// Helix error body: `{ "error": "Unauthorized", "status": 401, "message": "..." }`.
#[derive(Debug, Deserialize)]
pub struct HelixErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_deserialization() {
        let json = r#"{
            "id": "141981764",
            "login": "twitchdev",
            "display_name": "TwitchDev",
            "type": "",
            "broadcaster_type": "partner",
            "description": "Supporting third-party developers building Twitch integrations.",
            "profile_image_url": "https://static-cdn.jtvnw.net/jtv_user_pictures/8a6381c7-d0c0-4576-b179-38bd5ce1d6af-profile_image-300x300.png",
            "offline_image_url": "https://static-cdn.jtvnw.net/jtv_user_pictures/3f13ab61-ec78-4fe6-8481-8682cb3b0ac2-channel_offline_image-1920x1080.png",
            "view_count": 5980557,
            "email": "not-real@email.com",
            "created_at": "2016-12-14T20:32:28Z"
        }"#;

        let user: TwitchUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "141981764");
        assert_eq!(user.display_name, "TwitchDev");
        assert_eq!(user.broadcaster_type, "partner");
        assert_eq!(user.user_type, "");
        assert_eq!(user.email.as_deref(), Some("not-real@email.com"));
    }

    #[test]
    fn test_user_without_email() {
        let json = r#"{
            "id": "1", "login": "a", "display_name": "A",
            "created_at": "2020-01-01T00:00:00Z"
        }"#;
        let user: TwitchUser = serde_json::from_str(json).unwrap();
        assert!(user.email.is_none());
        assert_eq!(user.view_count, 0);
    }

    #[test]
    fn test_page_cursor() {
        let page: HelixPage<u32> =
            serde_json::from_str(r#"{"data":[1,2],"pagination":{"cursor":"abc"}}"#).unwrap();
        assert_eq!(page.cursor(), Some("abc"));

        let page: HelixPage<u32> =
            serde_json::from_str(r#"{"data":[3],"pagination":{}}"#).unwrap();
        assert_eq!(page.cursor(), None);

        let page: HelixPage<u32> =
            serde_json::from_str(r#"{"data":[],"pagination":{"cursor":""}}"#).unwrap();
        assert_eq!(page.cursor(), None);

        let page: HelixPage<u32> = serde_json::from_str(r#"{"data":[4]}"#).unwrap();
        assert_eq!(page.cursor(), None);
        assert_eq!(page.data, vec![4]);
    }

    #[test]
    fn test_clip_deserialization() {
        let json = r#"{
            "id": "AwkwardHelplessSalamanderSwiftRage",
            "url": "https://clips.twitch.tv/AwkwardHelplessSalamanderSwiftRage",
            "embed_url": "https://clips.twitch.tv/embed?clip=AwkwardHelplessSalamanderSwiftRage",
            "broadcaster_id": "67955580",
            "broadcaster_name": "ChewieMelodies",
            "creator_id": "53834192",
            "creator_name": "BlackNova03",
            "video_id": "205586603",
            "game_id": "488191",
            "language": "en",
            "title": "babymetal",
            "view_count": 10,
            "created_at": "2017-11-30T22:34:18Z",
            "thumbnail_url": "https://clips-media-assets.twitch.tv/157589949-preview-480x272.jpg",
            "duration": 60.0,
            "vod_offset": 480
        }"#;

        let clip: Clip = serde_json::from_str(json).unwrap();
        assert_eq!(clip.broadcaster_name, "ChewieMelodies");
        assert_eq!(clip.vod_offset, Some(480));
        assert_eq!(clip.duration, 60.0);
    }

    #[test]
    fn test_announcement_color_serialization() {
        assert_eq!(
            serde_json::to_string(&AnnouncementColor::Purple).unwrap(),
            "\"purple\""
        );
        assert_eq!(AnnouncementColor::default(), AnnouncementColor::Primary);
    }
}
