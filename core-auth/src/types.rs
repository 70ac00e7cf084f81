use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity providers the overlay can sign in to.
///
/// # Examples
///
/// ```
/// use core_auth::ProviderKind;
///
/// let provider = ProviderKind::Twitch;
/// assert_eq!(provider.display_name(), "Twitch");
/// assert_eq!(provider.credential_key(), "auth.twitch");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Streaming platform, implicit grant.
    Twitch,
    /// Music platform, authorization code with refresh.
    Spotify,
}

impl ProviderKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Twitch => "Twitch",
            ProviderKind::Spotify => "Spotify",
        }
    }

    /// Identifier used in storage keys, events and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Twitch => "twitch",
            ProviderKind::Spotify => "spotify",
        }
    }

    /// Parse a provider from its identifier.
    ///
    /// ```
    /// use core_auth::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::parse("Spotify"), Some(ProviderKind::Spotify));
    /// assert_eq!(ProviderKind::parse("youtube"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "twitch" => Some(ProviderKind::Twitch),
            "spotify" => Some(ProviderKind::Spotify),
            _ => None,
        }
    }

    /// Store key of the credential record. Owned by the provider's auth client.
    pub fn credential_key(&self) -> &'static str {
        match self {
            ProviderKind::Twitch => "auth.twitch",
            ProviderKind::Spotify => "auth.spotify",
        }
    }

    /// Store key of the one-shot sign-in state. Owned by the provider's auth client.
    pub fn state_key(&self) -> &'static str {
        match self {
            ProviderKind::Twitch => "auth.twitch.state",
            ProviderKind::Spotify => "auth.spotify.state",
        }
    }

    /// Store key of the cached current user. Owned by the provider's projector.
    pub fn user_key(&self) -> &'static str {
        match self {
            ProviderKind::Twitch => "auth.twitch.user",
            ProviderKind::Spotify => "auth.spotify.user",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Auth material for one provider.
///
/// Twitch records only carry `access_token` (and an expiry estimate);
/// Spotify records also hold the app's client id and secret plus a refresh
/// token.
///
/// # Security
///
/// The `Debug` implementation redacts secrets and tokens.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Client-side estimate; the provider remains the authority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// App configuration with no tokens.
    pub fn app(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            ..Self::default()
        }
    }

    /// Token-only record, as produced by the implicit grant.
    pub fn bearer(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            expires_at,
            ..Self::default()
        }
    }

    pub fn has_app(&self) -> bool {
        non_empty(&self.client_id) && non_empty(&self.client_secret)
    }

    /// The same app configuration with every token removed.
    pub fn without_tokens(&self) -> Self {
        Self {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            ..Self::default()
        }
    }

    /// `true` when the expiry estimate falls within `buffer` of `now`.
    ///
    /// A credential without an estimate never reports as expiring.
    pub fn expires_within(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.expires_at.is_some_and(|at| now + buffer >= at)
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("access_token", &redacted(&self.access_token))
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Sign-in lifecycle of a provider auth client.
///
/// ```text
/// SignedOut ──signin_url──> AwaitingCallback ──callback ok──> SignedIn
///     ^                            │                            │  ^
///     └──────state mismatch────────┘                   refresh  v  │
///     └──────────────logout───────────────────────────────  Refreshing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthState {
    #[default]
    SignedOut,
    /// A sign-in URL was issued and its state token is outstanding.
    AwaitingCallback,
    SignedIn,
    /// A refresh exchange is in flight. Still signed in from the outside.
    Refreshing,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn | AuthState::Refreshing)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, AuthState::AwaitingCallback | AuthState::Refreshing)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::SignedOut => write!(f, "Signed Out"),
            AuthState::AwaitingCallback => write!(f, "Awaiting Callback"),
            AuthState::SignedIn => write!(f, "Signed In"),
            AuthState::Refreshing => write!(f, "Refreshing Token"),
        }
    }
}

/// Result of handling an authorization callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// State matched and a token was stored.
    SignedIn,
    /// State did not match the issued one. Tokens were dropped.
    Rejected,
    /// State matched but the provider returned no token or code
    /// (for example the user pressed "cancel"). Credentials untouched.
    Denied { error: Option<String> },
}

impl CallbackOutcome {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, CallbackOutcome::SignedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_keys_are_scoped() {
        for provider in [ProviderKind::Twitch, ProviderKind::Spotify] {
            let prefix = format!("auth.{}", provider.as_str());
            assert_eq!(provider.credential_key(), prefix);
            assert!(provider.state_key().starts_with(&prefix));
            assert!(provider.user_key().starts_with(&prefix));
            assert_ne!(provider.state_key(), provider.user_key());
        }
    }

    #[test]
    fn test_provider_kind_parse_and_display() {
        assert_eq!(ProviderKind::parse("TWITCH"), Some(ProviderKind::Twitch));
        assert_eq!(ProviderKind::parse(""), None);
        assert_eq!(ProviderKind::Spotify.to_string(), "Spotify");
    }

    #[test]
    fn test_credential_debug_redacts() {
        let credential = Credential {
            client_id: Some("cid".to_string()),
            client_secret: Some("very-secret".to_string()),
            access_token: Some("BQD-access".to_string()),
            refresh_token: Some("AQC-refresh".to_string()),
            expires_at: None,
        };

        let debug = format!("{:?}", credential);
        assert!(debug.contains("cid"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("BQD-access"));
        assert!(!debug.contains("AQC-refresh"));
    }

    #[test]
    fn test_credential_without_tokens_keeps_app() {
        let mut credential = Credential::app("cid", "secret");
        credential.access_token = Some("tok".to_string());
        credential.refresh_token = Some("ref".to_string());
        credential.expires_at = Some(Utc::now());

        let stripped = credential.without_tokens();
        assert_eq!(stripped, Credential::app("cid", "secret"));
        assert!(stripped.has_app());
    }

    #[test]
    fn test_has_app_requires_both_values() {
        assert!(!Credential::default().has_app());
        assert!(!Credential::app("cid", "").has_app());
        assert!(!Credential {
            client_id: Some("cid".to_string()),
            ..Credential::default()
        }
        .has_app());
    }

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let credential = Credential::bearer("tok", Some(now + Duration::seconds(30)));

        assert!(credential.expires_within(now, Duration::seconds(60)));
        assert!(!credential.expires_within(now, Duration::seconds(10)));
        assert!(!Credential::bearer("tok", None).expires_within(now, Duration::hours(1)));
    }

    #[test]
    fn test_credential_serialization_skips_absent_fields() {
        let json = serde_json::to_string(&Credential::bearer("tok", None)).unwrap();
        assert_eq!(json, r#"{"access_token":"tok"}"#);

        let parsed: Credential = serde_json::from_str(r#"{"client_id":"cid"}"#).unwrap();
        assert_eq!(parsed.client_id.as_deref(), Some("cid"));
        assert!(parsed.access_token.is_none());
    }

    #[test]
    fn test_auth_state() {
        assert_eq!(AuthState::default(), AuthState::SignedOut);
        assert!(AuthState::Refreshing.is_authenticated());
        assert!(!AuthState::AwaitingCallback.is_authenticated());
        assert!(AuthState::AwaitingCallback.is_in_progress());
        assert_eq!(AuthState::Refreshing.to_string(), "Refreshing Token");
    }
}
