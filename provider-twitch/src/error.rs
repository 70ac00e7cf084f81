//! Error types for the Helix client

use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TwitchError {
    /// No access token was supplied, or Helix answered 401.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Helix answered with a non-2xx status other than 401.
    #[error("Helix API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse Helix response: {0}")]
    Parse(String),

    /// A paginated fetch did not reach its last page within the ceiling.
    #[error("Pagination stopped after {max_pages} pages")]
    PageLimitExceeded { max_pages: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transport(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, TwitchError>;

impl TwitchError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TwitchError::Unauthorized(_))
    }
}

impl From<TwitchError> for AuthError {
    fn from(error: TwitchError) -> Self {
        match error {
            TwitchError::Transport(e) => AuthError::Transport(e),
            TwitchError::Unauthorized(message) => AuthError::ProfileFetch {
                provider: "Twitch".to_string(),
                message,
                unauthorized: true,
            },
            other => AuthError::ProfileFetch {
                provider: "Twitch".to_string(),
                message: other.to_string(),
                unauthorized: false,
            },
        }
    }
}
