use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotifyError {
    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Web API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Throttled, retry after {0} seconds")]
    Throttled(u64),

    #[error("Failed to parse Web API response: {0}")]
    Parse(String),

    #[error(transparent)]
    Transport(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, SpotifyError>;

impl From<SpotifyError> for AuthError {
    fn from(error: SpotifyError) -> Self {
        match error {
            SpotifyError::Transport(e) => AuthError::Transport(e),
            SpotifyError::Unauthorized(message) => AuthError::ProfileFetch {
                provider: "Spotify".to_string(),
                message,
                unauthorized: true,
            },
            other => AuthError::ProfileFetch {
                provider: "Spotify".to_string(),
                message: other.to_string(),
                unauthorized: false,
            },
        }
    }
}
