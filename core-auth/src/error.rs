use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Client id or secret missing when a sign-in URL was requested.
    #[error("{provider} is not configured: {reason}")]
    Configuration { provider: String, reason: String },

    /// The token endpoint rejected a code or refresh token.
    #[error("{provider} token endpoint returned {status}: {message}")]
    TokenExchange {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] BridgeError),

    #[error("Credential storage failed: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Profile fetch failed for {provider}: {message}")]
    ProfileFetch {
        provider: String,
        message: String,
        /// HTTP 401: the token the profile was fetched with is no longer valid.
        unauthorized: bool,
    },

    #[error("Not authenticated")]
    NotAuthenticated,

    /// The credential was replaced or cleared while a token request was
    /// in flight; its response was discarded.
    #[error("{provider} sign-in was cancelled")]
    Cancelled { provider: String },
}

impl AuthError {
    /// Errors that leave the stored credential intact and may succeed on retry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AuthError::TokenExchange { status: 400..=401, .. } | AuthError::NotAuthenticated
        )
    }

    /// The token endpoint turned the grant down, as opposed to failing to
    /// answer. Only these count towards the refresh failure limit.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AuthError::TokenExchange { status: 400..=499, .. })
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
