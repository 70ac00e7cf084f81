use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Twitch error: {0}")]
    Twitch(#[from] provider_twitch::TwitchError),

    #[error("Spotify error: {0}")]
    Spotify(#[from] provider_spotify::SpotifyError),
}

impl CoreError {
    /// Missing token or a token the provider refused.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            CoreError::Twitch(e) => e.is_unauthorized(),
            CoreError::Spotify(provider_spotify::SpotifyError::Unauthorized(_)) => true,
            CoreError::Auth(core_auth::AuthError::NotAuthenticated) => true,
            CoreError::Auth(core_auth::AuthError::ProfileFetch { unauthorized, .. }) => *unauthorized,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
