use bridge_traits::BridgeError;
use thiserror::Error;

/// Startup failures: configuration, logging setup and bridge wiring.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Environment variable {var} is not usable: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("No {capability} available: {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Bridge initialization failed: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, Error>;
