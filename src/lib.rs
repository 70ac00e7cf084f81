//! Umbrella crate for the stream overlay core.
//!
//! Re-exports the workspace crates so a host depends on one crate and picks
//! bridges through features (`desktop-shims`, on by default).

pub use core_auth as auth;
pub use core_runtime as runtime;
pub use provider_spotify as spotify;
pub use provider_twitch as twitch;

pub use core_auth::{CallbackOutcome, ProviderKind};
pub use core_runtime::config::{CoreConfig, SpotifyConfig, TwitchConfig};
pub use core_runtime::events::{AuthEvent, CoreEvent, ProfileEvent};
pub use core_service::{CoreError, CoreService, Result};
