//! # Authentication Module
//!
//! Sign-in flows and credential state for the overlay's two identity
//! providers.
//!
//! ## Overview
//!
//! - [`ImplicitGrantClient`] signs in to Twitch; the token comes back in the
//!   redirect fragment and cannot be refreshed.
//! - [`AuthorizationCodeClient`] signs in to Spotify; a one-time code is
//!   exchanged for an access token plus a refresh token.
//! - [`CurrentUserProjector`] keeps the signed-in user's profile in step with
//!   a client's access token.
//!
//! Both clients persist through [`CredentialStore`], guard their callbacks
//! with a single-use state token (see [`state`]) and publish their access
//! token on a `tokio::sync::watch` channel.
//!
//! ## Features
//!
//! - Anti-forgery state from the OS CSPRNG, consumed on every callback
//! - Proactive refresh shortly before the expiry estimate
//! - Generation-checked profile snapshots that never outlive their token
//! - Auth and profile events on the core event bus

pub mod authorization_code;
pub mod callback;
pub mod credential_store;
pub mod error;
pub mod implicit;
pub mod projector;
mod session;
pub mod state;
pub mod types;

#[cfg(test)]
mod test_support;

pub use authorization_code::AuthorizationCodeClient;
pub use callback::{CallbackParams, CodeCallback};
pub use credential_store::CredentialStore;
pub use error::{AuthError, Result};
pub use implicit::ImplicitGrantClient;
pub use projector::{token_fingerprint, CurrentUserProjector, ProfileFetcher};
pub use session::AccessTokenSource;
pub use state::SigninStateSlot;
pub use types::{AuthState, CallbackOutcome, Credential, ProviderKind};
