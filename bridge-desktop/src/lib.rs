//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` backed by the OS keychain via `keyring` (feature `secure-store`)
//! - `SecureStore` backed by an owner-only JSON file, for hosts without a keychain
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{KeyringSecureStore, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let store = KeyringSecureStore::new();
//!
//!     // Hand both to CoreConfig::builder()
//! }
//! ```

mod file_store;
mod http;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use file_store::JsonFileStore;
pub use http::ReqwestHttpClient;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
