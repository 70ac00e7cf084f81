//! # Host Bridge Traits
//!
//! Capability seams between the overlay core and the host it runs in.
//!
//! ## Overview
//!
//! The core never talks to the network, the keychain or the host logger
//! directly. Each of those is a trait defined here and implemented per host
//! (`bridge-desktop` ships the native adapters). Tests substitute mocks.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Executes one request, no retries
//! - [`SecureStore`](storage::SecureStore) - Durable byte store for credentials
//! - [`Clock`](time::Clock) - Time source for expiry arithmetic
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits report failures as [`BridgeError`](error::BridgeError).
//! Adapters convert their platform errors at the boundary so callers only ever
//! match on one type.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so one adapter instance can be
//! shared through an `Arc` across tasks.
//!
//! ## Examples
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
//!
//! async fn whoami(client: &dyn HttpClient, token: &str) -> bridge_traits::error::Result<String> {
//!     let request = HttpRequest::new(HttpMethod::Get, "https://api.twitch.tv/helix/users")
//!         .bearer_token(token);
//!     client.execute(request).await?.text()
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::SecureStore;
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
