//! # Event Bus System
//!
//! Typed notifications for the overlay core, carried on a
//! `tokio::sync::broadcast` channel.
//!
//! ## Overview
//!
//! Auth clients and the current-user projectors publish here; the host UI
//! subscribes to refresh its sign-in widgets without polling.
//!
//! ```text
//! ┌─────────────────┐   emit    ┌───────────┐  subscribe  ┌────────────┐
//! │ Auth clients    ├──────────>│           ├────────────>│ UI         │
//! └─────────────────┘           │ EventBus  │             └────────────┘
//! ┌─────────────────┐   emit    │           │  subscribe  ┌────────────┐
//! │ User projectors ├──────────>│           ├────────────>│ Log / test │
//! └─────────────────┘           └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(32);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::SignedIn {
//!         provider: "twitch".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Auth(AuthEvent::SignedIn { .. })));
//! # }
//! ```
//!
//! Emitting with no subscribers is not an error worth reporting; publishers
//! use `let _ = bus.emit(..)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sign-in lifecycle of a provider auth client.
    Auth(AuthEvent),
    /// Changes of a provider's current-user snapshot.
    Profile(ProfileEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Profile(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SigninRejected { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Auth(AuthEvent::SignedOut { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Provider the event concerns.
    pub fn provider(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.provider(),
            CoreEvent::Profile(e) => e.provider(),
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events emitted by the provider auth clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A sign-in URL was issued; the client now waits for the callback.
    SigningIn { provider: String },
    /// A callback was accepted and a token stored.
    SignedIn { provider: String },
    /// A callback carried a state that did not match the issued one.
    SigninRejected { provider: String },
    /// Credentials were cleared.
    SignedOut { provider: String },
    /// A refresh-token exchange started.
    TokenRefreshing { provider: String },
    /// A refresh-token exchange succeeded.
    TokenRefreshed {
        provider: String,
        /// Estimated expiry (Unix epoch seconds), when the provider reported one.
        expires_at: Option<i64>,
    },
    /// An auth operation failed.
    AuthError {
        provider: String,
        message: String,
        /// `false` when the client dropped its tokens and a new sign-in is required.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn { .. } => "Waiting for authorization callback",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::SigninRejected { .. } => "Authorization callback rejected",
            AuthEvent::SignedOut { .. } => "User signed out",
            AuthEvent::TokenRefreshing { .. } => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }

    fn provider(&self) -> &str {
        match self {
            AuthEvent::SigningIn { provider }
            | AuthEvent::SignedIn { provider }
            | AuthEvent::SigninRejected { provider }
            | AuthEvent::SignedOut { provider }
            | AuthEvent::TokenRefreshing { provider }
            | AuthEvent::TokenRefreshed { provider, .. }
            | AuthEvent::AuthError { provider, .. } => provider,
        }
    }
}

/// Events emitted by the current-user projectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ProfileEvent {
    /// A profile was fetched for the current token.
    Updated {
        provider: String,
        user_id: String,
        display_name: String,
    },
    /// The snapshot was dropped (logout, rejected token, failed fetch).
    Cleared { provider: String },
}

impl ProfileEvent {
    fn description(&self) -> &str {
        match self {
            ProfileEvent::Updated { .. } => "Current user updated",
            ProfileEvent::Cleared { .. } => "Current user cleared",
        }
    }

    fn provider(&self) -> &str {
        match self {
            ProfileEvent::Updated { provider, .. } | ProfileEvent::Cleared { provider } => {
                provider
            }
        }
    }
}

/// Central broadcast channel. Cloning shares the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(16);
/// let spotify_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.provider() == "spotify");
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in(provider: &str) -> CoreEvent {
        CoreEvent::Auth(AuthEvent::SignedIn {
            provider: provider.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(signed_in("twitch")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(signed_in("spotify")).unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), signed_in("spotify"));
        assert_eq!(second.recv().await.unwrap(), signed_in("spotify"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Profile(_)));

        bus.emit(signed_in("twitch")).ok();
        let cleared = CoreEvent::Profile(ProfileEvent::Cleared {
            provider: "twitch".to_string(),
        });
        bus.emit(cleared.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), cleared);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                provider: "spotify".to_string(),
                expires_at: Some(1_700_000_000 + i),
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let fatal = CoreEvent::Auth(AuthEvent::AuthError {
            provider: "spotify".to_string(),
            message: "refresh token revoked".to_string(),
            recoverable: false,
        });
        assert_eq!(fatal.severity(), EventSeverity::Error);

        let transient = CoreEvent::Auth(AuthEvent::AuthError {
            provider: "spotify".to_string(),
            message: "timeout".to_string(),
            recoverable: true,
        });
        assert_eq!(transient.severity(), EventSeverity::Warning);

        assert_eq!(signed_in("twitch").severity(), EventSeverity::Info);

        let refreshing = CoreEvent::Auth(AuthEvent::TokenRefreshing {
            provider: "spotify".to_string(),
        });
        assert_eq!(refreshing.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_description_and_provider() {
        let event = CoreEvent::Profile(ProfileEvent::Updated {
            provider: "twitch".to_string(),
            user_id: "141981764".to_string(),
            display_name: "TwitchDev".to_string(),
        });
        assert_eq!(event.description(), "Current user updated");
        assert_eq!(event.provider(), "twitch");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Auth(AuthEvent::SigninRejected {
            provider: "twitch".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Auth\""));
        assert!(json.contains("\"event\":\"SigninRejected\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(64);
        let mut sub = bus.subscribe();

        let handles: Vec<_> = ["twitch", "spotify"]
            .into_iter()
            .map(|provider| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    for _ in 0..10 {
                        bus.emit(signed_in(provider)).ok();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.ok();
        }

        let mut count = 0;
        while sub.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }
}
