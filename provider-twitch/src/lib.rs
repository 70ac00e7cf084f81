//! # Twitch Provider
//!
//! Helix API access for the overlay.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`HelixClient`]: bearer + `Client-Id` header injection, envelope decoding
//!   and status mapping for `users`, `users/follows`, `clips`, `games` and
//!   `chat/announcements`
//! - [`fetch_all`]: the cursor pagination engine behind every collection call
//! - [`TwitchUserFetcher`]: current-user lookup for the auth projector
//!
//! Tokens are never stored here. Each [`HelixRequest`] carries the token it
//! should be sent with; a request without one fails with
//! [`TwitchError::Unauthorized`] before touching the network.

pub mod client;
pub mod error;
pub mod pagination;
pub mod profile;
pub mod types;

pub use client::{ClipsQuery, FollowsQuery, HelixClient, HelixRequest, HELIX_BASE_URL};
pub use error::{Result, TwitchError};
pub use pagination::{fetch_all, PageSource};
pub use profile::TwitchUserFetcher;
pub use types::{AnnouncementColor, Clip, Follow, Game, HelixPage, Pagination, TwitchUser};
