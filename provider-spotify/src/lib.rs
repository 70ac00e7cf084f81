//! # Spotify Provider
//!
//! Spotify Web API access for the overlay.
//!
//! ## Overview
//!
//! This module provides:
//! - [`SpotifyClient`]: `GET /v1/me` with bearer injection and error mapping
//! - [`SpotifyUserFetcher`]: current-user lookup for the auth projector
//!
//! Sign-in itself (authorization code, refresh) lives in
//! `core_auth::AuthorizationCodeClient`.

pub mod client;
pub mod error;
pub mod types;

pub use client::{SpotifyClient, SpotifyUserFetcher, SPOTIFY_API_BASE};
pub use error::{Result, SpotifyError};
pub use types::{ExternalUrls, Followers, Image, SpotifyUser};
