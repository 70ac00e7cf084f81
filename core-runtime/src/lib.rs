//! # Core Runtime Module
//!
//! Shared runtime infrastructure for the overlay core:
//! - Logging and tracing setup
//! - Builder-validated configuration
//! - Event bus for auth and profile notifications
//!
//! Every other core crate depends on this one; it depends only on the bridge
//! traits (and, with `desktop-shims`, the desktop bridge defaults).

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
