//! Relay server
//!
//! This module provides:
//! - The dual-listener [`CastServer`] and its per-connection drivers
//! - The [`LoginProvider`] seam to the embedding gameworld

pub mod handler;
pub mod listener;

pub use handler::{Account, LoginProvider};
pub use listener::{BoundListeners, CastServer};
