//! Wire protocol for the relay
//!
//! This module provides:
//! - Checked length-prefixed message reading and writing
//! - The relay-generated frames (cast channel, errors)
//! - The login-port conversation (account login + cast discovery)
//! - The cast-port conversation (join handshake + spectator frames)

pub mod constants;
pub mod frames;
pub mod join;
pub mod login;
pub mod wire;

pub use join::{JoinFrame, JoinRequest, SpectatorFrame};
pub use login::FirstFrame;
pub use wire::{InputMessage, OutputMessage};
