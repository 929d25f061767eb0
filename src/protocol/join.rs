//! Cast listener conversation
//!
//! The first frame mirrors the login shape without the legacy padding:
//!
//! ```text
//!   [os u16][version u16]
//!   [128-byte sealed block: key words, cast name, password]
//! ```
//!
//! After a successful join the connection speaks the spectator subset
//! of the game protocol: chat on the cast channel, a logout request,
//! and nothing else. Unknown frames are ignored, not fatal; a spectator
//! client sends plenty the relay has no use for.

use bytes::Bytes;

use super::constants::{
    CAST_CHANNEL_ID, HANDSHAKE_BLOCK_LEN, OPCODE_CLIENT_LOGOUT, OPCODE_CLIENT_SAY,
    TALK_CHANNEL_YELLOW,
};
use super::wire::InputMessage;
use crate::config::RelayConfig;
use crate::error::{LoginError, Result, WireError};
use crate::server::LoginProvider;
use crate::types::SymmetricKey;

/// Longest chat line a spectator may relay
const MAX_CHAT_LEN: usize = 255;

/// Decoded first frame of a cast connection
#[derive(Debug)]
pub enum JoinFrame {
    /// Version outside the accepted range; answered in plaintext
    Reject { version: u16 },

    /// Well-formed join request
    Join(JoinRequest),
}

/// The join parameters a spectator presents
#[derive(Debug)]
pub struct JoinRequest {
    pub version: u16,
    pub key: SymmetricKey,
    pub cast_name: String,
    pub password: String,
}

/// Decode the first frame of a cast connection
pub fn parse_join_frame<P: LoginProvider>(
    provider: &P,
    config: &RelayConfig,
    payload: Bytes,
) -> Result<JoinFrame> {
    let mut input = InputMessage::new(payload);

    input.skip(2)?; // operating system
    let version = input.get_u16()?;

    if version < config.version_min || version > config.version_max {
        return Ok(JoinFrame::Reject { version });
    }

    let mut block = input.take_block(HANDSHAKE_BLOCK_LEN)?;
    if !provider.decrypt_handshake(&mut block) {
        return Err(LoginError::HandshakeDecryptFailed.into());
    }

    let mut sealed = InputMessage::new(Bytes::from(block));
    let key = SymmetricKey::new([
        sealed.get_u32()?,
        sealed.get_u32()?,
        sealed.get_u32()?,
        sealed.get_u32()?,
    ]);
    let cast_name = sealed.get_string()?;
    let password = sealed.get_string()?;

    Ok(JoinFrame::Join(JoinRequest {
        version,
        key,
        cast_name,
        password,
    }))
}

/// One inbound frame from an attached spectator
#[derive(Debug, PartialEq, Eq)]
pub enum SpectatorFrame {
    /// Chat line for the cast channel
    Say(String),

    /// Explicit leave request
    Logout,

    /// Anything the relay ignores, by opcode
    Other(u8),
}

/// Decode a frame from an attached spectator
///
/// Say frames off the cast channel, with the wrong speech class, empty
/// or over the length cap all degrade to `Other`; the relay drops them
/// the way it drops unknown opcodes. An empty payload parses as an
/// ignored frame.
pub fn parse_spectator_frame(payload: Bytes) -> std::result::Result<SpectatorFrame, WireError> {
    let mut input = InputMessage::new(payload);
    if input.remaining() == 0 {
        return Ok(SpectatorFrame::Other(0x00));
    }

    let opcode = input.get_u8()?;
    match opcode {
        OPCODE_CLIENT_LOGOUT => Ok(SpectatorFrame::Logout),
        OPCODE_CLIENT_SAY => {
            let talk_type = input.get_u8()?;
            if talk_type != TALK_CHANNEL_YELLOW {
                return Ok(SpectatorFrame::Other(opcode));
            }

            let channel = input.get_u16()?;
            let text = input.get_string()?;
            if channel != CAST_CHANNEL_ID || text.is_empty() || text.len() > MAX_CHAT_LEN {
                return Ok(SpectatorFrame::Other(opcode));
            }

            Ok(SpectatorFrame::Say(text))
        }
        other => Ok(SpectatorFrame::Other(other)),
    }
}
