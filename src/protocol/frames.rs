//! Relay-generated frames
//!
//! The relay injects a handful of synthetic game frames into a cast:
//! the cast chat channel itself, spectator join events, relayed chat
//! lines, and the terminal error frames both listeners use.

use bytes::Bytes;

use super::constants::*;
use super::wire::OutputMessage;

/// Channel-open frame for the cast chat channel
///
/// Sent to the caster right after its cast registers. The empty user
/// lists mirror a freshly created channel.
pub fn cast_channel_open() -> Bytes {
    let mut msg = OutputMessage::new();
    msg.put_u8(OPCODE_CHANNEL_OPEN);
    msg.put_u16(CAST_CHANNEL_ID);
    msg.put_string(CAST_CHANNEL_NAME);
    msg.put_u16(0); // joined users
    msg.put_u16(0); // invited users
    msg.into_payload()
}

/// Join notification broadcast when a spectator attaches
pub fn cast_channel_join(spectator_name: &str) -> Bytes {
    let mut msg = OutputMessage::new();
    msg.put_u8(OPCODE_CHANNEL_EVENT);
    msg.put_u16(CAST_CHANNEL_ID);
    msg.put_string(spectator_name);
    msg.put_u8(CHANNEL_EVENT_JOIN);
    msg.into_payload()
}

/// Chat line relayed on the cast channel
///
/// The speaker is the spectator's assigned name; account identity never
/// appears on the wire.
pub fn cast_channel_message(speaker: &str, text: &str) -> Bytes {
    let mut msg = OutputMessage::new();
    msg.put_u8(OPCODE_CHANNEL_MESSAGE);
    msg.put_u32(0); // statement id, unused by the relay
    msg.put_string(speaker);
    msg.put_u16(0); // speaker level, hidden for spectators
    msg.put_u8(TALK_CHANNEL_YELLOW);
    msg.put_u16(CAST_CHANNEL_ID);
    msg.put_string(text);
    msg.into_payload()
}

/// Terminal error frame for the login flow
///
/// The opcode depends on the client version; older clients read a
/// different byte for the same message box.
pub fn login_error(version: u16, message: &str) -> Bytes {
    let mut msg = OutputMessage::new();
    if version >= VERSION_NEW_ERROR_OPCODE {
        msg.put_u8(LOGIN_ERROR);
    } else {
        msg.put_u8(LOGIN_ERROR_LEGACY);
    }
    msg.put_string(message);
    msg.into_payload()
}

/// Token-rejected status frame
pub fn token_rejected() -> Bytes {
    let mut msg = OutputMessage::new();
    msg.put_u8(LOGIN_TOKEN_ERROR);
    msg.put_u8(0);
    msg.into_payload()
}

/// Terminal error frame for an established game-side connection
pub fn game_error(message: &str) -> Bytes {
    let mut msg = OutputMessage::new();
    msg.put_u8(OPCODE_GAME_ERROR);
    msg.put_string(message);
    msg.into_payload()
}
