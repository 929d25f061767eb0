//! Protocol constants
//!
//! Opcode values and fixed sizes shared by the login and cast flows.
//! Directions are noted because a few values are reused: `0x14` is the
//! client's logout request inbound and the terminal error frame
//! outbound.

/// Length of an asymmetrically sealed handshake block
pub const HANDSHAKE_BLOCK_LEN: usize = 128;

/// Largest payload accepted from a peer
pub const MAX_MESSAGE_LEN: usize = 24_590;

/// First client version that reads the extended login preamble
pub const VERSION_EXTENDED_PREAMBLE: u16 = 971;

/// First client version that expects the newer error opcode
pub const VERSION_NEW_ERROR_OPCODE: u16 = 1076;

// Login server -> client
pub const LOGIN_ERROR_LEGACY: u8 = 0x0A;
pub const LOGIN_ERROR: u8 = 0x0B;
pub const LOGIN_TOKEN_OK: u8 = 0x0C;
pub const LOGIN_TOKEN_ERROR: u8 = 0x0D;
pub const LOGIN_MOTD: u8 = 0x14;
pub const LOGIN_SESSION_KEY: u8 = 0x28;
pub const LOGIN_CHARACTER_LIST: u8 = 0x64;

// Game server -> client
pub const OPCODE_GAME_ERROR: u8 = 0x14;
pub const OPCODE_CHANNEL_OPEN: u8 = 0xAC;
pub const OPCODE_CHANNEL_MESSAGE: u8 = 0xAA;
pub const OPCODE_CHANNEL_EVENT: u8 = 0xF3;

// Client -> game server
pub const OPCODE_CLIENT_LOGOUT: u8 = 0x14;
pub const OPCODE_CLIENT_SAY: u8 = 0x96;

/// Channel-event subtypes
pub const CHANNEL_EVENT_JOIN: u8 = 0;
pub const CHANNEL_EVENT_LEAVE: u8 = 1;

/// Speech class for channel chat
pub const TALK_CHANNEL_YELLOW: u8 = 0x07;

/// Synthetic chat channel every cast exposes
pub const CAST_CHANNEL_ID: u16 = 0xFFFE;
pub const CAST_CHANNEL_NAME: &str = "Cast Chat";
