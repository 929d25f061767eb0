//! Gameworld integration surface
//!
//! The relay is a library. Account storage, ban records, token
//! derivation and the handshake cipher all belong to the embedding
//! server, reached through [`LoginProvider`]. The listeners call the
//! synchronous methods inline on connection tasks, so those must not
//! block; the async methods are free to hit a database.

use std::future::Future;
use std::net::IpAddr;

use bytes::Bytes;

use crate::types::{BanInfo, GameState, SymmetricKey};

/// Account data for a successful login
#[derive(Debug, Clone, Default)]
pub struct Account {
    /// Authenticator secret; `None` skips the token check entirely
    pub secret: Option<String>,

    /// Character names shown in the login listing, in display order
    pub characters: Vec<String>,
}

/// Decisions the relay delegates to the embedding gameworld
pub trait LoginProvider: Send + Sync + 'static {
    /// Current gameworld lifecycle state
    fn game_state(&self) -> GameState;

    /// Decrypt one handshake block in place
    ///
    /// The block is always [`HANDSHAKE_BLOCK_LEN`] bytes. Returning
    /// false marks the block as garbage; the caller drops the
    /// connection or rejects the token depending on which block it was.
    ///
    /// [`HANDSHAKE_BLOCK_LEN`]: crate::protocol::constants::HANDSHAKE_BLOCK_LEN
    fn decrypt_handshake(&self, block: &mut [u8]) -> bool;

    /// Expected authenticator token for a secret at a period index
    fn derive_token(&self, secret: &str, period_index: i64) -> String;

    /// Active ban for the peer address, if any
    fn is_ip_banned(&self, peer: IpAddr) -> impl Future<Output = Option<BanInfo>> + Send;

    /// Look up an account and verify its password
    fn authenticate(
        &self,
        account_name: &str,
        password: &str,
    ) -> impl Future<Output = Option<Account>> + Send;

    /// Seal an outbound payload under the session key
    ///
    /// Pass-through by default; framing is applied after sealing.
    fn seal_frame(&self, _key: &SymmetricKey, payload: Bytes) -> Bytes {
        payload
    }

    /// Open an inbound payload under the session key
    ///
    /// Pass-through by default. A payload that opens to garbage fails
    /// frame parsing downstream, which disconnects the session.
    fn open_frame(&self, _key: &SymmetricKey, payload: Bytes) -> Bytes {
        payload
    }
}
