//! Login listener conversation
//!
//! One request, one reply, close. The first frame decides everything:
//!
//! ```text
//!   [os u16][version u16][preamble]
//!   [128-byte sealed block: key words, account, password]
//!   [128-byte sealed block: authenticator token]   (account logins)
//! ```
//!
//! The version gate runs before the sealed block is touched, so version
//! refusals go out in plaintext. Everything after the block is sealed
//! under the session key taken from it. An empty account name turns the
//! request into cast discovery, with the password field acting as the
//! listing filter.

use std::net::SocketAddr;

use bytes::Bytes;

use super::constants::{HANDSHAKE_BLOCK_LEN, VERSION_EXTENDED_PREAMBLE};
use super::frames;
use super::wire::{InputMessage, OutputMessage};
use crate::auth;
use crate::config::RelayConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{LoginError, NotReadyReason, Result};
use crate::hub::CastHub;
use crate::registry::CastOverview;
use crate::server::{Account, LoginProvider};
use crate::types::{GameState, SymmetricKey};

/// Refusal for an empty unfiltered cast listing
const NO_CAST_RUNNING: &str = "No cast running right now.";

/// Refusal for an empty password-filtered cast listing
const NO_CAST_WITH_PASSWORD: &str = "No cast running with this password.";

/// Decoded first frame of a login connection
#[derive(Debug)]
pub enum FirstFrame {
    /// Version outside the accepted range; answered in plaintext
    Reject { version: u16 },

    /// Empty account name: list casts, password acts as the filter
    Discovery {
        version: u16,
        key: SymmetricKey,
        filter: String,
    },

    /// Account login
    Login {
        version: u16,
        key: SymmetricKey,
        account: String,
        password: String,
        /// `None` when the token block was missing or did not decrypt
        token: Option<String>,
    },
}

/// Decode the first frame of a login connection
///
/// Fails on truncated input and on a handshake block that does not
/// decrypt; both are silent closes for the peer.
pub fn parse_first_frame<P: LoginProvider>(
    provider: &P,
    config: &RelayConfig,
    payload: Bytes,
) -> Result<FirstFrame> {
    let mut input = InputMessage::new(payload);

    input.skip(2)?; // operating system
    let version = input.get_u16()?;
    let preamble = if version >= VERSION_EXTENDED_PREAMBLE {
        17
    } else {
        12
    };
    input.skip(preamble)?;

    if version < config.version_min || version > config.version_max {
        return Ok(FirstFrame::Reject { version });
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
    let account = sealed.get_string()?;
    let password = sealed.get_string()?;

    if account.is_empty() {
        return Ok(FirstFrame::Discovery {
            version,
            key,
            filter: password,
        });
    }

    let token = read_token(provider, &mut input);
    Ok(FirstFrame::Login {
        version,
        key,
        account,
        password,
        token,
    })
}

/// Pull the authenticator token out of the trailing sealed block
///
/// The token block is the last `HANDSHAKE_BLOCK_LEN` bytes of the
/// frame, whatever padding sits before it. Anything short, garbled or
/// unparsable maps to `None`.
fn read_token<P: LoginProvider>(provider: &P, input: &mut InputMessage) -> Option<String> {
    let padding = input.remaining().checked_sub(HANDSHAKE_BLOCK_LEN)?;
    input.skip(padding).ok()?;

    let mut block = input.take_block(HANDSHAKE_BLOCK_LEN).ok()?;
    if !provider.decrypt_handshake(&mut block) {
        return None;
    }

    InputMessage::new(Bytes::from(block)).get_string().ok()
}

/// Run the whole login conversation for one first frame
///
/// Returns the single reply payload to send, already sealed where the
/// protocol calls for it, or `None` to close without answering.
pub async fn handle_login<P: LoginProvider>(
    provider: &P,
    config: &RelayConfig,
    dispatcher: &Dispatcher<CastHub>,
    peer: SocketAddr,
    payload: Bytes,
) -> Option<Bytes> {
    if provider.game_state() == GameState::Shutdown {
        tracing::debug!(peer = %peer, "Login during shutdown, dropping");
        return None;
    }

    let frame = match parse_first_frame(provider, config, payload) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::debug!(peer = %peer, error = %err, "Unusable login frame");
            return None;
        }
    };

    match frame {
        FirstFrame::Reject { version } => {
            tracing::debug!(peer = %peer, version, "Unsupported client version");
            let text = LoginError::VersionUnsupported(config.version_str.clone()).to_string();
            Some(frames::login_error(version, &text))
        }
        FirstFrame::Discovery {
            version,
            key,
            filter,
        } => {
            let reply = discovery_reply(provider, config, dispatcher, peer, version, filter).await?;
            Some(provider.seal_frame(&key, reply))
        }
        FirstFrame::Login {
            version,
            key,
            account,
            password,
            token,
        } => {
            let reply =
                account_reply(provider, config, peer, version, &account, &password, token).await;
            Some(provider.seal_frame(&key, reply))
        }
    }
}

/// Gameworld state and ban gate, shared by both login branches
async fn gate<P: LoginProvider>(provider: &P, peer: SocketAddr) -> std::result::Result<(), LoginError> {
    match provider.game_state() {
        GameState::Startup => return Err(LoginError::ServerNotReady(NotReadyReason::Startup)),
        GameState::Maintenance => {
            return Err(LoginError::ServerNotReady(NotReadyReason::Maintenance))
        }
        _ => {}
    }

    if let Some(ban) = provider.is_ip_banned(peer.ip()).await {
        let reason = if ban.reason.is_empty() {
            "(none)".to_string()
        } else {
            ban.reason
        };
        return Err(LoginError::PeerBanned {
            until: format_date_short(ban.expires_at),
            by: ban.banned_by,
            reason,
        });
    }

    Ok(())
}

/// Cast discovery branch
///
/// `None` only when the relay worker is gone, which closes the
/// connection silently.
async fn discovery_reply<P: LoginProvider>(
    provider: &P,
    config: &RelayConfig,
    dispatcher: &Dispatcher<CastHub>,
    peer: SocketAddr,
    version: u16,
    filter: String,
) -> Option<Bytes> {
    if let Err(err) = gate(provider, peer).await {
        tracing::info!(peer = %peer, "Cast discovery refused: {}", err);
        return Some(frames::login_error(version, &err.to_string()));
    }

    if !config.casting_enabled {
        let text = LoginError::InvalidCredentials.to_string();
        return Some(frames::login_error(version, &text));
    }

    let wanted = filter.clone();
    let listing = dispatcher
        .call(move |hub| hub.list_casts(&wanted))
        .await
        .ok()?;

    if listing.is_empty() {
        let text = if filter.is_empty() {
            NO_CAST_RUNNING
        } else {
            NO_CAST_WITH_PASSWORD
        };
        return Some(frames::login_error(version, text));
    }

    tracing::debug!(peer = %peer, casts = listing.len(), "Cast listing served");
    Some(cast_list_response(config, &listing, &filter))
}

/// Account login branch; always produces a reply
async fn account_reply<P: LoginProvider>(
    provider: &P,
    config: &RelayConfig,
    peer: SocketAddr,
    version: u16,
    account_name: &str,
    password: &str,
    token: Option<String>,
) -> Bytes {
    if let Err(err) = gate(provider, peer).await {
        tracing::info!(peer = %peer, "Login refused: {}", err);
        return frames::login_error(version, &err.to_string());
    }

    let Some(token) = token else {
        return frames::login_error(version, &LoginError::TokenInvalid.to_string());
    };

    let Some(account) = provider.authenticate(account_name, password).await else {
        tracing::info!(peer = %peer, account = account_name, "Rejected account credentials");
        return frames::login_error(version, &LoginError::IncorrectCredentials.to_string());
    };

    let period = auth::current_period(config.auth_token_period);
    let token_ok = auth::verify_token(account.secret.as_deref(), &token, period, |secret, at| {
        provider.derive_token(secret, at)
    });
    if !token_ok {
        tracing::info!(peer = %peer, account = account_name, "Rejected authenticator token");
        return frames::token_rejected();
    }

    tracing::info!(
        peer = %peer,
        account = account_name,
        characters = account.characters.len(),
        "Account login"
    );
    character_list_response(config, &account, account_name, password)
}

/// Character listing reply for a successful account login
fn character_list_response(
    config: &RelayConfig,
    account: &Account,
    account_name: &str,
    password: &str,
) -> Bytes {
    let mut reply = OutputMessage::new();

    // Token status precedes everything, but only for accounts that
    // carry a secret
    if account.secret.is_some() {
        reply.put_u8(super::constants::LOGIN_TOKEN_OK);
        reply.put_u8(0x00);
    }

    if !config.motd.is_empty() {
        reply.put_u8(super::constants::LOGIN_MOTD);
        reply.put_string(&format!("{}\n{}", config.motd_num, config.motd));
    }

    reply.put_u8(super::constants::LOGIN_SESSION_KEY);
    reply.put_string(&format!("{}\n{}", account_name, password));

    reply.put_u8(super::constants::LOGIN_CHARACTER_LIST);

    reply.put_u8(1); // world count
    reply.put_u8(0); // world id
    reply.put_string(&config.server_name);
    reply.put_string(&config.server_address);
    reply.put_u16(config.game_port);
    reply.put_u8(0); // preview flag

    let count = account.characters.len().min(u8::MAX as usize);
    reply.put_u8(count as u8);
    for name in account.characters.iter().take(count) {
        reply.put_u8(0); // world id
        reply.put_string(name);
    }

    // Premium status: enabled, never expiring
    reply.put_u8(0);
    reply.put_u8(1);
    reply.put_u32(0);

    reply.into_payload()
}

/// Cast listing reply for the discovery branch
///
/// Casts are presented as characters on synthetic worlds: the first
/// pass describes one world per cast with its viewer count as the
/// world name, the second pass lists the cast names.
fn cast_list_response(config: &RelayConfig, listing: &[CastOverview], filter: &str) -> Bytes {
    let mut reply = OutputMessage::new();

    reply.put_u8(super::constants::LOGIN_MOTD);
    reply.put_string(&format!("{}\n{}", config.motd_num, config.motd));

    reply.put_u8(super::constants::LOGIN_SESSION_KEY);
    reply.put_string(&format!("\n{}", filter));

    reply.put_u8(super::constants::LOGIN_CHARACTER_LIST);

    let count = listing.len().min(u8::MAX as usize);
    reply.put_u8(count as u8);
    for (world, cast) in listing.iter().take(count).enumerate() {
        reply.put_u8(world as u8);
        reply.put_string(&format!("{} viewers", cast.spectators));
        reply.put_string(&config.server_address);
        reply.put_u16(config.cast_port);
        reply.put_u8(0); // preview flag
    }

    reply.put_u8(count as u8);
    for (world, cast) in listing.iter().take(count).enumerate() {
        reply.put_u8(world as u8);
        reply.put_string(&cast.cast_name);
    }

    // Premium status: enabled, never expiring
    reply.put_u8(0);
    reply.put_u8(1);
    reply.put_u32(0);

    reply.into_payload()
}

/// Format a unix timestamp as `DD Mon YYYY`
///
/// Proleptic Gregorian, UTC. Used only for ban expiry texts.
fn format_date_short(timestamp: i64) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let days = timestamp.div_euclid(86_400);
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { year + 1 } else { year };

    format!("{:02} {} {}", day, MONTHS[(month - 1) as usize], year)
}
