//! Error types for the livecast crate
//!
//! Login errors double as the user-facing refusal texts: every variant's
//! `Display` output is exactly what the client sees in its message box,
//! so the protocol layer never formats refusals by hand.

use thiserror::Error;

use crate::registry::RegistryError;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure on a connection or listener
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Login handshake refused
    #[error(transparent)]
    Login(#[from] LoginError),

    /// Cast operation refused
    #[error(transparent)]
    Cast(#[from] CastError),

    /// Malformed wire data
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Peer closed the connection
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Handshake did not complete in time
    #[error("connection timed out")]
    Timeout,

    /// The relay state worker is gone
    #[error("dispatcher is gone")]
    DispatcherGone,
}

/// Why the gameworld refuses logins right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    Startup,
    Maintenance,
}

impl std::fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotReadyReason::Startup => write!(f, "Gameworld is starting up. Please wait."),
            NotReadyReason::Maintenance => {
                write!(f, "Gameworld is under maintenance.\nPlease re-connect in a while.")
            }
        }
    }
}

/// Terminal login handshake refusals
///
/// Every variant except `HandshakeDecryptFailed` is answered with an
/// error frame carrying the `Display` text; a failed decrypt closes the
/// connection without a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    /// Client protocol version outside the accepted range
    #[error("Only clients with protocol {0} allowed!")]
    VersionUnsupported(String),

    /// Handshake block did not decrypt; the peer gets no response
    #[error("handshake decryption failed")]
    HandshakeDecryptFailed,

    /// Gameworld not accepting logins yet
    #[error("{0}")]
    ServerNotReady(NotReadyReason),

    /// Peer address is banned
    #[error("Your IP has been banned until {until} by {by}.\n\nReason specified:\n{reason}")]
    PeerBanned {
        until: String,
        by: String,
        reason: String,
    },

    /// Empty account name while cast discovery is unavailable
    #[error("Invalid account name or password.")]
    InvalidCredentials,

    /// Account lookup or password check failed
    #[error("Account name or password is not correct.")]
    IncorrectCredentials,

    /// Authenticator block missing or undecryptable
    #[error("Invalid authentication token.")]
    TokenInvalid,
}

/// Cast lifecycle and join failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CastError {
    /// Casting is switched off in the relay configuration
    #[error("Casting is currently disabled.")]
    Disabled,

    /// The live-cast limit has been reached
    #[error("Too many casts are running right now. Try again later.")]
    CapacityExceeded,

    /// The player already has an active cast
    #[error("You are already casting.")]
    AlreadyActive,

    /// No active cast under the requested name
    #[error("No cast with this name is currently running.")]
    NotFound,

    /// Password mismatch on a protected cast
    #[error("Invalid cast password.")]
    AuthFailed,

    /// The casting player or its connection is gone
    #[error("The caster is not available.")]
    CasterUnavailable,
}

impl From<RegistryError> for CastError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CapacityExceeded(_) => CastError::CapacityExceeded,
            RegistryError::AlreadyActive(_) => CastError::AlreadyActive,
        }
    }
}

/// Malformed inbound wire data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    /// Read past the end of a message
    #[error("unexpected end of message")]
    UnexpectedEnd,

    /// String bytes are not valid UTF-8
    #[error("string is not valid UTF-8")]
    InvalidString,

    /// Frame exceeds the maximum accepted payload size
    #[error("frame of {0} bytes exceeds the maximum")]
    Oversized(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_error_messages() {
        let err = LoginError::VersionUnsupported("10.97 and 10.98".into());
        assert_eq!(
            err.to_string(),
            "Only clients with protocol 10.97 and 10.98 allowed!"
        );

        assert_eq!(
            LoginError::ServerNotReady(NotReadyReason::Startup).to_string(),
            "Gameworld is starting up. Please wait."
        );
        assert_eq!(
            LoginError::ServerNotReady(NotReadyReason::Maintenance).to_string(),
            "Gameworld is under maintenance.\nPlease re-connect in a while."
        );
    }

    #[test]
    fn test_ban_message_format() {
        let err = LoginError::PeerBanned {
            until: "02 Jan 2026".into(),
            by: "God".into(),
            reason: "(none)".into(),
        };
        assert_eq!(
            err.to_string(),
            "Your IP has been banned until 02 Jan 2026 by God.\n\nReason specified:\n(none)"
        );
    }

    #[test]
    fn test_registry_error_conversion() {
        use crate::types::PlayerId;

        let err: CastError = RegistryError::CapacityExceeded(200).into();
        assert_eq!(err, CastError::CapacityExceeded);

        let err: CastError = RegistryError::AlreadyActive(PlayerId(7)).into();
        assert_eq!(err, CastError::AlreadyActive);
    }
}
