//! Relay configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Relay configuration options
///
/// The live-cast capacity is deliberately not here; it is the fixed
/// [`CAST_CAPACITY`](crate::registry::CAST_CAPACITY) constant.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Master switch for the casting system
    pub casting_enabled: bool,

    /// Address the login listener binds to
    pub login_bind: SocketAddr,

    /// Address the cast (spectator) listener binds to
    pub cast_bind: SocketAddr,

    /// Server name shown in the character listing
    pub server_name: String,

    /// Address advertised to clients in listings
    pub server_address: String,

    /// Game port advertised in the character listing
    pub game_port: u16,

    /// Cast port advertised in the cast listing
    pub cast_port: u16,

    /// Message of the day; empty omits it from the character listing
    pub motd: String,

    /// Message-of-the-day revision number
    pub motd_num: u32,

    /// Lowest accepted client protocol version
    pub version_min: u16,

    /// Highest accepted client protocol version
    pub version_max: u16,

    /// Version range as shown in the refusal message
    pub version_str: String,

    /// Authenticator token period
    pub auth_token_period: Duration,

    /// Chat messages a spectator may send per reset window
    pub chat_burst_limit: u8,

    /// Interval at which spectator chat windows reset
    pub chat_reset_interval: Duration,

    /// Handshake must complete within this time
    pub connection_timeout: Duration,

    /// Interval between relay stats log lines
    pub stats_interval: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            casting_enabled: true,
            login_bind: SocketAddr::from(([0, 0, 0, 0], 7171)),
            cast_bind: SocketAddr::from(([0, 0, 0, 0], 7173)),
            server_name: "Gameworld".to_string(),
            server_address: "127.0.0.1".to_string(),
            game_port: 7172,
            cast_port: 7173,
            motd: String::new(),
            motd_num: 1,
            version_min: 1097,
            version_max: 1098,
            version_str: "10.97 and 10.98".to_string(),
            auth_token_period: Duration::from_secs(30),
            chat_burst_limit: 5,
            chat_reset_interval: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(10),
            stats_interval: Duration::from_secs(60),
            tcp_nodelay: true,
        }
    }
}

impl RelayConfig {
    /// Create a config with custom listener addresses
    pub fn with_addrs(login: SocketAddr, cast: SocketAddr) -> Self {
        Self {
            login_bind: login,
            cast_bind: cast,
            cast_port: cast.port(),
            ..Default::default()
        }
    }

    /// Enable or disable the casting system
    pub fn casting_enabled(mut self, enabled: bool) -> Self {
        self.casting_enabled = enabled;
        self
    }

    /// Set the login listener address
    pub fn login_bind(mut self, addr: SocketAddr) -> Self {
        self.login_bind = addr;
        self
    }

    /// Set the cast listener address
    ///
    /// Also updates the advertised cast port.
    pub fn cast_bind(mut self, addr: SocketAddr) -> Self {
        self.cast_bind = addr;
        self.cast_port = addr.port();
        self
    }

    /// Set the advertised server name
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Set the advertised address
    pub fn server_address(mut self, addr: impl Into<String>) -> Self {
        self.server_address = addr.into();
        self
    }

    /// Set the advertised game port
    pub fn game_port(mut self, port: u16) -> Self {
        self.game_port = port;
        self
    }

    /// Set the message of the day
    pub fn motd(mut self, motd: impl Into<String>, num: u32) -> Self {
        self.motd = motd.into();
        self.motd_num = num;
        self
    }

    /// Set the accepted client version range
    pub fn versions(mut self, min: u16, max: u16, display: impl Into<String>) -> Self {
        self.version_min = min;
        self.version_max = max;
        self.version_str = display.into();
        self
    }

    /// Set the chat burst limit
    pub fn chat_burst_limit(mut self, limit: u8) -> Self {
        self.chat_burst_limit = limit;
        self
    }

    /// Set the chat window reset interval
    pub fn chat_reset_interval(mut self, interval: Duration) -> Self {
        self.chat_reset_interval = interval;
        self
    }

    /// Set the handshake timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the stats log interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }
}
