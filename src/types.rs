//! Core identity and world types
//!
//! Small data carriers shared across the crate, plus the directory trait
//! through which the relay asks the game world about players.

/// Identity of a player within the game world
///
/// Also the key of the live-cast registry: one player owns at most one
/// cast.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub u32);

impl PlayerId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PlayerId({})", self.0)
    }
}

/// Four-word symmetric key established during the handshake
///
/// The relay only carries the key between the handshake and the frame
/// seal; the cipher itself lives behind the login provider.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SymmetricKey([u32; 4]);

impl SymmetricKey {
    pub const fn new(words: [u32; 4]) -> Self {
        Self(words)
    }

    pub const fn words(&self) -> &[u32; 4] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    // Key material stays out of logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey(..)")
    }
}

/// Lifecycle state of the game world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Startup,
    Running,
    Maintenance,
    Shutdown,
}

/// Active ban record for a peer address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanInfo {
    /// Unix timestamp at which the ban expires
    pub expires_at: i64,
    /// Reason text; empty means unspecified
    pub reason: String,
    /// Name of the banning party
    pub banned_by: String,
}

/// Game-world view of players, as the relay needs it
///
/// Object safe so the hub can hold it as `Arc<dyn PlayerDirectory>`.
/// Implementations must answer from already-loaded state; these are
/// called from the serialized relay worker.
pub trait PlayerDirectory: Send + Sync {
    /// Whether the player is present in the world and able to cast
    fn is_valid(&self, player: PlayerId) -> bool;

    /// The player's display name
    fn name(&self, player: PlayerId) -> Option<String>;
}
