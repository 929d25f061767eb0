//! Relay statistics

/// Counters accumulated by the relay hub
///
/// Plain fields; the hub is the only writer and it runs serialized, so
/// no atomics are needed here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Casts started successfully
    pub casts_started: u64,
    /// Casts stopped (explicitly or by teardown)
    pub casts_stopped: u64,
    /// Spectators that completed a join
    pub spectators_joined: u64,
    /// Spectators detached (leave, disconnect or cast stop)
    pub spectators_left: u64,
    /// Broadcast payloads mirrored to spectators
    pub frames_mirrored: u64,
    /// Chat lines relayed to casts
    pub chat_relayed: u64,
    /// Chat lines dropped by the burst window
    pub chat_throttled: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze the counters together with the current occupancy
    pub fn snapshot(&self, active_casts: usize, active_spectators: usize) -> StatsSnapshot {
        StatsSnapshot {
            active_casts,
            active_spectators,
            casts_started: self.casts_started,
            casts_stopped: self.casts_stopped,
            spectators_joined: self.spectators_joined,
            spectators_left: self.spectators_left,
            frames_mirrored: self.frames_mirrored,
            chat_relayed: self.chat_relayed,
            chat_throttled: self.chat_throttled,
        }
    }
}

/// Point-in-time view of the relay counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub active_casts: usize,
    pub active_spectators: usize,
    pub casts_started: u64,
    pub casts_stopped: u64,
    pub spectators_joined: u64,
    pub spectators_left: u64,
    pub frames_mirrored: u64,
    pub chat_relayed: u64,
    pub chat_throttled: u64,
}
