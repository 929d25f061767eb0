//! Relay orchestration state
//!
//! `CastHub` is the single-owner home of everything the relay mutates:
//! the cast registry, the persistence queue and the counters. It runs
//! inside a [`Dispatcher`](crate::dispatcher::Dispatcher), so every
//! operation here executes serialized with respect to every other one.
//! Nothing in this module performs I/O; writes are queued on session
//! handles and happen elsewhere.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::config::RelayConfig;
use crate::error::CastError;
use crate::persist::PersistQueue;
use crate::protocol::frames;
use crate::registry::{CastOverview, CastRegistry};
use crate::session::{CasterSession, SessionHandle, SpectatorSession};
use crate::stats::{RelayStats, StatsSnapshot};
use crate::types::{PlayerDirectory, PlayerId};

/// Dispatcher-owned relay state
pub struct CastHub {
    config: Arc<RelayConfig>,
    players: Arc<dyn PlayerDirectory>,
    registry: CastRegistry,
    persist: PersistQueue,
    stats: RelayStats,
}

impl CastHub {
    pub fn new(
        config: Arc<RelayConfig>,
        players: Arc<dyn PlayerDirectory>,
        persist: PersistQueue,
    ) -> Self {
        Self {
            config,
            players,
            registry: CastRegistry::new(),
            persist,
            stats: RelayStats::new(),
        }
    }

    pub fn registry(&self) -> &CastRegistry {
        &self.registry
    }

    /// Begin casting for `owner`
    ///
    /// Fails without side effects if casting is disabled, the owner
    /// already casts, the owner is gone from the world, the connection
    /// is closed, or the registry is full. On success the cast chat
    /// channel opens on the caster's own connection and the insert row
    /// is queued.
    pub fn start_cast(
        &mut self,
        owner: PlayerId,
        handle: SessionHandle,
        password: String,
    ) -> Result<(), CastError> {
        if !self.config.casting_enabled {
            return Err(CastError::Disabled);
        }
        if self.registry.contains(owner) {
            return Err(CastError::AlreadyActive);
        }
        if !self.players.is_valid(owner) {
            return Err(CastError::CasterUnavailable);
        }
        if !handle.is_open() {
            return Err(CastError::CasterUnavailable);
        }
        let Some(cast_name) = self.players.name(owner) else {
            return Err(CastError::CasterUnavailable);
        };

        let caster_handle = handle.clone();
        let cast = CasterSession::new(owner, cast_name.clone(), password, handle);
        let protected = cast.is_protected();

        self.registry.register(cast)?;
        self.persist.cast_started(owner, &cast_name, protected);
        caster_handle.write(frames::cast_channel_open());

        self.stats.casts_started += 1;
        Ok(())
    }

    /// Stop `owner`'s cast; true if one was active
    ///
    /// Detaches and disconnects every spectator. The delete row is only
    /// queued while the owner is still resolvable; a cast torn down
    /// after its player vanished keeps the row for the next bootstrap
    /// cleanup.
    pub fn stop_cast(&mut self, owner: PlayerId) -> bool {
        let Some(mut cast) = self.registry.unregister(owner) else {
            return false;
        };

        let spectators = cast.detach_all();
        let detached = spectators.len();
        for spectator in spectators {
            spectator.handle().disconnect();
        }

        if self.players.name(owner).is_some() {
            self.persist.cast_stopped(owner);
        }

        self.stats.casts_stopped += 1;
        self.stats.spectators_left += detached as u64;
        tracing::info!(owner = %owner, spectators = detached, "Cast stopped");
        true
    }

    /// Attach a viewer to a cast
    ///
    /// Resolves the cast by name; protected casts require the exact
    /// password, unprotected casts ignore whatever was supplied.
    pub fn join_cast(
        &mut self,
        cast_name: &str,
        password: &str,
        handle: SessionHandle,
    ) -> Result<Arc<SpectatorSession>, CastError> {
        if !self.config.casting_enabled {
            return Err(CastError::Disabled);
        }

        let owner = self.registry.resolve(cast_name).ok_or(CastError::NotFound)?;
        let Some(cast) = self.registry.get_mut(owner) else {
            return Err(CastError::NotFound);
        };

        if cast.is_protected() && cast.password() != password {
            return Err(CastError::AuthFailed);
        }

        let spectator = cast.add_spectator(handle);
        let count = cast.spectator_count();
        let (name, protected) = (cast.cast_name().to_string(), cast.is_protected());
        self.persist.cast_updated(owner, &name, protected, count);

        self.stats.spectators_joined += 1;
        tracing::info!(
            owner = %owner,
            spectator = %spectator.assigned_name(),
            spectators = count,
            "Spectator joined"
        );
        Ok(spectator)
    }

    /// Detach a spectator from its cast; true if it was attached
    ///
    /// Covers explicit leave and connection teardown alike; calling it
    /// for an already-detached spectator is a no-op.
    pub fn leave_cast(&mut self, spectator: &Arc<SpectatorSession>) -> bool {
        let Some(owner) = spectator.caster() else {
            return false;
        };
        let Some(cast) = self.registry.get_mut(owner) else {
            return false;
        };
        if !cast.remove_spectator(spectator) {
            return false;
        }

        let count = cast.spectator_count();
        let (name, protected) = (cast.cast_name().to_string(), cast.is_protected());
        self.persist.cast_updated(owner, &name, protected, count);

        self.stats.spectators_left += 1;
        tracing::info!(
            owner = %owner,
            spectator = %spectator.assigned_name(),
            spectators = count,
            "Spectator left"
        );
        true
    }

    /// Relay a chat line from a spectator to its whole cast
    ///
    /// Returns false when the spectator is detached or its burst window
    /// is exhausted; the line is dropped in that case.
    pub fn spectator_chat(&mut self, spectator: &Arc<SpectatorSession>, text: &str) -> bool {
        let Some(owner) = spectator.caster() else {
            return false;
        };
        let Some(cast) = self.registry.get(owner) else {
            return false;
        };

        if !spectator.note_chat(self.config.chat_burst_limit, unix_millis()) {
            self.stats.chat_throttled += 1;
            tracing::debug!(
                spectator = %spectator.assigned_name(),
                "Chat throttled"
            );
            return false;
        }

        let frame = frames::cast_channel_message(spectator.assigned_name(), text);
        cast.broadcast_write(frame, true);

        self.stats.chat_relayed += 1;
        true
    }

    /// Queue a caster-origin payload, mirroring it when `broadcast` is set
    ///
    /// Returns false when the owner has no active cast; the payload is
    /// not queued anywhere in that case and the caller owns the direct
    /// write path.
    pub fn caster_write(&mut self, owner: PlayerId, payload: Bytes, broadcast: bool) -> bool {
        let Some(cast) = self.registry.get(owner) else {
            return false;
        };

        cast.broadcast_write(payload, broadcast);
        if broadcast {
            self.stats.frames_mirrored += 1;
        }
        true
    }

    /// Guard run for every inbound caster packet
    ///
    /// A cast whose player left the world or died force-stops before the
    /// packet is processed further. Returns false if the cast was
    /// stopped here.
    pub fn on_caster_packet(&mut self, owner: PlayerId) -> bool {
        if !self.registry.contains(owner) {
            return true;
        }
        if self.players.is_valid(owner) {
            return true;
        }

        tracing::info!(owner = %owner, "Caster no longer valid, stopping cast");
        self.stop_cast(owner);
        false
    }

    /// Reset every spectator's chat burst window
    pub fn reset_chat_windows(&mut self) {
        for cast in self.registry.values() {
            for spectator in cast.spectators() {
                spectator.reset_chat_window();
            }
        }
    }

    /// Cast listing for the discovery flow
    pub fn list_casts(&self, password_filter: &str) -> Vec<CastOverview> {
        self.registry.list(password_filter)
    }

    /// Counters plus current occupancy
    pub fn snapshot_stats(&self) -> StatsSnapshot {
        let spectators = self
            .registry
            .values()
            .map(|cast| cast.spectator_count())
            .sum();
        self.stats.snapshot(self.registry.len(), spectators)
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionCommand;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};

    #[derive(Default)]
    struct TestPlayers {
        names: Mutex<HashMap<u32, String>>,
        invalid: Mutex<Vec<u32>>,
    }

    impl TestPlayers {
        fn add(&self, id: u32, name: &str) {
            self.names.lock().unwrap().insert(id, name.to_string());
        }

        fn invalidate(&self, id: u32) {
            self.invalid.lock().unwrap().push(id);
        }
    }

    impl PlayerDirectory for TestPlayers {
        fn is_valid(&self, player: PlayerId) -> bool {
            self.names.lock().unwrap().contains_key(&player.0)
                && !self.invalid.lock().unwrap().contains(&player.0)
        }

        fn name(&self, player: PlayerId) -> Option<String> {
            self.names.lock().unwrap().get(&player.0).cloned()
        }
    }

    struct Fixture {
        hub: CastHub,
        players: Arc<TestPlayers>,
        statements: UnboundedReceiver<String>,
    }

    fn fixture() -> Fixture {
        fixture_with(RelayConfig::default())
    }

    fn fixture_with(config: RelayConfig) -> Fixture {
        let players = Arc::new(TestPlayers::default());
        let (persist, statements) = PersistQueue::new();
        let hub = CastHub::new(
            Arc::new(config),
            Arc::clone(&players) as Arc<dyn PlayerDirectory>,
            persist,
        );
        Fixture {
            hub,
            players,
            statements,
        }
    }

    fn handle(id: u64) -> (SessionHandle, UnboundedReceiver<SessionCommand>) {
        SessionHandle::new(id, "127.0.0.1:0".parse().unwrap())
    }

    fn writes(rx: &mut UnboundedReceiver<SessionCommand>) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Ok(command) = rx.try_recv() {
            if let SessionCommand::Write(payload) = command {
                frames.push(payload);
            }
        }
        frames
    }

    fn saw_disconnect(rx: &mut UnboundedReceiver<SessionCommand>) -> bool {
        loop {
            match rx.try_recv() {
                Ok(SessionCommand::Disconnect) => return true,
                Ok(_) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    #[test]
    fn test_start_cast_opens_channel_and_persists() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");
        let (caster, mut caster_rx) = handle(1);

        fx.hub.start_cast(PlayerId(1), caster, String::new()).unwrap();

        assert!(fx.hub.registry().contains(PlayerId(1)));
        assert_eq!(writes(&mut caster_rx).len(), 1); // channel open
        assert!(fx.statements.try_recv().unwrap().starts_with("INSERT"));
    }

    #[test]
    fn test_start_cast_rejections() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");

        // Unknown player
        let (h, _rx) = handle(9);
        assert_eq!(
            fx.hub.start_cast(PlayerId(9), h, String::new()),
            Err(CastError::CasterUnavailable)
        );

        // Closed connection
        let (h, rx) = handle(1);
        drop(rx);
        assert_eq!(
            fx.hub.start_cast(PlayerId(1), h, String::new()),
            Err(CastError::CasterUnavailable)
        );

        // Double start
        let (h, _rx) = handle(1);
        fx.hub.start_cast(PlayerId(1), h, String::new()).unwrap();
        let (h2, _rx2) = handle(1);
        assert_eq!(
            fx.hub.start_cast(PlayerId(1), h2, String::new()),
            Err(CastError::AlreadyActive)
        );

        // No side effects from the failures: one insert only
        assert!(fx.statements.try_recv().unwrap().starts_with("INSERT"));
        assert!(fx.statements.try_recv().is_err());
    }

    #[test]
    fn test_start_cast_disabled() {
        let mut fx = fixture_with(RelayConfig::default().casting_enabled(false));
        fx.players.add(1, "Alice");
        let (h, _rx) = handle(1);

        assert_eq!(
            fx.hub.start_cast(PlayerId(1), h, String::new()),
            Err(CastError::Disabled)
        );
    }

    #[test]
    fn test_join_leave_updates_row() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");
        let (caster, _caster_rx) = handle(1);
        fx.hub.start_cast(PlayerId(1), caster, String::new()).unwrap();
        fx.statements.try_recv().unwrap(); // insert

        let (viewer, _viewer_rx) = handle(2);
        let spectator = fx.hub.join_cast("alice", "", viewer).unwrap();
        assert_eq!(spectator.assigned_name(), "Spectator 1");
        let update = fx.statements.try_recv().unwrap();
        assert!(update.contains("`spectators`=1"), "{update}");

        assert!(fx.hub.leave_cast(&spectator));
        let update = fx.statements.try_recv().unwrap();
        assert!(update.contains("`spectators`=0"), "{update}");

        // Second leave is benign
        assert!(!fx.hub.leave_cast(&spectator));
    }

    #[test]
    fn test_join_password_rules() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");
        fx.players.add(2, "Bob");
        let (h1, _rx1) = handle(1);
        fx.hub.start_cast(PlayerId(1), h1, "secret".into()).unwrap();
        let (h2, _rx2) = handle(2);
        fx.hub.start_cast(PlayerId(2), h2, String::new()).unwrap();

        let (v, _vrx) = handle(10);
        assert_eq!(
            fx.hub.join_cast("Alice", "wrong", v).err(),
            Some(CastError::AuthFailed)
        );

        let (v, _vrx) = handle(11);
        assert!(fx.hub.join_cast("Alice", "secret", v).is_ok());

        // Unprotected casts ignore a supplied password
        let (v, _vrx) = handle(12);
        assert!(fx.hub.join_cast("Bob", "whatever", v).is_ok());

        let (v, _vrx) = handle(13);
        assert_eq!(
            fx.hub.join_cast("Nobody", "", v).err(),
            Some(CastError::NotFound)
        );
    }

    #[test]
    fn test_stop_cast_disconnects_spectators() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");
        let (caster, _caster_rx) = handle(1);
        fx.hub.start_cast(PlayerId(1), caster, String::new()).unwrap();

        let (v1, mut v1_rx) = handle(2);
        let (v2, mut v2_rx) = handle(3);
        let s1 = fx.hub.join_cast("Alice", "", v1).unwrap();
        fx.hub.join_cast("Alice", "", v2).unwrap();

        assert!(fx.hub.stop_cast(PlayerId(1)));
        assert!(!fx.hub.registry().contains(PlayerId(1)));
        assert_eq!(s1.caster(), None);
        assert!(saw_disconnect(&mut v1_rx));
        assert!(saw_disconnect(&mut v2_rx));

        // Stopping again is a no-op
        assert!(!fx.hub.stop_cast(PlayerId(1)));
    }

    #[test]
    fn test_stop_cast_skips_delete_for_vanished_owner() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");
        let (caster, _caster_rx) = handle(1);
        fx.hub.start_cast(PlayerId(1), caster, String::new()).unwrap();
        fx.statements.try_recv().unwrap(); // insert

        fx.players.names.lock().unwrap().remove(&1);
        assert!(fx.hub.stop_cast(PlayerId(1)));
        assert!(fx.statements.try_recv().is_err());
    }

    #[test]
    fn test_chat_relays_to_everyone_with_assigned_name() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");
        let (caster, mut caster_rx) = handle(1);
        fx.hub.start_cast(PlayerId(1), caster, String::new()).unwrap();

        let (v1, mut v1_rx) = handle(2);
        let (v2, mut v2_rx) = handle(3);
        let speaker = fx.hub.join_cast("Alice", "", v1).unwrap();
        fx.hub.join_cast("Alice", "", v2).unwrap();

        writes(&mut caster_rx);
        writes(&mut v1_rx);
        writes(&mut v2_rx);

        assert!(fx.hub.spectator_chat(&speaker, "hello"));

        let to_caster = writes(&mut caster_rx);
        let to_v1 = writes(&mut v1_rx);
        let to_v2 = writes(&mut v2_rx);
        assert_eq!(to_caster.len(), 1);
        assert_eq!(to_caster, to_v1);
        assert_eq!(to_caster, to_v2);
        assert!(to_caster[0].windows(11).any(|w| w == b"Spectator 1"));
    }

    #[test]
    fn test_chat_throttling_and_reset() {
        let mut fx = fixture_with(RelayConfig::default().chat_burst_limit(1));
        fx.players.add(1, "Alice");
        let (caster, _caster_rx) = handle(1);
        fx.hub.start_cast(PlayerId(1), caster, String::new()).unwrap();
        let (v, _vrx) = handle(2);
        let speaker = fx.hub.join_cast("Alice", "", v).unwrap();

        assert!(fx.hub.spectator_chat(&speaker, "one"));
        assert!(!fx.hub.spectator_chat(&speaker, "two"));

        fx.hub.reset_chat_windows();
        assert!(fx.hub.spectator_chat(&speaker, "three"));

        let snapshot = fx.hub.snapshot_stats();
        assert_eq!(snapshot.chat_relayed, 2);
        assert_eq!(snapshot.chat_throttled, 1);
    }

    #[test]
    fn test_caster_write_respects_broadcast_flag() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");
        let (caster, mut caster_rx) = handle(1);
        fx.hub.start_cast(PlayerId(1), caster, String::new()).unwrap();
        let (v, mut vrx) = handle(2);
        fx.hub.join_cast("Alice", "", v).unwrap();
        writes(&mut caster_rx);
        writes(&mut vrx);

        assert!(fx.hub.caster_write(PlayerId(1), Bytes::from_static(b"all"), true));
        assert!(fx.hub.caster_write(PlayerId(1), Bytes::from_static(b"own"), false));

        assert_eq!(writes(&mut caster_rx).len(), 2);
        assert_eq!(writes(&mut vrx).len(), 1);

        // No active cast: nothing queued anywhere
        assert!(!fx.hub.caster_write(PlayerId(9), Bytes::from_static(b"x"), true));
    }

    #[test]
    fn test_invalid_caster_force_stops_on_packet() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");
        let (caster, _caster_rx) = handle(1);
        fx.hub.start_cast(PlayerId(1), caster, String::new()).unwrap();

        assert!(fx.hub.on_caster_packet(PlayerId(1)));

        fx.players.invalidate(1);
        assert!(!fx.hub.on_caster_packet(PlayerId(1)));
        assert!(!fx.hub.registry().contains(PlayerId(1)));

        // Not casting at all passes the guard
        assert!(fx.hub.on_caster_packet(PlayerId(1)));
    }

    #[test]
    fn test_snapshot_occupancy() {
        let mut fx = fixture();
        fx.players.add(1, "Alice");
        let (caster, _caster_rx) = handle(1);
        fx.hub.start_cast(PlayerId(1), caster, String::new()).unwrap();
        let (v, _vrx) = handle(2);
        fx.hub.join_cast("Alice", "", v).unwrap();

        let snapshot = fx.hub.snapshot_stats();
        assert_eq!(snapshot.active_casts, 1);
        assert_eq!(snapshot.active_spectators, 1);
        assert_eq!(snapshot.casts_started, 1);
        assert_eq!(snapshot.spectators_joined, 1);
    }
}
