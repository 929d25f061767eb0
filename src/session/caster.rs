//! Caster session state
//!
//! The caster owns the strong references to its spectators; spectators
//! hold only an identity back-reference. Registry membership is the
//! liveness flag: a `CasterSession` exists exactly as long as its cast
//! is active.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use super::handle::SessionHandle;
use super::spectator::SpectatorSession;
use crate::protocol::frames;
use crate::types::PlayerId;

/// A broadcasting player session
pub struct CasterSession {
    owner: PlayerId,
    cast_name: String,
    password: String,
    handle: SessionHandle,
    spectators: Vec<Arc<SpectatorSession>>,
    spectator_seq: u32,
    started_at: Instant,
}

impl CasterSession {
    pub fn new(owner: PlayerId, cast_name: String, password: String, handle: SessionHandle) -> Self {
        Self {
            owner,
            cast_name,
            password,
            handle,
            spectators: Vec::new(),
            spectator_seq: 0,
            started_at: Instant::now(),
        }
    }

    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn cast_name(&self) -> &str {
        &self.cast_name
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Whether joins must supply the password
    pub fn is_protected(&self) -> bool {
        !self.password.is_empty()
    }

    pub fn spectator_count(&self) -> usize {
        self.spectators.len()
    }

    /// Attached spectators in join order
    pub fn spectators(&self) -> &[Arc<SpectatorSession>] {
        &self.spectators
    }

    /// Attach a new spectator
    ///
    /// Assigns the next "Spectator N" name; the sequence only ever
    /// grows, so names stay unique for the cast's lifetime even across
    /// leaves. The join event is broadcast to the whole cast, the new
    /// spectator included.
    pub fn add_spectator(&mut self, handle: SessionHandle) -> Arc<SpectatorSession> {
        self.spectator_seq += 1;
        let name = format!("Spectator {}", self.spectator_seq);

        let spectator = Arc::new(SpectatorSession::new(
            self.spectator_seq,
            name.clone(),
            handle,
            self.owner,
        ));
        self.spectators.push(Arc::clone(&spectator));

        self.broadcast_write(frames::cast_channel_join(&name), true);

        spectator
    }

    /// Detach a spectator; true if it was attached here
    ///
    /// Clears the back-reference and releases the strong edge. Removing
    /// a spectator that is not attached is a no-op.
    pub fn remove_spectator(&mut self, spectator: &Arc<SpectatorSession>) -> bool {
        let Some(pos) = self
            .spectators
            .iter()
            .position(|s| Arc::ptr_eq(s, spectator))
        else {
            return false;
        };

        let removed = self.spectators.remove(pos);
        removed.detach();
        true
    }

    /// Case-insensitive lookup by assigned name
    pub fn find_spectator(&self, name: &str) -> Option<&Arc<SpectatorSession>> {
        self.spectators
            .iter()
            .find(|s| s.assigned_name().eq_ignore_ascii_case(name))
    }

    /// Queue a payload on the caster, mirroring it to every spectator
    /// when `broadcast` is set
    ///
    /// Every target receives the same `Bytes`; fan-out clones the
    /// reference count, never the payload.
    pub fn broadcast_write(&self, payload: Bytes, broadcast: bool) {
        self.handle.write(payload.clone());

        if !broadcast {
            return;
        }
        for spectator in &self.spectators {
            spectator.handle().write(payload.clone());
        }
    }

    /// Detach every spectator at once, returning them in join order
    pub fn detach_all(&mut self) -> Vec<Arc<SpectatorSession>> {
        let spectators = std::mem::take(&mut self.spectators);
        for spectator in &spectators {
            spectator.detach();
        }
        spectators
    }
}

impl std::fmt::Debug for CasterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasterSession")
            .field("owner", &self.owner)
            .field("cast_name", &self.cast_name)
            .field("protected", &self.is_protected())
            .field("spectators", &self.spectators.len())
            .finish()
    }
}
