//! Spectator session state
//!
//! A spectator is shared between its owning caster (the strong edge)
//! and the connection driver. Mutable state is atomic; the structure
//! itself never needs a lock, and the hub only touches it from the
//! serialized worker.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};

use super::handle::SessionHandle;
use crate::types::PlayerId;

/// A viewer attached to a live cast
pub struct SpectatorSession {
    assigned_name: String,
    assigned_id: u32,
    handle: SessionHandle,
    cast_owner: PlayerId,
    attached: AtomicBool,
    messages_sent: AtomicU8,
    last_speak: AtomicI64,
}

impl SpectatorSession {
    pub(crate) fn new(
        assigned_id: u32,
        assigned_name: String,
        handle: SessionHandle,
        cast_owner: PlayerId,
    ) -> Self {
        Self {
            assigned_name,
            assigned_id,
            handle,
            cast_owner,
            attached: AtomicBool::new(true),
            messages_sent: AtomicU8::new(0),
            last_speak: AtomicI64::new(0),
        }
    }

    /// Name assigned at join time ("Spectator N")
    pub fn assigned_name(&self) -> &str {
        &self.assigned_name
    }

    /// Sequence number assigned at join time; never reused within a cast
    pub fn assigned_id(&self) -> u32 {
        self.assigned_id
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Owner of the cast this spectator belongs to, while attached
    ///
    /// The back-reference is identity-based, so a detached spectator can
    /// never reach a stale caster.
    pub fn caster(&self) -> Option<PlayerId> {
        self.attached
            .load(Ordering::Acquire)
            .then_some(self.cast_owner)
    }

    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    /// Record one chat message against the burst window
    ///
    /// Returns false once `limit` messages have been sent; the counter
    /// only moves again after [`reset_chat_window`](Self::reset_chat_window).
    pub fn note_chat(&self, limit: u8, now_millis: i64) -> bool {
        if self.messages_sent.load(Ordering::Acquire) >= limit {
            return false;
        }
        self.messages_sent.fetch_add(1, Ordering::AcqRel);
        self.last_speak.store(now_millis, Ordering::Release);
        true
    }

    /// Clear the burst window
    pub fn reset_chat_window(&self) {
        self.messages_sent.store(0, Ordering::Release);
    }

    /// Unix-millis timestamp of the last relayed chat line
    pub fn last_speak(&self) -> i64 {
        self.last_speak.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SpectatorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectatorSession")
            .field("name", &self.assigned_name)
            .field("id", &self.assigned_id)
            .field("caster", &self.caster())
            .finish()
    }
}
