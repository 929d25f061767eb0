//! Fire-and-forget persistence queue
//!
//! Cast lifecycle changes are mirrored into a `live_casts` table owned
//! by an external storage layer. The relay only ever enqueues textual
//! statements; it never waits for, observes, or reacts to their
//! execution. A failed enqueue is logged and forgotten.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::types::PlayerId;

/// Queue of persistence statements for the external storage layer
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::UnboundedSender<String>,
    cleaned: Arc<AtomicBool>,
}

impl PersistQueue {
    /// Create the queue; the receiver belongs to the storage layer
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            tx,
            cleaned: Arc::new(AtomicBool::new(false)),
        };
        (queue, rx)
    }

    /// Remove any rows left over from a previous run
    ///
    /// Runs at most once per queue, before the first cast can register.
    pub fn bootstrap_cleanup(&self) {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Clearing stale live-cast rows");
        self.push("DELETE FROM `live_casts`;".to_string());
    }

    /// Row for a newly started cast
    pub fn cast_started(&self, owner: PlayerId, cast_name: &str, protected: bool) {
        self.push(format!(
            "INSERT INTO `live_casts` (`player_id`, `cast_name`, `password`) \
             VALUES ({}, {}, {});",
            owner,
            escape(cast_name),
            protected as u8,
        ));
    }

    /// Refresh a cast's row after spectator or password changes
    pub fn cast_updated(&self, owner: PlayerId, cast_name: &str, protected: bool, spectators: usize) {
        self.push(format!(
            "UPDATE `live_casts` SET `cast_name`={}, `password`={}, `spectators`={} \
             WHERE `player_id`={};",
            escape(cast_name),
            protected as u8,
            spectators,
            owner,
        ));
    }

    /// Drop the row for a stopped cast
    pub fn cast_stopped(&self, owner: PlayerId) {
        self.push(format!(
            "DELETE FROM `live_casts` WHERE `player_id`={};",
            owner
        ));
    }

    fn push(&self, statement: String) {
        if self.tx.send(statement).is_err() {
            tracing::warn!("Storage queue gone, statement dropped");
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}
