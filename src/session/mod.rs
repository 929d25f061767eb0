//! Caster and spectator sessions
//!
//! A cast is one caster session fanning out to many spectator sessions:
//!
//! ```text
//!                      CasterSession
//!                ┌──────────────────────┐
//!   game output ─► broadcast_write()    │
//!                │   ├─ caster handle   │──► writer task ──► TCP
//!                │   └─ spectators[]    │
//!                └──────┬───────┬───────┘
//!                       │ Arc   │ Arc
//!                       ▼       ▼
//!              SpectatorSession SpectatorSession
//!                handle ──► writer ──► TCP
//! ```
//!
//! Ownership runs one way: the caster holds `Arc` edges to its
//! spectators, each spectator holds only the owner's id plus an
//! `attached` flag. Session behaviors are compositions over
//! [`SessionHandle`]; there is no session inheritance anywhere.

pub mod caster;
pub mod handle;
pub mod spectator;

pub use caster::CasterSession;
pub use handle::{run_session_writer, FrameSeal, SessionCommand, SessionHandle};
pub use spectator::SpectatorSession;
