//! Live-cast registry
//!
//! The directory of every active cast, keyed by the broadcasting
//! player. An entry exists exactly while the cast is live; there is no
//! idle or grace state to track.
//!
//! ```text
//!                        CastRegistry
//!                ┌──────────────────────────┐
//!                │ casts: BTreeMap<         │
//!                │   PlayerId,              │
//!                │   CasterSession {        │
//!                │     spectators: Vec<Arc> │
//!                │   }                      │
//!                │ >          (cap 200)     │
//!                └──────────┬───────────────┘
//!                           │ resolve(name) / list(filter)
//!                           ▼
//!                   login discovery, joins
//! ```

pub mod error;
pub mod store;

pub use error::RegistryError;
pub use store::{CastOverview, CastRegistry, CAST_CAPACITY};
