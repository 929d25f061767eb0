//! Live-cast relay server library
//!
//! A relay that lets spectators watch a player's game session live. A
//! casting player registers a named, optionally password-protected cast;
//! bare unauthenticated clients discover casts through the regular login
//! listing and attach as spectators. Every broadcast-eligible frame the
//! caster's connection emits is mirrored to all attached spectators in
//! write order, and spectators can talk back on a synthetic chat channel
//! under relay-assigned names.
//!
//! ```text
//!   game server ──► Dispatcher ──► CastHub ──► CastRegistry
//!      (embeds)      one queue,     │            (≤ 200 casts)
//!                    one worker     ▼
//!                              CasterSession ──► spectators[] ──► writer tasks
//!
//!   login port ──► account login / cast discovery (one frame each way)
//!   cast port  ──► join handshake ──► spectator read loop
//! ```
//!
//! All relay state lives inside a single worker task; listeners and the
//! embedding game server reach it through the [`Dispatcher`], so every
//! operation runs serialized and the session structures need no locks.
//! Persistence is fire-and-forget: state changes queue SQL statements
//! the embedder drains into its database.
//!
//! # Example
//!
//! ```no_run
//! use std::future::Future;
//! use std::net::IpAddr;
//! use std::sync::Arc;
//!
//! use livecast::server::{Account, CastServer, LoginProvider};
//! use livecast::types::{BanInfo, GameState, PlayerDirectory, PlayerId};
//! use livecast::RelayConfig;
//!
//! struct World;
//!
//! impl PlayerDirectory for World {
//!     fn is_valid(&self, _player: PlayerId) -> bool {
//!         true
//!     }
//!
//!     fn name(&self, _player: PlayerId) -> Option<String> {
//!         Some("Alice".to_string())
//!     }
//! }
//!
//! struct Gate;
//!
//! impl LoginProvider for Gate {
//!     fn game_state(&self) -> GameState {
//!         GameState::Running
//!     }
//!
//!     fn decrypt_handshake(&self, _block: &mut [u8]) -> bool {
//!         true
//!     }
//!
//!     fn derive_token(&self, _secret: &str, _period_index: i64) -> String {
//!         String::new()
//!     }
//!
//!     fn is_ip_banned(&self, _peer: IpAddr) -> impl Future<Output = Option<BanInfo>> + Send {
//!         async { None }
//!     }
//!
//!     fn authenticate(
//!         &self,
//!         _account_name: &str,
//!         _password: &str,
//!     ) -> impl Future<Output = Option<Account>> + Send {
//!         async { Some(Account::default()) }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> livecast::Result<()> {
//!     let (server, mut statements) =
//!         CastServer::new(RelayConfig::default(), Gate, Arc::new(World));
//!
//!     // Drain persistence statements into the database layer
//!     tokio::spawn(async move {
//!         while let Some(statement) = statements.recv().await {
//!             let _ = statement;
//!         }
//!     });
//!
//!     server.run().await
//! }
//! ```
//!
//! The embedding game server drives its casting players through
//! [`CastServer::dispatcher`]: `start_cast` and `stop_cast` on the cast
//! management commands, `caster_write` for every outbound frame, and
//! `on_caster_packet` for every inbound one.

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod persist;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod types;

pub use config::RelayConfig;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use hub::CastHub;
pub use persist::PersistQueue;
pub use registry::{CastOverview, CastRegistry, CAST_CAPACITY};
pub use server::{Account, CastServer, LoginProvider};
pub use session::{SessionHandle, SpectatorSession};
pub use stats::StatsSnapshot;
pub use types::{GameState, PlayerDirectory, PlayerId, SymmetricKey};
