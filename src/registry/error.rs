//! Registry error types

use thiserror::Error;

use crate::types::PlayerId;

/// Error type for registry operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Registry is at the live-cast limit
    #[error("live cast limit reached ({0} active)")]
    CapacityExceeded(usize),

    /// Player already has an active cast
    #[error("player {0} is already casting")]
    AlreadyActive(PlayerId),
}
