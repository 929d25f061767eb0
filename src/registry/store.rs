//! Live-cast registry
//!
//! The central directory of active casts, keyed by the broadcasting
//! player. It is a plain owned structure: the hub holds it, and only
//! dispatcher jobs ever touch it, so there is no interior locking.
//! Persistence side effects belong to the call sites; the directory
//! itself is pure bookkeeping.

use std::collections::BTreeMap;

use super::error::RegistryError;
use crate::session::CasterSession;
use crate::types::PlayerId;

/// Hard limit on simultaneously active casts
pub const CAST_CAPACITY: usize = 200;

/// Directory of all active casts
#[derive(Debug, Default)]
pub struct CastRegistry {
    casts: BTreeMap<PlayerId, CasterSession>,
}

/// One row of the public cast listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastOverview {
    pub owner: PlayerId,
    pub cast_name: String,
    pub spectators: usize,
}

impl CastRegistry {
    pub fn new() -> Self {
        Self {
            casts: BTreeMap::new(),
        }
    }

    /// Number of active casts
    pub fn len(&self) -> usize {
        self.casts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.casts.is_empty()
    }

    /// Whether the player has an active cast
    pub fn contains(&self, owner: PlayerId) -> bool {
        self.casts.contains_key(&owner)
    }

    /// Add a cast to the directory
    ///
    /// Rejected when the owner already casts or the registry is full;
    /// the rejected session is simply dropped, which has no observable
    /// side effects.
    pub fn register(&mut self, cast: CasterSession) -> Result<(), RegistryError> {
        let owner = cast.owner();

        if self.casts.contains_key(&owner) {
            return Err(RegistryError::AlreadyActive(owner));
        }
        if self.casts.len() >= CAST_CAPACITY {
            return Err(RegistryError::CapacityExceeded(self.casts.len()));
        }

        tracing::info!(
            owner = %owner,
            cast = %cast.cast_name(),
            protected = cast.is_protected(),
            "Cast registered"
        );
        self.casts.insert(owner, cast);
        Ok(())
    }

    /// Remove a cast, returning the session for teardown
    pub fn unregister(&mut self, owner: PlayerId) -> Option<CasterSession> {
        let cast = self.casts.remove(&owner);
        if let Some(ref cast) = cast {
            tracing::info!(
                owner = %owner,
                cast = %cast.cast_name(),
                spectators = cast.spectator_count(),
                "Cast unregistered"
            );
        }
        cast
    }

    pub fn get(&self, owner: PlayerId) -> Option<&CasterSession> {
        self.casts.get(&owner)
    }

    pub fn get_mut(&mut self, owner: PlayerId) -> Option<&mut CasterSession> {
        self.casts.get_mut(&owner)
    }

    /// Find an active cast by name, ignoring ASCII case
    pub fn resolve(&self, cast_name: &str) -> Option<PlayerId> {
        self.casts
            .values()
            .find(|cast| cast.cast_name().eq_ignore_ascii_case(cast_name))
            .map(|cast| cast.owner())
    }

    /// All active casts in owner order
    pub fn values(&self) -> impl Iterator<Item = &CasterSession> {
        self.casts.values()
    }

    /// Public cast listing
    ///
    /// A non-empty filter selects password-protected casts with exactly
    /// that password; an empty filter selects unprotected casts only.
    /// Sorted by spectator count, busiest first; ties keep owner order.
    pub fn list(&self, password_filter: &str) -> Vec<CastOverview> {
        let mut listing: Vec<CastOverview> = self
            .casts
            .values()
            .filter(|cast| {
                if password_filter.is_empty() {
                    !cast.is_protected()
                } else {
                    cast.is_protected() && cast.password() == password_filter
                }
            })
            .map(|cast| CastOverview {
                owner: cast.owner(),
                cast_name: cast.cast_name().to_string(),
                spectators: cast.spectator_count(),
            })
            .collect();

        // Stable, so equal counts preserve the BTreeMap's owner order
        listing.sort_by(|a, b| b.spectators.cmp(&a.spectators));
        listing
    }
}
