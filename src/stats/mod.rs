//! Relay statistics
//!
//! Counter types only; the server logs a snapshot line on an interval.

pub mod metrics;

pub use metrics::{RelayStats, StatsSnapshot};
