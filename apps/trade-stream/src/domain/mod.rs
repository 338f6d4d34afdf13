//! Domain Layer - Core trade types and ordering rules.
//!
//! Pure types with no I/O: the decoded trade, the raw cache record, the
//! replay/live sequencing state machine and the retention policy.

/// Stream state tracking (feed connection, replay phase, counters).
pub mod streaming;

/// Replay/live publish ordering.
pub mod sequencing;

/// Cache retention policy.
pub mod retention;

/// Aggregated trade and cache entry types.
pub mod trade;
