//! nvk-drift
//!
//! Bounded drift-enforcement ledger for published NAV values.
//!
//! Goals:
//! - Drift in basis points between consecutive epochs
//! - Consecutive-violation streak with a sticky circuit breaker
//! - Fixed 100-slot ring of per-epoch entries (index = epoch mod window)
//! - History queries bounded by the ring (longer retention is the audit
//!   log's job)
//!
//! Deterministic, pure logic. No IO, no wall-clock. The decision step is
//! read-only so a caller can fail atomically before any write; `admit`
//! applies the writes for an accepted epoch.

mod engine;
mod types;

pub use engine::{admit, drift_bps, evaluate, history, reset, trip};
pub use types::*;
