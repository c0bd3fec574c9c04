//! nvk-exposure
//!
//! Inter-fund exposure graph with violation detection.
//!
//! Goals:
//! - Slot-indexed outgoing edges per fund (10 slots, last-write-wins)
//! - Self-reference and concentration checks per edge
//! - Cycle detection over the whole graph, filtered by relative severity
//!
//! Detection is read-only and never mutates the graph. Violations are an
//! audit trail for the caller to log or escalate; only the self-loop case
//! can reject a write, and only in strict mode.
//!
//! Deterministic, pure logic. No IO, no wall-clock, no floats.

mod engine;
mod types;

pub use engine::{detect, update_edge};
pub use types::*;
