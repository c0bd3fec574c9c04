//! nvk-anchor
//!
//! Cross-anchor publication registry.
//!
//! Goals:
//! - One record per anchor target, last write wins
//! - Consistency means no disagreement among the targets that reported;
//!   silent targets never block
//! - Divergence is reported, never rolled back
//!
//! The registry also carries the pair each epoch is expected to confirm,
//! registered by whoever computed it, pruned to a short epoch window.
//!
//! Deterministic, pure logic. No IO, no wall-clock.

mod engine;
mod types;

pub use engine::{anchor_status, expect, record, verify_consistency};
pub use types::*;
