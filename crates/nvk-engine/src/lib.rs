//! nvk-engine
//!
//! The NAV pipeline orchestrator.
//!
//! Invariants:
//! - Fixed pipeline order: validation, computation, commitment, drift check,
//!   state writes, exposure detection. No stage is skipped or reordered;
//!   each stage's output gates the next.
//! - Atomic operations: every fallible stage runs before the first store
//!   write, so a failed operation leaves no partial state. The only
//!   mutations that survive a failure are the two sticky latches (drift
//!   breaker, emergency) and the pending event buffer.
//! - No ambient state: the engine owns an explicit [`EngineStore`]; callers
//!   serialize operations (`&mut self`), matching the serialized execution
//!   model of the settlement substrate underneath.
//! - Capabilities are external: authorization is a yes/no question put to
//!   an injected [`Authorizer`]. The engine never stores roles.
//!
//! ```text
//! caller
//!   └─► NavEngine::compute_and_commit_nav(actor, fund, inputs, now)
//!          ├── emergency latch clear        → EmergencyActive
//!          ├── Authorizer: Oracle           → Unauthorized
//!          ├── fund breaker latch clear     → ExcessiveDrift
//!          ├── nvk-valuation::compute       → InputValidation / PriceNotFound
//!          ├── nvk-commitment + ProofBackend
//!          ├── nvk-drift::evaluate          → ExcessiveDrift (trip, latch)
//!          ├── writes: ring entry, NavRecord, current NAV, anchor pair
//!          └── nvk-exposure::detect         → soft findings + events
//! ```

mod engine;
mod store;
mod types;

pub use engine::NavEngine;
pub use store::{EngineStore, FundState};
pub use types::*;

// Config structs of the stage crates, re-exported so callers can build an
// [`EngineConfig`] without depending on each stage crate.
pub use nvk_anchor::AnchorConfig;
pub use nvk_drift::DriftConfig;
pub use nvk_exposure::ExposureConfig;
pub use nvk_valuation::ValuationConfig;
