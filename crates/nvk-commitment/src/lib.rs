//! nvk-commitment
//!
//! Binds a published NAV value to the exact input set it was derived from.
//!
//! Goals:
//! - Domain-separated SHA-256 commitment: NAV value + one sub-digest per
//!   input category (holdings, prices, liabilities) + a scheme tag
//! - Order-sensitive folds: elements are hashed in array order, so callers
//!   must submit inputs in canonical call order (reordering the same logical
//!   set yields a different commitment; this is contractual, not a bug)
//! - `ProofBackend` trait boundary so a real proof system can replace the
//!   deterministic hash backend without touching engine logic
//!
//! Pure and deterministic. No IO, no wall-clock.

mod backend;
mod digest;

pub use backend::{HashProofBackend, ProofBackend, ProofError, MIN_PROOF_LEN};
pub use digest::{
    commit, commit_from_public, holdings_digest, liabilities_digest, prices_digest, public_inputs,
    to_hex, verify, Commitment, PublicInputs,
};
