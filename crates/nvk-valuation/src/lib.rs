//! nvk-valuation
//!
//! NAV computation for a pooled fund.
//!
//! Goals:
//! - Input validation (holdings, price quotes, liabilities, compliance proofs)
//! - Asset aggregation: quantity × matched price at micro-unit scale
//! - Simple-interest liability accrual to maturity
//! - Volatility / liquidity / concentration haircuts in basis points
//!
//! Deterministic, pure logic. No IO, no wall-clock, no floats. All arithmetic
//! is checked u128; the caller supplies `now` as unix seconds.

mod engine;
mod types;

pub mod fixedpoint;

pub use engine::{compute, validate_holdings, validate_prices, validate_proofs};
pub use types::*;
