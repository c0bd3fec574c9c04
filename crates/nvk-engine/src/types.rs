use std::error::Error;
use std::fmt;

use nvk_anchor::AnchorConfig;
use nvk_commitment::Commitment;
use nvk_drift::DriftConfig;
use nvk_exposure::{ExposureConfig, ExposureViolation};
use nvk_valuation::{ValuationConfig, ValuationError};

/// Largest NAV move the emergency override accepts, in bps of the current
/// value. 2500 = one quarter of the fund in a single privileged write.
pub const MAX_EMERGENCY_CHANGE_BPS: u64 = 2_500;

// ---------------------------------------------------------------------------
// Authorization boundary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Submit NAV computations.
    Oracle,
    /// Run proof verification.
    Verifier,
    /// Exposure wiring, emergency control, breaker resets.
    Admin,
    /// Report anchor-target confirmations.
    Bridge,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Oracle => "oracle",
            Capability::Verifier => "verifier",
            Capability::Admin => "admin",
            Capability::Bridge => "bridge",
        };
        f.write_str(s)
    }
}

/// Capability check against whatever governance system is in charge.
///
/// Wire real role storage behind this in production. Tests use allow-lists
/// or boolean stubs. The engine calls it per operation and never caches a
/// verdict.
pub trait Authorizer {
    fn is_authorized(&self, actor: &str, capability: Capability) -> bool;
}

// ---------------------------------------------------------------------------
// Emergency state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyReason {
    MarketCrash,
    OracleFailure,
    SecurityBreach,
    RegulatoryAction,
    TechnicalFailure,
    ExcessiveDrift,
}

impl fmt::Display for EmergencyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EmergencyReason::MarketCrash => "market_crash",
            EmergencyReason::OracleFailure => "oracle_failure",
            EmergencyReason::SecurityBreach => "security_breach",
            EmergencyReason::RegulatoryAction => "regulatory_action",
            EmergencyReason::TechnicalFailure => "technical_failure",
            EmergencyReason::ExcessiveDrift => "excessive_drift",
        };
        f.write_str(s)
    }
}

/// The global halt latch. Set by `trigger_emergency` or a NAV override,
/// cleared only by `clear_emergency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyState {
    pub reason: EmergencyReason,
    pub triggered_by: String,
    pub triggered_at: i64,
}

// ---------------------------------------------------------------------------
// Records and outcomes
// ---------------------------------------------------------------------------

/// One published NAV. Created once per accepted epoch; only verification
/// mutates it afterwards, and nothing ever deletes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavRecord {
    pub fund_id: String,
    pub epoch: u64,
    pub nav_value: u128,
    pub commitment: Commitment,
    pub timestamp: i64,
    pub verifier_count: u32,
    pub is_verified: bool,
}

/// What a successful `compute_and_commit_nav` hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavOutcome {
    pub epoch: u64,
    pub nav_value: u128,
    pub total_assets: u128,
    pub total_liabilities: u128,
    pub drift_bps: u128,
    pub commitment: Commitment,
    pub proof_bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Ordered event stream of the engine. Buffered internally; callers drain
/// after each operation and wrap into envelopes at the emission boundary.
/// Each payload reconstructs its triggering record without another query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    NavComputed {
        fund_id: String,
        epoch: u64,
        nav_value: u128,
        total_assets: u128,
        total_liabilities: u128,
        drift_bps: u128,
        commitment: Commitment,
        proof_bytes: Vec<u8>,
        timestamp: i64,
    },
    DriftViolation {
        fund_id: String,
        epoch: u64,
        drift_bps: u128,
        max_drift_bps: u64,
        consecutive_violations: u32,
        breaker_tripped: bool,
        timestamp: i64,
    },
    ExposureViolationDetected { violation: ExposureViolation },
    CrossAnchorRecorded {
        fund_id: String,
        anchor_id: String,
        epoch: u64,
        nav_value: u128,
        commitment: Commitment,
        consistent_so_far: bool,
        timestamp: i64,
    },
    EmergencyTriggered {
        reason: EmergencyReason,
        actor: String,
        /// Set when the trigger was a NAV override rather than a plain halt.
        fund_id: Option<String>,
        old_nav: Option<u128>,
        new_nav: Option<u128>,
        timestamp: i64,
    },
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub valuation: ValuationConfig,
    pub drift: DriftConfig,
    pub exposure: ExposureConfig,
    pub anchor: AnchorConfig,
    /// Override bound for `emergency_nav_override`.
    pub max_emergency_change_bps: u64,
    /// Cycle severity filter used by the pipeline's own detection pass.
    pub default_max_exposure_pct_bps: u64,
}

impl EngineConfig {
    pub fn sane_defaults() -> Self {
        Self {
            valuation: ValuationConfig::sane_defaults(),
            drift: DriftConfig::sane_defaults(),
            exposure: ExposureConfig::sane_defaults(),
            anchor: AnchorConfig::sane_defaults(),
            max_emergency_change_bps: MAX_EMERGENCY_CHANGE_BPS,
            default_max_exposure_pct_bps: 5_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Engine-surface failures. Every fatal condition is a distinct kind so
/// callers can tell "fix your input" from "the system is latched".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    /// Empty, zero, stale, expired or future inputs. Recoverable by
    /// resubmission with corrected data.
    InputValidation { detail: String },
    /// No quote for a held asset. Fatal for the computation; substituting
    /// a default price would silently understate assets.
    PriceNotFound { asset_id: String },
    /// The drift breaker: latched, or tripping on this very call.
    ExcessiveDrift {
        fund_id: String,
        drift_bps: u128,
        consecutive_violations: u32,
    },
    /// Proof bytes failed the structural gate; no hash comparison was run.
    MalformedProof { len: usize, min_len: usize },
    /// The pluggable proof subsystem failed outright.
    ProofBackend { detail: String },
    Unauthorized { actor: String, capability: Capability },
    EmergencyActive { reason: EmergencyReason },
    /// Anchor or ledger sequencing misuse.
    EpochSequence { expected: u64, got: u64 },
    SelfLoopRejected { fund_id: String },
    EmergencyChangeTooLarge { requested_bps: u128, max_bps: u64 },
    UnknownFund { fund_id: String },
    UnknownTarget { anchor_id: String },
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavError::InputValidation { detail } => write!(f, "invalid input: {detail}"),
            NavError::PriceNotFound { asset_id } => {
                write!(f, "no price quote for asset {asset_id}")
            }
            NavError::ExcessiveDrift {
                fund_id,
                drift_bps,
                consecutive_violations,
            } => write!(
                f,
                "drift breaker for fund {fund_id}: {drift_bps} bps, {consecutive_violations} consecutive violations"
            ),
            NavError::MalformedProof { len, min_len } => {
                write!(f, "proof blob is {len} bytes, minimum {min_len}")
            }
            NavError::ProofBackend { detail } => write!(f, "proof backend failure: {detail}"),
            NavError::Unauthorized { actor, capability } => {
                write!(f, "actor {actor} lacks the {capability} capability")
            }
            NavError::EmergencyActive { reason } => {
                write!(f, "emergency halt is active ({reason})")
            }
            NavError::EpochSequence { expected, got } => {
                write!(f, "epoch {got} out of sequence, expected at most {expected}")
            }
            NavError::SelfLoopRejected { fund_id } => {
                write!(f, "self-exposure rejected for fund {fund_id}")
            }
            NavError::EmergencyChangeTooLarge {
                requested_bps,
                max_bps,
            } => write!(
                f,
                "override moves NAV by {requested_bps} bps, maximum {max_bps}"
            ),
            NavError::UnknownFund { fund_id } => write!(f, "unknown fund {fund_id}"),
            NavError::UnknownTarget { anchor_id } => {
                write!(f, "anchor target {anchor_id} is not configured")
            }
        }
    }
}

impl Error for NavError {}

impl NavError {
    /// Valuation failures keep their own taxonomy slot only for the
    /// missing-quote case; everything else is caller-correctable input.
    pub(crate) fn from_valuation(err: ValuationError) -> Self {
        match err {
            ValuationError::PriceNotFound { asset_id } => NavError::PriceNotFound { asset_id },
            other => NavError::InputValidation {
                detail: other.to_string(),
            },
        }
    }
}
