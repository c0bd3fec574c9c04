use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Outgoing edge slots per fund. An edge is addressed by (fund, slot) and
/// a rewrite of the same slot replaces the old edge.
pub const MAX_EXPOSURE_SLOTS: usize = 10;

/// Full scale for edge weights. A single edge may not claim more than
/// 100% of the originating fund's book.
pub const WEIGHT_SCALE_BPS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExposureType {
    DirectInvestment,
    DerivativeExposure,
    CollateralBacking,
    SyntheticExposure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationType {
    SelfReference,
    Concentration,
    CircularExposure,
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationType::SelfReference => "self_reference",
            ViolationType::Concentration => "concentration",
            ViolationType::CircularExposure => "circular_exposure",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureEdge {
    pub from_fund: String,
    pub to_fund: String,
    pub exposure_type: ExposureType,
    /// Share of the originating fund's book placed with `to_fund`, in bps.
    pub weight_bps: u64,
}

/// One slot write, the unit `update_edge` accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureUpdate {
    pub from_fund: String,
    pub to_fund: String,
    pub exposure_type: ExposureType,
    pub weight_bps: u64,
    pub slot_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureConfig {
    pub max_slots: usize,
    /// Single-edge weight above this is a concentration violation.
    pub concentration_limit_bps: u64,
    /// When set, a self-loop write is refused outright instead of being
    /// recorded and flagged by detection.
    pub strict_self_loops: bool,
}

impl ExposureConfig {
    pub fn sane_defaults() -> Self {
        Self {
            max_slots: MAX_EXPOSURE_SLOTS,
            concentration_limit_bps: 5_000,
            strict_self_loops: true,
        }
    }
}

/// Detection output. Append-only from the caller's point of view; nothing
/// in this crate ever reads one back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureViolation {
    pub fund_a: String,
    pub fund_b: String,
    /// Severity in bps. Raw edge weight for self-reference and
    /// concentration; weight relative to the origin's total for cycles.
    pub exposure_pct_bps: u64,
    pub violation_type: ViolationType,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExposureError {
    EmptyFundId,
    SlotOutOfRange { slot: usize, max_slots: usize },
    WeightAboveScale { weight_bps: u64 },
    SelfLoopRejected { fund_id: String },
}

impl fmt::Display for ExposureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExposureError::EmptyFundId => write!(f, "fund id must be non-empty"),
            ExposureError::SlotOutOfRange { slot, max_slots } => {
                write!(f, "slot {slot} out of range (max {max_slots})")
            }
            ExposureError::WeightAboveScale { weight_bps } => {
                write!(f, "weight {weight_bps} bps above full scale")
            }
            ExposureError::SelfLoopRejected { fund_id } => {
                write!(f, "self-exposure rejected for fund {fund_id}")
            }
        }
    }
}

impl Error for ExposureError {}

/// Directed exposure graph. Funds key their outgoing slot arrays; a fund
/// that only ever appears as a target holds no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposureGraph {
    funds: BTreeMap<String, Vec<Option<ExposureEdge>>>,
}

impl ExposureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fund_ids(&self) -> impl Iterator<Item = &str> {
        self.funds.keys().map(String::as_str)
    }

    pub fn edge(&self, fund: &str, slot: usize) -> Option<&ExposureEdge> {
        self.funds.get(fund)?.get(slot)?.as_ref()
    }

    /// Live edges of one fund in slot order.
    pub fn edges_of(&self, fund: &str) -> Vec<(usize, &ExposureEdge)> {
        match self.funds.get(fund) {
            Some(slots) => slots
                .iter()
                .enumerate()
                .filter_map(|(i, e)| e.as_ref().map(|e| (i, e)))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Sum of a fund's live edge weights. Saturating; the cap is
    /// max_slots * WEIGHT_SCALE_BPS, far inside u64.
    pub fn total_weight_bps(&self, fund: &str) -> u64 {
        self.edges_of(fund)
            .iter()
            .fold(0u64, |acc, (_, e)| acc.saturating_add(e.weight_bps))
    }

    pub fn edge_count(&self) -> usize {
        self.funds
            .values()
            .map(|slots| slots.iter().filter(|e| e.is_some()).count())
            .sum()
    }

    pub(crate) fn put(&mut self, max_slots: usize, slot: usize, edge: ExposureEdge) {
        let slots = self
            .funds
            .entry(edge.from_fund.clone())
            .or_insert_with(|| vec![None; max_slots]);
        if slots.len() < max_slots {
            slots.resize(max_slots, None);
        }
        slots[slot] = Some(edge);
    }
}
