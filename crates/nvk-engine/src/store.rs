use std::collections::BTreeMap;

use nvk_anchor::AnchorRegistry;
use nvk_commitment::Commitment;
use nvk_drift::DriftState;
use nvk_exposure::{ExposureGraph, ExposureViolation};

use crate::types::{EmergencyState, NavRecord};

/// Everything one fund accumulates across epochs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundState {
    pub(crate) drift: DriftState,
    pub(crate) anchors: AnchorRegistry,
    /// Append-only NAV history keyed by epoch. Never pruned; the drift
    /// ring is the bounded structure, this is the archive.
    records: BTreeMap<u64, NavRecord>,
    pub(crate) current_nav: Option<u128>,
    /// Append-only violation trail. Written by detection, read by nobody
    /// inside the engine.
    violations: Vec<ExposureViolation>,
}

impl FundState {
    pub(crate) fn new(drift_window: usize) -> Self {
        Self {
            drift: DriftState::new(drift_window),
            anchors: AnchorRegistry::new(),
            records: BTreeMap::new(),
            current_nav: None,
            violations: Vec::new(),
        }
    }

    pub fn drift(&self) -> &DriftState {
        &self.drift
    }

    pub fn anchors(&self) -> &AnchorRegistry {
        &self.anchors
    }

    pub fn current_nav(&self) -> Option<u128> {
        self.current_nav
    }

    pub fn record(&self, epoch: u64) -> Option<&NavRecord> {
        self.records.get(&epoch)
    }

    /// Records in epoch order.
    pub fn records(&self) -> impl Iterator<Item = &NavRecord> {
        self.records.values()
    }

    pub fn violations(&self) -> &[ExposureViolation] {
        &self.violations
    }

    pub(crate) fn put_record(&mut self, record: NavRecord) {
        self.records.insert(record.epoch, record);
    }

    pub(crate) fn record_by_commitment_mut(
        &mut self,
        commitment: &Commitment,
    ) -> Option<&mut NavRecord> {
        self.records
            .values_mut()
            .find(|r| r.commitment == *commitment)
    }

    pub(crate) fn append_violation(&mut self, violation: ExposureViolation) {
        self.violations.push(violation);
    }
}

/// The engine's entire mutable world. Owned by [`crate::NavEngine`],
/// handed out read-only for inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStore {
    pub(crate) emergency: Option<EmergencyState>,
    /// One shared graph: exposure edges cross fund boundaries, so cycles
    /// are only visible over the union.
    pub(crate) exposure: ExposureGraph,
    funds: BTreeMap<String, FundState>,
}

impl EngineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emergency(&self) -> Option<&EmergencyState> {
        self.emergency.as_ref()
    }

    pub fn exposure(&self) -> &ExposureGraph {
        &self.exposure
    }

    pub fn fund(&self, fund_id: &str) -> Option<&FundState> {
        self.funds.get(fund_id)
    }

    pub fn fund_ids(&self) -> impl Iterator<Item = &str> {
        self.funds.keys().map(String::as_str)
    }

    pub(crate) fn fund_mut(&mut self, fund_id: &str) -> Option<&mut FundState> {
        self.funds.get_mut(fund_id)
    }

    pub(crate) fn ensure_fund(&mut self, fund_id: &str, drift_window: usize) -> &mut FundState {
        self.funds
            .entry(fund_id.to_string())
            .or_insert_with(|| FundState::new(drift_window))
    }
}
