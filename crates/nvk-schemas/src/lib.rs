use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub kind: String,
    pub payload: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavComputed {
    pub fund_id: String,
    pub epoch: u64,
    pub nav_value: String,
    pub total_assets: String,
    pub total_liabilities: String,
    pub drift_bps: String,
    pub commitment: String,
    pub proof: String,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftViolation {
    pub fund_id: String,
    pub epoch: u64,
    pub drift_bps: String,
    pub max_drift_bps: u64,
    pub consecutive_violations: u32,
    pub breaker_tripped: bool,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureViolation {
    pub fund_a: String,
    pub fund_b: String,
    pub exposure_pct_bps: u64,
    pub violation_type: String,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossAnchorRecorded {
    pub fund_id: String,
    pub anchor_id: String,
    pub epoch: u64,
    pub nav_value: String,
    pub commitment: String,
    pub consistent_so_far: bool,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyTriggered {
    pub reason: String,
    pub actor: String,
    pub fund_id: Option<String>,
    pub old_nav: Option<String>,
    pub new_nav: Option<String>,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundSummary {
    pub fund_id: String,
    pub current_epoch: u64,
    pub current_nav: Option<String>,
    pub verified_records: u64,
    pub violations: u64,
    pub breaker_tripped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub captured_at_utc: DateTime<Utc>,
    pub emergency: Option<String>,
    pub funds: Vec<FundSummary>,
}
