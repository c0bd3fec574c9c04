use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorConfig {
    /// Targets allowed to report. Anyone else is refused.
    pub known_targets: Vec<String>,
    /// Epochs a report may trail the newest epoch the registry has seen.
    pub max_epoch_lag: u64,
}

impl AnchorConfig {
    /// Targets are deployment-specific, so the default set is empty and
    /// must be filled in before any report can land.
    pub fn sane_defaults() -> Self {
        Self {
            known_targets: Vec::new(),
            max_epoch_lag: 2,
        }
    }
}

/// Last accepted report of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRecord {
    pub anchor_id: String,
    pub epoch: u64,
    pub last_nav: u128,
    pub last_commitment: [u8; 32],
    pub last_sync_timestamp: i64,
}

/// One target's claim of what it published for an epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorReport {
    pub anchor_id: String,
    pub epoch: u64,
    pub nav_value: u128,
    pub commitment: [u8; 32],
    pub timestamp: i64,
}

/// Per-target view for one epoch. `consistent` is false whenever the
/// target has not reported that epoch at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorStatus {
    pub anchor_id: String,
    pub reported: bool,
    pub consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    UnknownTarget { anchor_id: String },
    EpochTooOld { epoch: u64, latest: u64 },
}

impl fmt::Display for AnchorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorError::UnknownTarget { anchor_id } => {
                write!(f, "anchor target {anchor_id} is not configured")
            }
            AnchorError::EpochTooOld { epoch, latest } => {
                write!(f, "epoch {epoch} trails too far behind {latest}")
            }
        }
    }
}

impl Error for AnchorError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorRegistry {
    records: BTreeMap<String, AnchorRecord>,
    /// Expected (nav, commitment) per epoch, pruned to the lag window so
    /// the registry stays bounded no matter how long the fund runs.
    expected: BTreeMap<u64, (u128, [u8; 32])>,
    latest_epoch: u64,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_of(&self, anchor_id: &str) -> Option<&AnchorRecord> {
        self.records.get(anchor_id)
    }

    /// Records in target-id order.
    pub fn records(&self) -> impl Iterator<Item = &AnchorRecord> {
        self.records.values()
    }

    pub fn expected_for(&self, epoch: u64) -> Option<(u128, [u8; 32])> {
        self.expected.get(&epoch).copied()
    }

    /// Newest epoch seen through either an expectation or a report.
    pub fn latest_epoch(&self) -> u64 {
        self.latest_epoch
    }

    pub(crate) fn bump_epoch(&mut self, max_epoch_lag: u64, epoch: u64) {
        if epoch > self.latest_epoch {
            self.latest_epoch = epoch;
        }
        let cutoff = self.latest_epoch.saturating_sub(max_epoch_lag);
        self.expected.retain(|e, _| *e >= cutoff);
    }

    pub(crate) fn put_expected(&mut self, epoch: u64, nav_value: u128, commitment: [u8; 32]) {
        self.expected.insert(epoch, (nav_value, commitment));
    }

    pub(crate) fn put_record(&mut self, record: AnchorRecord) {
        self.records.insert(record.anchor_id.clone(), record);
    }
}
