/// Slots in the per-fund drift ring. Entry for epoch `e` lives at
/// `e % DRIFT_WINDOW`; an epoch 100 ahead overwrites the slot.
pub const DRIFT_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftConfig {
    /// Largest epoch-over-epoch NAV move (bps) accepted without a violation.
    pub max_drift_bps: u64,
    /// Violations tolerated in a row. The streak exceeding this trips the
    /// breaker.
    pub max_consecutive_violations: u32,
    /// Ring capacity. Kept configurable for tests; production uses
    /// [`DRIFT_WINDOW`].
    pub window: usize,
}

impl DriftConfig {
    pub fn sane_defaults() -> Self {
        Self {
            max_drift_bps: 500,
            max_consecutive_violations: 3,
            window: DRIFT_WINDOW,
        }
    }
}

/// One accepted epoch in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftEntry {
    pub epoch: u64,
    pub nav_value: u128,
    pub nav_commitment: [u8; 32],
    /// Drift vs the prior accepted NAV, basis points, truncating division.
    pub drift_bps: u128,
    pub is_excessive: bool,
    pub timestamp: i64,
}

/// Mutable per-fund drift state. Owned by the caller; this crate only
/// reads and writes it through `evaluate` / `admit` / `trip` / `reset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftState {
    /// Last accepted epoch. 0 until the first `admit`.
    pub current_epoch: u64,
    /// NAV of the last accepted epoch. `None` until the first `admit`;
    /// the first observation is measured against nothing and drifts 0.
    pub prior_nav: Option<u128>,
    pub consecutive_violations: u32,
    /// Sticky. Once set, only `reset` clears it.
    pub breaker_tripped: bool,
    entries: Vec<Option<DriftEntry>>,
}

impl DriftState {
    pub fn new(window: usize) -> Self {
        Self {
            current_epoch: 0,
            prior_nav: None,
            consecutive_violations: 0,
            breaker_tripped: false,
            entries: vec![None; window.max(1)],
        }
    }

    pub fn window(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn slot(&self, epoch: u64) -> usize {
        (epoch % self.entries.len() as u64) as usize
    }

    /// Ring lookup for one epoch. `None` when the epoch was never admitted
    /// or its slot has been reused by a later epoch.
    pub fn entry(&self, epoch: u64) -> Option<&DriftEntry> {
        self.entries[self.slot(epoch)]
            .as_ref()
            .filter(|e| e.epoch == epoch)
    }

    pub(crate) fn put(&mut self, entry: DriftEntry) {
        let slot = self.slot(entry.epoch);
        self.entries[slot] = Some(entry);
    }

    /// All live entries, ascending by epoch. Slots overwritten by a later
    /// epoch are gone.
    pub fn entries(&self) -> Vec<DriftEntry> {
        let mut out: Vec<DriftEntry> = self.entries.iter().filter_map(|e| *e).collect();
        out.sort_by_key(|e| e.epoch);
        out
    }
}

/// A candidate NAV publication for the next epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftObservation {
    pub epoch: u64,
    pub nav_value: u128,
    pub timestamp: i64,
}

/// Read-only verdict on an observation. Nothing in state changed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftDecision {
    pub drift_bps: u128,
    pub violation: bool,
    /// Streak length this observation would produce if admitted.
    pub would_be_streak: u32,
    /// True when admitting this observation must trip the breaker instead.
    pub trips_breaker: bool,
}
