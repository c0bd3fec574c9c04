use crate::types::{DriftConfig, DriftDecision, DriftEntry, DriftObservation, DriftState};

/// Epoch-over-epoch drift in basis points, truncating division.
///
/// A prior of zero measures as zero drift: there is no meaningful base to
/// compare against, so the first real NAV after an empty fund is accepted
/// as a fresh baseline.
pub fn drift_bps(prior: u128, current: u128) -> u128 {
    if prior == 0 {
        return 0;
    }
    let diff = if current >= prior {
        current - prior
    } else {
        prior - current
    };
    match diff.checked_mul(10_000) {
        Some(scaled) => scaled / prior,
        // Unrepresentable move reads as maximal drift. Fails closed.
        None => u128::MAX,
    }
}

/// Judge an observation against current state. Read-only: callers decide
/// whether to `admit`, `trip`, or reject based on the decision, so a
/// rejected epoch leaves no partial writes behind.
pub fn evaluate(cfg: &DriftConfig, st: &DriftState, obs: &DriftObservation) -> DriftDecision {
    // 1) Sticky breaker overrides everything. No measurement is taken and
    //    nothing is admissible until an operator reset.
    if st.breaker_tripped {
        return DriftDecision {
            drift_bps: 0,
            violation: false,
            would_be_streak: st.consecutive_violations,
            trips_breaker: true,
        };
    }

    // 2) Measure against the prior accepted NAV. The first observation has
    //    no prior and drifts zero.
    let drift = match st.prior_nav {
        Some(prior) => drift_bps(prior, obs.nav_value),
        None => 0,
    };

    // 3) Threshold check, and the streak this admission would produce. A
    //    clean epoch resets the streak outright.
    let violation = drift > cfg.max_drift_bps as u128;
    let would_be_streak = if violation {
        st.consecutive_violations.saturating_add(1)
    } else {
        0
    };

    // 4) The breaker trips when the streak would exceed the tolerance.
    //    Tolerated violations are still admitted and recorded as excessive.
    let trips_breaker = would_be_streak > cfg.max_consecutive_violations;

    DriftDecision {
        drift_bps: drift,
        violation,
        would_be_streak,
        trips_breaker,
    }
}

/// Apply the writes for an accepted epoch: ring entry, prior NAV, epoch
/// cursor, violation streak. Callers must not admit a decision whose
/// `trips_breaker` is set; `trip` is the only write for that path.
pub fn admit(
    st: &mut DriftState,
    obs: &DriftObservation,
    nav_commitment: [u8; 32],
    decision: &DriftDecision,
) {
    st.put(DriftEntry {
        epoch: obs.epoch,
        nav_value: obs.nav_value,
        nav_commitment,
        drift_bps: decision.drift_bps,
        is_excessive: decision.violation,
        timestamp: obs.timestamp,
    });
    st.current_epoch = obs.epoch;
    st.prior_nav = Some(obs.nav_value);
    st.consecutive_violations = decision.would_be_streak;
}

/// Latch the breaker. Sticky until `reset`.
pub fn trip(st: &mut DriftState) {
    st.breaker_tripped = true;
}

/// Operator reset: clears the latch and the streak. Ring entries and the
/// epoch cursor are left intact, so the next admission measures against
/// the last accepted NAV as usual.
pub fn reset(st: &mut DriftState) {
    st.breaker_tripped = false;
    st.consecutive_violations = 0;
}

/// The most recent `epochs` live entries, ascending by epoch. Bounded by
/// the ring window; overwritten slots are gone.
pub fn history(st: &DriftState, epochs: usize) -> Vec<DriftEntry> {
    let all = st.entries();
    let skip = all.len().saturating_sub(epochs);
    all[skip..].to_vec()
}

// ---------------------------------------------------------------------------
