//! Scenario: a fund publishes four excessive NAV moves in a row.
//!
//! GREEN when:
//! - the first three violations are admitted and flagged excessive
//! - the fourth trips the breaker and writes no entry
//! - the latch is sticky: a calm observation is still refused
//! - an operator reset readmits publications against the old baseline

use nvk_drift::{
    admit, evaluate, reset, trip, DriftConfig, DriftDecision, DriftObservation, DriftState,
};

const M: u128 = 1_000_000;

fn step(cfg: &DriftConfig, st: &mut DriftState, epoch: u64, nav_value: u128) -> DriftDecision {
    let obs = DriftObservation {
        epoch,
        nav_value,
        timestamp: 1_700_000_000 + epoch as i64,
    };
    let decision = evaluate(cfg, st, &obs);
    if decision.trips_breaker {
        trip(st);
    } else {
        admit(st, &obs, [7u8; 32], &decision);
    }
    decision
}

#[test]
fn three_violations_tolerated_fourth_trips() {
    let cfg = DriftConfig::sane_defaults();
    let mut st = DriftState::new(cfg.window);

    // Baseline, then 10% up each epoch (1000 bps, twice the 500 bps limit).
    step(&cfg, &mut st, 1, 1_000_000 * M);
    for (epoch, nav) in [
        (2u64, 1_100_000 * M),
        (3, 1_210_000 * M),
        (4, 1_331_000 * M),
    ] {
        let d = step(&cfg, &mut st, epoch, nav);
        assert!(d.violation, "epoch {epoch} is a violation");
        assert!(!d.trips_breaker, "epoch {epoch} is within tolerance");
        let entry = st.entry(epoch).expect("tolerated violation is recorded");
        assert!(entry.is_excessive);
    }
    assert_eq!(st.consecutive_violations, 3);
    assert!(!st.breaker_tripped);

    let fourth = step(&cfg, &mut st, 5, 1_464_100 * M);
    assert!(fourth.trips_breaker, "fourth consecutive violation trips");
    assert!(st.breaker_tripped);
    assert!(st.entry(5).is_none(), "tripping epoch leaves no entry");
    assert_eq!(st.current_epoch, 4, "epoch cursor did not advance");
}

#[test]
fn latch_survives_calm_markets_until_reset() {
    let cfg = DriftConfig::sane_defaults();
    let mut st = DriftState::new(cfg.window);

    step(&cfg, &mut st, 1, 1_000_000 * M);
    step(&cfg, &mut st, 2, 1_100_000 * M);
    step(&cfg, &mut st, 3, 1_210_000 * M);
    step(&cfg, &mut st, 4, 1_331_000 * M);
    step(&cfg, &mut st, 5, 1_464_100 * M);
    assert!(st.breaker_tripped);
    let baseline = st.prior_nav.expect("baseline from epoch 4");

    // Flat market, zero drift. Still refused while latched.
    let calm = step(&cfg, &mut st, 5, baseline);
    assert!(calm.trips_breaker);
    assert!(st.entry(5).is_none());

    reset(&mut st);
    assert!(!st.breaker_tripped);
    assert_eq!(st.consecutive_violations, 0);

    // Next publication measures against the pre-trip baseline.
    let resumed = step(&cfg, &mut st, 5, 1_337_000 * M);
    assert!(!resumed.violation, "45 bps off the epoch-4 baseline");
    assert_eq!(st.current_epoch, 5);
    assert!(st.entry(5).is_some());
}
