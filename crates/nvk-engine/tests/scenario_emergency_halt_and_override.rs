//! Emergency controls cutting across the pipeline.
//!
//! GREEN when:
//! - A triggered emergency halts publication for every fund until cleared.
//! - A bounded override replaces the display NAV without minting an epoch,
//!   and latches the halt on its own.
//! - After the clear, drift measures against the last accepted epoch, not
//!   the override value.

use nvk_commitment::HashProofBackend;
use nvk_engine::{
    Authorizer, Capability, EmergencyReason, EngineConfig, EngineEvent, NavEngine, NavError,
};
use nvk_valuation::{AssetHolding, AssetType, NavInputs, PriceQuote, ValuationMethod};

const M: u128 = 1_000_000;
const T0: i64 = 1_700_000_000;

struct Desk;

impl Authorizer for Desk {
    fn is_authorized(&self, actor: &str, capability: Capability) -> bool {
        matches!(
            (actor, capability),
            ("nav-oracle", Capability::Oracle) | ("ops", Capability::Admin)
        )
    }
}

fn book(price: u128, now: i64) -> NavInputs {
    NavInputs {
        holdings: vec![AssetHolding {
            asset_id: "UST-BILL".to_string(),
            quantity: 1_000 * M,
            asset_type: AssetType::Treasury,
            valuation_method: ValuationMethod::MarkToMarket,
            last_updated: now - 120,
        }],
        prices: vec![PriceQuote {
            asset_id: "UST-BILL".to_string(),
            price,
            confidence: 100,
            source: "oracle-a".to_string(),
            timestamp: now - 15,
        }],
        liabilities: vec![],
        compliance_proofs: vec![],
    }
}

#[test]
fn halt_is_global_and_survives_until_cleared() {
    let mut engine = NavEngine::new(EngineConfig::sane_defaults(), Desk, HashProofBackend);
    engine
        .compute_and_commit_nav("nav-oracle", "pool-a", &book(M, T0), T0)
        .unwrap();

    engine
        .trigger_emergency("ops", EmergencyReason::MarketCrash, T0 + 10)
        .unwrap();
    let em = engine.store().emergency().unwrap();
    assert_eq!(em.reason, EmergencyReason::MarketCrash);
    assert_eq!(em.triggered_by, "ops");

    // Both a known fund and a brand-new one are refused.
    for fund in ["pool-a", "pool-b"] {
        let err = engine
            .compute_and_commit_nav("nav-oracle", fund, &book(M, T0 + 20), T0 + 20)
            .unwrap_err();
        assert_eq!(
            err,
            NavError::EmergencyActive {
                reason: EmergencyReason::MarketCrash,
            }
        );
    }
    assert!(engine.store().fund("pool-b").is_none());

    // Only Admin clears.
    assert!(matches!(
        engine.clear_emergency("nav-oracle"),
        Err(NavError::Unauthorized { .. })
    ));
    engine.clear_emergency("ops").unwrap();
    let out = engine
        .compute_and_commit_nav("nav-oracle", "pool-a", &book(M, T0 + 30), T0 + 30)
        .unwrap();
    assert_eq!(out.epoch, 2);
}

#[test]
fn re_trigger_overwrites_reason_and_actor() {
    let mut engine = NavEngine::new(EngineConfig::sane_defaults(), Desk, HashProofBackend);
    engine
        .trigger_emergency("ops", EmergencyReason::OracleFailure, T0)
        .unwrap();
    engine
        .trigger_emergency("ops", EmergencyReason::RegulatoryAction, T0 + 5)
        .unwrap();

    let em = engine.store().emergency().unwrap();
    assert_eq!(em.reason, EmergencyReason::RegulatoryAction);
    assert_eq!(em.triggered_at, T0 + 5);

    let triggers = engine
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::EmergencyTriggered { .. }))
        .count();
    assert_eq!(triggers, 2);
}

#[test]
fn override_skips_the_ledger_and_drift_baseline() {
    let mut engine = NavEngine::new(EngineConfig::sane_defaults(), Desk, HashProofBackend);
    let out = engine
        .compute_and_commit_nav("nav-oracle", "pool-a", &book(M, T0), T0)
        .unwrap();
    let nav = out.nav_value;

    // Push the display value down 20% under a crash call.
    let marked_down = nav - nav * 2_000 / 10_000;
    engine
        .emergency_nav_override(
            "ops",
            "pool-a",
            marked_down,
            EmergencyReason::MarketCrash,
            T0 + 60,
        )
        .unwrap();

    let fund = engine.store().fund("pool-a").unwrap();
    assert_eq!(fund.current_nav(), Some(marked_down));
    // No epoch, no record, no drift entry for the override.
    assert_eq!(fund.drift().current_epoch, 1);
    assert!(fund.record(2).is_none());
    assert_eq!(engine.get_nav_history("pool-a", 10).unwrap().len(), 1);
    assert!(engine.store().emergency().is_some());

    // Publication is down while the override's latch holds.
    assert!(matches!(
        engine.compute_and_commit_nav("nav-oracle", "pool-a", &book(M, T0 + 90), T0 + 90),
        Err(NavError::EmergencyActive { .. })
    ));

    // After the clear, the same book prices back to the epoch-1 value:
    // drift is measured against the accepted baseline, so it reads zero
    // even though the display NAV moved 20% in between.
    engine.clear_emergency("ops").unwrap();
    let out = engine
        .compute_and_commit_nav("nav-oracle", "pool-a", &book(M, T0 + 120), T0 + 120)
        .unwrap();
    assert_eq!(out.epoch, 2);
    assert_eq!(out.nav_value, nav);
    assert_eq!(out.drift_bps, 0);
    assert_eq!(
        engine.store().fund("pool-a").unwrap().current_nav(),
        Some(nav)
    );
}

#[test]
fn override_refuses_out_of_bound_moves_atomically() {
    let mut engine = NavEngine::new(EngineConfig::sane_defaults(), Desk, HashProofBackend);
    let out = engine
        .compute_and_commit_nav("nav-oracle", "pool-a", &book(M, T0), T0)
        .unwrap();
    let nav = out.nav_value;

    // A 30% cut is past the bound: refused, nothing changes, no latch.
    let err = engine
        .emergency_nav_override(
            "ops",
            "pool-a",
            nav - nav * 3_000 / 10_000,
            EmergencyReason::MarketCrash,
            T0 + 60,
        )
        .unwrap_err();
    assert_eq!(
        err,
        NavError::EmergencyChangeTooLarge {
            requested_bps: 3_000,
            max_bps: 2_500,
        }
    );
    assert_eq!(engine.store().fund("pool-a").unwrap().current_nav(), Some(nav));
    assert!(engine.store().emergency().is_none());
    assert!(engine
        .drain_events()
        .iter()
        .all(|e| !matches!(e, EngineEvent::EmergencyTriggered { .. })));
}
