use nvk_anchor::{AnchorError, AnchorReport, AnchorStatus};
use nvk_commitment::{Commitment, ProofBackend, ProofError, PublicInputs, MIN_PROOF_LEN};
use nvk_drift::{DriftEntry, DriftObservation};
use nvk_exposure::{ExposureError, ExposureType, ExposureUpdate, ExposureViolation, ViolationType};
use nvk_valuation::NavInputs;

use crate::store::EngineStore;
use crate::types::{
    Authorizer, Capability, EmergencyReason, EmergencyState, EngineConfig, EngineEvent, NavError,
    NavOutcome, NavRecord,
};

/// The orchestrator. Owns the store, buffers events, and runs every
/// operation through the same gate order. One instance per fund family;
/// `&mut self` on every mutating operation is the concurrency story.
pub struct NavEngine<A, P> {
    cfg: EngineConfig,
    authorizer: A,
    proofs: P,
    store: EngineStore,
    events: Vec<EngineEvent>,
}

impl<A, P> NavEngine<A, P>
where
    A: Authorizer,
    P: ProofBackend,
{
    pub fn new(cfg: EngineConfig, authorizer: A, proofs: P) -> Self {
        Self {
            cfg,
            authorizer,
            proofs,
            store: EngineStore::new(),
            events: Vec::new(),
        }
    }

    pub fn cfg(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn store(&self) -> &EngineStore {
        &self.store
    }

    /// Take every event buffered since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn require(&self, actor: &str, capability: Capability) -> Result<(), NavError> {
        if self.authorizer.is_authorized(actor, capability) {
            Ok(())
        } else {
            Err(NavError::Unauthorized {
                actor: actor.to_string(),
                capability,
            })
        }
    }

    // -----------------------------------------------------------------------
    // NAV pipeline
    // -----------------------------------------------------------------------

    /// Run one epoch end to end: validate, value, commit, prove, check
    /// drift, write. The store is untouched until every fallible stage has
    /// passed; a refusal at any point leaves the prior epoch fully intact.
    pub fn compute_and_commit_nav(
        &mut self,
        actor: &str,
        fund_id: &str,
        inputs: &NavInputs,
        now: i64,
    ) -> Result<NavOutcome, NavError> {
        // 1) The emergency latch overrides everything, capability included.
        if let Some(em) = &self.store.emergency {
            return Err(NavError::EmergencyActive { reason: em.reason });
        }

        // 2) Capability gate.
        self.require(actor, Capability::Oracle)?;

        // 3) Fund breaker latch. A fund the engine has never seen has none.
        if let Some(fund) = self.store.fund(fund_id) {
            if fund.drift().breaker_tripped {
                return Err(NavError::ExcessiveDrift {
                    fund_id: fund_id.to_string(),
                    drift_bps: 0,
                    consecutive_violations: fund.drift().consecutive_violations,
                });
            }
        }

        // 4) Pure computation: validation and valuation.
        let valuation = nvk_valuation::compute(&self.cfg.valuation, inputs, now)
            .map_err(NavError::from_valuation)?;

        // 5) Commitment and proof, still before any write.
        let commitment = nvk_commitment::commit(
            valuation.nav_value,
            &inputs.holdings,
            &inputs.prices,
            &inputs.liabilities,
        );
        let public = nvk_commitment::public_inputs(&inputs.holdings, &inputs.prices, &inputs.liabilities);
        let proof_bytes = self
            .proofs
            .generate(&commitment, &public)
            .map_err(|e| NavError::ProofBackend {
                detail: e.to_string(),
            })?;

        // 6) Drift verdict for the next epoch.
        let window = self.cfg.drift.window;
        let fund = self.store.ensure_fund(fund_id, window);
        let obs = DriftObservation {
            epoch: fund.drift.current_epoch.saturating_add(1),
            nav_value: valuation.nav_value,
            timestamp: now,
        };
        let decision = nvk_drift::evaluate(&self.cfg.drift, &fund.drift, &obs);

        if decision.violation {
            self.events.push(EngineEvent::DriftViolation {
                fund_id: fund_id.to_string(),
                epoch: obs.epoch,
                drift_bps: decision.drift_bps,
                max_drift_bps: self.cfg.drift.max_drift_bps,
                consecutive_violations: decision.would_be_streak,
                breaker_tripped: decision.trips_breaker,
                timestamp: now,
            });
        }
        if decision.trips_breaker {
            // The latch is the only write of a refused epoch.
            nvk_drift::trip(&mut fund.drift);
            return Err(NavError::ExcessiveDrift {
                fund_id: fund_id.to_string(),
                drift_bps: decision.drift_bps,
                consecutive_violations: decision.would_be_streak,
            });
        }

        // 7) The writes of an accepted epoch, together: ring entry, NAV
        //    record, current value, the pair anchors must confirm.
        nvk_drift::admit(&mut fund.drift, &obs, commitment, &decision);
        fund.put_record(NavRecord {
            fund_id: fund_id.to_string(),
            epoch: obs.epoch,
            nav_value: valuation.nav_value,
            commitment,
            timestamp: now,
            verifier_count: 0,
            is_verified: false,
        });
        fund.current_nav = Some(valuation.nav_value);
        nvk_anchor::expect(
            &self.cfg.anchor,
            &mut fund.anchors,
            obs.epoch,
            valuation.nav_value,
            commitment,
        );

        // 8) Soft exposure pass over the shared graph. Findings are events
        //    and trail entries, never a refusal of the epoch just written.
        self.run_exposure_detection(self.cfg.default_max_exposure_pct_bps, now);

        self.events.push(EngineEvent::NavComputed {
            fund_id: fund_id.to_string(),
            epoch: obs.epoch,
            nav_value: valuation.nav_value,
            total_assets: valuation.total_assets,
            total_liabilities: valuation.total_liabilities,
            drift_bps: decision.drift_bps,
            commitment,
            proof_bytes: proof_bytes.clone(),
            timestamp: now,
        });

        Ok(NavOutcome {
            epoch: obs.epoch,
            nav_value: valuation.nav_value,
            total_assets: valuation.total_assets,
            total_liabilities: valuation.total_liabilities,
            drift_bps: decision.drift_bps,
            commitment,
            proof_bytes,
        })
    }

    // -----------------------------------------------------------------------
    // Verification
    // -----------------------------------------------------------------------

    /// Check a published commitment against declared public inputs and a
    /// claimed NAV, then the proof bytes against the backend. Disagreement
    /// is `Ok(false)`; only structural garbage is an error. Stays available
    /// during an emergency halt: verification is how an emergency gets
    /// investigated.
    pub fn verify_nav(
        &mut self,
        actor: &str,
        fund_id: &str,
        commitment: Commitment,
        proof_bytes: &[u8],
        public: &PublicInputs,
        nav_value: u128,
    ) -> Result<bool, NavError> {
        self.require(actor, Capability::Verifier)?;

        // Structural gate before any hash work.
        if proof_bytes.len() < MIN_PROOF_LEN {
            return Err(NavError::MalformedProof {
                len: proof_bytes.len(),
                min_len: MIN_PROOF_LEN,
            });
        }

        if !nvk_commitment::verify(&commitment, public, nav_value) {
            return Ok(false);
        }
        let proof_ok = self
            .proofs
            .verify(proof_bytes, &commitment, public)
            .map_err(|e| match e {
                ProofError::Malformed { len } => NavError::MalformedProof {
                    len,
                    min_len: MIN_PROOF_LEN,
                },
                ProofError::Backend { detail } => NavError::ProofBackend { detail },
            })?;
        if !proof_ok {
            return Ok(false);
        }

        // A known record gains a confirmation. An unknown commitment still
        // verifies; there is just nothing to annotate.
        if let Some(fund) = self.store.fund_mut(fund_id) {
            if let Some(rec) = fund.record_by_commitment_mut(&commitment) {
                rec.verifier_count = rec.verifier_count.saturating_add(1);
                rec.is_verified = true;
            }
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Exposure graph
    // -----------------------------------------------------------------------

    /// Write one slot of a fund's exposure table. Self-loops are flagged at
    /// write time in either mode, without waiting for a detection pass;
    /// strict mode also refuses the write, so the edge never lands.
    pub fn update_fund_exposure(
        &mut self,
        actor: &str,
        fund_id: &str,
        connected_fund_id: &str,
        weight_bps: u64,
        exposure_type: ExposureType,
        slot_index: usize,
        now: i64,
    ) -> Result<(), NavError> {
        self.require(actor, Capability::Admin)?;

        let update = ExposureUpdate {
            from_fund: fund_id.to_string(),
            to_fund: connected_fund_id.to_string(),
            exposure_type,
            weight_bps,
            slot_index,
        };
        let strict_reject =
            match nvk_exposure::update_edge(&self.cfg.exposure, &mut self.store.exposure, &update) {
                Ok(()) => None,
                Err(ExposureError::SelfLoopRejected { fund_id }) => {
                    Some(NavError::SelfLoopRejected { fund_id })
                }
                Err(other) => {
                    return Err(NavError::InputValidation {
                        detail: other.to_string(),
                    });
                }
            };

        if fund_id == connected_fund_id {
            // Flagged in both modes; strict only withholds the edge itself.
            let violation = ExposureViolation {
                fund_a: fund_id.to_string(),
                fund_b: connected_fund_id.to_string(),
                exposure_pct_bps: weight_bps,
                violation_type: ViolationType::SelfReference,
                timestamp: now,
            };
            let window = self.cfg.drift.window;
            self.store
                .ensure_fund(fund_id, window)
                .append_violation(violation.clone());
            self.events
                .push(EngineEvent::ExposureViolationDetected { violation });
        }

        match strict_reject {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Full detection sweep with a caller-chosen cycle severity filter.
    /// Read-only on the graph; findings land on each origin fund's trail
    /// and in the event stream. Unprivileged: detection only reports what
    /// the graph already says.
    pub fn detect_exposure_violations(
        &mut self,
        max_exposure_pct_bps: u64,
        now: i64,
    ) -> Vec<ExposureViolation> {
        self.run_exposure_detection(max_exposure_pct_bps, now)
    }

    fn run_exposure_detection(
        &mut self,
        max_exposure_pct_bps: u64,
        now: i64,
    ) -> Vec<ExposureViolation> {
        let found = nvk_exposure::detect(
            &self.cfg.exposure,
            &self.store.exposure,
            max_exposure_pct_bps,
            now,
        );
        let window = self.cfg.drift.window;
        for violation in &found {
            self.store
                .ensure_fund(&violation.fund_a, window)
                .append_violation(violation.clone());
            self.events.push(EngineEvent::ExposureViolationDetected {
                violation: violation.clone(),
            });
        }
        found
    }

    // -----------------------------------------------------------------------
    // Cross-anchor reconciliation
    // -----------------------------------------------------------------------

    /// Accept one anchor target's confirmation of a published epoch.
    /// Divergence is recorded and reported, never rolled back.
    pub fn record_cross_anchor(
        &mut self,
        actor: &str,
        fund_id: &str,
        anchor_id: &str,
        epoch: u64,
        nav_value: u128,
        commitment: Commitment,
        now: i64,
    ) -> Result<(), NavError> {
        self.require(actor, Capability::Bridge)?;

        let fund = self
            .store
            .fund_mut(fund_id)
            .ok_or_else(|| unknown_fund(fund_id))?;

        // A bridge cannot confirm an epoch the fund has not reached.
        if epoch > fund.drift.current_epoch {
            return Err(NavError::EpochSequence {
                expected: fund.drift.current_epoch,
                got: epoch,
            });
        }

        let report = AnchorReport {
            anchor_id: anchor_id.to_string(),
            epoch,
            nav_value,
            commitment,
            timestamp: now,
        };
        nvk_anchor::record(&self.cfg.anchor, &mut fund.anchors, &report).map_err(|e| match e {
            AnchorError::UnknownTarget { anchor_id } => NavError::UnknownTarget { anchor_id },
            AnchorError::EpochTooOld { epoch, latest } => NavError::EpochSequence {
                expected: latest,
                got: epoch,
            },
        })?;

        let consistent_so_far = nvk_anchor::verify_consistency(&fund.anchors, epoch);
        self.events.push(EngineEvent::CrossAnchorRecorded {
            fund_id: fund_id.to_string(),
            anchor_id: anchor_id.to_string(),
            epoch,
            nav_value,
            commitment,
            consistent_so_far,
            timestamp: now,
        });
        Ok(())
    }

    /// True iff no two targets that reported this epoch disagree.
    pub fn verify_anchor_consistency(&self, fund_id: &str, epoch: u64) -> Result<bool, NavError> {
        let fund = self.store.fund(fund_id).ok_or_else(|| unknown_fund(fund_id))?;
        Ok(nvk_anchor::verify_consistency(fund.anchors(), epoch))
    }

    /// Per-target reported/consistent flags for an epoch, in target order.
    pub fn get_anchor_status(
        &self,
        fund_id: &str,
        epoch: u64,
    ) -> Result<Vec<AnchorStatus>, NavError> {
        let fund = self.store.fund(fund_id).ok_or_else(|| unknown_fund(fund_id))?;
        Ok(nvk_anchor::anchor_status(
            &self.cfg.anchor,
            fund.anchors(),
            epoch,
        ))
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// The most recent `epoch_count` drift entries for a fund, ascending.
    /// Bounded by the ring window.
    pub fn get_nav_history(
        &self,
        fund_id: &str,
        epoch_count: usize,
    ) -> Result<Vec<DriftEntry>, NavError> {
        let fund = self.store.fund(fund_id).ok_or_else(|| unknown_fund(fund_id))?;
        Ok(nvk_drift::history(fund.drift(), epoch_count))
    }

    // -----------------------------------------------------------------------
    // Emergency controls
    // -----------------------------------------------------------------------

    /// Halt NAV publication. Re-triggering overwrites reason and actor.
    pub fn trigger_emergency(
        &mut self,
        actor: &str,
        reason: EmergencyReason,
        now: i64,
    ) -> Result<(), NavError> {
        self.require(actor, Capability::Admin)?;
        self.store.emergency = Some(EmergencyState {
            reason,
            triggered_by: actor.to_string(),
            triggered_at: now,
        });
        self.events.push(EngineEvent::EmergencyTriggered {
            reason,
            actor: actor.to_string(),
            fund_id: None,
            old_nav: None,
            new_nav: None,
            timestamp: now,
        });
        Ok(())
    }

    /// Lift the halt. Breaker latches on individual funds stay latched;
    /// they have their own reset.
    pub fn clear_emergency(&mut self, actor: &str) -> Result<(), NavError> {
        self.require(actor, Capability::Admin)?;
        self.store.emergency = None;
        Ok(())
    }

    /// Replace a fund's current NAV outside the pipeline, bounded to
    /// `max_emergency_change_bps` of the standing value. No epoch, no
    /// commitment, no drift entry; the override latches the emergency so
    /// normal publication stays down until an explicit clear.
    pub fn emergency_nav_override(
        &mut self,
        actor: &str,
        fund_id: &str,
        nav_value: u128,
        reason: EmergencyReason,
        now: i64,
    ) -> Result<(), NavError> {
        self.require(actor, Capability::Admin)?;

        let max_bps = self.cfg.max_emergency_change_bps;
        let old_nav = {
            let fund = self
                .store
                .fund_mut(fund_id)
                .ok_or_else(|| unknown_fund(fund_id))?;
            let current = fund.current_nav.ok_or_else(|| NavError::InputValidation {
                detail: format!("fund {fund_id} has no current NAV to override"),
            })?;
            let change_bps = nvk_drift::drift_bps(current, nav_value);
            if change_bps > u128::from(max_bps) {
                return Err(NavError::EmergencyChangeTooLarge {
                    requested_bps: change_bps,
                    max_bps,
                });
            }
            fund.current_nav = Some(nav_value);
            current
        };

        self.store.emergency = Some(EmergencyState {
            reason,
            triggered_by: actor.to_string(),
            triggered_at: now,
        });
        self.events.push(EngineEvent::EmergencyTriggered {
            reason,
            actor: actor.to_string(),
            fund_id: Some(fund_id.to_string()),
            old_nav: Some(old_nav),
            new_nav: Some(nav_value),
            timestamp: now,
        });
        Ok(())
    }

    /// Operator reset of a fund's drift breaker. The ring and epoch cursor
    /// survive, so the next computation measures against the last accepted
    /// NAV as usual.
    pub fn reset_drift_breaker(&mut self, actor: &str, fund_id: &str) -> Result<(), NavError> {
        self.require(actor, Capability::Admin)?;
        let fund = self
            .store
            .fund_mut(fund_id)
            .ok_or_else(|| unknown_fund(fund_id))?;
        nvk_drift::reset(&mut fund.drift);
        Ok(())
    }
}

fn unknown_fund(fund_id: &str) -> NavError {
    NavError::UnknownFund {
        fund_id: fund_id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nvk_commitment::HashProofBackend;
    use nvk_valuation::{
        AssetHolding, AssetType, Liability, LiabilityType, PriceQuote, ValuationMethod,
    };

    const M: u128 = 1_000_000;
    const NOW: i64 = 1_700_000_000;
    const FUND: &str = "fund-main";

    /// Allow-list stub: one conventional actor per capability.
    struct RoleBook;

    impl Authorizer for RoleBook {
        fn is_authorized(&self, actor: &str, capability: Capability) -> bool {
            matches!(
                (actor, capability),
                ("oracle-1", Capability::Oracle)
                    | ("verifier-1", Capability::Verifier)
                    | ("admin-1", Capability::Admin)
                    | ("bridge-1", Capability::Bridge)
            )
        }
    }

    fn make_engine(cfg: EngineConfig) -> NavEngine<RoleBook, HashProofBackend> {
        NavEngine::new(cfg, RoleBook, HashProofBackend)
    }

    /// Single-treasury book: raw NAV = 1000 units × price. The only haircut
    /// is concentration (share 10000, excess 7500, weight 1000 = 750 bps),
    /// so NAV scales exactly with price and drift ratios stay clean.
    fn book(price: u128, now: i64) -> NavInputs {
        NavInputs {
            holdings: vec![AssetHolding {
                asset_id: "UST-BILL".to_string(),
                quantity: 1_000 * M,
                asset_type: AssetType::Treasury,
                valuation_method: ValuationMethod::MarkToMarket,
                last_updated: now - 600,
            }],
            prices: vec![PriceQuote {
                asset_id: "UST-BILL".to_string(),
                price,
                confidence: 100,
                source: "oracle-a".to_string(),
                timestamp: now - 45,
            }],
            liabilities: vec![],
            compliance_proofs: vec![],
        }
    }

    fn nav_for(price: u128) -> u128 {
        let raw = 1_000 * price;
        raw - raw * 750 / 10_000
    }

    #[test]
    fn oracle_capability_is_required() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        let err = engine
            .compute_and_commit_nav("admin-1", FUND, &book(M, NOW), NOW)
            .unwrap_err();
        assert_eq!(
            err,
            NavError::Unauthorized {
                actor: "admin-1".to_string(),
                capability: Capability::Oracle,
            }
        );
        assert!(engine.store().fund(FUND).is_none());
    }

    #[test]
    fn pipeline_writes_record_current_nav_and_expectation() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW), NOW)
            .unwrap();

        assert_eq!(out.epoch, 1);
        assert_eq!(out.nav_value, nav_for(M));
        assert_eq!(out.total_assets, 1_000 * M);
        assert_eq!(out.total_liabilities, 0);
        assert_eq!(out.drift_bps, 0);
        assert_eq!(out.proof_bytes.len(), 64);

        let fund = engine.store().fund(FUND).unwrap();
        let rec = fund.record(1).unwrap();
        assert_eq!(rec.nav_value, out.nav_value);
        assert_eq!(rec.commitment, out.commitment);
        assert_eq!(rec.verifier_count, 0);
        assert!(!rec.is_verified);
        assert_eq!(fund.current_nav(), Some(out.nav_value));
        assert_eq!(
            fund.anchors().expected_for(1),
            Some((out.nav_value, out.commitment))
        );

        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            EngineEvent::NavComputed { fund_id, epoch: 1, .. } if fund_id == FUND
        ));
    }

    #[test]
    fn calm_second_epoch_measures_zero_drift() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW), NOW)
            .unwrap();
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW + 60), NOW + 60)
            .unwrap();

        assert_eq!(out.epoch, 2);
        assert_eq!(out.drift_bps, 0);
        let events = engine.drain_events();
        assert!(events
            .iter()
            .all(|e| !matches!(e, EngineEvent::DriftViolation { .. })));
    }

    #[test]
    fn soft_drift_violation_commits_and_emits() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW), NOW)
            .unwrap();
        // Price ×1.2: drift 2000 bps, over the 500 default but one strike
        // is below the streak tolerance.
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(12 * M / 10, NOW + 60), NOW + 60)
            .unwrap();

        assert_eq!(out.drift_bps, 2_000);
        let fund = engine.store().fund(FUND).unwrap();
        assert!(fund.record(2).is_some());
        assert!(!fund.drift().breaker_tripped);
        assert_eq!(fund.drift().consecutive_violations, 1);

        let events = engine.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::DriftViolation {
                epoch: 2,
                drift_bps: 2_000,
                breaker_tripped: false,
                ..
            }
        )));
    }

    #[test]
    fn breaker_trip_refuses_epoch_and_latches() {
        let mut cfg = EngineConfig::sane_defaults();
        cfg.drift.max_consecutive_violations = 0;
        let mut engine = make_engine(cfg);
        engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW), NOW)
            .unwrap();
        let nav_1 = engine.store().fund(FUND).unwrap().current_nav();

        // Zero tolerance: the first violation trips.
        let err = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(2 * M, NOW + 60), NOW + 60)
            .unwrap_err();
        assert_eq!(
            err,
            NavError::ExcessiveDrift {
                fund_id: FUND.to_string(),
                drift_bps: 10_000,
                consecutive_violations: 1,
            }
        );

        // The refused epoch wrote nothing except the latch.
        let fund = engine.store().fund(FUND).unwrap();
        assert!(fund.drift().breaker_tripped);
        assert_eq!(fund.drift().current_epoch, 1);
        assert!(fund.record(2).is_none());
        assert_eq!(fund.current_nav(), nav_1);

        // Latched: even a calm resubmission is refused, drift 0.
        let err = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW + 120), NOW + 120)
            .unwrap_err();
        assert!(matches!(
            err,
            NavError::ExcessiveDrift { drift_bps: 0, .. }
        ));

        // Reset is Admin-only, then publication resumes against epoch 1.
        assert!(matches!(
            engine.reset_drift_breaker("oracle-1", FUND),
            Err(NavError::Unauthorized { .. })
        ));
        engine.reset_drift_breaker("admin-1", FUND).unwrap();
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW + 180), NOW + 180)
            .unwrap();
        assert_eq!(out.epoch, 2);
        assert_eq!(out.drift_bps, 0);
    }

    #[test]
    fn verify_nav_confirms_and_annotates_the_record() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        let inputs = book(M, NOW);
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &inputs, NOW)
            .unwrap();
        engine.drain_events();

        let public =
            nvk_commitment::public_inputs(&inputs.holdings, &inputs.prices, &inputs.liabilities);
        let ok = engine
            .verify_nav(
                "verifier-1",
                FUND,
                out.commitment,
                &out.proof_bytes,
                &public,
                out.nav_value,
            )
            .unwrap();
        assert!(ok);

        let rec = engine.store().fund(FUND).unwrap().record(1).unwrap();
        assert_eq!(rec.verifier_count, 1);
        assert!(rec.is_verified);

        // Wrong claimed value: logical false, the record is untouched.
        let ok = engine
            .verify_nav(
                "verifier-1",
                FUND,
                out.commitment,
                &out.proof_bytes,
                &public,
                out.nav_value + 1,
            )
            .unwrap();
        assert!(!ok);
        let rec = engine.store().fund(FUND).unwrap().record(1).unwrap();
        assert_eq!(rec.verifier_count, 1);
    }

    #[test]
    fn verify_nav_rejects_short_proof_before_hashing() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        let inputs = book(M, NOW);
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &inputs, NOW)
            .unwrap();
        let public =
            nvk_commitment::public_inputs(&inputs.holdings, &inputs.prices, &inputs.liabilities);

        let err = engine
            .verify_nav(
                "verifier-1",
                FUND,
                out.commitment,
                &out.proof_bytes[..32],
                &public,
                out.nav_value,
            )
            .unwrap_err();
        assert_eq!(
            err,
            NavError::MalformedProof {
                len: 32,
                min_len: MIN_PROOF_LEN,
            }
        );
    }

    #[test]
    fn verify_nav_succeeds_for_commitment_the_engine_never_published() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        let inputs = book(3 * M, NOW);
        let nav = nav_for(3 * M);
        let commitment =
            nvk_commitment::commit(nav, &inputs.holdings, &inputs.prices, &inputs.liabilities);
        let public =
            nvk_commitment::public_inputs(&inputs.holdings, &inputs.prices, &inputs.liabilities);
        let proof = HashProofBackend.generate(&commitment, &public).unwrap();

        // Verification is stateless over the claim; no record to annotate.
        let ok = engine
            .verify_nav("verifier-1", "fund-ghost", commitment, &proof, &public, nav)
            .unwrap();
        assert!(ok);
        assert!(engine.store().fund("fund-ghost").is_none());
    }

    #[test]
    fn verification_stays_available_during_emergency() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        let inputs = book(M, NOW);
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &inputs, NOW)
            .unwrap();
        engine
            .trigger_emergency("admin-1", EmergencyReason::SecurityBreach, NOW + 10)
            .unwrap();

        let public =
            nvk_commitment::public_inputs(&inputs.holdings, &inputs.prices, &inputs.liabilities);
        let ok = engine
            .verify_nav(
                "verifier-1",
                FUND,
                out.commitment,
                &out.proof_bytes,
                &public,
                out.nav_value,
            )
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn emergency_latch_blocks_compute_until_cleared() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        engine
            .trigger_emergency("admin-1", EmergencyReason::MarketCrash, NOW)
            .unwrap();

        let err = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW + 5), NOW + 5)
            .unwrap_err();
        assert_eq!(
            err,
            NavError::EmergencyActive {
                reason: EmergencyReason::MarketCrash,
            }
        );

        engine.clear_emergency("admin-1").unwrap();
        assert!(engine.store().emergency().is_none());
        engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW + 10), NOW + 10)
            .unwrap();
    }

    #[test]
    fn exposure_write_is_admin_gated_and_self_loop_strict() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        assert!(matches!(
            engine.update_fund_exposure(
                "oracle-1",
                "fund-a",
                "fund-b",
                1_000,
                ExposureType::DirectInvestment,
                0,
                NOW,
            ),
            Err(NavError::Unauthorized { .. })
        ));

        let err = engine
            .update_fund_exposure(
                "admin-1",
                "fund-a",
                "fund-a",
                1,
                ExposureType::DirectInvestment,
                0,
                NOW,
            )
            .unwrap_err();
        assert_eq!(
            err,
            NavError::SelfLoopRejected {
                fund_id: "fund-a".to_string(),
            }
        );
        assert_eq!(engine.store().exposure().edge_count(), 0);

        // The refused write still shows up on the trail and in the stream.
        let trail = engine.store().fund("fund-a").unwrap().violations();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].violation_type, ViolationType::SelfReference);
        let events = engine.drain_events();
        assert!(matches!(
            &events[..],
            [EngineEvent::ExposureViolationDetected { .. }]
        ));
    }

    #[test]
    fn lenient_self_loop_lands_and_is_flagged_at_write_time() {
        let mut cfg = EngineConfig::sane_defaults();
        cfg.exposure.strict_self_loops = false;
        let mut engine = make_engine(cfg);

        engine
            .update_fund_exposure(
                "admin-1",
                "fund-a",
                "fund-a",
                700,
                ExposureType::SyntheticExposure,
                2,
                NOW,
            )
            .unwrap();

        assert_eq!(engine.store().exposure().edge_count(), 1);
        let trail = engine.store().fund("fund-a").unwrap().violations();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].violation_type, ViolationType::SelfReference);
        assert_eq!(trail[0].exposure_pct_bps, 700);

        let events = engine.drain_events();
        assert!(matches!(
            &events[..],
            [EngineEvent::ExposureViolationDetected { .. }]
        ));
    }

    #[test]
    fn detection_sweep_lands_findings_on_origin_funds() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        engine
            .update_fund_exposure(
                "admin-1",
                "fund-a",
                "fund-b",
                3_000,
                ExposureType::DirectInvestment,
                0,
                NOW,
            )
            .unwrap();
        engine
            .update_fund_exposure(
                "admin-1",
                "fund-b",
                "fund-a",
                2_000,
                ExposureType::CollateralBacking,
                0,
                NOW,
            )
            .unwrap();
        engine.drain_events();

        // Both edges carry their fund's whole exposure: 10000 bps each.
        let found = engine.detect_exposure_violations(4_000, NOW + 1);
        assert_eq!(found.len(), 2);
        assert!(found
            .iter()
            .all(|v| v.violation_type == ViolationType::CircularExposure));

        assert_eq!(engine.store().fund("fund-a").unwrap().violations().len(), 1);
        assert_eq!(engine.store().fund("fund-b").unwrap().violations().len(), 1);
        assert_eq!(engine.drain_events().len(), 2);
    }

    #[test]
    fn pipeline_runs_detection_as_a_soft_pass() {
        let mut cfg = EngineConfig::sane_defaults();
        cfg.exposure.strict_self_loops = true;
        let mut engine = make_engine(cfg);
        engine
            .update_fund_exposure(
                "admin-1",
                FUND,
                "fund-b",
                6_000,
                ExposureType::DerivativeExposure,
                0,
                NOW,
            )
            .unwrap();

        // Concentration over 5000 bps is a finding, not a refusal.
        let out = engine.compute_and_commit_nav("oracle-1", FUND, &book(M, NOW), NOW);
        assert!(out.is_ok());

        let events = engine.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::ExposureViolationDetected { violation }
                if violation.violation_type == ViolationType::Concentration
        )));
        assert!(!engine.store().fund(FUND).unwrap().violations().is_empty());
    }

    #[test]
    fn cross_anchor_record_and_consistency() {
        let mut cfg = EngineConfig::sane_defaults();
        cfg.anchor.known_targets = vec!["settle-east".to_string(), "settle-west".to_string()];
        let mut engine = make_engine(cfg);
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW), NOW)
            .unwrap();
        engine.drain_events();

        assert!(matches!(
            engine.record_cross_anchor(
                "oracle-1", FUND, "settle-east", 1, out.nav_value, out.commitment, NOW + 30,
            ),
            Err(NavError::Unauthorized { .. })
        ));

        engine
            .record_cross_anchor(
                "bridge-1",
                FUND,
                "settle-east",
                1,
                out.nav_value,
                out.commitment,
                NOW + 30,
            )
            .unwrap();
        assert!(engine.verify_anchor_consistency(FUND, 1).unwrap());
        let events = engine.drain_events();
        assert!(matches!(
            &events[..],
            [EngineEvent::CrossAnchorRecorded { consistent_so_far: true, .. }]
        ));

        // A diverging second target lands but flips consistency.
        engine
            .record_cross_anchor(
                "bridge-1",
                FUND,
                "settle-west",
                1,
                out.nav_value + 5,
                out.commitment,
                NOW + 40,
            )
            .unwrap();
        assert!(!engine.verify_anchor_consistency(FUND, 1).unwrap());
        let status = engine.get_anchor_status(FUND, 1).unwrap();
        assert_eq!(status.len(), 2);
        assert!(status.iter().any(|s| s.anchor_id == "settle-east" && s.consistent));
        assert!(status.iter().any(|s| s.anchor_id == "settle-west" && !s.consistent));
    }

    #[test]
    fn cross_anchor_rejects_future_epochs_and_unknown_names() {
        let mut cfg = EngineConfig::sane_defaults();
        cfg.anchor.known_targets = vec!["settle-east".to_string()];
        let mut engine = make_engine(cfg);
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW), NOW)
            .unwrap();

        let err = engine
            .record_cross_anchor(
                "bridge-1", FUND, "settle-east", 5, out.nav_value, out.commitment, NOW + 30,
            )
            .unwrap_err();
        assert_eq!(err, NavError::EpochSequence { expected: 1, got: 5 });

        let err = engine
            .record_cross_anchor(
                "bridge-1", FUND, "settle-x", 1, out.nav_value, out.commitment, NOW + 30,
            )
            .unwrap_err();
        assert_eq!(
            err,
            NavError::UnknownTarget {
                anchor_id: "settle-x".to_string(),
            }
        );

        let err = engine
            .record_cross_anchor(
                "bridge-1", "fund-ghost", "settle-east", 1, out.nav_value, out.commitment, NOW,
            )
            .unwrap_err();
        assert_eq!(
            err,
            NavError::UnknownFund {
                fund_id: "fund-ghost".to_string(),
            }
        );
    }

    #[test]
    fn nav_history_is_bounded_and_ascending() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        for i in 0..5 {
            let now = NOW + i * 60;
            engine
                .compute_and_commit_nav("oracle-1", FUND, &book(M, now), now)
                .unwrap();
        }
        let history = engine.get_nav_history(FUND, 3).unwrap();
        let epochs: Vec<u64> = history.iter().map(|e| e.epoch).collect();
        assert_eq!(epochs, vec![3, 4, 5]);

        assert!(matches!(
            engine.get_nav_history("fund-ghost", 3),
            Err(NavError::UnknownFund { .. })
        ));
    }

    #[test]
    fn override_is_bounded_and_latches_the_emergency() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        let out = engine
            .compute_and_commit_nav("oracle-1", FUND, &book(M, NOW), NOW)
            .unwrap();
        engine.drain_events();
        let nav = out.nav_value;

        // One bps over the bound refuses and changes nothing.
        let over = nav + nav * 2_501 / 10_000;
        let err = engine
            .emergency_nav_override(
                "admin-1",
                FUND,
                over,
                EmergencyReason::OracleFailure,
                NOW + 60,
            )
            .unwrap_err();
        assert_eq!(
            err,
            NavError::EmergencyChangeTooLarge {
                requested_bps: 2_501,
                max_bps: 2_500,
            }
        );
        assert_eq!(engine.store().fund(FUND).unwrap().current_nav(), Some(nav));
        assert!(engine.store().emergency().is_none());

        // Exactly the bound is allowed. No epoch advance, halt latched.
        let capped = nav + nav * 2_500 / 10_000;
        engine
            .emergency_nav_override(
                "admin-1",
                FUND,
                capped,
                EmergencyReason::OracleFailure,
                NOW + 90,
            )
            .unwrap();
        let fund = engine.store().fund(FUND).unwrap();
        assert_eq!(fund.current_nav(), Some(capped));
        assert_eq!(fund.drift().current_epoch, 1);
        assert!(fund.record(2).is_none());
        let em = engine.store().emergency().unwrap();
        assert_eq!(em.reason, EmergencyReason::OracleFailure);
        assert_eq!(em.triggered_by, "admin-1");

        let events = engine.drain_events();
        assert!(matches!(
            &events[..],
            [EngineEvent::EmergencyTriggered {
                fund_id: Some(f),
                old_nav: Some(o),
                new_nav: Some(n),
                ..
            }] if f == FUND && *o == nav && *n == capped
        ));

        // Publication is down until the latch clears.
        assert!(matches!(
            engine.compute_and_commit_nav("oracle-1", FUND, &book(M, NOW + 120), NOW + 120),
            Err(NavError::EmergencyActive { .. })
        ));
    }

    #[test]
    fn override_requires_a_standing_nav() {
        let mut engine = make_engine(EngineConfig::sane_defaults());
        assert!(matches!(
            engine.emergency_nav_override(
                "admin-1",
                "fund-ghost",
                M,
                EmergencyReason::TechnicalFailure,
                NOW,
            ),
            Err(NavError::UnknownFund { .. })
        ));
    }
}
