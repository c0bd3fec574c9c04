//! Replays a [`ScenarioSpec`] against a live engine, step by step.
//!
//! Engine refusals (bad capability, breaker latch, emergency, bound checks)
//! are recorded in the step report and the run continues. Only malformed
//! scenario data (unparseable money, bad hex) aborts, since the file itself
//! is broken at that point.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use nvk_commitment::{public_inputs, HashProofBackend, PublicInputs};
use nvk_engine::{Authorizer, Capability, EngineConfig, EngineEvent, NavEngine, NavOutcome};
use nvk_schemas::{FundSummary, StoreSnapshot};

use crate::scenario::{build_nav_inputs, parse_micros, ActorSpec, ScenarioSpec, StepSpec};

/// Fixed capability grants built from a scenario's actor list. Unknown
/// actors hold nothing.
pub struct StaticAuthorizer {
    grants: BTreeMap<String, Vec<Capability>>,
}

impl StaticAuthorizer {
    /// No grants at all. Every capability check fails.
    pub fn deny_all() -> Self {
        Self {
            grants: BTreeMap::new(),
        }
    }

    pub fn from_actors(actors: &[ActorSpec]) -> Self {
        let mut grants = BTreeMap::new();
        for actor in actors {
            let caps: Vec<Capability> = actor
                .capabilities
                .iter()
                .map(|c| Capability::from(*c))
                .collect();
            grants.insert(actor.name.clone(), caps);
        }
        Self { grants }
    }
}

impl Authorizer for StaticAuthorizer {
    fn is_authorized(&self, actor: &str, capability: Capability) -> bool {
        self.grants
            .get(actor)
            .map_or(false, |caps| caps.contains(&capability))
    }
}

/// What one step produced.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: String,
    /// "ok ..." or "refused: ...".
    pub outcome: String,
    pub refused: bool,
}

/// A finished run: per-step reports plus every engine event, in emission
/// order.
pub struct ScenarioRun {
    pub name: String,
    pub reports: Vec<StepReport>,
    pub events: Vec<EngineEvent>,
}

struct Outcome {
    text: String,
    refused: bool,
}

impl Outcome {
    fn ok(detail: String) -> Self {
        Self {
            text: format!("ok {detail}"),
            refused: false,
        }
    }

    fn refused(err: impl std::fmt::Display) -> Self {
        Self {
            text: format!("refused: {err}"),
            refused: true,
        }
    }
}

/// Last accepted publication per fund, kept so later steps can re-verify
/// or anchor it without restating the commitment.
struct Published {
    outcome: NavOutcome,
    public: PublicInputs,
}

pub struct ScenarioRunner {
    engine: NavEngine<StaticAuthorizer, HashProofBackend>,
    published: BTreeMap<String, Published>,
}

impl ScenarioRunner {
    pub fn new(cfg: EngineConfig, actors: &[ActorSpec]) -> Self {
        let authorizer = StaticAuthorizer::from_actors(actors);
        Self {
            engine: NavEngine::new(cfg, authorizer, HashProofBackend),
            published: BTreeMap::new(),
        }
    }

    pub fn engine(&self) -> &NavEngine<StaticAuthorizer, HashProofBackend> {
        &self.engine
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.engine.drain_events()
    }

    /// Run every step, collecting reports and events. Aborts only on
    /// malformed scenario data.
    pub fn run_all(&mut self, spec: &ScenarioSpec) -> Result<ScenarioRun> {
        let mut reports = Vec::with_capacity(spec.steps.len());
        let mut events = Vec::new();
        for (index, step) in spec.steps.iter().enumerate() {
            reports.push(self.run_step(index, step)?);
            events.extend(self.engine.drain_events());
        }
        Ok(ScenarioRun {
            name: spec.name.clone(),
            reports,
            events,
        })
    }

    pub fn run_step(&mut self, index: usize, step: &StepSpec) -> Result<StepReport> {
        let (op, outcome) = match step {
            StepSpec::ComputeNav {
                actor,
                fund_id,
                at,
                holdings,
                prices,
                liabilities,
                compliance_proofs,
            } => {
                let inputs =
                    build_nav_inputs(*at, holdings, prices, liabilities, compliance_proofs)
                        .with_context(|| format!("step {index} (compute_nav)"))?;
                let public =
                    public_inputs(&inputs.holdings, &inputs.prices, &inputs.liabilities);
                let outcome = match self.engine.compute_and_commit_nav(actor, fund_id, &inputs, *at)
                {
                    Ok(out) => {
                        let detail = format!(
                            "epoch={} nav={} drift_bps={}",
                            out.epoch, out.nav_value, out.drift_bps
                        );
                        self.published
                            .insert(fund_id.clone(), Published { outcome: out, public });
                        Outcome::ok(detail)
                    }
                    Err(e) => Outcome::refused(e),
                };
                ("compute_nav", outcome)
            }
            StepSpec::VerifyLast {
                actor,
                fund_id,
                claimed_nav,
            } => {
                let outcome = match self.published.get(fund_id) {
                    None => Outcome::refused(format!(
                        "nothing published for {fund_id} in this run"
                    )),
                    Some(p) => {
                        let nav = match claimed_nav {
                            Some(text) => parse_micros(text, "claimed_nav")
                                .with_context(|| format!("step {index} (verify_last)"))?,
                            None => p.outcome.nav_value,
                        };
                        match self.engine.verify_nav(
                            actor,
                            fund_id,
                            p.outcome.commitment,
                            &p.outcome.proof_bytes,
                            &p.public,
                            nav,
                        ) {
                            Ok(valid) => Outcome::ok(format!("verified={valid}")),
                            Err(e) => Outcome::refused(e),
                        }
                    }
                };
                ("verify_last", outcome)
            }
            StepSpec::UpdateExposure {
                actor,
                from_fund,
                to_fund,
                weight_bps,
                exposure_type,
                slot_index,
                at,
            } => {
                let outcome = match self.engine.update_fund_exposure(
                    actor,
                    from_fund,
                    to_fund,
                    *weight_bps,
                    (*exposure_type).into(),
                    *slot_index,
                    *at,
                ) {
                    Ok(()) => Outcome::ok(format!(
                        "{from_fund}->{to_fund} weight_bps={weight_bps}"
                    )),
                    Err(e) => Outcome::refused(e),
                };
                ("update_exposure", outcome)
            }
            StepSpec::DetectExposure {
                max_exposure_pct_bps,
                at,
            } => {
                let found = self
                    .engine
                    .detect_exposure_violations(*max_exposure_pct_bps, *at);
                ("detect_exposure", Outcome::ok(format!("findings={}", found.len())))
            }
            StepSpec::RecordAnchor {
                actor,
                fund_id,
                anchor_id,
                epoch,
                nav_value,
                at,
            } => {
                let outcome = match self.published.get(fund_id) {
                    None => Outcome::refused(format!(
                        "nothing published for {fund_id} in this run"
                    )),
                    Some(p) => {
                        let use_epoch = epoch.unwrap_or(p.outcome.epoch);
                        let nav = match nav_value {
                            Some(text) => parse_micros(text, "anchor nav_value")
                                .with_context(|| format!("step {index} (record_anchor)"))?,
                            None => p.outcome.nav_value,
                        };
                        match self.engine.record_cross_anchor(
                            actor,
                            fund_id,
                            anchor_id,
                            use_epoch,
                            nav,
                            p.outcome.commitment,
                            *at,
                        ) {
                            Ok(()) => {
                                Outcome::ok(format!("anchor={anchor_id} epoch={use_epoch}"))
                            }
                            Err(e) => Outcome::refused(e),
                        }
                    }
                };
                ("record_anchor", outcome)
            }
            StepSpec::TriggerEmergency { actor, reason, at } => {
                let outcome = match self.engine.trigger_emergency(actor, (*reason).into(), *at) {
                    Ok(()) => Outcome::ok(format!("reason={reason:?}")),
                    Err(e) => Outcome::refused(e),
                };
                ("trigger_emergency", outcome)
            }
            StepSpec::ClearEmergency { actor } => {
                let outcome = match self.engine.clear_emergency(actor) {
                    Ok(()) => Outcome::ok("cleared".to_owned()),
                    Err(e) => Outcome::refused(e),
                };
                ("clear_emergency", outcome)
            }
            StepSpec::OverrideNav {
                actor,
                fund_id,
                nav_value,
                reason,
                at,
            } => {
                let nav = parse_micros(nav_value, "override nav_value")
                    .with_context(|| format!("step {index} (override_nav)"))?;
                let outcome = match self
                    .engine
                    .emergency_nav_override(actor, fund_id, nav, (*reason).into(), *at)
                {
                    Ok(()) => Outcome::ok(format!("nav={nav}")),
                    Err(e) => Outcome::refused(e),
                };
                ("override_nav", outcome)
            }
            StepSpec::ResetBreaker { actor, fund_id } => {
                let outcome = match self.engine.reset_drift_breaker(actor, fund_id) {
                    Ok(()) => Outcome::ok("reset".to_owned()),
                    Err(e) => Outcome::refused(e),
                };
                ("reset_breaker", outcome)
            }
        };
        Ok(StepReport {
            index,
            op: op.to_owned(),
            outcome: outcome.text,
            refused: outcome.refused,
        })
    }

    /// Summarize the store for end-of-run reporting.
    pub fn snapshot(&self) -> StoreSnapshot {
        let store = self.engine.store();
        let mut funds = Vec::new();
        for fund_id in store.fund_ids() {
            if let Some(fund) = store.fund(fund_id) {
                funds.push(FundSummary {
                    fund_id: fund_id.to_owned(),
                    current_epoch: fund.drift().current_epoch,
                    current_nav: fund.current_nav().map(|v| v.to_string()),
                    verified_records: fund.records().filter(|r| r.is_verified).count() as u64,
                    violations: fund.violations().len() as u64,
                    breaker_tripped: fund.drift().breaker_tripped,
                });
            }
        }
        StoreSnapshot {
            captured_at_utc: Utc::now(),
            emergency: store.emergency().map(|e| e.reason.to_string()),
            funds,
        }
    }
}
