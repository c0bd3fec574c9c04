//! The `navkeep run` handler: config + scenario + engine + audit wiring.
//!
//! Engine events stream to stdout as JSONL envelopes and, when a trail path
//! is configured, into the hash-chained audit log. The final line is a
//! store snapshot.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use nvk_engine::EngineEvent;
use nvk_schemas::EventEnvelope;
use nvk_testkit::{demo_engine_config, demo_scenario, load_scenario_yaml, ScenarioRunner};

use super::{engine_config_from, load_settings};

pub fn run_scenario(
    config_paths: Vec<String>,
    scenario_path: Option<String>,
    audit_log: Option<String>,
    no_hash_chain: bool,
) -> Result<()> {
    let (settings, loaded) = load_settings(&config_paths)?;

    let spec = match &scenario_path {
        Some(p) => load_scenario_yaml(Path::new(p))?,
        None => demo_scenario(),
    };

    let run_id = Uuid::new_v4();
    info!(
        run_id = %run_id,
        engine_id = %settings.engine.engine_id,
        scenario = %spec.name,
        steps = spec.steps.len(),
        "run start"
    );
    if let Some(loaded) = &loaded {
        info!(config_hash = %loaded.config_hash, "config loaded");
    }

    let audit_path = audit_log.or_else(|| settings.audit.path.clone());
    let mut audit = match &audit_path {
        Some(p) => {
            let chain = settings.audit.hash_chain && !no_hash_chain;
            let writer = nvk_audit::AuditWriter::resume_from(Path::new(p), chain)
                .with_context(|| format!("open audit trail {p}"))?;
            info!(path = %p, hash_chain = chain, resumed_seq = writer.seq(), "audit trail open");
            Some(writer)
        }
        None => None,
    };

    let mut engine_cfg = engine_config_from(&settings);
    if scenario_path.is_none() {
        // The built-in demo confirms epochs against its own anchor targets,
        // which a bare default config does not know.
        for target in demo_engine_config().anchor.known_targets {
            if !engine_cfg.anchor.known_targets.contains(&target) {
                engine_cfg.anchor.known_targets.push(target);
            }
        }
    }

    let mut runner = ScenarioRunner::new(engine_cfg, &spec.actors);
    let mut seq: u64 = 0;
    let mut refused = 0usize;

    for (index, step) in spec.steps.iter().enumerate() {
        let report = runner.run_step(index, step)?;
        if report.refused {
            refused += 1;
            warn!(step = index, op = %report.op, outcome = %report.outcome, "step refused");
        } else {
            info!(step = index, op = %report.op, outcome = %report.outcome, "step ok");
        }

        for event in runner.drain_events() {
            let (topic, event_type, payload) = event_payload(&event)?;
            if let Some(writer) = audit.as_mut() {
                writer
                    .append(run_id, topic, event_type, payload.clone())
                    .context("append audit event")?;
            }
            let envelope = EventEnvelope {
                event_id: Uuid::new_v4(),
                run_id,
                seq,
                ts_utc: Utc::now(),
                kind: event_type.to_string(),
                payload,
            };
            seq += 1;
            println!("{}", serde_json::to_string(&envelope)?);
        }
    }

    let snapshot = runner.snapshot();
    println!("{}", serde_json::to_string(&snapshot)?);
    info!(
        run_id = %run_id,
        steps = spec.steps.len(),
        refused,
        events = seq,
        funds = snapshot.funds.len(),
        "run complete"
    );
    Ok(())
}

/// Audit topic, event type, and serialized schema payload for one engine
/// event.
fn event_payload(event: &EngineEvent) -> Result<(&'static str, &'static str, Value)> {
    let (topic, event_type, payload) = match event {
        EngineEvent::NavComputed {
            fund_id,
            epoch,
            nav_value,
            total_assets,
            total_liabilities,
            drift_bps,
            commitment,
            proof_bytes,
            timestamp,
        } => (
            "nav",
            "NAV_COMPUTED",
            serde_json::to_value(nvk_schemas::NavComputed {
                fund_id: fund_id.clone(),
                epoch: *epoch,
                nav_value: nav_value.to_string(),
                total_assets: total_assets.to_string(),
                total_liabilities: total_liabilities.to_string(),
                drift_bps: drift_bps.to_string(),
                commitment: nvk_commitment::to_hex(commitment),
                proof: hex::encode(proof_bytes),
                ts_utc: utc_from(*timestamp),
            })?,
        ),
        EngineEvent::DriftViolation {
            fund_id,
            epoch,
            drift_bps,
            max_drift_bps,
            consecutive_violations,
            breaker_tripped,
            timestamp,
        } => (
            "drift",
            "DRIFT_VIOLATION",
            serde_json::to_value(nvk_schemas::DriftViolation {
                fund_id: fund_id.clone(),
                epoch: *epoch,
                drift_bps: drift_bps.to_string(),
                max_drift_bps: *max_drift_bps,
                consecutive_violations: *consecutive_violations,
                breaker_tripped: *breaker_tripped,
                ts_utc: utc_from(*timestamp),
            })?,
        ),
        EngineEvent::ExposureViolationDetected { violation } => (
            "exposure",
            "EXPOSURE_VIOLATION",
            serde_json::to_value(nvk_schemas::ExposureViolation {
                fund_a: violation.fund_a.clone(),
                fund_b: violation.fund_b.clone(),
                exposure_pct_bps: violation.exposure_pct_bps,
                violation_type: violation.violation_type.to_string(),
                ts_utc: utc_from(violation.timestamp),
            })?,
        ),
        EngineEvent::CrossAnchorRecorded {
            fund_id,
            anchor_id,
            epoch,
            nav_value,
            commitment,
            consistent_so_far,
            timestamp,
        } => (
            "anchor",
            "CROSS_ANCHOR_RECORDED",
            serde_json::to_value(nvk_schemas::CrossAnchorRecorded {
                fund_id: fund_id.clone(),
                anchor_id: anchor_id.clone(),
                epoch: *epoch,
                nav_value: nav_value.to_string(),
                commitment: nvk_commitment::to_hex(commitment),
                consistent_so_far: *consistent_so_far,
                ts_utc: utc_from(*timestamp),
            })?,
        ),
        EngineEvent::EmergencyTriggered {
            reason,
            actor,
            fund_id,
            old_nav,
            new_nav,
            timestamp,
        } => (
            "emergency",
            "EMERGENCY_TRIGGERED",
            serde_json::to_value(nvk_schemas::EmergencyTriggered {
                reason: reason.to_string(),
                actor: actor.clone(),
                fund_id: fund_id.clone(),
                old_nav: old_nav.map(|v| v.to_string()),
                new_nav: new_nav.map(|v| v.to_string()),
                ts_utc: utc_from(*timestamp),
            })?,
        ),
    };
    Ok((topic, event_type, payload))
}

fn utc_from(unix_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix_secs, 0).unwrap_or_else(Utc::now)
}
