//! Command handlers for navkeep.
//!
//! Shared config and audit helpers live here; the run handler lives in
//! `run.rs`.

pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use nvk_config::{EngineSettings, LoadedConfig, UnusedKeyPolicy};
use nvk_engine::EngineConfig;
use tracing::warn;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load and merge config layers, lint unused keys, and deserialize the
/// typed settings. No paths = compiled-in defaults.
pub fn load_settings(config_paths: &[String]) -> Result<(EngineSettings, Option<LoadedConfig>)> {
    if config_paths.is_empty() {
        return Ok((EngineSettings::default(), None));
    }

    let refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = nvk_config::load_layered_yaml(&refs)?;

    let report = nvk_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(
            unused_leaf_keys = report.unused_leaf_pointers.len(),
            "CONFIG_UNUSED_KEYS"
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            warn!("  unused={p}");
        }
        let extra = report.unused_leaf_pointers.len().saturating_sub(50);
        if extra > 0 {
            warn!("  ... and {extra} more");
        }
    }

    let settings = EngineSettings::from_loaded(&loaded)?;
    Ok((settings, Some(loaded)))
}

/// Map typed settings onto the engine's config structs.
pub fn engine_config_from(settings: &EngineSettings) -> EngineConfig {
    EngineConfig {
        valuation: nvk_engine::ValuationConfig {
            risk_adjustments_enabled: settings.valuation.risk_adjustments_enabled,
            volatility_bps_per_point: settings.valuation.volatility_bps_per_point,
            illiquidity_haircut_bps: settings.valuation.illiquidity_haircut_bps,
            concentration_floor_bps: settings.valuation.concentration_floor_bps,
            concentration_weight_bps: settings.valuation.concentration_weight_bps,
            max_adjustment_bps: settings.valuation.max_adjustment_bps,
        },
        drift: nvk_engine::DriftConfig {
            max_drift_bps: settings.drift.max_drift_bps,
            max_consecutive_violations: settings.drift.max_consecutive_violations,
            window: settings.drift.window,
        },
        exposure: nvk_engine::ExposureConfig {
            max_slots: settings.exposure.max_slots,
            concentration_limit_bps: settings.exposure.concentration_limit_bps,
            strict_self_loops: settings.exposure.strict_self_loops,
        },
        anchor: nvk_engine::AnchorConfig {
            known_targets: settings.anchor.known_targets.clone(),
            max_epoch_lag: settings.anchor.max_epoch_lag,
        },
        max_emergency_change_bps: settings.engine.max_emergency_change_bps,
        default_max_exposure_pct_bps: settings.engine.default_max_exposure_pct_bps,
    }
}

// ---------------------------------------------------------------------------
// config-hash
// ---------------------------------------------------------------------------

pub fn config_hash(paths: &[String]) -> Result<()> {
    let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = nvk_config::load_layered_yaml(&refs)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

// ---------------------------------------------------------------------------
// audit-verify
// ---------------------------------------------------------------------------

pub fn audit_verify(path: &str) -> Result<()> {
    let result = nvk_audit::verify_hash_chain(Path::new(path))
        .with_context(|| format!("verify audit trail {path}"))?;
    match result {
        nvk_audit::VerifyResult::Valid { lines } => {
            println!("chain_valid=true lines={lines}");
            Ok(())
        }
        nvk_audit::VerifyResult::Broken { line, reason } => {
            println!("chain_valid=false line={line} reason={reason}");
            anyhow::bail!("audit trail broken at line {line}: {reason}")
        }
    }
}
