//! nvk-testkit
//!
//! Goals:
//! - Script whole engine runs as data: a YAML `ScenarioSpec` lists actors and
//!   an ordered sequence of operations, and `ScenarioRunner` replays it
//!   against a live `NavEngine`.
//! - Refusals are outcomes, not aborts: a step the engine rejects lands in
//!   the report with the error text and the run keeps going, so scenarios can
//!   script authorization failures and breaker trips on purpose.
//! - Ship one `demo_scenario()` that exercises every operation class, for
//!   smoke tests and the CLI default run.

pub mod fixtures;
pub mod runner;
pub mod scenario;

pub use runner::{ScenarioRun, ScenarioRunner, StaticAuthorizer, StepReport};
pub use scenario::{
    demo_engine_config, demo_scenario, ActorSpec, CapabilitySpec, HoldingSpec, LiabilitySpec,
    PriceSpec, ProofSpec, ScenarioSpec, StepSpec,
};

use anyhow::{Context, Result};
use std::path::Path;

/// Parse a scenario from YAML text.
pub fn parse_scenario_yaml(text: &str) -> Result<ScenarioSpec> {
    let spec: ScenarioSpec =
        serde_yaml::from_str(text).context("failed to parse scenario YAML")?;
    if spec.steps.is_empty() {
        anyhow::bail!("scenario '{}' has no steps", spec.name);
    }
    Ok(spec)
}

/// Load a scenario from a YAML file on disk.
pub fn load_scenario_yaml(path: &Path) -> Result<ScenarioSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file {}", path.display()))?;
    parse_scenario_yaml(&text)
}
