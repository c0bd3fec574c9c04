//! navkeep entry point.
//!
//! This file is intentionally thin: it sets up tracing, parses the command
//! tree, and dispatches to the handlers in `commands/`. Tracing goes to
//! stderr so stdout stays machine-readable JSONL.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "navkeep")]
#[command(about = "NAV computation and integrity engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario against a fresh engine, emitting events as JSONL.
    Run {
        /// Layered config paths in merge order (defaults file first).
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Scenario YAML path. Omitted = the built-in demo scenario.
        #[arg(long)]
        scenario: Option<String>,

        /// Append engine events to this JSONL audit trail. Overrides the
        /// config's audit.path.
        #[arg(long = "audit-log")]
        audit_log: Option<String>,

        /// Write the trail without hash chaining.
        #[arg(long = "no-hash-chain", default_value_t = false)]
        no_hash_chain: bool,
    },

    /// Compute the layered config hash and print the canonical JSON.
    ConfigHash {
        /// Paths in merge order (defaults -> site -> run overrides).
        #[arg(long = "paths", required = true, value_delimiter = ',')]
        paths: Vec<String>,
    },

    /// Verify an audit trail's hash chain and event id derivations.
    AuditVerify {
        /// JSONL trail path.
        #[arg(long)]
        path: String,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Run {
            config_paths,
            scenario,
            audit_log,
            no_hash_chain,
        } => commands::run::run_scenario(config_paths, scenario, audit_log, no_hash_chain),
        Commands::ConfigHash { paths } => commands::config_hash(&paths),
        Commands::AuditVerify { path } => commands::audit_verify(&path),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
