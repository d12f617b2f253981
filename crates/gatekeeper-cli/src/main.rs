//! `gatekeeper` CLI: a thin clap wrapper around `gk-gates`, `gk-config`, and
//! `gk-audit` (modeled on `mqk-cli`'s `Cli { cmd: Commands }` shape, cut down
//! to the subcommands this repo's three ambient crates actually support —
//! no db/backtest/execution surface, since admission evaluation has none).

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(about = "Gatekeeper admission-engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a candidate signal snapshot bundle (JSON, file or stdin)
    /// through the full 19-gate admission chain.
    Evaluate {
        /// Path to the snapshot bundle JSON; reads stdin if omitted.
        #[arg(long)]
        input: Option<String>,

        /// Layered YAML config paths in merge order; compiled-in defaults
        /// are used if none are given.
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Append the decision to this hash-chained audit log.
        #[arg(long)]
        audit_log: Option<String>,

        /// Path to the persisted DRP state machine (JSON). Loaded before
        /// the evaluation and written back after, so the machine's state
        /// carries across invocations instead of resetting every call.
        #[arg(long = "drp-state")]
        drp_state: Option<String>,
    },

    /// Compute the layered config hash and print canonical JSON.
    ConfigHash {
        /// Paths in merge order (base -> venue -> stress overrides, ...).
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Verify the hash-chain integrity of an audit log.
    VerifyAudit {
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Evaluate { input, config_paths, audit_log, drp_state } => commands::evaluate::run(input, config_paths, audit_log, drp_state),
        Commands::ConfigHash { paths } => commands::config_hash::run(paths),
        Commands::VerifyAudit { path } => commands::verify_audit::run(path),
    }
}
