//! CLI interface for market-governor
//!
//! Provides subcommands for:
//! - `run`: Run the refresh governor and log its events
//! - `status`: Show governor status as JSON
//! - `evaluate`: Score strategy metrics and check promotion
//! - `chain`: Score and validate an options chain
//! - `config`: Show configuration

mod chain;
mod evaluate;
mod run;
mod status;

pub use chain::ChainArgs;
pub use evaluate::EvaluateArgs;
pub use run::{build_governor, build_provider, RunArgs};
pub use status::StatusArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "market-governor")]
#[command(about = "Rate-budgeted market-data refresh governor with strategy staging")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the refresh governor until Ctrl-C
    Run(RunArgs),
    /// Show governor status
    Status(StatusArgs),
    /// Score strategy metrics from a JSON file
    Evaluate(EvaluateArgs),
    /// Analyze an options chain from a JSON file
    Chain(ChainArgs),
    /// Show configuration
    Config,
}

/// Read and parse a JSON input file
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))
}
