//! Status command implementation

use super::run::build_governor;
use crate::config::Config;
use chrono::Utc;
use clap::Args;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Run one refresh tick before reporting
    #[arg(long)]
    pub tick: bool,
}

impl StatusArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (governor, _roster) = build_governor(config).await?;
        if self.tick {
            let report = governor.tick(Utc::now()).await;
            tracing::info!(
                due = report.due_symbols,
                sent = report.batches_sent,
                failed = report.batches_failed,
                "Tick complete"
            );
        }
        let status = governor.status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    }
}
