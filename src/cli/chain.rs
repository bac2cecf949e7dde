//! Chain command implementation

use super::read_json;
use crate::chain::{ChainAnalyzer, OptionsChain};
use crate::config::Config;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ChainArgs {
    /// JSON file holding an options chain snapshot
    pub input: PathBuf,
}

impl ChainArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let chain: OptionsChain = read_json(&self.input)?;
        let verdict = ChainAnalyzer::new(config.chain.clone()).validate(&chain);

        let output = serde_json::json!({
            "underlying": chain.underlying,
            "quality": verdict.quality,
            "valid": verdict.valid,
            "reasons": verdict.reasons.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
