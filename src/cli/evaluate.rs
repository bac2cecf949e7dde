//! Evaluate command implementation

use super::read_json;
use crate::config::Config;
use crate::fitness::{CapitalMetrics, FitnessEnhancer, PerformanceMetrics};
use crate::stage::{Stage, StageManager};
use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;

/// Input file layout
#[derive(Debug, Deserialize)]
struct EvaluationInput {
    #[serde(default)]
    key: Option<String>,
    metrics: PerformanceMetrics,
    capital: CapitalMetrics,
    #[serde(default)]
    peers: Vec<Vec<f64>>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// JSON file with `metrics`, `capital` and optional `peers`
    pub input: PathBuf,

    /// Stage the strategy is currently at
    #[arg(long, default_value = "PLAN")]
    pub stage: Stage,

    /// Score scale used against the promotion threshold
    #[arg(long, default_value = "10")]
    pub scale: f64,
}

impl EvaluateArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let input: EvaluationInput = read_json(&self.input)?;
        let enhancer = FitnessEnhancer::new(config.fitness.clone());

        let result = enhancer.enhanced_fitness(&input.metrics, &input.capital, &input.peers);
        let verdict = enhancer.meets_promotion_criteria(&input.metrics, &input.capital);

        let stages = StageManager::new(config.stage.clone());
        let key = input.key.unwrap_or_else(|| "strategy".to_string());
        let decision = stages.next_stage(
            &key,
            self.stage,
            result.enhanced_fitness * self.scale,
            stages.threshold(),
        );

        let output = serde_json::json!({
            "key": key,
            "fitness": result,
            "promotion": {
                "eligible": verdict.eligible,
                "reasons": verdict.reasons.iter().map(ToString::to_string).collect::<Vec<_>>(),
            },
            "stage": decision,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
