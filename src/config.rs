//! Configuration types for market-governor

use anyhow::Context;
use crate::roster::RosterEntry;
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub governor: GovernorConfig,
    pub rate: RateConfig,
    pub calendar: CalendarConfig,
    pub provider: ProviderConfig,
    pub roster: RosterConfig,
    pub stage: StageConfig,
    pub fitness: FitnessConfig,
    pub chain: ChainConfig,
    pub execution: ExecutionConfig,
    pub data: DataConfig,
    pub telemetry: TelemetryConfig,
}

/// Refresh governor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Run the polling loop on `start()`
    pub autorefresh: bool,
    /// Base tick interval during market hours (ms)
    pub interval_market_ms: u64,
    /// Base tick interval outside market hours (ms)
    pub interval_after_hours_ms: u64,
    /// Tier 2 refreshes every N ticks
    pub tier2_every: u64,
    /// Tier 3 refreshes every N ticks
    pub tier3_every: u64,
    /// Symbols per provider call
    pub batch_size: usize,
    /// Active roster cap
    pub max_symbols: usize,
    /// Active roster cap while the market is closed
    pub max_symbols_after_hours: Option<usize>,
    /// Delay between batches within a tick, before backoff scaling (ms)
    pub inter_batch_delay_ms: u64,
    /// Hard timeout on a single provider call (ms)
    pub provider_timeout_ms: u64,
    /// Bound on the market recorder hook for one batch (ms)
    pub recorder_timeout_ms: u64,
    /// Event channel capacity
    pub event_capacity: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            autorefresh: true,
            interval_market_ms: 5_000,
            interval_after_hours_ms: 60_000,
            tier2_every: 3,
            tier3_every: 10,
            batch_size: 50,
            max_symbols: 200,
            max_symbols_after_hours: None,
            inter_batch_delay_ms: 250,
            provider_timeout_ms: 10_000,
            recorder_timeout_ms: 2_000,
            event_capacity: 1024,
        }
    }
}

/// Rate budget configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub quota_per_minute: u32,
    pub reset_interval_secs: u64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            quota_per_minute: 120,
            reset_interval_secs: 60,
        }
    }
}

/// Exchange session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA timezone of the exchange
    pub timezone: String,
    /// Session open, "HH:MM" exchange-local
    pub open: String,
    /// Session close, "HH:MM" exchange-local
    pub close: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            open: "09:30".to_string(),
            close: "16:00".to_string(),
        }
    }
}

/// Quote provider backend
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Simulated,
    Http,
}

/// Quote provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub name: String,
    pub base_url: String,
    /// Falls back to the `QUOTE_API_KEY` environment variable
    pub api_key: Option<String>,
    /// Seed for the simulated random walk
    pub seed: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Simulated,
            name: "simulated".to_string(),
            base_url: String::new(),
            api_key: None,
            seed: 42,
        }
    }
}

impl ProviderConfig {
    /// Configured API key, else `QUOTE_API_KEY` from the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("QUOTE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Symbol roster configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub entries: Vec<RosterEntry>,
    pub refresh_interval_secs: u64,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            refresh_interval_secs: 300,
        }
    }
}

/// How far a promotion moves a key
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StagePolicy {
    /// Promote straight to ROUTE; demote back to the stage promoted from
    #[default]
    Direct,
    /// Move one stage at a time in both directions
    OneStep,
}

/// Stage manager configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub promote_threshold: f64,
    /// Demotion only below `promote_threshold - hysteresis_margin`
    pub hysteresis_margin: f64,
    /// Minimum dwell time between transitions of one key
    pub min_hold_secs: u64,
    pub policy: StagePolicy,
    pub event_capacity: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            promote_threshold: 9.3,
            hysteresis_margin: 0.5,
            min_hold_secs: 0,
            policy: StagePolicy::Direct,
            event_capacity: 256,
        }
    }
}

/// Strict promotion gate thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromotionCriteria {
    pub min_trades: u32,
    pub min_sharpe: f64,
    pub max_drawdown: f64,
    pub min_win_rate: f64,
    pub min_capital_efficiency: f64,
    pub max_slippage_pct: f64,
}

impl Default for PromotionCriteria {
    fn default() -> Self {
        Self {
            min_trades: 30,
            min_sharpe: 1.0,
            max_drawdown: 0.20,
            min_win_rate: 0.45,
            min_capital_efficiency: 0.05,
            max_slippage_pct: 0.005,
        }
    }
}

/// Fitness enhancer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Capital efficiency below this is penalized
    pub capital_efficiency_floor: f64,
    /// Friction / gross P&L above this is penalized
    pub friction_cap: f64,
    /// Clamp for each floor/cap violation penalty
    pub max_violation_penalty: f64,
    /// Clamp for the final enhanced fitness
    pub min_enhanced_fitness: f64,
    pub promotion: PromotionCriteria,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            capital_efficiency_floor: 0.05,
            friction_cap: 0.3,
            max_violation_penalty: 0.5,
            min_enhanced_fitness: -1.0,
            promotion: PromotionCriteria::default(),
        }
    }
}

/// Options chain validation minimums
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Relative spread at which the spread score reaches zero
    pub max_spread: f64,
    pub min_spread_score: f64,
    pub min_volume_score: f64,
    pub min_oi_score: f64,
    pub min_overall_score: f64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_spread: 0.10,
            min_spread_score: 0.5,
            min_volume_score: 0.3,
            min_oi_score: 0.3,
            min_overall_score: 0.5,
        }
    }
}

/// Execution gate configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Orders are refused on quotes older than this
    pub max_quote_age_secs: u64,
    /// Paper fee as a fraction of notional
    pub fee_rate: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_quote_age_secs: 30,
            fee_rate: Decimal::ZERO,
        }
    }
}

/// Quote observation capture configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub capture_enabled: bool,
    pub output_dir: PathBuf,
    pub rotation_interval_secs: u64,
    pub buffer_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            capture_enabled: false,
            output_dir: PathBuf::from("./data"),
            rotation_interval_secs: 3600,
            buffer_size: 1000,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prometheus endpoint port; no exporter when unset
    pub metrics_port: Option<u16>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Load from file, or use defaults when the file does not exist
    ///
    /// A file that exists but fails to read or parse is an error.
    pub fn load_or_default(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            eprintln!("Warning: config {} not found, using defaults", path.display());
            return Ok(Config::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Tier;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [governor]
            autorefresh = true
            interval_market_ms = 2000
            interval_after_hours_ms = 30000
            tier2_every = 2
            tier3_every = 5
            batch_size = 25
            max_symbols = 100
            max_symbols_after_hours = 20

            [rate]
            quota_per_minute = 60

            [calendar]
            timezone = "America/Chicago"
            open = "09:30"
            close = "16:00"

            [provider]
            kind = "http"
            name = "vendor"
            base_url = "https://quotes.example.com/v1"
            api_key = "secret"

            [[roster.entries]]
            symbol = "AAPL"
            tier = 1
            pinned = true
            score = 9.1

            [[roster.entries]]
            symbol = "IWM"
            tier = 3
            score = 2.0

            [stage]
            promote_threshold = 9.0
            hysteresis_margin = 0.4
            min_hold_secs = 600
            policy = "one_step"

            [fitness.promotion]
            min_trades = 50

            [execution]
            max_quote_age_secs = 10
            fee_rate = 0.0005

            [telemetry]
            metrics_port = 9090
            log_level = "debug"
            log_format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.governor.batch_size, 25);
        assert_eq!(config.governor.max_symbols_after_hours, Some(20));
        assert_eq!(config.rate.quota_per_minute, 60);
        assert_eq!(config.rate.reset_interval_secs, 60);
        assert_eq!(config.calendar.timezone, "America/Chicago");
        assert_eq!(config.provider.kind, ProviderKind::Http);
        assert_eq!(config.roster.entries.len(), 2);
        assert!(config.roster.entries[0].pinned);
        assert_eq!(config.roster.entries[1].tier, Tier::Three);
        assert!(!config.roster.entries[1].pinned);
        assert_eq!(config.stage.policy, StagePolicy::OneStep);
        assert_eq!(config.fitness.promotion.min_trades, 50);
        assert_eq!(config.fitness.promotion.min_sharpe, 1.0);
        assert_eq!(config.execution.fee_rate, dec!(0.0005));
        assert_eq!(config.telemetry.metrics_port, Some(9090));
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.governor.autorefresh);
        assert_eq!(config.governor.interval_market_ms, 5_000);
        assert_eq!(config.provider.kind, ProviderKind::Simulated);
        assert_eq!(config.stage.promote_threshold, 9.3);
        assert_eq!(config.stage.policy, StagePolicy::Direct);
        assert_eq!(config.chain.min_overall_score, 0.5);
        assert!(config.telemetry.metrics_port.is_none());
        assert!(!config.data.capture_enabled);
    }

    #[test]
    fn test_invalid_tier_rejected() {
        let toml = r#"
            [[roster.entries]]
            symbol = "AAPL"
            tier = 4
            score = 1.0
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_unknown_provider_kind_rejected() {
        let toml = r#"
            [provider]
            kind = "carrier-pigeon"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let config = ProviderConfig {
            api_key: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolved_api_key().as_deref(), Some("abc"));
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file_uses_defaults() {
        let config = Config::load_or_default("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.governor.batch_size, 50);
        assert!(config.roster.entries.is_empty());
    }

    #[test]
    fn test_load_or_default_rejects_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();

        let bad_kind = dir.path().join("bad_kind.toml");
        std::fs::write(&bad_kind, "[provider]\nkind = \"htp\"\n").unwrap();
        let err = Config::load_or_default(&bad_kind).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid config"));

        let bad_tier = dir.path().join("bad_tier.toml");
        std::fs::write(
            &bad_tier,
            "[[roster.entries]]\nsymbol = \"AAPL\"\ntier = 4\n",
        )
        .unwrap();
        assert!(Config::load_or_default(&bad_tier).is_err());
    }
}
