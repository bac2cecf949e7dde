//! End-to-end integration tests

use chrono::{Duration, TimeZone, Utc};
use market_governor::calendar::MarketCalendar;
use market_governor::chain::{ChainAnalyzer, OptionContract, OptionKind, OptionsChain};
use market_governor::config::{Config, ProviderKind};
use market_governor::execution::{
    ExecutionEngine, ExecutionGate, ExecutionGateError, Order, OrderType, PaperEngine, Side,
};
use market_governor::fitness::{CapitalMetrics, FitnessEnhancer, PerformanceMetrics};
use market_governor::governor::RefreshGovernor;
use market_governor::provider::{ProviderError, SimulatedProvider};
use market_governor::rate::RateBudget;
use market_governor::roster::{RosterEntry, SymbolRoster, Tier};
use market_governor::stage::{Stage, StageManager};
use rust_decimal_macros::dec;
use std::sync::Arc;

#[test]
fn test_config_example_loads() {
    let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example")).unwrap();
    assert_eq!(config.provider.kind, ProviderKind::Simulated);
    assert_eq!(config.roster.entries.len(), 4);
    assert_eq!(config.roster.entries[0].tier, Tier::One);
    assert!(config.roster.entries[0].pinned);
    assert!(MarketCalendar::from_config(&config.calendar).is_ok());
}

#[tokio::test]
async fn test_http_provider_without_key_is_fatal() {
    let mut config = Config::default();
    config.provider.kind = ProviderKind::Http;
    config.provider.base_url = "http://127.0.0.1:9".to_string();
    config.provider.api_key = Some("   ".to_string());
    let err = market_governor::cli::build_provider(&config).err().unwrap();
    assert!(err.to_string().contains("API key"));
}

/// Scores feed the stage manager, which gates execution on governor quotes
#[tokio::test]
async fn test_score_stage_and_gate_pipeline() {
    let now = Utc.with_ymd_and_hms(2024, 1, 17, 16, 0, 0).unwrap();

    // Strategy scoring
    let enhancer = FitnessEnhancer::default();
    let metrics = PerformanceMetrics {
        total_trades: 80,
        sharpe_ratio: 2.8,
        total_return: 1.9,
        max_drawdown: 0.05,
        win_rate: 0.7,
        profit_factor: 2.9,
        returns: vec![],
    };
    let capital = CapitalMetrics {
        net_pnl: 600.0,
        gross_pnl: 640.0,
        capital_at_risk: 1000.0,
        total_slippage: 25.0,
        total_commission: 15.0,
        avg_slippage_pct: 0.0003,
        adv_participation: 0.002,
        rounding_inefficiency: 0.01,
    };
    let fitness = enhancer.enhanced_fitness(&metrics, &capital, &[]);
    assert!(enhancer.meets_promotion_criteria(&metrics, &capital).eligible);

    // Options liquidity for the underlying
    let chain = OptionsChain {
        underlying: "AAPL".to_string(),
        contracts: vec![OptionContract {
            strike: dec!(190),
            expiry: chrono::NaiveDate::from_ymd_opt(2024, 2, 16).unwrap(),
            kind: OptionKind::Call,
            bid: dec!(4.00),
            ask: dec!(4.02),
            volume: 2500,
            open_interest: 12000,
        }],
    };
    assert!(ChainAnalyzer::default().validate(&chain).valid);

    let stages = Arc::new(StageManager::default());
    let decision = stages.next_stage("AAPL", Stage::Gates, fitness.enhanced_fitness * 10.0, 9.3);
    assert_eq!(decision.stage, Stage::Route);

    // Governor quotes
    let provider = Arc::new(SimulatedProvider::new(9));
    let roster = Arc::new(SymbolRoster::new(10));
    roster.replace(vec![RosterEntry::new("AAPL", Tier::One, 9.0)]).await;
    let governor = RefreshGovernor::new(
        Default::default(),
        Arc::new(RateBudget::new(10)),
        roster,
        MarketCalendar::us_equities(),
        provider.clone(),
    );
    governor.tick(now).await;

    let engine = Arc::new(PaperEngine::new(dec!(0.0005)).with_quotes(governor.cache()));
    let gate = ExecutionGate::new(governor.cache(), stages.clone(), engine.clone(), Duration::seconds(30));
    let order = Order {
        key: "AAPL".to_string(),
        symbol: "AAPL".to_string(),
        side: Side::Buy,
        price: dec!(0),
        quantity: dec!(10),
        order_type: OrderType::Market,
    };

    gate.submit(order.clone()).await.unwrap();
    assert_eq!(engine.get_fills().await.unwrap().len(), 1);

    // A rate-limit failure invalidates the quote; the gate now refuses
    provider.push_failure(ProviderError::RateLimited {
        retry_after_secs: None,
    });
    governor.tick(now).await;
    assert!(matches!(
        gate.submit(order).await,
        Err(ExecutionGateError::NoQuote(_))
    ));
    assert_eq!(engine.get_fills().await.unwrap().len(), 1);
}
