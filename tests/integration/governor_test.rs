//! Refresh governor integration tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use market_governor::calendar::MarketCalendar;
use market_governor::config::GovernorConfig;
use market_governor::data::{MarketRecorder, QuoteObservation};
use market_governor::governor::{GovernorEvent, GovernorStatus, Health, RefreshGovernor};
use market_governor::provider::{ErrorClass, ProviderError, SimulatedProvider};
use market_governor::rate::RateBudget;
use market_governor::roster::{RosterEntry, SymbolRoster, Tier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wednesday 11:00 New York (UTC-5)
fn market_hours() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 17, 16, 0, 0).unwrap()
}

/// Saturday noon
fn weekend() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 20, 17, 0, 0).unwrap()
}

fn config(batch_size: usize) -> GovernorConfig {
    GovernorConfig {
        batch_size,
        inter_batch_delay_ms: 0,
        provider_timeout_ms: 500,
        ..Default::default()
    }
}

struct Fixture {
    governor: RefreshGovernor,
    provider: Arc<SimulatedProvider>,
    budget: Arc<RateBudget>,
}

async fn fixture(quota: u32, batch_size: usize, roster: SymbolRoster, entries: Vec<RosterEntry>) -> Fixture {
    let provider = Arc::new(SimulatedProvider::new(11));
    let budget = Arc::new(RateBudget::new(quota));
    let roster = Arc::new(roster);
    roster.replace(entries).await;
    let governor = RefreshGovernor::new(
        config(batch_size),
        budget.clone(),
        roster,
        MarketCalendar::us_equities(),
        provider.clone(),
    );
    Fixture {
        governor,
        provider,
        budget,
    }
}

fn tier1(symbols: &[&str]) -> Vec<RosterEntry> {
    symbols
        .iter()
        .map(|s| RosterEntry::new(*s, Tier::One, 1.0))
        .collect()
}

#[tokio::test]
async fn test_exhausted_budget_defers_without_calls() {
    let f = fixture(2, 1, SymbolRoster::new(50), tier1(&["AAPL", "MSFT", "NVDA"])).await;

    let report = f.governor.tick(market_hours()).await;
    assert_eq!(report.batches_sent, 2);
    assert_eq!(report.batches_deferred, 1);
    assert_eq!(f.provider.calls(), 2);

    let before = f.governor.cache().snapshot();
    let report = f.governor.tick(market_hours()).await;
    assert_eq!(report.batches_sent, 0);
    assert_eq!(report.batches_deferred, 3);
    assert_eq!(f.provider.calls(), 2);
    assert_eq!(f.governor.cache().snapshot(), before);

    // Deferred symbols are picked up again once the budget resets
    f.budget.reset();
    let report = f.governor.tick(market_hours()).await;
    assert_eq!(report.batches_sent, 2);
    assert_eq!(f.provider.calls(), 4);
}

#[tokio::test]
async fn test_status_round_trip_shows_progress() {
    let f = fixture(100, 10, SymbolRoster::new(50), tier1(&["AAPL", "MSFT"])).await;

    f.governor.tick(market_hours()).await;
    let json = serde_json::to_string(&f.governor.status_at(market_hours()).await).unwrap();
    let first: GovernorStatus = serde_json::from_str(&json).unwrap();

    f.governor.tick(market_hours() + Duration::seconds(5)).await;
    let json = serde_json::to_string(&f.governor.status_at(market_hours()).await).unwrap();
    let second: GovernorStatus = serde_json::from_str(&json).unwrap();

    assert!(second.last_refresh.unwrap() > first.last_refresh.unwrap());
    assert_eq!(second.tick, first.tick + 1);
    assert_eq!(second.provider, "simulated");
    assert_eq!(second.symbols_cached, 2);
    assert_eq!(second.tiers.tier1, 2);
    assert!(second.market_open);
    assert_eq!(second.health, Health::Healthy);
    assert_eq!(second.interval_ms, 5_000);
}

#[tokio::test]
async fn test_degraded_recovers_one_level_per_success() {
    let f = fixture(100, 10, SymbolRoster::new(50), tier1(&["AAPL"])).await;

    for _ in 0..3 {
        f.provider.push_failure(ProviderError::Network("connection reset".into()));
    }
    for _ in 0..3 {
        f.governor.tick(market_hours()).await;
    }
    assert_eq!(f.governor.backoff_level(), 4);
    assert_eq!(f.governor.status_at(market_hours()).await.health, Health::Degraded);

    let mut levels = Vec::new();
    for _ in 0..3 {
        f.governor.tick(market_hours()).await;
        levels.push(f.governor.backoff_level());
    }
    assert_eq!(levels, vec![3, 2, 1]);
    assert_eq!(f.governor.status_at(market_hours()).await.health, Health::Healthy);
}

#[tokio::test]
async fn test_backoff_never_exceeds_ceiling() {
    let f = fixture(100, 10, SymbolRoster::new(50), tier1(&["AAPL"])).await;
    for _ in 0..12 {
        f.provider.push_failure(ProviderError::RateLimited {
            retry_after_secs: Some(30),
        });
        f.governor.tick(market_hours()).await;
    }
    assert_eq!(f.governor.backoff_level(), 8);
}

#[tokio::test]
async fn test_network_failure_emits_backoff_then_alert() {
    let f = fixture(100, 10, SymbolRoster::new(50), tier1(&["AAPL", "MSFT"])).await;
    f.governor.tick(market_hours()).await;
    let mut events = f.governor.subscribe();

    f.provider.push_failure(ProviderError::Timeout(500));
    f.governor.tick(market_hours()).await;

    match events.recv().await.unwrap() {
        GovernorEvent::Backoff {
            class,
            level,
            invalidate,
            symbols,
            ..
        } => {
            assert_eq!(class, ErrorClass::Network);
            assert_eq!(level, 2);
            assert!(invalidate);
            assert_eq!(symbols.len(), 2);
        }
        other => panic!("expected backoff, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        GovernorEvent::StaleDataAlert { invalidated, .. } => assert_eq!(invalidated, 2),
        other => panic!("expected stale alert, got {other:?}"),
    }
    assert!(f.governor.cache().is_empty());
}

#[tokio::test]
async fn test_other_failure_keeps_cache() {
    let f = fixture(100, 10, SymbolRoster::new(50), tier1(&["AAPL"])).await;
    f.governor.tick(market_hours()).await;

    f.provider.push_failure(ProviderError::Other("HTTP 500".into()));
    f.governor.tick(market_hours()).await;
    assert!(f.governor.cache().contains("AAPL"));
    assert_eq!(f.governor.backoff_level(), 2);
}

#[tokio::test]
async fn test_after_hours_cap_and_weekend() {
    let roster = SymbolRoster::new(3).with_after_hours_cap(Some(1));
    let f = fixture(100, 10, roster, tier1(&["AAPL", "MSFT", "NVDA"])).await;

    let report = f.governor.tick(market_hours()).await;
    assert!(report.market_open);
    assert_eq!(report.due_symbols, 3);

    let report = f.governor.tick(weekend()).await;
    assert!(!report.market_open);
    assert_eq!(report.due_symbols, 1);

    let status = f.governor.status_at(weekend()).await;
    assert!(!status.market_open);
    assert_eq!(status.interval_ms, 60_000);
}

struct CountingRecorder {
    seen: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl MarketRecorder for CountingRecorder {
    async fn record(&self, observation: QuoteObservation) -> anyhow::Result<()> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        assert_eq!(observation.source, "simulated");
        assert_eq!(observation.symbol, observation.quote.symbol);
        if self.fail {
            anyhow::bail!("disk full");
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_recorder_hook_failure_does_not_fail_refresh() {
    let recorder = Arc::new(CountingRecorder {
        seen: AtomicUsize::new(0),
        fail: true,
    });
    let roster = Arc::new(SymbolRoster::new(10));
    roster.replace(tier1(&["AAPL", "MSFT"])).await;
    let governor = RefreshGovernor::new(
        config(10),
        Arc::new(RateBudget::new(10)),
        roster,
        MarketCalendar::us_equities(),
        Arc::new(SimulatedProvider::new(5)),
    )
    .with_recorder(recorder.clone());

    let report = governor.tick(market_hours()).await;
    assert_eq!(report.batches_failed, 0);
    assert_eq!(report.quotes_merged, 2);
    assert_eq!(recorder.seen.load(Ordering::SeqCst), 2);
    assert_eq!(governor.cache().len(), 2);
    assert_eq!(governor.backoff_level(), 1);
}
