//! Refresh governor: the polling loop
//!
//! One task owns the loop. Each tick it reads the roster snapshot, works
//! out which tiers are due, spends rate budget per batch, calls the
//! provider with a hard timeout, and folds the outcome into the cache, the
//! backoff level and the event stream. Provider failures never escape the
//! loop; they become `Backoff` / `StaleDataAlert` events. A configuration
//! failure halts polling and publishes `Halted`.

use super::cache::QuoteCache;
use super::policy::{due_symbols, is_fatal, plan_batches, should_invalidate_on_failure};
use super::types::{GovernorEvent, GovernorState, GovernorStatus, TickReport, TierCounts};
use crate::calendar::MarketCalendar;
use crate::config::GovernorConfig;
use crate::data::{MarketRecorder, QuoteObservation};
use crate::provider::{ProviderError, Quote, QuoteProvider};
use crate::rate::RateBudget;
use crate::roster::{SymbolRoster, Tier};
use crate::telemetry::{
    increment, record_latency, record_provider_failure, set_gauge, CounterMetric, GaugeMetric,
    LatencyMetric,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Market-data refresh governor
///
/// Construct with its collaborators injected, then `start()` the loop or
/// drive it with `tick()`. Governor state is only written from inside a
/// tick, and ticks are serialized by `tick_lock`.
pub struct RefreshGovernor {
    config: GovernorConfig,
    budget: Arc<RateBudget>,
    roster: Arc<SymbolRoster>,
    calendar: MarketCalendar,
    provider: Arc<dyn QuoteProvider>,
    recorder: Option<Arc<dyn MarketRecorder>>,
    cache: QuoteCache,
    events: broadcast::Sender<GovernorEvent>,
    state: Mutex<GovernorState>,
    tick_lock: tokio::sync::Mutex<()>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Outcome of one batch call, already validated
enum BatchOutcome {
    /// Every requested symbol came back valid
    Complete(Vec<Quote>),
    /// Some symbols missing or invalid; the valid ones are still usable
    Partial {
        valid: Vec<Quote>,
        rejected: Vec<String>,
    },
    /// Call failed outright
    Failed(ProviderError),
}

impl RefreshGovernor {
    /// Create a governor with its collaborators
    pub fn new(
        config: GovernorConfig,
        budget: Arc<RateBudget>,
        roster: Arc<SymbolRoster>,
        calendar: MarketCalendar,
        provider: Arc<dyn QuoteProvider>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            budget,
            roster,
            calendar,
            provider,
            recorder: None,
            cache: QuoteCache::new(),
            events,
            state: Mutex::new(GovernorState::default()),
            tick_lock: tokio::sync::Mutex::new(()),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Attach a market recorder hook
    pub fn with_recorder(mut self, recorder: Arc<dyn MarketRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Share an existing cache instead of the governor's own
    pub fn with_cache(mut self, cache: QuoteCache) -> Self {
        self.cache = cache;
        self
    }

    /// Read handle on the quote cache
    pub fn cache(&self) -> QuoteCache {
        self.cache.clone()
    }

    /// Subscribe to governor events
    pub fn subscribe(&self) -> broadcast::Receiver<GovernorEvent> {
        self.events.subscribe()
    }

    /// Current backoff level
    pub fn backoff_level(&self) -> u32 {
        self.state.lock().backoff.get()
    }

    /// Whether the loop task is running
    pub fn is_running(&self) -> bool {
        self.tasks.lock().iter().any(|t| !t.is_finished())
    }

    /// Base interval for the market state, before backoff
    pub fn base_interval(&self, market_open: bool) -> Duration {
        if market_open {
            Duration::from_millis(self.config.interval_market_ms)
        } else {
            Duration::from_millis(self.config.interval_after_hours_ms)
        }
    }

    /// Sleep between ticks: base interval x backoff level
    pub fn current_interval(&self) -> Duration {
        let state = self.state.lock();
        self.base_interval(state.market_open) * state.backoff.get()
    }

    /// Spawn the refresh loop and the rate budget reset task
    ///
    /// Does nothing if autorefresh is disabled or the loop is already running.
    pub fn start(self: &Arc<Self>) {
        if !self.config.autorefresh {
            tracing::info!("Autorefresh disabled, governor loop not started");
            return;
        }
        if self.is_running() {
            tracing::warn!("Governor already running");
            return;
        }

        self.shutdown.send_replace(false);
        let reset_task = self.budget.spawn_reset_task(self.shutdown.subscribe());

        let governor = Arc::clone(self);
        let shutdown = self.shutdown.subscribe();
        let loop_task = tokio::spawn(async move {
            governor.run(shutdown).await;
        });

        let mut tasks = self.tasks.lock();
        tasks.clear();
        tasks.push(reset_task);
        tasks.push(loop_task);

        tracing::info!(
            provider = self.provider.name(),
            batch_size = self.config.batch_size,
            quota = self.budget.quota(),
            "Governor started"
        );
    }

    /// Stop the loop at the next sleep boundary and wait for it to exit
    ///
    /// An in-flight provider call is bounded by the provider timeout.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Governor task ended abnormally");
            }
        }
        tracing::info!("Governor stopped");
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.tick(Utc::now()).await;
            if report.interrupted || report.halted {
                break;
            }

            let delay = self.current_interval();
            tracing::trace!(delay_ms = delay.as_millis() as u64, "Sleeping until next tick");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {}
            }
        }
        tracing::debug!("Governor loop exited");
    }

    /// Sleep unless shutdown is requested first; `false` means stop
    async fn pause(&self, delay: Duration) -> bool {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => !*shutdown.borrow(),
            _ = shutdown.changed() => false,
        }
    }

    /// Run one polling tick at `now`
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let _guard = self.tick_lock.lock().await;
        let started = Instant::now();

        let market_open = self.calendar.is_market_open(now);
        let (tick, halted) = {
            let mut state = self.state.lock();
            state.market_open = market_open;
            (state.tick, state.halted)
        };
        if halted {
            return TickReport {
                tick,
                market_open,
                halted: true,
                ..Default::default()
            };
        }

        let active = self.roster.active_roster(now, market_open).await;
        let due = due_symbols(
            &active,
            tick,
            self.config.tier2_every,
            self.config.tier3_every,
        );
        let batches = plan_batches(&due, self.config.batch_size);

        let mut report = TickReport {
            tick,
            market_open,
            due_symbols: due.len(),
            batches_planned: batches.len(),
            ..Default::default()
        };

        tracing::debug!(
            tick,
            market_open,
            active = active.len(),
            due = due.len(),
            batches = batches.len(),
            "Governor tick"
        );

        for (i, batch) in batches.into_iter().enumerate() {
            if i > 0 {
                let delay =
                    Duration::from_millis(self.config.inter_batch_delay_ms) * self.backoff_level();
                if !delay.is_zero() && !self.pause(delay).await {
                    report.interrupted = true;
                    break;
                }
            }

            if !self.budget.try_consume() {
                report.batches_deferred += 1;
                increment(CounterMetric::BatchesDeferred);
                tracing::debug!(tick, batch = i, size = batch.len(), "Rate budget exhausted, batch deferred");
                continue;
            }

            report.batches_sent += 1;
            let outcome = self.fetch(&batch).await;
            match self.apply_outcome(tick, &batch, outcome).await {
                Ok(merged) => report.quotes_merged += merged,
                Err(merged) => {
                    report.quotes_merged += merged;
                    report.batches_failed += 1;
                }
            }
            if self.state.lock().halted {
                report.halted = true;
                break;
            }
        }

        {
            let mut state = self.state.lock();
            state.tick += 1;
        }
        set_gauge(GaugeMetric::CachedSymbols, self.cache.len() as f64);
        record_latency(LatencyMetric::Tick, started.elapsed());

        report
    }

    /// Call the provider with the hard timeout and validate the response
    async fn fetch(&self, batch: &[String]) -> BatchOutcome {
        let timeout = Duration::from_millis(self.config.provider_timeout_ms);
        let started = Instant::now();
        increment(CounterMetric::ProviderCalls);

        let result = tokio::time::timeout(timeout, self.provider.get_quotes(batch)).await;
        record_latency(LatencyMetric::ProviderCall, started.elapsed());

        let quotes = match result {
            Ok(Ok(quotes)) => quotes,
            Ok(Err(e)) => return BatchOutcome::Failed(e),
            Err(_) => return BatchOutcome::Failed(ProviderError::Timeout(timeout.as_millis() as u64)),
        };

        validate_batch(batch, quotes)
    }

    /// Fold a batch outcome into cache, backoff and events
    ///
    /// Returns the number of quotes merged, as `Err` if the batch counted
    /// as a failure.
    async fn apply_outcome(
        &self,
        tick: u64,
        batch: &[String],
        outcome: BatchOutcome,
    ) -> Result<usize, usize> {
        match outcome {
            BatchOutcome::Complete(quotes) => {
                let merged = self.merge(tick, quotes).await;
                let level = {
                    let mut state = self.state.lock();
                    state.backoff.on_success();
                    state.backoff.get()
                };
                set_gauge(GaugeMetric::BackoffLevel, level as f64);
                Ok(merged)
            }
            BatchOutcome::Partial { valid, rejected } => {
                let merged = self.merge(tick, valid).await;
                let error = ProviderError::Malformed(format!(
                    "{} of {} symbols missing or invalid",
                    rejected.len(),
                    batch.len()
                ));
                self.fail(tick, rejected, error);
                Err(merged)
            }
            BatchOutcome::Failed(error) if is_fatal(error.class()) => {
                self.halt(tick, error);
                Err(0)
            }
            BatchOutcome::Failed(error) => {
                self.fail(tick, batch.to_vec(), error);
                Err(0)
            }
        }
    }

    /// Merge quotes, publish `QuotesUpdated`, then run the recorder hook
    async fn merge(&self, tick: u64, quotes: Vec<Quote>) -> usize {
        if quotes.is_empty() {
            return 0;
        }

        let received_at = Utc::now();
        let symbols: Vec<String> = quotes.iter().map(|q| q.symbol.clone()).collect();
        let count = quotes.len();
        let observations: Vec<QuoteObservation> = if self.recorder.is_some() {
            quotes
                .iter()
                .map(|q| QuoteObservation::new(q.clone(), self.provider.name()))
                .collect()
        } else {
            Vec::new()
        };

        self.cache.merge(quotes);
        {
            let mut state = self.state.lock();
            // Keep last_refresh strictly increasing even on coarse clocks
            let stamp = match state.last_refresh {
                Some(prev) if received_at <= prev => prev + chrono::Duration::microseconds(1),
                _ => received_at,
            };
            state.last_refresh = Some(stamp);
        }

        tracing::debug!(tick, count, "Quotes updated");
        let _ = self.events.send(GovernorEvent::QuotesUpdated {
            tick,
            symbols,
            received_at,
        });

        if let Some(recorder) = &self.recorder {
            self.record(recorder.as_ref(), observations).await;
        }
        count
    }

    /// Hand observations to the recorder, bounded by `recorder_timeout_ms`
    ///
    /// Recorder errors and timeouts are logged; the refresh already happened.
    async fn record(&self, recorder: &dyn MarketRecorder, observations: Vec<QuoteObservation>) {
        let timeout = Duration::from_millis(self.config.recorder_timeout_ms);
        let count = observations.len();
        let write_all = async {
            for observation in observations {
                let symbol = observation.symbol.clone();
                if let Err(e) = recorder.record(observation).await {
                    tracing::warn!(%symbol, error = %e, "Market recorder failed");
                }
            }
        };
        if tokio::time::timeout(timeout, write_all).await.is_err() {
            tracing::warn!(
                count,
                timeout_ms = timeout.as_millis() as u64,
                "Market recorder timed out, rest of batch dropped"
            );
        }
    }

    /// Raise backoff, record the error, publish `Backoff` and maybe `StaleDataAlert`
    fn fail(&self, tick: u64, symbols: Vec<String>, error: ProviderError) {
        let class = error.class();
        let reason = error.to_string();
        let invalidate = should_invalidate_on_failure(class);

        let level = {
            let mut state = self.state.lock();
            state.backoff.on_failure();
            state.last_error = Some(reason.clone());
            state.last_error_at = Some(Utc::now());
            state.backoff.get()
        };
        set_gauge(GaugeMetric::BackoffLevel, level as f64);
        record_provider_failure(class);

        tracing::warn!(
            tick,
            class = class.as_str(),
            backoff = level,
            symbols = symbols.len(),
            error = %reason,
            "Quote refresh failed"
        );

        let _ = self.events.send(GovernorEvent::Backoff {
            tick,
            reason,
            class,
            level,
            symbols: symbols.clone(),
            invalidate,
        });

        if invalidate {
            let invalidated = self.cache.invalidate(&symbols);
            increment(CounterMetric::StaleAlerts);
            tracing::warn!(tick, invalidated, class = class.as_str(), "Stale data alert");
            let _ = self.events.send(GovernorEvent::StaleDataAlert {
                tick,
                symbols,
                class,
                invalidated,
                at: Utc::now(),
            });
        }
    }

    /// Stop polling on an unrecoverable failure and publish `Halted`
    fn halt(&self, tick: u64, error: ProviderError) {
        let reason = error.to_string();
        let at = Utc::now();
        {
            let mut state = self.state.lock();
            state.halted = true;
            state.last_error = Some(reason.clone());
            state.last_error_at = Some(at);
        }
        record_provider_failure(error.class());
        tracing::error!(tick, error = %reason, "Provider configuration error, governor halted");
        let _ = self.events.send(GovernorEvent::Halted { tick, reason, at });
    }

    /// Status snapshot at the current wall-clock time
    pub async fn status(&self) -> GovernorStatus {
        self.status_at(Utc::now()).await
    }

    /// Status snapshot evaluated at `now`
    pub async fn status_at(&self, now: DateTime<Utc>) -> GovernorStatus {
        let market_open = self.calendar.is_market_open(now);
        let active = self.roster.active_roster(now, market_open).await;
        let pinned: HashSet<String> = self
            .roster
            .entries()
            .await
            .into_iter()
            .filter(|e| e.pinned)
            .map(|e| e.symbol)
            .collect();

        let mut tiers = TierCounts::default();
        for a in &active {
            match a.tier {
                Tier::One => tiers.tier1 += 1,
                Tier::Two => tiers.tier2 += 1,
                Tier::Three => tiers.tier3 += 1,
            }
            if pinned.contains(&a.symbol) {
                tiers.pinned += 1;
            }
        }

        let state = self.state.lock().clone();
        GovernorStatus {
            provider: self.provider.name().to_string(),
            autorefresh: self.config.autorefresh,
            running: self.is_running(),
            interval_ms: (self.base_interval(market_open) * state.backoff.get()).as_millis() as u64,
            backoff_level: state.backoff.get(),
            health: state.backoff.health(),
            rate_budget: self.budget.snapshot(),
            batch_size: self.config.batch_size,
            symbols_cached: self.cache.len(),
            tiers,
            last_refresh: state.last_refresh,
            last_error: state.last_error,
            last_error_at: state.last_error_at,
            market_open,
            tick: state.tick,
            halted: state.halted,
        }
    }
}

/// Split a provider response into usable quotes and rejected symbols
///
/// Quotes for symbols that were not requested are ignored.
fn validate_batch(batch: &[String], mut quotes: HashMap<String, Quote>) -> BatchOutcome {
    let mut valid = Vec::with_capacity(batch.len());
    let mut rejected = Vec::new();

    for symbol in batch {
        match quotes.remove(symbol) {
            Some(quote) if quote.is_valid() && quote.symbol == *symbol => valid.push(quote),
            _ => rejected.push(symbol.clone()),
        }
    }

    if rejected.is_empty() {
        BatchOutcome::Complete(valid)
    } else {
        BatchOutcome::Partial { valid, rejected }
    }
}
