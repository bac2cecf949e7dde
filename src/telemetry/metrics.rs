//! Prometheus metrics

use crate::provider::ErrorClass;
use std::net::SocketAddr;
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Quote provider batch call
    ProviderCall,
    /// Full governor tick
    Tick,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Current backoff level
    BackoffLevel,
    /// Symbols held in the quote cache
    CachedSymbols,
    /// Rate budget tokens left
    RateTokens,
    /// Keys tracked by the stage manager
    StageKeys,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Provider batch calls issued
    ProviderCalls,
    /// Batches skipped for lack of rate budget
    BatchesDeferred,
    /// Stale data alerts raised
    StaleAlerts,
    /// Stage transitions applied
    StageTransitions,
    /// Transitions suppressed by minimum hold time
    StageHoldSuppressed,
}

fn latency_name(metric: LatencyMetric) -> &'static str {
    match metric {
        LatencyMetric::ProviderCall => "governor_provider_call_latency_ms",
        LatencyMetric::Tick => "governor_tick_latency_ms",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::BackoffLevel => "governor_backoff_level",
        GaugeMetric::CachedSymbols => "governor_cached_symbols",
        GaugeMetric::RateTokens => "governor_rate_tokens",
        GaugeMetric::StageKeys => "stage_tracked_keys",
    }
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::ProviderCalls => "governor_provider_calls_total",
        CounterMetric::BatchesDeferred => "governor_batches_deferred_total",
        CounterMetric::StaleAlerts => "governor_stale_alerts_total",
        CounterMetric::StageTransitions => "stage_transitions_total",
        CounterMetric::StageHoldSuppressed => "stage_hold_suppressed_total",
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(latency_name(metric)).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    metrics::counter!(counter_name(metric)).increment(1);
}

/// Count a provider failure by class
pub fn record_provider_failure(class: ErrorClass) {
    metrics::counter!("governor_provider_failures_total", "class" => class.as_str()).increment(1);
}

/// Install the Prometheus exporter on `0.0.0.0:port`
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus metrics endpoint listening");
    Ok(())
}
