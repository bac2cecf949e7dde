//! Run command implementation

use crate::calendar::MarketCalendar;
use crate::config::{Config, ProviderKind};
use crate::data::{ParquetRecorder, RecorderConfig};
use crate::governor::{GovernorEvent, RefreshGovernor};
use crate::provider::{HttpProviderConfig, HttpQuoteProvider, QuoteProvider, SimulatedProvider};
use crate::rate::RateBudget;
use crate::roster::{RosterSource, StaticRosterSource, SymbolRoster};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Print every event, including quote updates
    #[arg(short, long)]
    pub verbose: bool,
}

/// Build the configured quote provider
///
/// Missing credentials for the HTTP provider are a startup error.
pub fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn QuoteProvider>> {
    match config.provider.kind {
        ProviderKind::Simulated => Ok(Arc::new(SimulatedProvider::new(config.provider.seed))),
        ProviderKind::Http => {
            let provider = HttpQuoteProvider::new(HttpProviderConfig {
                name: config.provider.name.clone(),
                base_url: config.provider.base_url.clone(),
                api_key: config.provider.resolved_api_key(),
                timeout: Duration::from_millis(config.governor.provider_timeout_ms),
            })?;
            Ok(Arc::new(provider))
        }
    }
}

/// Assemble a governor and its roster from configuration
///
/// The roster is seeded from the configured entries before returning.
pub async fn build_governor(config: &Config) -> anyhow::Result<(Arc<RefreshGovernor>, Arc<SymbolRoster>)> {
    let provider = build_provider(config)?;
    let calendar = MarketCalendar::from_config(&config.calendar)?;
    let budget = Arc::new(RateBudget::with_reset_interval(
        config.rate.quota_per_minute,
        Duration::from_secs(config.rate.reset_interval_secs.max(1)),
    ));
    let roster = Arc::new(
        SymbolRoster::new(config.governor.max_symbols)
            .with_after_hours_cap(config.governor.max_symbols_after_hours),
    );
    roster
        .refresh(&StaticRosterSource::new(config.roster.entries.clone()))
        .await?;

    let mut governor = RefreshGovernor::new(
        config.governor.clone(),
        budget,
        roster.clone(),
        calendar,
        provider,
    );
    if config.data.capture_enabled {
        let recorder = ParquetRecorder::new(RecorderConfig {
            output_dir: config.data.output_dir.clone(),
            rotation_interval_secs: config.data.rotation_interval_secs,
            buffer_size: config.data.buffer_size,
            ..Default::default()
        });
        governor = governor.with_recorder(Arc::new(recorder));
    }

    Ok((Arc::new(governor), roster))
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (governor, roster) = build_governor(config).await?;
        let mut events = governor.subscribe();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let source: Arc<dyn RosterSource> =
            Arc::new(StaticRosterSource::new(config.roster.entries.clone()));
        let refresher = roster.spawn_refresh_task(
            source,
            Duration::from_secs(config.roster.refresh_interval_secs.max(1)),
            shutdown_rx,
        );

        governor.start();
        tracing::info!(symbols = config.roster.entries.len(), "Governor running, Ctrl-C to stop");

        let mut halted = None;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Ok(event @ GovernorEvent::Halted { .. }) => {
                        self.log_event(&event);
                        halted = Some(event);
                        break;
                    }
                    Ok(event) => self.log_event(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        governor.stop().await;
        let _ = shutdown_tx.send(true);
        if let Err(e) = refresher.await {
            tracing::warn!(error = %e, "Roster refresher ended abnormally");
        }

        let status = governor.status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);

        if let Some(GovernorEvent::Halted { reason, .. }) = halted {
            anyhow::bail!("Governor halted: {reason}");
        }
        Ok(())
    }

    fn log_event(&self, event: &GovernorEvent) {
        match event {
            GovernorEvent::QuotesUpdated { tick, symbols, .. } => {
                if self.verbose {
                    tracing::info!(tick, count = symbols.len(), "Quotes updated");
                }
            }
            GovernorEvent::Backoff {
                tick, reason, level, ..
            } => tracing::warn!(tick, level, %reason, "Backoff"),
            GovernorEvent::StaleDataAlert {
                tick, invalidated, ..
            } => tracing::warn!(tick, invalidated, "Stale data alert"),
            GovernorEvent::Halted { tick, reason, .. } => {
                tracing::error!(tick, %reason, "Governor halted")
            }
        }
    }
}
