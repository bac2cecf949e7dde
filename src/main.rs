use clap::Parser;
use market_governor::cli::{Cli, Commands};
use market_governor::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load_or_default(&cli.config)?;

    // Initialize telemetry
    let _telemetry = market_governor::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting refresh governor");
            args.execute(&config).await?;
        }
        Commands::Status(args) => {
            args.execute(&config).await?;
        }
        Commands::Evaluate(args) => {
            args.execute(&config).await?;
        }
        Commands::Chain(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Provider: {:?} ({})",
                config.provider.kind, config.provider.name
            );
            println!(
                "  Governor: batch={}, market={}ms, after-hours={}ms, autorefresh={}",
                config.governor.batch_size,
                config.governor.interval_market_ms,
                config.governor.interval_after_hours_ms,
                config.governor.autorefresh
            );
            println!(
                "  Tiers: tier2 every {} ticks, tier3 every {} ticks",
                config.governor.tier2_every, config.governor.tier3_every
            );
            println!("  Rate: {} calls/min", config.rate.quota_per_minute);
            println!(
                "  Session: {}-{} {}",
                config.calendar.open, config.calendar.close, config.calendar.timezone
            );
            println!("  Roster: {} symbols", config.roster.entries.len());
            println!(
                "  Stage: threshold={}, margin={}, min hold={}s, policy={:?}",
                config.stage.promote_threshold,
                config.stage.hysteresis_margin,
                config.stage.min_hold_secs,
                config.stage.policy
            );
        }
    }

    Ok(())
}
