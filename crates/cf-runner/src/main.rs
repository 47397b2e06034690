//! # cf-runner
//!
//! Entry point for the chartfeed market data service.
//!
//! Loads a JSON configuration file, registers every configured adapter with a
//! [`DataManager`], then either streams the configured subscriptions until
//! Ctrl+C (`run`, the default) or answers a single query and prints it as
//! JSON.
//!
//! # Usage
//!
//! ```bash
//! cf-runner config.json --log-level info
//! cf-runner config.json history --symbol AAPL --timeframe 1h --hours 24
//! cf-runner config.json quote --symbol BTCUSDT --source binance
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use cf_core::time_util::{self, DAY_MS, HOUR_MS};
use cf_core::types::{DataUpdate, Timeframe};
use cf_md::{DataManager, HistoricalRequest, ManagerConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

/// Chartfeed market data runner.
#[derive(Parser)]
#[command(name = "cf-runner", about = "Chartfeed market data runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output (overrides `app.log_path`).
    #[arg(long)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the configured subscriptions and log updates until Ctrl+C.
    Run,
    /// Fetch historical bars ending now.
    History {
        #[arg(long)]
        symbol: String,
        /// 1m, 5m, 15m, 30m, 1h, 4h, 1d or 1w.
        #[arg(long, default_value = "1h")]
        timeframe: Timeframe,
        #[arg(long, default_value_t = 24)]
        hours: u64,
        /// Adapter name to try first.
        #[arg(long)]
        source: Option<String>,
    },
    /// Latest quote.
    Quote {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        source: Option<String>,
    },
    /// Recent headlines, newest first.
    News {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Corporate actions over the last `days`.
    Actions {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 365)]
        days: u64,
    },
    /// Which adapters recognize a symbol.
    Validate {
        #[arg(long)]
        symbol: String,
    },
    /// List registered adapters.
    Adapters,
}

/// Start of a window reaching `count` units back from `end`, clamped at the epoch.
fn window_start(end: u64, count: u64, unit_ms: u64) -> u64 {
    end.saturating_sub(count.saturating_mul(unit_ms))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = cf_core::config::load_config(&cli.config)?;

    // 2. Initialize logging
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    cf_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name());
    info!(
        "cf-runner starting, config={}, log_level={}, {} adapter(s) configured",
        cli.config.display(),
        cli.log_level,
        config.adapters.len()
    );

    // 3. Register adapters; one bad entry does not stop the rest
    let manager = DataManager::new(ManagerConfig::from_settings(&config.manager)?);
    for (idx, settings) in config.adapters.iter().enumerate() {
        match manager.add_adapter(settings).await {
            Ok(()) => info!("adapters[{idx}]: '{}' ({}) ready", settings.name, settings.kind),
            Err(e) => error!("adapters[{idx}]: failed to add '{}' ({}): {e}", settings.name, settings.kind),
        }
    }

    // 4. Dispatch
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            for spec in &config.subscriptions {
                let accepted = manager
                    .subscribe(
                        &spec.symbol,
                        spec.data_type,
                        Arc::new(|update: &DataUpdate| match update {
                            DataUpdate::Quote(q) => info!("{q}"),
                            DataUpdate::Trade(t) => info!("{t}"),
                            DataUpdate::News(n) => info!("{n}"),
                            DataUpdate::CorporateAction(a) => info!("{a}"),
                        }),
                    )
                    .await;
                info!("subscription {} {} accepted by {accepted} adapter(s)", spec.symbol, spec.data_type);
            }

            info!("{} subscription(s) open, press Ctrl+C to stop", manager.subscription_count());
            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");
        }
        Command::History { symbol, timeframe, hours, source } => {
            let end = time_util::now_ms();
            let mut request = HistoricalRequest::new(symbol, timeframe, window_start(end, hours, HOUR_MS), end);
            request.preferred_source = source;
            print_json(&manager.get_historical_data_detailed(&request).await)?;
        }
        Command::Quote { symbol, source } => {
            print_json(&manager.get_realtime_quote(&symbol, source.as_deref()).await)?;
        }
        Command::News { symbol, limit } => {
            print_json(&manager.get_news(&symbol, limit).await)?;
        }
        Command::Actions { symbol, days } => {
            let end = time_util::now_ms();
            print_json(&manager.get_corporate_actions(&symbol, window_start(end, days, DAY_MS), end).await)?;
        }
        Command::Validate { symbol } => {
            print_json(&manager.validate_symbol(&symbol).await)?;
        }
        Command::Adapters => {
            print_json(&manager.get_available_adapters())?;
        }
    }

    // 5. Stop everything gracefully
    manager.shutdown().await;
    info!("cf-runner stopped");
    Ok(())
}
