//! Rebalancer Binary
//!
//! Runs exactly one reconciliation pass and exits. Scheduling (cron, a
//! systemd timer) lives outside the process.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin rebalancer
//! ```
//!
//! # Environment Variables
//!
//! - `REBALANCER_CONFIG`: Path to the YAML config (default: config.yaml)
//! - `RUST_LOG`: Log level override
//!
//! Broker credentials are referenced from the config file via `${VAR}`
//! interpolation, typically `ALPACA_API_KEY` / `ALPACA_API_SECRET`.
//!
//! # Exit status
//!
//! Zero when the pass completes, even if individual symbols were skipped;
//! non-zero on fatal errors (config, feed, broker authentication).

use std::sync::Arc;

use anyhow::Context;

use rebalancer::config::{Config, load_config};
use rebalancer::infrastructure::broker::alpaca::{AlpacaBrokerAdapter, AlpacaConfig};
use rebalancer::infrastructure::feed::FileRecommendationFeed;
use rebalancer::infrastructure::marketdata::AlpacaMarketDataAdapter;
use rebalancer::telemetry::init_telemetry;
use rebalancer::{PassReport, RebalanceUseCase, RecommendationSet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("REBALANCER_CONFIG").ok();
    let config = load_config(config_path.as_deref()).context("loading configuration")?;

    init_telemetry(&config.logging.level);

    tracing::info!(
        dry_run = config.dry_run,
        environment = %config.broker.alpaca.environment,
        sources = config.recommendations.len(),
        "Starting rebalancer pass"
    );

    let recommendations = load_recommendations(&config)?;
    let report = run_pass(&config, &recommendations).await?;

    print_report(&report)?;
    Ok(())
}

/// Load and merge all recommendation sources.
fn load_recommendations(config: &Config) -> anyhow::Result<RecommendationSet> {
    let feed = FileRecommendationFeed::new(config.recommendations.clone());
    let set = feed.load().context("loading recommendations")?;
    tracing::info!(count = set.len(), "Recommendations merged");
    Ok(set)
}

/// Wire the adapters and execute one pass.
async fn run_pass(
    config: &Config,
    recommendations: &RecommendationSet,
) -> anyhow::Result<PassReport> {
    let alpaca_config: AlpacaConfig = config.broker.alpaca.to_alpaca_config()?;

    let broker =
        Arc::new(AlpacaBrokerAdapter::new(&alpaca_config).context("creating broker adapter")?);
    let market_data = Arc::new(
        AlpacaMarketDataAdapter::new(&alpaca_config).context("creating market data adapter")?,
    );

    let use_case = RebalanceUseCase::new(
        broker,
        market_data,
        config.policy.clone(),
        config.dry_run,
    );

    let report = use_case
        .execute(recommendations)
        .await
        .context("executing rebalance pass")?;
    Ok(report)
}

/// Emit the pass report as JSON on stdout.
fn print_report(report: &PassReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing pass report")?;
    println!("{json}");
    Ok(())
}
