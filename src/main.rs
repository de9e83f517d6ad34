//! Stats Engine
//!
//! Tool download telemetry, batch side:
//! - Schema setup and store health
//! - Daily rollups for yesterday and today
//! - Retention compaction of aged raw download facts
//! - One-off rollup backfills (`stats-engine backfill <start> <end>`)

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{error, info};

use stats_core::clock::parse_day_key;
use stats_core::RetentionPolicy;
use stats_store::health::{check_connection, init_schema};
use stats_store::{StatsDb, StoreConfig};
use telemetry::{
    health, init_tracing, log_metrics, metrics, tracing_config_from_env, TracingConfig,
};
use worker::{
    BackfillWorker, DailyJob, RetentionCompactor, RollupAggregator, WorkerConfig, WorkerScheduler,
};

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    database: StoreConfig,

    #[serde(default)]
    worker: WorkerConfig,

    #[serde(default)]
    retention: RetentionPolicy,

    #[serde(default)]
    logging: TracingConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()?;
    init_tracing(&tracing_config_from_env(config.logging.clone()));

    info!("Starting Stats Engine v{}", env!("CARGO_PKG_VERSION"));
    info!(
        database = %config.database.path.display(),
        raw_retention_days = config.retention.raw_retention_days,
        mau_window_days = config.retention.mau_window_days,
        "Loaded configuration"
    );

    config
        .retention
        .validate()
        .context("Invalid retention policy")?;

    let db = StatsDb::open(config.database.clone()).context("Failed to open stats database")?;
    init_schema(&db).context("Failed to initialize schema")?;
    check_health(&db);

    let aggregator =
        RollupAggregator::new(db.clone()).with_mau_window(config.retention.mau_window_days);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = args.first() {
        return match command.as_str() {
            "backfill" => run_backfill(aggregator, &args[1..]),
            other => bail!("Unknown command: {}", other),
        };
    }

    let job = DailyJob::new(
        aggregator,
        RetentionCompactor::new(db.clone()),
        config.retention,
    );
    let scheduler = Arc::new(WorkerScheduler::new(config.worker.clone(), db, job));
    let handles = scheduler.start();

    shutdown_signal().await;

    info!("Shutting down...");
    for handle in handles {
        handle.abort();
    }
    log_metrics(&metrics().snapshot());

    info!("Shutdown complete");
    Ok(())
}

/// Recompute rollups for an inclusive date range and exit.
fn run_backfill(aggregator: RollupAggregator, args: &[String]) -> Result<()> {
    let [start, end] = args else {
        bail!("Usage: stats-engine backfill <YYYY-MM-DD> <YYYY-MM-DD>");
    };
    let start = parse_day_key(start).context("Invalid start date")?;
    let end = parse_day_key(end).context("Invalid end date")?;

    let result = BackfillWorker::new(aggregator)
        .run(start, end)
        .context("Backfill failed")?;

    for (date, e) in &result.failed_dates {
        error!(date = %date, error = %e, "Backfill date failed");
    }
    if !result.failed_dates.is_empty() {
        bail!("{} dates failed to backfill", result.failed_dates.len());
    }
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("STATS")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat overrides for the common settings
    if let Ok(path) = std::env::var("STATS_DATABASE_PATH") {
        config.database.path = path.into();
    }
    if let Ok(days) = std::env::var("STATS_RETENTION_DAYS") {
        config.retention.raw_retention_days = days
            .parse()
            .context("STATS_RETENTION_DAYS must be a number of days")?;
    }

    Ok(config)
}

/// Check store health on startup.
fn check_health(db: &StatsDb) {
    if check_connection(db) {
        health().store.set_healthy();
        info!("Store connection: healthy");
    } else {
        health().store.set_unhealthy("Connection failed");
        error!("Store connection: unhealthy");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
