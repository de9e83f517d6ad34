//! Worker scheduler for background tasks.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use stats_store::health::check_connection;
use stats_store::StatsDb;
use telemetry::{health, log_metrics, metrics};

use crate::job::DailyJob;

/// Worker scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Daily job interval
    #[serde(default = "default_rollup_interval_secs")]
    pub rollup_interval_secs: u64,
    /// Metrics log interval
    #[serde(default = "default_metrics_flush_interval_secs")]
    pub metrics_flush_interval_secs: u64,
    /// Store health check interval
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    /// Run the daily job immediately at startup
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,
}

fn default_rollup_interval_secs() -> u64 {
    86_400 // 1 day
}

fn default_metrics_flush_interval_secs() -> u64 {
    60
}

fn default_health_check_interval_secs() -> u64 {
    60
}

fn default_run_on_start() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            rollup_interval_secs: default_rollup_interval_secs(),
            metrics_flush_interval_secs: default_metrics_flush_interval_secs(),
            health_check_interval_secs: default_health_check_interval_secs(),
            run_on_start: default_run_on_start(),
        }
    }
}

impl WorkerConfig {
    pub fn rollup_interval(&self) -> Duration {
        Duration::from_secs(self.rollup_interval_secs.max(1))
    }

    pub fn metrics_flush_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_flush_interval_secs.max(1))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }
}

/// Background worker scheduler.
///
/// Runs one daily job at a time; a tick that arrives while the previous run
/// is still going is skipped.
pub struct WorkerScheduler {
    config: WorkerConfig,
    db: StatsDb,
    job: DailyJob,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig, db: StatsDb, job: DailyJob) -> Self {
        Self { config, db, job }
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_daily_job_worker().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_flush().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_health_check().await;
        }));

        health().scheduler.set_healthy();
        info!(
            rollup_interval_secs = self.config.rollup_interval_secs,
            run_on_start = self.config.run_on_start,
            "Background workers started"
        );
        handles
    }

    /// Run the daily job once on the blocking pool.
    pub async fn run_daily_job_once(&self) -> Option<crate::job::DailyJobReport> {
        let job = self.job.clone();
        match tokio::task::spawn_blocking(move || job.run()).await {
            Ok(report) => {
                if report.is_clean() {
                    health().scheduler.set_healthy();
                } else {
                    health()
                        .scheduler
                        .set_unhealthy("last daily job reported failures");
                }
                Some(report)
            }
            Err(e) => {
                error!("Daily job panicked: {}", e);
                health().scheduler.set_unhealthy(format!("daily job panicked: {}", e));
                None
            }
        }
    }

    async fn run_daily_job_worker(&self) {
        let mut ticker = interval(self.config.rollup_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick completes immediately
        if !self.config.run_on_start {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            self.run_daily_job_once().await;
        }
    }

    async fn run_metrics_flush(&self) {
        let mut ticker = interval(self.config.metrics_flush_interval());

        loop {
            ticker.tick().await;
            log_metrics(&metrics().snapshot());
        }
    }

    async fn run_health_check(&self) {
        let mut ticker = interval(self.config.health_check_interval());

        loop {
            ticker.tick().await;

            let db = self.db.clone();
            match tokio::task::spawn_blocking(move || check_connection(&db)).await {
                Ok(true) => health().store.set_healthy(),
                Ok(false) => {
                    warn!("Store health check failed");
                    health().store.set_unhealthy("store did not answer");
                }
                Err(e) => {
                    error!("Store health check panicked: {}", e);
                    health().store.set_unhealthy("health check panicked");
                }
            }
        }
    }
}
