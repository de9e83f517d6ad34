//! Tests for scheduler-driven health and metrics reporting.

use integration_tests::fixtures::download_via;
use integration_tests::setup::TestContext;
use stats_core::RetentionPolicy;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{health, metrics, HealthStatus};
use worker::{WorkerConfig, WorkerScheduler};

fn scheduler(ctx: &TestContext) -> Arc<WorkerScheduler> {
    let config = WorkerConfig {
        health_check_interval_secs: 1,
        ..WorkerConfig::default()
    };
    Arc::new(WorkerScheduler::new(
        config,
        ctx.db.clone(),
        ctx.daily_job(RetentionPolicy::default()),
    ))
}

/// A clean daily job run leaves the scheduler component healthy
#[tokio::test]
async fn test_daily_job_run_reports_healthy() {
    let ctx = TestContext::new();
    ctx.tracker
        .track_download(&download_via("node", "20.0.0", 1, "core:node"))
        .unwrap();

    let report = scheduler(&ctx).run_daily_job_once().await.unwrap();

    assert!(report.is_clean());
    let today = report.rollups.last().unwrap();
    assert_eq!(today.date, ctx.today());
    assert_eq!(today.downloads.total_downloads, 1);
    assert!(health().scheduler.is_healthy());
    assert!(metrics().snapshot().downloads_tracked >= 1);
}

/// Started workers mark the store healthy and serve a report
#[tokio::test]
async fn test_started_workers_report_store_health() {
    let ctx = TestContext::new();
    let handles = scheduler(&ctx).start();

    let mut ready = false;
    for _ in 0..50 {
        if health().is_ready() {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    for handle in handles {
        handle.abort();
    }

    assert!(ready, "store should report healthy after the first check");
    let report = health().report();
    assert!(report.status.is_serving());
    assert!(report.components.iter().any(|c| c.name == "store" && c.healthy));
    assert_ne!(report.status, HealthStatus::Unhealthy);
}
