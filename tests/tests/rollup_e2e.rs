//! End-to-end tests for rollups: tracked facts in, rollup rows out.

use integration_tests::fixtures::{client, download, download_via};
use integration_tests::setup::TestContext;
use stats_core::RetentionPolicy;
use stats_store::query::{
    backend_stats, combined_stats, global_stats, tool_backend_stats, tool_stats, version_stats,
};
use worker::BackfillWorker;

fn seed_node_and_go(ctx: &TestContext) {
    for n in [1, 2] {
        ctx.tracker
            .track_download(&download_via("node", "22.3.0", n, "core:node"))
            .unwrap();
    }
    ctx.tracker
        .track_download(&download_via("node", "20.15.0", 1, "core:node"))
        .unwrap();
    for n in [3, 4] {
        ctx.tracker
            .track_download(&download_via("go", "1.22.5", n, "core:go"))
            .unwrap();
    }
}

#[test]
fn test_rollup_correctness() {
    let ctx = TestContext::new();
    seed_node_and_go(&ctx);
    let today = ctx.today();

    let summary = ctx.aggregator.compute_rollups(today).unwrap();
    assert_eq!(summary.tool_stats_count, 2);
    assert_eq!(summary.backend_stats_count, 1);

    let node = ctx.tracker.resolver().resolve_tool("node").unwrap();
    let tools = tool_stats(&ctx.db, today).unwrap();
    let node_row = tools.iter().find(|t| t.tool_id == node).unwrap();
    assert_eq!(node_row.downloads, 3);
    assert_eq!(node_row.unique_users, 2);

    let global = global_stats(&ctx.db, today).unwrap().unwrap();
    assert_eq!(global.total_downloads, 5);
    assert_eq!(global.unique_users, 4);

    let backends = backend_stats(&ctx.db, today).unwrap();
    assert_eq!(backends.len(), 1);
    assert_eq!(backends[0].backend_type, "core");
    assert_eq!(backends[0].downloads, 5);

    let pairs = tool_backend_stats(&ctx.db, today).unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs.iter().map(|p| p.downloads).sum::<u64>(), 5);
}

#[test]
fn test_rollup_idempotence() {
    let ctx = TestContext::new();
    seed_node_and_go(&ctx);
    let today = ctx.today();

    let first = ctx.aggregator.run_all(today).unwrap();
    let rows_first = (
        tool_stats(&ctx.db, today).unwrap(),
        backend_stats(&ctx.db, today).unwrap(),
        tool_backend_stats(&ctx.db, today).unwrap(),
    );
    let second = ctx.aggregator.run_all(today).unwrap();
    let rows_second = (
        tool_stats(&ctx.db, today).unwrap(),
        backend_stats(&ctx.db, today).unwrap(),
        tool_backend_stats(&ctx.db, today).unwrap(),
    );

    assert_eq!(first, second);
    assert_eq!(rows_first, rows_second);
}

#[test]
fn test_combined_dau_counts_client_once() {
    let ctx = TestContext::new();
    let today = ctx.today();
    ctx.tracker.track_download(&download("node", "22.3.0", 1)).unwrap();
    ctx.tracker.track_version_check(&client(1)).unwrap();
    ctx.tracker.track_version_check(&client(2)).unwrap();

    ctx.aggregator.run_all(today).unwrap();

    assert_eq!(combined_stats(&ctx.db, today).unwrap().unwrap().unique_users, 2);
    assert_eq!(version_stats(&ctx.db, today).unwrap().unwrap().total_checks, 2);
    assert_eq!(global_stats(&ctx.db, today).unwrap().unwrap().unique_users, 1);
}

#[test]
fn test_dates_are_independent() {
    let ctx = TestContext::new();
    let day_one = ctx.today();
    ctx.tracker.track_download(&download("node", "22.3.0", 1)).unwrap();
    ctx.clock.advance_days(1);
    let day_two = ctx.today();
    ctx.tracker.track_download(&download("node", "22.3.0", 1)).unwrap();
    ctx.tracker.track_download(&download("node", "22.3.0", 2)).unwrap();

    // Order does not matter
    ctx.aggregator.compute_rollups(day_two).unwrap();
    ctx.aggregator.compute_rollups(day_one).unwrap();

    assert_eq!(global_stats(&ctx.db, day_one).unwrap().unwrap().total_downloads, 1);
    assert_eq!(global_stats(&ctx.db, day_two).unwrap().unwrap().total_downloads, 2);
}

#[test]
fn test_late_facts_picked_up_on_rerun() {
    let ctx = TestContext::new();
    let today = ctx.today();
    ctx.tracker.track_download(&download("node", "22.3.0", 1)).unwrap();
    ctx.aggregator.compute_rollups(today).unwrap();

    ctx.tracker.track_download(&download("node", "22.3.0", 2)).unwrap();
    ctx.aggregator.compute_rollups(today).unwrap();

    assert_eq!(global_stats(&ctx.db, today).unwrap().unwrap().total_downloads, 2);
}

#[test]
fn test_daily_job_covers_yesterday_and_today() {
    let ctx = TestContext::new();
    let yesterday = ctx.today();
    ctx.tracker.track_download(&download("node", "22.3.0", 1)).unwrap();
    ctx.clock.advance_days(1);
    ctx.tracker.track_download(&download("node", "22.3.0", 2)).unwrap();

    let report = ctx.daily_job(RetentionPolicy::default()).run();

    assert!(report.is_clean());
    assert_eq!(report.rollups.len(), 2);
    assert_eq!(report.rollups[0].date, yesterday);
    assert_eq!(report.rollups[1].mau.mau, 2);
}

#[test]
fn test_backfill_recomputes_range() {
    let ctx = TestContext::new();
    let start = ctx.today();
    for n in 1..=3 {
        ctx.tracker.track_download(&download("node", "22.3.0", n)).unwrap();
        ctx.clock.advance_days(1);
    }
    let end = ctx.today();

    let result = BackfillWorker::new(ctx.aggregator.clone())
        .run(start, end)
        .unwrap();

    assert_eq!(result.dates_processed, 4);
    assert_eq!(result.downloads_recounted, 3);
    assert_eq!(global_stats(&ctx.db, end).unwrap().unwrap().total_downloads, 0);
}
