//! End-to-end tests for retention compaction and the reads that span it.

use integration_tests::fixtures::{client, date, download, download_via};
use integration_tests::setup::TestContext;
use stats_core::RetentionPolicy;
use stats_store::insert::{count_downloads, count_downloads_before};
use stats_store::query::{
    combined_stats, global_stats, mau_stats, raw_summaries, tool_downloads_by_day, tool_stats,
};
use worker::BackfillWorker;

/// Four downloads on 2024-01-05, then the clock is back at 2024-07-01.
fn seed_old_day(ctx: &TestContext) {
    ctx.set_date(date(2024, 1, 5));
    for n in [1, 2] {
        ctx.tracker
            .track_download(&download_via("node", "22.3.0", n, "core:node"))
            .unwrap();
    }
    ctx.tracker.track_download(&download("node", "22.3.0", 3)).unwrap();
    ctx.tracker
        .track_download(&download_via("go", "1.22.5", 4, "core:go"))
        .unwrap();
    ctx.set_date(date(2024, 7, 1));
}

#[test]
fn test_compaction_preserves_per_tool_counts() {
    let ctx = TestContext::new();
    seed_old_day(&ctx);
    ctx.tracker.track_download(&download("node", "22.3.0", 1)).unwrap();

    let old = date(2024, 1, 5);
    let node = ctx.tracker.resolver().resolve_tool("node").unwrap();
    let before = ctx.db.with_conn(|conn| count_downloads(conn, node, old)).unwrap();

    let report = ctx.compactor.compact(90).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.deleted, 4);
    assert_eq!(report.aggregated, 3);

    let compacted: u64 = raw_summaries(&ctx.db, old)
        .unwrap()
        .iter()
        .filter(|s| s.tool_id == node)
        .map(|s| s.downloads)
        .sum();
    assert_eq!(compacted, before);

    let cutoff = RetentionPolicy::default().cutoff_date(ctx.today());
    let remaining = ctx
        .db
        .with_conn(|conn| count_downloads_before(conn, cutoff))
        .unwrap();
    assert_eq!(remaining, 0);

    // Today's raw fact is untouched
    let recent = ctx
        .db
        .with_conn(|conn| count_downloads(conn, node, ctx.today()))
        .unwrap();
    assert_eq!(recent, 1);
}

#[test]
fn test_rollup_after_compaction_matches_rollup_before() {
    let ctx = TestContext::new();
    seed_old_day(&ctx);
    let old = date(2024, 1, 5);

    ctx.aggregator.compute_rollups(old).unwrap();
    let global_before = global_stats(&ctx.db, old).unwrap().unwrap();
    let tools_before = tool_stats(&ctx.db, old).unwrap();

    ctx.compactor.compact(90).unwrap();
    ctx.aggregator.compute_rollups(old).unwrap();

    assert_eq!(global_stats(&ctx.db, old).unwrap().unwrap(), global_before);
    assert_eq!(tool_stats(&ctx.db, old).unwrap(), tools_before);
}

#[test]
fn test_backfill_over_compacted_date_keeps_distinct_counts() {
    let ctx = TestContext::new();
    let old = date(2024, 1, 10);
    ctx.set_date(old);
    ctx.tracker.track_download(&download("node", "20.0.0", 1)).unwrap();
    ctx.tracker.track_download(&download("node", "22.0.0", 1)).unwrap();
    ctx.tracker.track_download(&download("node", "22.0.0", 2)).unwrap();
    ctx.tracker.track_version_check(&client(1)).unwrap();
    ctx.set_date(date(2024, 7, 1));

    let before = ctx.aggregator.run_all(old).unwrap();
    assert_eq!(
        (before.downloads.unique_users, before.combined.unique_users, before.mau.mau),
        (2, 2, 2)
    );
    let tools_before = tool_stats(&ctx.db, old).unwrap();

    let compaction = ctx.compactor.compact(90).unwrap();
    assert_eq!(compaction.compacted_dates, vec![old]);

    let result = BackfillWorker::new(ctx.aggregator.clone()).run(old, old).unwrap();
    assert_eq!(result.dates_processed, 1);
    assert_eq!(result.downloads_recounted, 3);

    let global = global_stats(&ctx.db, old).unwrap().unwrap();
    assert_eq!((global.total_downloads, global.unique_users), (3, 2));
    assert_eq!(tool_stats(&ctx.db, old).unwrap(), tools_before);
    assert_eq!(combined_stats(&ctx.db, old).unwrap(), Some(before.combined));
    assert_eq!(mau_stats(&ctx.db, old).unwrap(), Some(before.mau));
}

#[test]
fn test_trend_spans_compacted_and_raw_dates() {
    let ctx = TestContext::new();
    seed_old_day(&ctx);
    ctx.tracker.track_download(&download("node", "22.3.0", 9)).unwrap();
    ctx.compactor.compact(90).unwrap();

    let series = tool_downloads_by_day(&ctx.db, "node", date(2024, 1, 1), ctx.today()).unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].date, date(2024, 1, 5));
    assert_eq!(series[0].downloads, 3);
    assert_eq!(series[1].date, ctx.today());
    assert_eq!(series[1].downloads, 1);
}

#[test]
fn test_daily_job_rolls_up_before_compacting() {
    let ctx = TestContext::new();
    let policy = RetentionPolicy::default();

    // Facts on what will be yesterday when the job runs past the cutoff
    let day = date(2024, 3, 1);
    ctx.set_date(day);
    ctx.tracker.track_download(&download("node", "22.3.0", 1)).unwrap();
    ctx.set_date(date(2024, 3, 2));
    ctx.tracker.track_download(&download("node", "22.3.0", 2)).unwrap();

    let report = ctx.daily_job(policy).run();
    assert!(report.is_clean());
    assert_eq!(global_stats(&ctx.db, day).unwrap().unwrap().total_downloads, 1);

    // Much later: the raw rows age out and are compacted
    ctx.set_date(date(2024, 7, 1));
    let report = ctx.daily_job(policy).run();
    let compaction = report.compaction.unwrap();
    assert_eq!(compaction.compacted_dates, vec![day, date(2024, 3, 2)]);
    assert_eq!(global_stats(&ctx.db, day).unwrap().unwrap().total_downloads, 1);
}

#[test]
fn test_second_run_is_noop() {
    let ctx = TestContext::new();
    seed_old_day(&ctx);

    let first = ctx.compactor.compact(90).unwrap();
    let second = ctx.compactor.compact(90).unwrap();

    assert_eq!(first.deleted, 4);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.aggregated, 0);
}
