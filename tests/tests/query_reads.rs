//! Read contracts over rollup tables, including graceful degradation.

use integration_tests::fixtures::{date, download, download_via};
use integration_tests::setup::TestContext;
use stats_store::map_db_error;
use stats_store::query::{
    active_users, backend_breakdown, global_stats_range, mau_range, tool_backend_breakdown,
    tool_trend, top_tools, version_updates,
};

fn seed_two_days(ctx: &TestContext) {
    let first = ctx.today();
    for n in 1..=3 {
        ctx.tracker
            .track_download(&download_via("node", "22.3.0", n, "core:node"))
            .unwrap();
    }
    ctx.tracker
        .track_download(&download_via("bun", "1.1.0", 1, "aqua:oven-sh/bun"))
        .unwrap();
    ctx.aggregator.run_all(first).unwrap();

    ctx.clock.advance_days(1);
    for n in 1..=3 {
        ctx.tracker
            .track_download(&download_via("bun", "1.1.0", n, "aqua:oven-sh/bun"))
            .unwrap();
    }
    ctx.tracker.track_download(&download("go", "1.22.5", 1)).unwrap();
    ctx.aggregator.run_all(ctx.today()).unwrap();
}

#[test]
fn test_top_tools_breaks_ties_by_name() {
    let ctx = TestContext::new();
    let start = ctx.today();
    seed_two_days(&ctx);

    let top = top_tools(&ctx.db, start, ctx.today(), 2).unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!((top[0].tool.as_str(), top[0].downloads), ("bun", 4));
    assert_eq!((top[1].tool.as_str(), top[1].downloads), ("node", 3));
}

#[test]
fn test_trend_and_breakdowns() {
    let ctx = TestContext::new();
    let start = ctx.today();
    seed_two_days(&ctx);
    let end = ctx.today();

    let trend = tool_trend(&ctx.db, "bun", start, end).unwrap();
    assert_eq!(trend.iter().map(|p| p.downloads).collect::<Vec<_>>(), vec![1, 3]);

    let totals = global_stats_range(&ctx.db, start, end).unwrap();
    assert_eq!(totals.iter().map(|g| g.total_downloads).collect::<Vec<_>>(), vec![4, 4]);

    let backends = backend_breakdown(&ctx.db, start, end).unwrap();
    let aqua = backends.iter().find(|b| b.backend_type == "aqua").unwrap();
    assert_eq!(aqua.downloads, 4);
    assert!(backends.iter().any(|b| b.backend_type == "unknown"));

    let node = tool_backend_breakdown(&ctx.db, "node", start, end).unwrap();
    assert_eq!(node.len(), 1);
    assert_eq!(node[0].backend_type, "core");
}

#[test]
fn test_active_users_reads_snapshots() {
    let ctx = TestContext::new();
    seed_two_days(&ctx);

    let users = active_users(&ctx.db, ctx.today()).unwrap();
    assert_eq!(users.dau, 3);
    assert_eq!(users.mau, 3);

    // No rollup for this date yet
    let empty = active_users(&ctx.db, date(2030, 1, 1)).unwrap();
    assert_eq!((empty.dau, empty.mau), (0, 0));
}

#[test]
fn test_reporting_reads_degrade_without_tables() {
    let ctx = TestContext::new();
    ctx.db
        .with_conn(|conn| {
            conn.execute_batch(
                r#"
                DROP TABLE daily_mau_stats;
                DROP TABLE daily_combined_stats;
                DROP TABLE version_updates;
                "#,
            )
            .map_err(map_db_error)
        })
        .unwrap();

    let users = active_users(&ctx.db, ctx.today()).unwrap();
    assert_eq!((users.dau, users.mau), (0, 0));
    assert!(mau_range(&ctx.db, date(2024, 1, 1), ctx.today()).unwrap().is_empty());
    assert!(version_updates(&ctx.db, date(2024, 1, 1), ctx.today())
        .unwrap()
        .is_empty());
}

#[test]
fn test_version_updates_accumulate() {
    let ctx = TestContext::new();
    ctx.tracker.record_version_updates("node", 2).unwrap();
    ctx.tracker.record_version_updates("node", 3).unwrap();
    ctx.clock.advance_days(1);
    ctx.tracker.record_version_updates("node", 1).unwrap();

    let updates = version_updates(&ctx.db, date(2024, 7, 1), ctx.today()).unwrap();
    let counts: Vec<_> = updates.iter().map(|u| (u.date, u.versions_added)).collect();
    assert_eq!(counts, vec![(date(2024, 7, 1), 5), (date(2024, 7, 2), 1)]);
}
