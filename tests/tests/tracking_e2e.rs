//! End-to-end tests for the tracking path.
//!
//! Dimension resolution and per-day dedup against an on-disk database,
//! including several handles writing to the same file.

use integration_tests::fixtures::{self, client, download, download_via};
use integration_tests::setup::TestContext;
use stats_core::{NaturalKey, TrackOutcome};
use stats_store::dimensions::count_dimension_rows;
use stats_store::insert::{count_downloads, count_version_checks};
use std::thread;

#[test]
fn test_repeated_download_recorded_once_per_day() {
    let ctx = TestContext::new();
    let request = download_via("node", "22.3.0", 1, "core:node");

    let outcomes: Vec<_> = (0..10)
        .map(|_| ctx.tracker.track_download(&request).unwrap())
        .collect();

    assert_eq!(outcomes[0], TrackOutcome::RECORDED);
    assert!(outcomes[1..].iter().all(|o| o.deduplicated));

    let tool_id = ctx.tracker.resolver().resolve_tool("node").unwrap();
    let stored = ctx
        .db
        .with_conn(|conn| count_downloads(conn, tool_id, ctx.today()))
        .unwrap();
    assert_eq!(stored, 1);
}

#[test]
fn test_dedup_resets_on_next_day() {
    let ctx = TestContext::new();
    let request = download("go", "1.22.5", 7);

    assert!(!ctx.tracker.track_download(&request).unwrap().deduplicated);
    assert!(ctx.tracker.track_download(&request).unwrap().deduplicated);

    ctx.clock.advance_days(1);
    assert!(!ctx.tracker.track_download(&request).unwrap().deduplicated);
    assert!(ctx.tracker.track_download(&request).unwrap().deduplicated);
}

#[test]
fn test_dedup_holds_across_handles() {
    let ctx = TestContext::new();
    let other = ctx.independent_tracker();
    let request = download("deno", "1.45.0", 3);

    assert!(!ctx.tracker.track_download(&request).unwrap().deduplicated);
    assert!(other.track_download(&request).unwrap().deduplicated);

    assert!(!other.track_version_check(&client(3)).unwrap().deduplicated);
    assert!(ctx.tracker.track_version_check(&client(3)).unwrap().deduplicated);

    let checks = ctx
        .db
        .with_conn(|conn| count_version_checks(conn, ctx.today()))
        .unwrap();
    assert_eq!(checks, 1);
}

#[test]
fn test_concurrent_same_identity_records_once() {
    let ctx = TestContext::new();
    let trackers: Vec<_> = (0..6).map(|_| ctx.independent_tracker()).collect();

    let handles: Vec<_> = trackers
        .into_iter()
        .map(|tracker| {
            thread::spawn(move || {
                tracker
                    .track_download(&download_via("bun", "1.1.0", 42, "aqua:oven-sh/bun"))
                    .unwrap()
            })
        })
        .collect();
    let recorded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|o| !o.deduplicated)
        .count();

    assert_eq!(recorded, 1);
}

#[test]
fn test_resolver_stable_under_concurrency() {
    let ctx = TestContext::new();
    let key = NaturalKey::Backend("aqua:org/tool".to_string());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tracker = ctx.independent_tracker();
            thread::spawn(move || {
                tracker
                    .resolver()
                    .resolve_backend(Some("aqua:org/tool"))
                    .unwrap()
            })
        })
        .collect();
    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    let rows = ctx
        .db
        .with_conn(|conn| count_dimension_rows(conn, &key))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn test_platform_with_missing_arch_is_one_dimension() {
    let ctx = TestContext::new();
    let request = fixtures::download("node", "22.3.0", 1).with_platform(Some("linux"), None);
    let other = fixtures::download("node", "22.3.0", 2).with_platform(Some("linux"), None);

    ctx.tracker.track_download(&request).unwrap();
    ctx.tracker.track_download(&other).unwrap();

    let key = NaturalKey::Platform(request.platform().unwrap());
    let rows = ctx
        .db
        .with_conn(|conn| count_dimension_rows(conn, &key))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn test_malformed_client_hash_rejected() {
    assert!(stats_core::ClientHash::parse("short").is_err());
    assert!(stats_core::ClientHash::parse("has spaces in it").is_err());
    assert!(stats_core::ClientHash::parse("1.2.3.4").is_err());
}
