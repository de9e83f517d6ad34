//! Common test setup functions.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use stats_core::{Clock, FixedClock, RetentionPolicy};
use stats_store::health::init_schema;
use stats_store::{StatsDb, StoreConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tracking::{DimensionResolver, EventTracker};
use worker::{DailyJob, RetentionCompactor, RollupAggregator};

/// Default "now" for tests: 2024-07-01 10:00 UTC.
pub fn default_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap()
}

/// Test context over an on-disk database in a temporary directory.
///
/// The file lives on disk so extra handles can open it, the way separate
/// processes would.
pub struct TestContext {
    _dir: TempDir,
    pub path: PathBuf,
    pub db: StatsDb,
    pub clock: Arc<FixedClock>,
    pub tracker: EventTracker,
    pub aggregator: RollupAggregator,
    pub compactor: RetentionCompactor,
}

impl TestContext {
    /// Create a new context with the schema initialized.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("stats.db");
        let db = StatsDb::open(StoreConfig::at(&path)).expect("Failed to open database");
        init_schema(&db).expect("Failed to initialize schema");

        let clock = Arc::new(FixedClock::new(default_now()));
        let tracker = EventTracker::new(db.clone(), DimensionResolver::new(db.clone()))
            .with_clock(clock.clone());
        let aggregator = RollupAggregator::new(db.clone());
        let compactor = RetentionCompactor::new(db.clone()).with_clock(clock.clone());

        Self {
            _dir: dir,
            path,
            db,
            clock,
            tracker,
            aggregator,
            compactor,
        }
    }

    /// Open another handle on the same database file.
    pub fn open_handle(&self) -> StatsDb {
        StatsDb::open(StoreConfig::at(&self.path)).expect("Failed to open second handle")
    }

    /// A tracker with its own handle and cache, sharing the test clock.
    pub fn independent_tracker(&self) -> EventTracker {
        let db = self.open_handle();
        EventTracker::new(db.clone(), DimensionResolver::new(db)).with_clock(self.clock.clone())
    }

    /// Current test date.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Move the clock to 10:00 UTC on `date`.
    pub fn set_date(&self, date: NaiveDate) {
        let now = date.and_hms_opt(10, 0, 0).expect("valid time");
        self.clock.set(Utc.from_utc_datetime(&now));
    }

    /// Daily job wired to this context's store and clock.
    pub fn daily_job(&self, policy: RetentionPolicy) -> DailyJob {
        DailyJob::new(self.aggregator.clone(), self.compactor.clone(), policy)
            .with_clock(self.clock.clone())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
