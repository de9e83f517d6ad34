//! Rollup aggregator: per-date summary rows from download and version-check facts.
//!
//! Every family of rollup rows for a date is replaced wholesale inside one
//! transaction, so running a date twice yields the same rows as running it
//! once, and keys that no longer have facts disappear.
//!
//! Compacted summary rows keep per-group distinct counts but no client
//! hashes, so exact distinct counts cannot be rebuilt once a date (or a MAU
//! window) reaches compacted data. For those dates the stored distinct
//! counts are kept and only raised when the remaining raw hashes alone
//! prove a higher count. Download totals are always recomputed.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use stats_core::clock::{day_key, window_start};
use stats_core::limits::DEFAULT_MAU_WINDOW_DAYS;
use stats_core::{
    backend_type_or_unknown, DailyCombinedStats, DailyMauStats, DailyVersionStats, DimensionId,
    Error, Result, RollupSummary,
};
use stats_store::{map_db_error, StatsDb};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, info, info_span, warn};

use crate::facts::{default_sources, DownloadFact, DownloadFactSource, FactClients};

/// Downloads and distinct clients for one rollup key.
#[derive(Debug, Default)]
struct Tally {
    downloads: u64,
    clients: HashSet<u32>,
    /// Distinct counts from compacted facts, which carry no hashes.
    compacted_clients: u64,
}

impl Tally {
    fn add(&mut self, downloads: u64, client: Option<u32>, compacted_clients: u64) {
        self.downloads += downloads;
        if let Some(client) = client {
            self.clients.insert(client);
        }
        self.compacted_clients += compacted_clients;
    }

    fn unique_users(&self) -> u64 {
        self.clients.len() as u64 + self.compacted_clients
    }

    /// Distinct clients, preferring a count stored before compaction.
    fn settled_unique_users(&self, stored: Option<u64>) -> u64 {
        match stored {
            Some(prev) => prev.max(self.clients.len() as u64),
            None => self.unique_users(),
        }
    }
}

/// Distinct counts already stored for a date's download rollups.
#[derive(Debug, Default)]
struct StoredDistinct {
    global: Option<u64>,
    tools: HashMap<DimensionId, u64>,
    backends: HashMap<String, u64>,
}

impl StoredDistinct {
    fn load(conn: &Connection, date: NaiveDate) -> Result<Self> {
        let key = day_key(date);
        let global = conn
            .query_row(
                "SELECT unique_users FROM daily_stats WHERE date = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(map_db_error)?
            .map(|n| n as u64);

        let mut stmt = conn
            .prepare_cached("SELECT tool_id, unique_users FROM daily_tool_stats WHERE date = ?1")
            .map_err(map_db_error)?;
        let tools = stmt
            .query_map(params![key], |row| {
                Ok((row.get::<_, DimensionId>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(map_db_error)?
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .map_err(map_db_error)?;

        let mut stmt = conn
            .prepare_cached(
                "SELECT backend_type, unique_users FROM daily_backend_stats WHERE date = ?1",
            )
            .map_err(map_db_error)?;
        let backends = stmt
            .query_map(params![key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(map_db_error)?
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .map_err(map_db_error)?;

        Ok(Self {
            global,
            tools,
            backends,
        })
    }
}

/// In-memory grouping of one date's download facts.
#[derive(Debug, Default)]
struct DayAccumulator {
    client_ids: HashMap<String, u32>,
    global: Tally,
    tools: HashMap<DimensionId, Tally>,
    backends: HashMap<String, Tally>,
    tool_backends: HashMap<(DimensionId, String), u64>,
    has_compacted: bool,
}

impl DayAccumulator {
    fn intern(&mut self, hash: String) -> u32 {
        let next = self.client_ids.len() as u32;
        *self.client_ids.entry(hash).or_insert(next)
    }

    fn add(&mut self, fact: DownloadFact) {
        let (client, compacted) = match fact.clients {
            FactClients::Hash(hash) => (Some(self.intern(hash)), 0),
            FactClients::Distinct(n) => {
                self.has_compacted = true;
                (None, n)
            }
        };
        let backend_type = backend_type_or_unknown(fact.backend.as_deref()).to_string();

        self.global.add(fact.downloads, client, compacted);
        self.tools
            .entry(fact.tool_id)
            .or_default()
            .add(fact.downloads, client, compacted);
        self.backends
            .entry(backend_type.clone())
            .or_default()
            .add(fact.downloads, client, compacted);
        *self
            .tool_backends
            .entry((fact.tool_id, backend_type))
            .or_default() += fact.downloads;
    }

    fn summary(&self, stored: &StoredDistinct) -> RollupSummary {
        RollupSummary {
            tool_stats_count: self.tools.len(),
            backend_stats_count: self.backends.len(),
            tool_backend_stats_count: self.tool_backends.len(),
            total_downloads: self.global.downloads,
            unique_users: self.global.settled_unique_users(stored.global),
        }
    }
}

/// Every rollup computed for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRollup {
    pub date: NaiveDate,
    pub downloads: RollupSummary,
    pub version: DailyVersionStats,
    pub combined: DailyCombinedStats,
    pub mau: DailyMauStats,
}

/// Computes and stores rollup rows.
#[derive(Clone)]
pub struct RollupAggregator {
    db: StatsDb,
    sources: Arc<Vec<Box<dyn DownloadFactSource>>>,
    mau_window_days: u32,
}

impl RollupAggregator {
    /// Aggregator reading raw and compacted download facts.
    pub fn new(db: StatsDb) -> Self {
        Self::with_sources(db, default_sources())
    }

    pub fn with_sources(db: StatsDb, sources: Vec<Box<dyn DownloadFactSource>>) -> Self {
        Self {
            db,
            sources: Arc::new(sources),
            mau_window_days: DEFAULT_MAU_WINDOW_DAYS,
        }
    }

    pub fn with_mau_window(mut self, days: u32) -> Self {
        self.mau_window_days = days;
        self
    }

    pub fn db(&self) -> &StatsDb {
        &self.db
    }

    /// Recompute global, per-tool, per-backend-type and per-tool-per-backend-type
    /// download rollups for `date`.
    pub fn compute_rollups(&self, date: NaiveDate) -> Result<RollupSummary> {
        let _span = info_span!("rollup", date = %date).entered();
        let start = Instant::now();

        let result = self.db.transaction(|tx| {
            let mut day = DayAccumulator::default();
            for source in self.sources.iter() {
                let scanned = source.scan(tx, date, &mut |fact| day.add(fact))?;
                debug!(source = source.name(), facts = scanned, "Scanned download facts");
            }
            let stored = if day.has_compacted {
                StoredDistinct::load(tx, date)?
            } else {
                StoredDistinct::default()
            };
            write_download_rollups(tx, date, &day, &stored)?;
            Ok(day.summary(&stored))
        });

        metrics()
            .rollup_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match result {
            Ok(summary) => {
                metrics().rollup_runs.inc();
                metrics().last_rollup_unix.set(Utc::now().timestamp() as u64);
                info!(
                    tools = summary.tool_stats_count,
                    backends = summary.backend_stats_count,
                    downloads = summary.total_downloads,
                    unique_users = summary.unique_users,
                    "Download rollups computed"
                );
                Ok(summary)
            }
            Err(e) => {
                metrics().rollup_failures.inc();
                warn!(error = %e, "Download rollups failed");
                Err(e)
            }
        }
    }

    /// Recompute the version-check rollup for `date`.
    pub fn compute_version_stats(&self, date: NaiveDate) -> Result<DailyVersionStats> {
        self.db.transaction(|tx| {
            let (total, unique): (i64, i64) = tx
                .query_row(
                    "SELECT count(*), count(DISTINCT client_hash) FROM version_checks WHERE day = ?1",
                    params![day_key(date)],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(map_db_error)?;

            tx.execute(
                r#"
                INSERT INTO daily_version_stats (date, total_checks, unique_users)
                VALUES (?1, ?2, ?3)
                ON CONFLICT (date) DO UPDATE SET
                    total_checks = excluded.total_checks,
                    unique_users = excluded.unique_users
                "#,
                params![day_key(date), total, unique],
            )
            .map_err(map_db_error)?;

            debug!(date = %date, checks = total, unique_users = unique, "Version-check rollup computed");
            Ok(DailyVersionStats {
                date,
                total_checks: total as u64,
                unique_users: unique as u64,
            })
        })
    }

    /// Recompute distinct clients across downloads and version checks for `date`.
    ///
    /// A client present in both streams counts once. Once the date holds
    /// compacted download rows, the stored count is kept; without one, the
    /// compacted distinct counts are added on top of the raw union.
    pub fn compute_combined_stats(&self, date: NaiveDate) -> Result<DailyCombinedStats> {
        self.db.transaction(|tx| {
            let key = day_key(date);
            let raw: i64 = tx
                .query_row(
                    r#"
                    SELECT count(*) FROM (
                        SELECT client_hash FROM downloads WHERE day = ?1
                        UNION
                        SELECT client_hash FROM version_checks WHERE day = ?1
                    )
                    "#,
                    params![key],
                    |row| row.get(0),
                )
                .map_err(map_db_error)?;
            let (compacted_rows, compacted): (i64, i64) = tx
                .query_row(
                    "SELECT count(*), coalesce(sum(unique_users), 0) FROM downloads_daily WHERE date = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(map_db_error)?;
            let stored = if compacted_rows > 0 {
                tx.query_row(
                    "SELECT unique_users FROM daily_combined_stats WHERE date = ?1",
                    params![key],
                    |row| row.get::<_, i64>(0),
                )
                .optional()
                .map_err(map_db_error)?
            } else {
                None
            };
            let unique_users = match stored {
                Some(prev) => prev.max(raw) as u64,
                None => (raw + compacted) as u64,
            };

            tx.execute(
                r#"
                INSERT INTO daily_combined_stats (date, unique_users) VALUES (?1, ?2)
                ON CONFLICT (date) DO UPDATE SET unique_users = excluded.unique_users
                "#,
                params![key, unique_users as i64],
            )
            .map_err(map_db_error)?;

            debug!(date = %date, unique_users = unique_users, "Combined DAU computed");
            Ok(DailyCombinedStats { date, unique_users })
        })
    }

    /// Snapshot distinct clients over the trailing window ending at `date`.
    ///
    /// Counted from raw facts. A window that reaches compacted dates keeps
    /// its stored snapshot, since compacted rows cannot be unioned by client.
    pub fn compute_mau_stats(&self, date: NaiveDate) -> Result<DailyMauStats> {
        let from = window_start(date, self.mau_window_days);
        self.db.transaction(|tx| {
            let raw: i64 = tx
                .query_row(
                    r#"
                    SELECT count(*) FROM (
                        SELECT client_hash FROM downloads WHERE day BETWEEN ?1 AND ?2
                        UNION
                        SELECT client_hash FROM version_checks WHERE day BETWEEN ?1 AND ?2
                    )
                    "#,
                    params![day_key(from), day_key(date)],
                    |row| row.get(0),
                )
                .map_err(map_db_error)?;
            let compacted_dates: i64 = tx
                .query_row(
                    "SELECT count(*) FROM downloads_daily WHERE date BETWEEN ?1 AND ?2",
                    params![day_key(from), day_key(date)],
                    |row| row.get(0),
                )
                .map_err(map_db_error)?;
            let stored = if compacted_dates > 0 {
                tx.query_row(
                    "SELECT mau FROM daily_mau_stats WHERE date = ?1",
                    params![day_key(date)],
                    |row| row.get::<_, i64>(0),
                )
                .optional()
                .map_err(map_db_error)?
            } else {
                None
            };
            let mau = stored.map_or(raw, |prev| prev.max(raw));

            tx.execute(
                r#"
                INSERT INTO daily_mau_stats (date, mau) VALUES (?1, ?2)
                ON CONFLICT (date) DO UPDATE SET mau = excluded.mau
                "#,
                params![day_key(date), mau],
            )
            .map_err(map_db_error)?;

            debug!(date = %date, window_start = %from, mau = mau, "MAU snapshot computed");
            Ok(DailyMauStats {
                date,
                mau: mau as u64,
            })
        })
    }

    /// Every rollup for `date`, downloads first.
    ///
    /// Each family runs even when an earlier one fails; failures are
    /// reported together as `ROLLUP_001`.
    pub fn run_all(&self, date: NaiveDate) -> Result<DateRollup> {
        let mut failures = Vec::new();
        let downloads = record_failure("downloads", self.compute_rollups(date), &mut failures);
        let version = record_failure("version", self.compute_version_stats(date), &mut failures);
        let combined = record_failure("combined", self.compute_combined_stats(date), &mut failures);
        let mau = record_failure("mau", self.compute_mau_stats(date), &mut failures);

        match (downloads, version, combined, mau) {
            (Some(downloads), Some(version), Some(combined), Some(mau)) => Ok(DateRollup {
                date,
                downloads,
                version,
                combined,
                mau,
            }),
            _ => Err(Error::RollupIncomplete { date, failures }),
        }
    }
}

fn record_failure<T>(family: &str, result: Result<T>, failures: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(family = family, error = %e, "Rollup family failed");
            failures.push(format!("{}: {}", family, e));
            None
        }
    }
}

fn write_download_rollups(
    conn: &Connection,
    date: NaiveDate,
    day: &DayAccumulator,
    stored: &StoredDistinct,
) -> Result<()> {
    let key = day_key(date);

    for table in [
        "daily_stats",
        "daily_tool_stats",
        "daily_backend_stats",
        "daily_tool_backend_stats",
    ] {
        conn.execute(&format!("DELETE FROM {} WHERE date = ?1", table), params![key])
            .map_err(map_db_error)?;
    }

    conn.execute(
        "INSERT INTO daily_stats (date, total_downloads, unique_users) VALUES (?1, ?2, ?3)",
        params![
            key,
            day.global.downloads as i64,
            day.global.settled_unique_users(stored.global) as i64
        ],
    )
    .map_err(map_db_error)?;

    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO daily_tool_stats (date, tool_id, downloads, unique_users) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(map_db_error)?;
    for (tool_id, tally) in &day.tools {
        stmt.execute(params![
            key,
            tool_id,
            tally.downloads as i64,
            tally.settled_unique_users(stored.tools.get(tool_id).copied()) as i64
        ])
        .map_err(map_db_error)?;
    }

    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO daily_backend_stats (date, backend_type, downloads, unique_users) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(map_db_error)?;
    for (backend_type, tally) in &day.backends {
        stmt.execute(params![
            key,
            backend_type,
            tally.downloads as i64,
            tally
                .settled_unique_users(stored.backends.get(backend_type).copied()) as i64
        ])
        .map_err(map_db_error)?;
    }

    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO daily_tool_backend_stats (date, tool_id, backend_type, downloads) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(map_db_error)?;
    for ((tool_id, backend_type), downloads) in &day.tool_backends {
        stmt.execute(params![key, tool_id, backend_type, *downloads as i64])
            .map_err(map_db_error)?;
    }

    Ok(())
}
