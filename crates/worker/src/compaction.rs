//! Retention compactor.
//!
//! Raw download facts older than the retention cutoff are folded into the
//! per-(tool, backend, version, platform, date) summary table and then
//! deleted. Each date is compacted in its own transaction: the raw rows of a
//! date are deleted only in the transaction that confirmed their summary, so
//! a failed date keeps all of its raw rows.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Serialize;
use stats_core::clock::{day_key, days_before, parse_day_key};
use stats_core::{Clock, Error, Result, SystemClock};
use stats_store::{map_db_error, StatsDb};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error, info, info_span};

/// A date whose raw rows were left in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactionFailure {
    pub date: NaiveDate,
    pub error: String,
}

/// Outcome of one compaction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    /// Summary groups written or extended
    pub aggregated: u64,
    /// Raw rows deleted
    pub deleted: u64,
    pub compacted_dates: Vec<NaiveDate>,
    pub failed_dates: Vec<CompactionFailure>,
}

impl CompactionReport {
    pub fn is_clean(&self) -> bool {
        self.failed_dates.is_empty()
    }
}

/// Moves aged raw download facts into the compacted summary table.
#[derive(Clone)]
pub struct RetentionCompactor {
    db: StatsDb,
    clock: Arc<dyn Clock>,
}

impl RetentionCompactor {
    pub fn new(db: StatsDb) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Compact raw facts on dates before `today - cutoff_days_ago`.
    pub fn compact(&self, cutoff_days_ago: u32) -> Result<CompactionReport> {
        self.compact_before(days_before(self.clock.today(), cutoff_days_ago))
    }

    /// Compact raw facts on dates strictly before `cutoff`, oldest first.
    ///
    /// A date that fails is reported and left untouched; the remaining dates
    /// are still processed. Only failing to list the dates is an error.
    pub fn compact_before(&self, cutoff: NaiveDate) -> Result<CompactionReport> {
        let _span = info_span!("compaction", cutoff = %cutoff).entered();
        let start = Instant::now();

        let dates = self.db.with_conn(|conn| dates_before(conn, cutoff))?;
        if dates.is_empty() {
            debug!("No raw facts past the retention cutoff");
            return Ok(CompactionReport::default());
        }

        let mut report = CompactionReport::default();
        for date in dates {
            match self.compact_date(date) {
                Ok((groups, deleted)) => {
                    report.aggregated += groups;
                    report.deleted += deleted;
                    report.compacted_dates.push(date);
                    metrics().compaction_groups_written.inc_by(groups);
                    metrics().compaction_rows_deleted.inc_by(deleted);
                    debug!(date = %date, groups = groups, deleted = deleted, "Compacted date");
                }
                Err(e) => {
                    metrics().compaction_failures.inc();
                    error!(date = %date, error = %e, "Compaction failed, raw rows kept");
                    report.failed_dates.push(CompactionFailure {
                        date,
                        error: e.to_string(),
                    });
                }
            }
        }

        metrics()
            .compaction_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        info!(
            dates = report.compacted_dates.len(),
            aggregated = report.aggregated,
            deleted = report.deleted,
            failed = report.failed_dates.len(),
            "Compaction complete"
        );
        Ok(report)
    }

    /// Summarize and delete one date's raw rows. Returns (groups, deleted).
    fn compact_date(&self, date: NaiveDate) -> Result<(u64, u64)> {
        let key = day_key(date);
        self.db.transaction(|tx| {
            let raw_rows = count(tx, "SELECT count(*) FROM downloads WHERE day = ?1", &key)?;
            let before = summary_total(tx, &key)?;

            let groups = tx
                .execute(
                    r#"
                    INSERT INTO downloads_daily
                        (tool_id, backend_id, version, platform_id, date, count, unique_users)
                    SELECT tool_id, coalesce(backend_id, 0), version, coalesce(platform_id, 0),
                           day, count(*), count(DISTINCT client_hash)
                    FROM downloads
                    WHERE day = ?1
                    GROUP BY tool_id, coalesce(backend_id, 0), version, coalesce(platform_id, 0)
                    ON CONFLICT (tool_id, backend_id, version, platform_id, date) DO UPDATE SET
                        count = count + excluded.count,
                        unique_users = unique_users + excluded.unique_users
                    "#,
                    params![key],
                )
                .map_err(map_db_error)? as u64;

            let grown = summary_total(tx, &key)?.saturating_sub(before);
            if grown != raw_rows {
                return Err(Error::compaction_integrity(
                    date,
                    format!("summary grew by {} but {} raw rows were read", grown, raw_rows),
                ));
            }

            let deleted = tx
                .execute("DELETE FROM downloads WHERE day = ?1", params![key])
                .map_err(map_db_error)? as u64;
            if deleted != raw_rows {
                return Err(Error::compaction_integrity(
                    date,
                    format!("deleted {} raw rows, expected {}", deleted, raw_rows),
                ));
            }

            Ok((groups, deleted))
        })
    }
}

fn dates_before(conn: &Connection, cutoff: NaiveDate) -> Result<Vec<NaiveDate>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT day FROM downloads WHERE day < ?1 ORDER BY day")
        .map_err(map_db_error)?;
    let days = stmt
        .query_map(params![day_key(cutoff)], |row| row.get::<_, String>(0))
        .map_err(map_db_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_db_error)?;
    days.iter().map(|d| parse_day_key(d)).collect()
}

fn count(conn: &Connection, sql: &str, key: &str) -> Result<u64> {
    let n: i64 = conn
        .query_row(sql, params![key], |row| row.get(0))
        .map_err(map_db_error)?;
    Ok(n as u64)
}

fn summary_total(conn: &Connection, key: &str) -> Result<u64> {
    count(
        conn,
        "SELECT coalesce(sum(count), 0) FROM downloads_daily WHERE date = ?1",
        key,
    )
}
