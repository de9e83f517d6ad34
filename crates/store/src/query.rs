//! Rollup read contracts.
//!
//! Every function here is a pure read over rollup tables (plus the raw and
//! compacted download tables for per-tool day series). Presentation concerns
//! such as zero-filling missing days belong to the caller.

use crate::client::{map_db_error, StatsDb};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use stats_core::{
    DailyBackendStats, DailyCombinedStats, DailyGlobalStats, DailyMauStats, DailyRawSummary,
    DailyToolBackendStats, DailyToolStats, DailyVersionStats, Result,
};
use tracing::debug;

use crate::schema::NO_DIMENSION_ID;

/// Download total for one tool over a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolTotal {
    pub tool: String,
    pub downloads: u64,
}

/// Download total for one backend type over a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendTotal {
    pub backend_type: String,
    pub downloads: u64,
}

/// One point of a daily series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub downloads: u64,
}

/// Active users as of a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUsers {
    /// Distinct clients across downloads and version checks on the date
    pub dau: u64,
    /// Snapshotted trailing-window distinct clients
    pub mau: u64,
}

/// Versions discovered for a tool on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionUpdateTotal {
    pub date: NaiveDate,
    pub tool: String,
    pub versions_added: u64,
}

/// Global download stats for a date.
pub fn global_stats(db: &StatsDb, date: NaiveDate) -> Result<Option<DailyGlobalStats>> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT date, total_downloads, unique_users FROM daily_stats WHERE date = ?1",
            [date],
            |row| {
                Ok(DailyGlobalStats {
                    date: row.get(0)?,
                    total_downloads: row.get::<_, i64>(1)? as u64,
                    unique_users: row.get::<_, i64>(2)? as u64,
                })
            },
        )
        .optional()
        .map_err(map_db_error)
    })
}

/// Global download stats per day over an inclusive range (trend sparkline).
pub fn global_stats_range(
    db: &StatsDb,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyGlobalStats>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT date, total_downloads, unique_users FROM daily_stats
                WHERE date BETWEEN ?1 AND ?2
                ORDER BY date
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok(DailyGlobalStats {
                    date: row.get(0)?,
                    total_downloads: row.get::<_, i64>(1)? as u64,
                    unique_users: row.get::<_, i64>(2)? as u64,
                })
            })
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

/// Most downloaded tools over a range. Ties are broken by tool name.
pub fn top_tools(
    db: &StatsDb,
    start: NaiveDate,
    end: NaiveDate,
    limit: u32,
) -> Result<Vec<ToolTotal>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT t.name, sum(s.downloads) AS total
                FROM daily_tool_stats s
                JOIN tools t ON t.id = s.tool_id
                WHERE s.date BETWEEN ?1 AND ?2
                GROUP BY t.name
                ORDER BY total DESC, t.name ASC
                LIMIT ?3
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![start, end, limit], |row| {
                Ok(ToolTotal {
                    tool: row.get(0)?,
                    downloads: row.get::<_, i64>(1)? as u64,
                })
            })
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

/// Daily downloads for one tool from the tool rollup.
pub fn tool_trend(
    db: &StatsDb,
    tool: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TrendPoint>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT s.date, s.downloads
                FROM daily_tool_stats s
                JOIN tools t ON t.id = s.tool_id
                WHERE t.name = ?1 AND s.date BETWEEN ?2 AND ?3
                ORDER BY s.date
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![tool, start, end], trend_point)
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

/// Downloads per backend type over a range, largest first.
pub fn backend_breakdown(
    db: &StatsDb,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<BackendTotal>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT backend_type, sum(downloads) AS total
                FROM daily_backend_stats
                WHERE date BETWEEN ?1 AND ?2
                GROUP BY backend_type
                ORDER BY total DESC, backend_type ASC
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![start, end], backend_total)
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

/// Downloads of one tool per backend type over a range.
pub fn tool_backend_breakdown(
    db: &StatsDb,
    tool: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<BackendTotal>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT s.backend_type, sum(s.downloads) AS total
                FROM daily_tool_backend_stats s
                JOIN tools t ON t.id = s.tool_id
                WHERE t.name = ?1 AND s.date BETWEEN ?2 AND ?3
                GROUP BY s.backend_type
                ORDER BY total DESC, s.backend_type ASC
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![tool, start, end], backend_total)
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

/// DAU and MAU as of a date.
///
/// Missing rows or missing tables read as zero rather than failing.
pub fn active_users(db: &StatsDb, date: NaiveDate) -> Result<ActiveUsers> {
    let dau = degrade(
        "daily_combined_stats",
        combined_stats(db, date).map(|row| row.map(|r| r.unique_users)),
    )?
    .flatten()
    .unwrap_or(0);
    let mau = degrade(
        "daily_mau_stats",
        mau_stats(db, date).map(|row| row.map(|r| r.mau)),
    )?
    .flatten()
    .unwrap_or(0);

    Ok(ActiveUsers { dau, mau })
}

/// Snapshotted MAU series over a range; empty when the table is missing.
pub fn mau_range(db: &StatsDb, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyMauStats>> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT date, mau FROM daily_mau_stats WHERE date BETWEEN ?1 AND ?2 ORDER BY date",
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok(DailyMauStats {
                    date: row.get(0)?,
                    mau: row.get::<_, i64>(1)? as u64,
                })
            })
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    });
    Ok(degrade("daily_mau_stats", rows)?.unwrap_or_default())
}

/// Version updates per tool and day over a range; empty when the table is missing.
pub fn version_updates(
    db: &StatsDb,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<VersionUpdateTotal>> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT v.date, t.name, v.versions_added
                FROM version_updates v
                JOIN tools t ON t.id = v.tool_id
                WHERE v.date BETWEEN ?1 AND ?2
                ORDER BY v.date, t.name
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok(VersionUpdateTotal {
                    date: row.get(0)?,
                    tool: row.get(1)?,
                    versions_added: row.get::<_, i64>(2)? as u64,
                })
            })
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    });
    Ok(degrade("version_updates", rows)?.unwrap_or_default())
}

/// Daily downloads of a tool read straight from facts.
///
/// Raw download facts and compacted summary rows are summed per date.
/// Compaction moves a date's raw rows into the summary table in a single
/// transaction, so a fact is never held by both, and raw rows that are past
/// the retention cutoff but not yet compacted still show up.
pub fn tool_downloads_by_day(
    db: &StatsDb,
    tool: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TrendPoint>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT day, sum(n) AS downloads FROM (
                    SELECT d.day AS day, count(*) AS n
                    FROM downloads d
                    JOIN tools t ON t.id = d.tool_id
                    WHERE t.name = ?1 AND d.day BETWEEN ?2 AND ?3
                    GROUP BY d.day
                    UNION ALL
                    SELECT s.date AS day, sum(s.count) AS n
                    FROM downloads_daily s
                    JOIN tools t ON t.id = s.tool_id
                    WHERE t.name = ?1 AND s.date BETWEEN ?2 AND ?3
                    GROUP BY s.date
                )
                GROUP BY day
                ORDER BY day
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![tool, start, end], trend_point)
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

/// Tool rollup rows for a date, ordered by tool id.
pub fn tool_stats(db: &StatsDb, date: NaiveDate) -> Result<Vec<DailyToolStats>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT date, tool_id, downloads, unique_users FROM daily_tool_stats
                WHERE date = ?1 ORDER BY tool_id
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map([date], |row| {
                Ok(DailyToolStats {
                    date: row.get(0)?,
                    tool_id: row.get(1)?,
                    downloads: row.get::<_, i64>(2)? as u64,
                    unique_users: row.get::<_, i64>(3)? as u64,
                })
            })
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

/// Backend rollup rows for a date, ordered by backend type.
pub fn backend_stats(db: &StatsDb, date: NaiveDate) -> Result<Vec<DailyBackendStats>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT date, backend_type, downloads, unique_users FROM daily_backend_stats
                WHERE date = ?1 ORDER BY backend_type
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map([date], |row| {
                Ok(DailyBackendStats {
                    date: row.get(0)?,
                    backend_type: row.get(1)?,
                    downloads: row.get::<_, i64>(2)? as u64,
                    unique_users: row.get::<_, i64>(3)? as u64,
                })
            })
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

/// Tool x backend-type rollup rows for a date.
pub fn tool_backend_stats(db: &StatsDb, date: NaiveDate) -> Result<Vec<DailyToolBackendStats>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT date, tool_id, backend_type, downloads FROM daily_tool_backend_stats
                WHERE date = ?1 ORDER BY tool_id, backend_type
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map([date], |row| {
                Ok(DailyToolBackendStats {
                    date: row.get(0)?,
                    tool_id: row.get(1)?,
                    backend_type: row.get(2)?,
                    downloads: row.get::<_, i64>(3)? as u64,
                })
            })
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

/// Version-check rollup for a date.
pub fn version_stats(db: &StatsDb, date: NaiveDate) -> Result<Option<DailyVersionStats>> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT date, total_checks, unique_users FROM daily_version_stats WHERE date = ?1",
            [date],
            |row| {
                Ok(DailyVersionStats {
                    date: row.get(0)?,
                    total_checks: row.get::<_, i64>(1)? as u64,
                    unique_users: row.get::<_, i64>(2)? as u64,
                })
            },
        )
        .optional()
        .map_err(map_db_error)
    })
}

/// Combined DAU rollup for a date.
pub fn combined_stats(db: &StatsDb, date: NaiveDate) -> Result<Option<DailyCombinedStats>> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT date, unique_users FROM daily_combined_stats WHERE date = ?1",
            [date],
            |row| {
                Ok(DailyCombinedStats {
                    date: row.get(0)?,
                    unique_users: row.get::<_, i64>(1)? as u64,
                })
            },
        )
        .optional()
        .map_err(map_db_error)
    })
}

/// MAU snapshot for a date.
pub fn mau_stats(db: &StatsDb, date: NaiveDate) -> Result<Option<DailyMauStats>> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT date, mau FROM daily_mau_stats WHERE date = ?1",
            [date],
            |row| {
                Ok(DailyMauStats {
                    date: row.get(0)?,
                    mau: row.get::<_, i64>(1)? as u64,
                })
            },
        )
        .optional()
        .map_err(map_db_error)
    })
}

/// Compacted download rows for a date.
pub fn raw_summaries(db: &StatsDb, date: NaiveDate) -> Result<Vec<DailyRawSummary>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT tool_id, backend_id, version, platform_id, date, count, unique_users
                FROM downloads_daily
                WHERE date = ?1
                ORDER BY tool_id, backend_id, version, platform_id
                "#,
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map([date], |row| {
                Ok(DailyRawSummary {
                    tool_id: row.get(0)?,
                    backend_id: optional_id(row.get(1)?),
                    version: row.get(2)?,
                    platform_id: optional_id(row.get(3)?),
                    date: row.get(4)?,
                    downloads: row.get::<_, i64>(5)? as u64,
                    unique_users: row.get::<_, i64>(6)? as u64,
                })
            })
            .map_err(map_db_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_error)
    })
}

fn optional_id(id: i64) -> Option<i64> {
    (id != NO_DIMENSION_ID).then_some(id)
}

fn trend_point(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrendPoint> {
    Ok(TrendPoint {
        date: row.get(0)?,
        downloads: row.get::<_, i64>(1)? as u64,
    })
}

fn backend_total(row: &rusqlite::Row<'_>) -> rusqlite::Result<BackendTotal> {
    Ok(BackendTotal {
        backend_type: row.get(0)?,
        downloads: row.get::<_, i64>(1)? as u64,
    })
}

/// Turn a missing-table failure into `Ok(None)` for reporting reads.
fn degrade<T>(table: &str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_schema_not_ready() => {
            debug!(table = table, error = %e, "Rollup table not ready, returning empty result");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
