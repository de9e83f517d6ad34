//! Fact insert helpers.
//!
//! Facts are append-only. The per-day unique keys on `downloads` and
//! `version_checks` make a second insert for the same identity and day a
//! no-op, which the tracker reports as a deduplicated event.

use crate::client::map_db_error;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use stats_core::clock::day_key;
use stats_core::{DimensionId, DownloadEvent, Result, VersionCheckEvent};

/// Insert a download fact. Returns `false` when the identity already has a
/// fact for the event's UTC day.
pub fn insert_download(conn: &Connection, event: &DownloadEvent) -> Result<bool> {
    let inserted = conn
        .execute(
            r#"
            INSERT OR IGNORE INTO downloads
                (tool_id, backend_id, version, platform_id, client_hash, created_at, day)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                event.tool_id,
                event.backend_id,
                event.version,
                event.platform_id,
                event.client.as_str(),
                event.created_at.timestamp(),
                day_key(event.day()),
            ],
        )
        .map_err(map_db_error)?;
    Ok(inserted > 0)
}

/// Insert a version-check fact. Returns `false` when the client already has
/// a fact for the event's UTC day.
pub fn insert_version_check(conn: &Connection, event: &VersionCheckEvent) -> Result<bool> {
    let inserted = conn
        .execute(
            r#"
            INSERT OR IGNORE INTO version_checks (client_hash, created_at, day)
            VALUES (?1, ?2, ?3)
            "#,
            params![
                event.client.as_str(),
                event.created_at.timestamp(),
                day_key(event.day()),
            ],
        )
        .map_err(map_db_error)?;
    Ok(inserted > 0)
}

/// Add newly observed versions for a tool on a date.
pub fn add_version_updates(
    conn: &Connection,
    date: NaiveDate,
    tool_id: DimensionId,
    versions_added: u64,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO version_updates (date, tool_id, versions_added)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (date, tool_id)
        DO UPDATE SET versions_added = versions_added + excluded.versions_added
        "#,
        params![day_key(date), tool_id, versions_added as i64],
    )
    .map_err(map_db_error)?;
    Ok(())
}

/// Raw download facts stored for a tool on a date.
pub fn count_downloads(conn: &Connection, tool_id: DimensionId, date: NaiveDate) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM downloads WHERE tool_id = ?1 AND day = ?2",
            params![tool_id, day_key(date)],
            |row| row.get(0),
        )
        .map_err(map_db_error)?;
    Ok(count as u64)
}

/// Raw download facts stored before a date.
pub fn count_downloads_before(conn: &Connection, date: NaiveDate) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM downloads WHERE day < ?1",
            [day_key(date)],
            |row| row.get(0),
        )
        .map_err(map_db_error)?;
    Ok(count as u64)
}

/// Version-check facts stored for a date.
pub fn count_version_checks(conn: &Connection, date: NaiveDate) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM version_checks WHERE day = ?1",
            [day_key(date)],
            |row| row.get(0),
        )
        .map_err(map_db_error)?;
    Ok(count as u64)
}
