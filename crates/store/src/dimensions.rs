//! Dimension table primitives.

use crate::client::map_db_error;
use rusqlite::{params, Connection, OptionalExtension};
use stats_core::{DimensionId, NaturalKey, Result};

/// Look up the surrogate id of a natural key.
///
/// Platform lookups use `IS`, which treats two NULLs as equal.
pub fn find_dimension(conn: &Connection, key: &NaturalKey) -> Result<Option<DimensionId>> {
    let found = match key {
        NaturalKey::Tool(name) => conn
            .query_row("SELECT id FROM tools WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional(),
        NaturalKey::Backend(full) => conn
            .query_row("SELECT id FROM backends WHERE full_id = ?1", [full], |row| {
                row.get(0)
            })
            .optional(),
        NaturalKey::Platform(platform) => conn
            .query_row(
                "SELECT id FROM platforms WHERE os IS ?1 AND arch IS ?2",
                params![platform.os, platform.arch],
                |row| row.get(0),
            )
            .optional(),
    };
    found.map_err(map_db_error)
}

/// Insert a natural key, ignoring a uniqueness conflict.
///
/// Returns `true` when this call created the row. A `false` return means a
/// concurrent writer inserted the key first; callers re-read the id.
pub fn insert_dimension_or_ignore(conn: &Connection, key: &NaturalKey) -> Result<bool> {
    let changed = match key {
        NaturalKey::Tool(name) => {
            conn.execute("INSERT OR IGNORE INTO tools (name) VALUES (?1)", [name])
        }
        NaturalKey::Backend(full) => {
            conn.execute("INSERT OR IGNORE INTO backends (full_id) VALUES (?1)", [full])
        }
        NaturalKey::Platform(platform) => conn.execute(
            "INSERT OR IGNORE INTO platforms (os, arch) VALUES (?1, ?2)",
            params![platform.os, platform.arch],
        ),
    };
    changed.map(|n| n > 0).map_err(map_db_error)
}

/// Number of rows stored for a natural key (at most one when the schema is intact).
pub fn count_dimension_rows(conn: &Connection, key: &NaturalKey) -> Result<u64> {
    let count: i64 = match key {
        NaturalKey::Tool(name) => conn.query_row(
            "SELECT count(*) FROM tools WHERE name = ?1",
            [name],
            |row| row.get(0),
        ),
        NaturalKey::Backend(full) => conn.query_row(
            "SELECT count(*) FROM backends WHERE full_id = ?1",
            [full],
            |row| row.get(0),
        ),
        NaturalKey::Platform(platform) => conn.query_row(
            "SELECT count(*) FROM platforms WHERE os IS ?1 AND arch IS ?2",
            params![platform.os, platform.arch],
            |row| row.get(0),
        ),
    }
    .map_err(map_db_error)?;
    Ok(count as u64)
}
