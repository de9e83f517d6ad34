//! Download facts for a date, from either of the two places they live.
//!
//! Recent dates are held as raw per-event rows. Dates past the retention
//! cutoff are held as compacted summary rows that keep counts and a
//! distinct-client count but no client hashes. The aggregator reads a date
//! through every configured source and merges the results.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use stats_core::clock::day_key;
use stats_core::{DimensionId, Result};
use stats_store::map_db_error;

/// Which clients a fact stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactClients {
    /// One known client.
    Hash(String),
    /// A number of distinct clients whose hashes are no longer stored.
    Distinct(u64),
}

/// One unit of download evidence for a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFact {
    pub tool_id: DimensionId,
    /// Full backend identifier, if the download named one.
    pub backend: Option<String>,
    pub downloads: u64,
    pub clients: FactClients,
}

/// A provider of download facts for a single UTC date.
pub trait DownloadFactSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Feed every fact stored for `date` to `sink`.
    fn scan(
        &self,
        conn: &Connection,
        date: NaiveDate,
        sink: &mut dyn FnMut(DownloadFact),
    ) -> Result<u64>;
}

/// Raw download rows, one fact per stored event.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawDownloads;

impl DownloadFactSource for RawDownloads {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn scan(
        &self,
        conn: &Connection,
        date: NaiveDate,
        sink: &mut dyn FnMut(DownloadFact),
    ) -> Result<u64> {
        let mut stmt = conn
            .prepare_cached(
                r#"
                SELECT d.tool_id, b.full_id, d.client_hash
                FROM downloads d
                LEFT JOIN backends b ON b.id = d.backend_id
                WHERE d.day = ?1
                "#,
            )
            .map_err(map_db_error)?;
        let mut rows = stmt.query(params![day_key(date)]).map_err(map_db_error)?;

        let mut scanned = 0;
        while let Some(row) = rows.next().map_err(map_db_error)? {
            sink(DownloadFact {
                tool_id: row.get(0).map_err(map_db_error)?,
                backend: row.get(1).map_err(map_db_error)?,
                downloads: 1,
                clients: FactClients::Hash(row.get(2).map_err(map_db_error)?),
            });
            scanned += 1;
        }
        Ok(scanned)
    }
}

/// Compacted summary rows for dates past the retention cutoff.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompactedDownloads;

impl DownloadFactSource for CompactedDownloads {
    fn name(&self) -> &'static str {
        "compacted"
    }

    fn scan(
        &self,
        conn: &Connection,
        date: NaiveDate,
        sink: &mut dyn FnMut(DownloadFact),
    ) -> Result<u64> {
        // backend_id 0 matches no backend row, so the join yields NULL
        let mut stmt = conn
            .prepare_cached(
                r#"
                SELECT s.tool_id, b.full_id, s.count, s.unique_users
                FROM downloads_daily s
                LEFT JOIN backends b ON b.id = s.backend_id
                WHERE s.date = ?1
                "#,
            )
            .map_err(map_db_error)?;
        let mut rows = stmt.query(params![day_key(date)]).map_err(map_db_error)?;

        let mut scanned = 0;
        while let Some(row) = rows.next().map_err(map_db_error)? {
            let downloads: i64 = row.get(2).map_err(map_db_error)?;
            let unique_users: i64 = row.get(3).map_err(map_db_error)?;
            sink(DownloadFact {
                tool_id: row.get(0).map_err(map_db_error)?,
                backend: row.get(1).map_err(map_db_error)?,
                downloads: downloads as u64,
                clients: FactClients::Distinct(unique_users as u64),
            });
            scanned += 1;
        }
        Ok(scanned)
    }
}

/// Both sources, raw first.
pub fn default_sources() -> Vec<Box<dyn DownloadFactSource>> {
    vec![Box::new(RawDownloads), Box::new(CompactedDownloads)]
}
