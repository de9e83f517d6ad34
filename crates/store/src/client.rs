//! SQLite store handle.

use crate::config::StoreConfig;
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use stats_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Store handle wrapping one SQLite connection.
///
/// Clones share the connection. Independent handles opened on the same file
/// behave like separate processes: they only coordinate through the
/// database's own locking and constraints.
#[derive(Clone)]
pub struct StatsDb {
    inner: Arc<Mutex<Connection>>,
    config: StoreConfig,
}

impl StatsDb {
    /// Opens (creating if needed) the database file from the configuration.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::transient(format!(
                        "failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(&config.path).map_err(map_db_error)?;
        configure(&conn, &config)?;

        info!(
            path = %config.path.display(),
            wal = config.wal,
            busy_timeout_ms = config.busy_timeout_ms,
            "Opened stats database"
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Opens a private in-memory database (tests and dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let config = StoreConfig {
            wal: false,
            ..StoreConfig::default()
        };
        let conn = Connection::open_in_memory().map_err(map_db_error)?;
        configure(&conn, &config)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Runs `f` with the connection held.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.inner.lock();
        f(&conn)
    }

    /// Runs `f` inside an immediate transaction.
    ///
    /// The transaction commits only when `f` returns `Ok`; any error rolls it back.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.inner.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_db_error)?;
        let out = f(&tx)?;
        tx.commit().map_err(map_db_error)?;
        Ok(out)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

fn configure(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(map_db_error)?;
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(map_db_error)?;
    if config.wal {
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(map_db_error)?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(journal_mode = %mode, "WAL journal mode not available");
        }
    }
    Ok(())
}

/// Classify a SQLite error into the engine's error taxonomy.
pub fn map_db_error(err: rusqlite::Error) -> Error {
    let message = err.to_string();

    if message.contains("no such table") {
        return Error::schema_not_ready(message);
    }

    match &err {
        rusqlite::Error::SqliteFailure(inner, _)
            if matches!(
                inner.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::CannotOpen
                    | ErrorCode::DiskFull
            ) =>
        {
            Error::transient(message)
        }
        _ => Error::database(stats_core::error::DbErrorCode::Failed, message),
    }
}
