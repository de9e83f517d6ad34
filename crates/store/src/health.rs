//! Store health checks and schema initialization.

use crate::client::{map_db_error, StatsDb};
use stats_core::Result;
use tracing::{debug, error};

/// Check store connection health.
pub fn check_connection(db: &StatsDb) -> bool {
    let probe = db.with_conn(|conn| {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(map_db_error)
    });

    match probe {
        Ok(_) => {
            debug!("Stats store connection healthy");
            true
        }
        Err(e) => {
            error!("Stats store health check failed: {}", e);
            false
        }
    }
}

/// Initialize database schema.
///
/// Every statement is `IF NOT EXISTS`, so this is safe to run on each startup.
pub fn init_schema(db: &StatsDb) -> Result<()> {
    use crate::schema::all_tables;

    db.transaction(|tx| {
        for ddl in all_tables() {
            tx.execute_batch(ddl).map_err(map_db_error)?;
        }
        Ok(())
    })?;

    debug!("Stats store schema initialized");
    Ok(())
}

/// Whether a table exists.
pub fn table_exists(db: &StatsDb, table: &str) -> Result<bool> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)
        .map_err(map_db_error)
    })
}
