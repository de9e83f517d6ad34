//! SQLite table schemas.
//!
//! Schema layout:
//! - dimension tables (`tools`, `backends`, `platforms`), append-only
//! - fact tables (`downloads`, `version_checks`) with one row per identity per UTC day
//! - rollup tables (`daily_*`), replaced per date by the aggregator
//! - `version_updates`, accumulated by the version-sync collaborator
//! - `downloads_daily`, compacted download facts past the retention cutoff
//!
//! Day columns hold `YYYY-MM-DD` UTC dates; timestamps are unix seconds.

/// Tool dimension.
pub const CREATE_TOOLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tools (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
)
"#;

/// Backend dimension, keyed by the full identifier (e.g. "aqua:org/repo").
pub const CREATE_BACKENDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS backends (
    id INTEGER PRIMARY KEY,
    full_id TEXT NOT NULL UNIQUE
)
"#;

/// Platform dimension.
pub const CREATE_PLATFORMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS platforms (
    id INTEGER PRIMARY KEY,
    os TEXT,
    arch TEXT
)
"#;

/// Uniqueness of (os, arch) including NULLs.
///
/// A plain UNIQUE constraint treats NULLs as distinct, so the index maps NULL
/// to a blob that can never equal a text value.
pub const CREATE_PLATFORMS_UNIQUE_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_platforms_os_arch
    ON platforms (coalesce(os, x'00'), coalesce(arch, x'00'))
"#;

/// Download facts. The unique key enforces one fact per
/// (tool, version, client) per UTC day.
pub const CREATE_DOWNLOADS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS downloads (
    id INTEGER PRIMARY KEY,
    tool_id INTEGER NOT NULL REFERENCES tools(id),
    backend_id INTEGER REFERENCES backends(id),
    version TEXT NOT NULL,
    platform_id INTEGER REFERENCES platforms(id),
    client_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    day TEXT NOT NULL,
    UNIQUE (tool_id, version, client_hash, day)
)
"#;

pub const CREATE_DOWNLOADS_DAY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_downloads_day ON downloads (day)
"#;

pub const CREATE_DOWNLOADS_CLIENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_downloads_day_client ON downloads (day, client_hash)
"#;

/// Version-check facts, one per client per UTC day.
pub const CREATE_VERSION_CHECKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS version_checks (
    id INTEGER PRIMARY KEY,
    client_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    day TEXT NOT NULL,
    UNIQUE (client_hash, day)
)
"#;

pub const CREATE_VERSION_CHECKS_DAY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_version_checks_day ON version_checks (day)
"#;

pub const CREATE_DAILY_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_stats (
    date TEXT PRIMARY KEY,
    total_downloads INTEGER NOT NULL,
    unique_users INTEGER NOT NULL
)
"#;

pub const CREATE_DAILY_TOOL_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_tool_stats (
    date TEXT NOT NULL,
    tool_id INTEGER NOT NULL REFERENCES tools(id),
    downloads INTEGER NOT NULL,
    unique_users INTEGER NOT NULL,
    PRIMARY KEY (date, tool_id)
)
"#;

pub const CREATE_DAILY_BACKEND_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_backend_stats (
    date TEXT NOT NULL,
    backend_type TEXT NOT NULL,
    downloads INTEGER NOT NULL,
    unique_users INTEGER NOT NULL,
    PRIMARY KEY (date, backend_type)
)
"#;

/// Count only; distinct clients are not tracked at this cardinality.
pub const CREATE_DAILY_TOOL_BACKEND_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_tool_backend_stats (
    date TEXT NOT NULL,
    tool_id INTEGER NOT NULL REFERENCES tools(id),
    backend_type TEXT NOT NULL,
    downloads INTEGER NOT NULL,
    PRIMARY KEY (date, tool_id, backend_type)
)
"#;

pub const CREATE_DAILY_VERSION_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_version_stats (
    date TEXT PRIMARY KEY,
    total_checks INTEGER NOT NULL,
    unique_users INTEGER NOT NULL
)
"#;

pub const CREATE_DAILY_COMBINED_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_combined_stats (
    date TEXT PRIMARY KEY,
    unique_users INTEGER NOT NULL
)
"#;

pub const CREATE_DAILY_MAU_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_mau_stats (
    date TEXT PRIMARY KEY,
    mau INTEGER NOT NULL
)
"#;

pub const CREATE_VERSION_UPDATES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS version_updates (
    date TEXT NOT NULL,
    tool_id INTEGER NOT NULL REFERENCES tools(id),
    versions_added INTEGER NOT NULL,
    PRIMARY KEY (date, tool_id)
)
"#;

/// Compacted download facts. Absent backend / platform are stored as 0 so
/// the natural key can be the primary key.
pub const CREATE_DOWNLOADS_DAILY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS downloads_daily (
    tool_id INTEGER NOT NULL,
    backend_id INTEGER NOT NULL DEFAULT 0,
    version TEXT NOT NULL,
    platform_id INTEGER NOT NULL DEFAULT 0,
    date TEXT NOT NULL,
    count INTEGER NOT NULL,
    unique_users INTEGER NOT NULL,
    PRIMARY KEY (tool_id, backend_id, version, platform_id, date)
)
"#;

pub const CREATE_DOWNLOADS_DAILY_DATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_downloads_daily_date ON downloads_daily (date)
"#;

/// Sentinel id for "no backend" / "no platform" in `downloads_daily`.
pub const NO_DIMENSION_ID: i64 = 0;

/// Tables the aggregator replaces per date.
pub const ROLLUP_TABLES: &[&str] = &[
    "daily_stats",
    "daily_tool_stats",
    "daily_backend_stats",
    "daily_tool_backend_stats",
    "daily_version_stats",
    "daily_combined_stats",
    "daily_mau_stats",
];

/// Get all DDL statements in dependency order.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_TOOLS_TABLE,
        CREATE_BACKENDS_TABLE,
        CREATE_PLATFORMS_TABLE,
        CREATE_PLATFORMS_UNIQUE_INDEX,
        CREATE_DOWNLOADS_TABLE,
        CREATE_DOWNLOADS_DAY_INDEX,
        CREATE_DOWNLOADS_CLIENT_INDEX,
        CREATE_VERSION_CHECKS_TABLE,
        CREATE_VERSION_CHECKS_DAY_INDEX,
        CREATE_DAILY_STATS_TABLE,
        CREATE_DAILY_TOOL_STATS_TABLE,
        CREATE_DAILY_BACKEND_STATS_TABLE,
        CREATE_DAILY_TOOL_BACKEND_STATS_TABLE,
        CREATE_DAILY_VERSION_STATS_TABLE,
        CREATE_DAILY_COMBINED_STATS_TABLE,
        CREATE_DAILY_MAU_STATS_TABLE,
        CREATE_VERSION_UPDATES_TABLE,
        CREATE_DOWNLOADS_DAILY_TABLE,
        CREATE_DOWNLOADS_DAILY_DATE_INDEX,
    ]
}
