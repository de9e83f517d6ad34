//! Store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SQLite store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file path
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// How long a writer waits on a locked database before failing (ms)
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Use write-ahead logging
    #[serde(default = "default_wal")]
    pub wal: bool,
}

fn default_path() -> PathBuf {
    PathBuf::from("data/stats.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_wal() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            wal: default_wal(),
        }
    }
}

impl StoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}
