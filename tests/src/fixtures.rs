//! Test fixtures and request generators.

use chrono::NaiveDate;
use stats_core::{ClientHash, TrackDownload};

/// Deterministic hashed client id.
pub fn client(n: u32) -> ClientHash {
    ClientHash::parse(&format!("c0ffee-client-{:06}", n)).expect("valid client hash")
}

/// Download request without backend or platform.
pub fn download(tool: &str, version: &str, n: u32) -> TrackDownload {
    TrackDownload::new(tool, version, client(n))
}

/// Download request through a backend, on linux/x64.
pub fn download_via(tool: &str, version: &str, n: u32, backend: &str) -> TrackDownload {
    download(tool, version, n)
        .with_backend(backend)
        .with_platform(Some("linux"), Some("x64"))
}

/// Calendar date shorthand.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}
