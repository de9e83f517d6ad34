//! Fact types for the tracking path.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::Validate;

use crate::dimensions::{DimensionId, PlatformKey};
use crate::error::{Error, Result};
use crate::limits::CLIENT_HASH_PATTERN;

/// Compiled client hash regex (lazy initialization).
static CLIENT_HASH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CLIENT_HASH_PATTERN).expect("invalid client hash pattern"));

/// Hashed, non-reversible client identifier supplied by the boundary layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientHash(String);

impl ClientHash {
    /// Parse and validate a client hash.
    pub fn parse(hash: &str) -> Result<Self> {
        if !CLIENT_HASH_REGEX.is_match(hash) {
            return Err(Error::validation(format!(
                "client hash must match {}",
                CLIENT_HASH_PATTERN
            )));
        }
        Ok(Self(hash.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ClientHash> for String {
    fn from(hash: ClientHash) -> Self {
        hash.0
    }
}

/// One successful tool-version fetch reported by the boundary layer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrackDownload {
    #[validate(length(min = 1, max = 200))]
    pub tool: String,
    #[validate(length(min = 1, max = 100))]
    pub version: String,
    pub client: ClientHash,
    #[validate(length(min = 1, max = 50))]
    pub os: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub arch: Option<String>,
    /// Full backend identifier, e.g. "aqua:org/repo".
    #[validate(length(min = 1, max = 500))]
    pub backend: Option<String>,
}

impl TrackDownload {
    pub fn new(tool: impl Into<String>, version: impl Into<String>, client: ClientHash) -> Self {
        Self {
            tool: tool.into(),
            version: version.into(),
            client,
            os: None,
            arch: None,
            backend: None,
        }
    }

    pub fn with_platform(mut self, os: Option<&str>, arch: Option<&str>) -> Self {
        self.os = os.map(str::to_string);
        self.arch = arch.map(str::to_string);
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn platform(&self) -> Option<PlatformKey> {
        PlatformKey::from_parts(self.os.as_deref(), self.arch.as_deref())
    }

    /// Validate field lengths.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::validation(format!("download: {}", e)))
    }
}

/// Result of a tracking call.
///
/// `deduplicated` is not an error: the identity already has a fact for the
/// current UTC day and nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackOutcome {
    pub deduplicated: bool,
}

impl TrackOutcome {
    pub const RECORDED: Self = Self {
        deduplicated: false,
    };
    pub const DEDUPLICATED: Self = Self { deduplicated: true };
}

/// Stored download fact with resolved dimension ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEvent {
    pub tool_id: DimensionId,
    pub backend_id: Option<DimensionId>,
    pub version: String,
    pub platform_id: Option<DimensionId>,
    pub client: ClientHash,
    pub created_at: DateTime<Utc>,
}

impl DownloadEvent {
    /// UTC calendar day this fact counts towards.
    pub fn day(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

/// Stored version-check (CLI heartbeat) fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheckEvent {
    pub client: ClientHash,
    pub created_at: DateTime<Utc>,
}

impl VersionCheckEvent {
    pub fn day(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}
