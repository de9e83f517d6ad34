//! Dimension natural keys and surrogate ids.
//!
//! Dimensions are created lazily, never renamed and never deleted, so a
//! natural key maps to the same surrogate id for the lifetime of the store.

use serde::{Deserialize, Serialize};

use crate::limits::{BACKEND_SCHEME_SEPARATOR, UNKNOWN_BACKEND_TYPE};

/// Surrogate key of a dimension row.
pub type DimensionId = i64;

/// Dimension table kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Tool,
    Backend,
    Platform,
}

impl DimensionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Backend => "backend",
            Self::Platform => "platform",
        }
    }
}

/// Natural key of a platform: an (os, arch) pair where either side may be absent.
///
/// Two keys are equal when both components are equal, treating two absent
/// components as equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformKey {
    pub os: Option<String>,
    pub arch: Option<String>,
}

impl PlatformKey {
    pub fn new(os: Option<&str>, arch: Option<&str>) -> Self {
        Self {
            os: os.map(str::to_string),
            arch: arch.map(str::to_string),
        }
    }

    /// Returns `None` when neither component is known; downloads then carry no platform.
    pub fn from_parts(os: Option<&str>, arch: Option<&str>) -> Option<Self> {
        if os.is_none() && arch.is_none() {
            None
        } else {
            Some(Self::new(os, arch))
        }
    }
}

/// Natural key for any dimension kind; the cache key of the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    Tool(String),
    Backend(String),
    Platform(PlatformKey),
}

impl NaturalKey {
    pub fn kind(&self) -> DimensionKind {
        match self {
            Self::Tool(_) => DimensionKind::Tool,
            Self::Backend(_) => DimensionKind::Backend,
            Self::Platform(_) => DimensionKind::Platform,
        }
    }
}

/// Backend type of a full backend identifier: the scheme before the first `:`.
///
/// `"aqua:org/repo"` -> `"aqua"`; an identifier without a separator is its own type.
pub fn backend_type(full: &str) -> &str {
    match full.split_once(BACKEND_SCHEME_SEPARATOR) {
        Some((scheme, _)) => scheme,
        None => full,
    }
}

/// Backend type for an optional backend, `"unknown"` when absent.
pub fn backend_type_or_unknown(full: Option<&str>) -> &str {
    full.map(backend_type).unwrap_or(UNKNOWN_BACKEND_TYPE)
}
