//! Size limits and fixed windows for the stats engine.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so field limits are duplicated there. Keep both in sync when modifying.

// === Input Limits ===

/// Maximum tool name length in bytes.
pub const MAX_TOOL_NAME_LEN: usize = 200;

/// Maximum version string length in bytes.
pub const MAX_VERSION_LEN: usize = 100;

/// Maximum backend identifier length (e.g. "aqua:org/repo").
pub const MAX_BACKEND_LEN: usize = 500;

/// Maximum os / arch component length.
pub const MAX_PLATFORM_COMPONENT_LEN: usize = 50;

/// Hashed client identifier pattern.
///
/// The boundary layer hashes the client address before it reaches the core;
/// anything that still looks like an IP address is rejected by this pattern.
pub const CLIENT_HASH_PATTERN: &str = r"^[A-Za-z0-9_-]{8,128}$";

// === Windows ===

/// Default raw event retention before compaction (days).
pub const DEFAULT_RAW_RETENTION_DAYS: u32 = 90;

/// Trailing window for MAU snapshots (days, inclusive of the snapshot date).
pub const DEFAULT_MAU_WINDOW_DAYS: u32 = 30;

/// Backend type used when a download has no known backend.
pub const UNKNOWN_BACKEND_TYPE: &str = "unknown";

/// Separator between a backend's scheme and the rest of its identifier.
pub const BACKEND_SCHEME_SEPARATOR: char = ':';
