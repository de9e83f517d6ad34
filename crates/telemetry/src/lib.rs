//! Internal telemetry for the stats engine.
//!
//! Structured logging, in-process counters and component health. Nothing
//! here talks to an external metrics system.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
