//! Tracking path for the stats engine.
//!
//! Called synchronously per request by the boundary layer:
//! - Dimension resolution (tool / backend / platform -> surrogate id)
//! - Deduplicated download and version-check facts
//! - Version update counts from the version-sync collaborator

pub mod resolver;
pub mod tracker;

pub use resolver::{DimensionCache, DimensionResolver};
pub use tracker::EventTracker;
