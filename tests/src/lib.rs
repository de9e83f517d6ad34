//! Shared setup for the stats engine integration tests.

pub mod fixtures;
pub mod setup;
