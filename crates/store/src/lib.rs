//! SQLite store for the stats engine.

pub mod client;
pub mod config;
pub mod dimensions;
pub mod health;
pub mod insert;
pub mod query;
pub mod schema;

pub use client::*;
pub use config::*;
pub use query::*;
