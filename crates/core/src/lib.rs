//! Core types, date rules and validation for the stats engine.

pub mod clock;
pub mod dimensions;
pub mod error;
pub mod events;
pub mod limits;
pub mod retention;
pub mod rollup;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dimensions::*;
pub use error::{Error, Result};
pub use events::*;
pub use retention::*;
pub use rollup::*;
