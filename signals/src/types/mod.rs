//! Common types used throughout the signals pipeline.
//!
//! Re-exports the signal event types and the row shape written to the destination.

mod row;
mod signal;

pub use row::*;
pub use signal::*;
