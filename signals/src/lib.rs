//! Core library of the signals persistence pipeline.
//!
//! Moves binary-encoded event records ("signals") from a message-bus topic into a
//! schema'd analytical table. Each signal is projected into a two-field row (its
//! integer id plus the raw encoded bytes) and appended to the destination table,
//! indefinitely. Consumption, batching, and write mechanics live behind the
//! [`source::SignalSource`] and [`destination::Destination`] contracts; the
//! pipeline itself only assembles the chain and hands control to the run loop.

pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod error;
mod macros;
pub mod pipeline;
#[cfg(feature = "bigquery")]
pub(crate) mod retries;
pub mod schema;
pub mod source;
pub mod types;
pub mod workers;
