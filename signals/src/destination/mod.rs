//! Destination abstractions for signal persistence.
//!
//! Destinations receive the two-field signal rows and own the write mechanics:
//! create-if-absent table preparation, append-only batched inserts, and any
//! retry behavior for transient write failures.

mod base;
#[cfg(feature = "bigquery")]
pub mod bigquery;
pub mod memory;

pub use base::Destination;
pub use memory::MemoryDestination;
