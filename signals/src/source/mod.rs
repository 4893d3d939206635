//! Signal source abstractions.
//!
//! Sources own the subscription to the message bus and hand decoded signals to
//! the pipeline in batches. Delivery order and redelivery guarantees are the
//! source's (at-least-once in practice), not the pipeline's, and decode failures
//! are handled here, never by the row converter.

mod base;
pub mod memory;
#[cfg(feature = "pubsub")]
pub mod pubsub;
mod topic;

pub use base::SignalSource;
pub use memory::MemorySource;
pub use topic::{DEFAULT_TOPIC, resolve_topic};
