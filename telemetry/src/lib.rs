//! Tracing initialization for the signals persistence services.

mod tracing;

pub use tracing::{InitTracingError, init_tracing};
