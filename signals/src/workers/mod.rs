//! Background workers driving the pipeline run loop.

pub mod base;
pub mod persist;

pub use base::{Worker, WorkerHandle};
pub use persist::{PersistWorker, PersistWorkerHandle};
