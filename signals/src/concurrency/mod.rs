//! Concurrency primitives shared by the pipeline and its worker.

pub mod shutdown;
