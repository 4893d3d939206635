//! Configuration types and loading for the signals persistence pipeline.
//!
//! Shared configuration structures live in [`shared`], while [`load`] implements
//! hierarchical loading from files and environment variables. The [`environment`]
//! module distinguishes between dev and prod runtime environments.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{LoadConfigError, load_config};
