//! Shared configuration types for the signals persistence pipeline.

mod batch;
mod persister;

pub use batch::BatchConfig;
pub use persister::{
    DestinationConfig, PersisterConfig, PipelineConfig, SourceConfig, ValidationError,
};
