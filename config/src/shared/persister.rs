use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::BatchConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A configuration field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}

/// Configuration consumed by the pipeline itself.
///
/// Everything the pipeline needs to resolve its destination table and bind
/// its source topic at startup. The destination dataset and table names are
/// fixed; only the project is configurable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cloud project under which the destination table lives.
    pub project: String,
    /// Message-bus topic to consume signals from.
    ///
    /// When unset, a well-known default topic is used.
    #[serde(default)]
    pub topic: Option<String>,
    /// Batch processing configuration.
    #[serde(default)]
    pub batch: BatchConfig,
}

impl PipelineConfig {
    /// Validates pipeline configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.project.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "project".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        self.batch.validate()?;

        Ok(())
    }
}

/// Configuration for supported signal sources.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// In-memory source, only useful for local development and tests.
    Memory,
    /// Pub/Sub streaming pull source.
    PubSub {
        /// Subscription to pull from.
        ///
        /// When unset, the subscription name is derived from the resolved topic.
        #[serde(default)]
        subscription: Option<String>,
        /// Service account key used to authenticate the pull requests.
        service_account_key: SecretString,
    },
}

/// Configuration for supported destinations.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    /// In-memory destination, only useful for local development and tests.
    Memory,
    /// Google BigQuery destination configuration.
    BigQuery {
        /// Service account key for authenticating with BigQuery.
        service_account_key: SecretString,
    },
}

/// Top-level configuration of the persister service.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct PersisterConfig {
    /// Pipeline settings (project, topic, batching).
    pub pipeline: PipelineConfig,
    /// Source the pipeline consumes signals from.
    pub source: SourceConfig,
    /// Destination the pipeline appends rows to.
    pub destination: DestinationConfig,
}

impl PersisterConfig {
    /// Validates the whole persister configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pipeline.validate()
    }
}
