use std::io;
use std::path::PathBuf;

use rust_cli_config::{Config, File};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// File stem of the always-loaded base configuration.
const BASE_CONFIG_STEM: &str = "base";

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between the prefix and the first key segment.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// The `configuration` directory does not exist.
    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// Failed to determine the runtime environment (`APP_ENVIRONMENT`).
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    /// A configuration source failed to load or merge.
    #[error("failed to load configuration: {0}")]
    Load(#[source] rust_cli_config::ConfigError),

    /// The configuration sources were merged but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),
}

/// Loads hierarchical configuration from base file, environment file, and env variables.
///
/// Files are read from `configuration/base.yaml` and `configuration/{environment}.yaml`,
/// where the environment is selected via `APP_ENVIRONMENT`. Environment variables with
/// the `APP` prefix override file values, with double underscores separating nested keys
/// (e.g. `APP_PIPELINE__PROJECT`).
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let configuration_directory = base_path.join(CONFIGURATION_DIR);

    if !configuration_directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            configuration_directory,
        ));
    }

    let environment = Environment::load()?;

    let settings = Config::builder()
        .add_source(
            File::from(configuration_directory.join(format!("{BASE_CONFIG_STEM}.yaml")))
                .required(true),
        )
        .add_source(
            File::from(configuration_directory.join(format!("{environment}.yaml")))
                .required(false),
        )
        .add_source(
            rust_cli_config::Environment::default()
                .prefix(ENV_PREFIX)
                .prefix_separator(ENV_PREFIX_SEPARATOR)
                .separator(ENV_SEPARATOR),
        )
        .build()
        .map_err(LoadConfigError::Load)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}
