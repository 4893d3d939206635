use config::load_config;
use config::shared::PersisterConfig;

/// Loads and validates the persister configuration.
///
/// Uses the standard configuration loading mechanism from the `config` crate and
/// validates the resulting [`PersisterConfig`] before returning it.
pub fn load_persister_config() -> anyhow::Result<PersisterConfig> {
    let config = load_config::<PersisterConfig>()?;
    config.validate()?;

    Ok(config)
}
