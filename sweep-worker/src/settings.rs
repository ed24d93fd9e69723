use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Process configuration for the sweep worker, layered the way the rest
/// of the pack's services do: a `.env` file for local development,
/// overridden by real environment variables in any deployed environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,

    #[serde(default = "default_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_batch_size")]
    pub sweep_batch_size: u32,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_batch_size() -> u32 {
    24
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        // Missing .env is fine in production, where real env vars are set.
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("sweep_interval_secs", default_interval_secs() as i64)?
            .set_default("sweep_batch_size", default_batch_size() as i64)?
            .add_source(config::Environment::default())
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
