use crate::error::AppError;
use config::{builder::DefaultState, Config as Cfg, ConfigBuilder, Environment, File};
use serde::Deserialize;

/// Settings shared by every service binary.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    /// Read the optional `configuration` file, then `APP__*` variables.
    ///
    /// `.env` is not read here; binaries load it once before anything else.
    pub fn load() -> Result<Self, AppError> {
        Self::from_builder(
            Cfg::builder()
                .add_source(File::with_name("configuration").required(false))
                .add_source(Environment::with_prefix("APP").separator("__")),
        )
    }

    /// Resolve an assembled set of sources.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, AppError> {
        Ok(builder.build()?.try_deserialize()?)
    }
}
