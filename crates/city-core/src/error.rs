//! Error types for the simulation crate.

use thiserror::Error;

use city_registry::RegistryError;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum CityError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
