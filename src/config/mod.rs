//! Configuration management for SheetPress
//!
//! A layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the
//! pattern `SHEETPRESS__<section>__<key>`:
//!
//! - `SHEETPRESS__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `SHEETPRESS__UPLOADS__MAX_UPLOAD_BYTES=32MB`
//! - `SHEETPRESS__RETRY__MAX_ATTEMPTS=5`
//!
//! # Configuration File
//!
//! By default the configuration is loaded from `config/sheetpress.toml`;
//! override the location with the `SHEETPRESS_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, DocumentsConfig, RetentionConfig, RetryConfig, ServerConfig, UploadConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
