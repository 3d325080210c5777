use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

use super::models::Config;

const CONFIG_ENV_VAR: &str = "SHEETPRESS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/sheetpress.toml";
const ENV_PREFIX: &str = "SHEETPRESS";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if it exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env if present; a missing file is not an error.
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path plus environment overrides.
/// Useful for tests with custom config files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "loading configuration file");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "configuration file not found, using defaults and environment overrides"
        );
    }

    // SHEETPRESS__SERVER__BIND_ADDR -> server.bind_addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_from_sources(temp_dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(
            &config_path,
            r#"
[server]
bind_addr = "127.0.0.1:9000"

[uploads]
max_upload_bytes = "4MB"
chunk_size = 4096

[retry]
max_attempts = 5
base_delay_ms = 200

[documents.mapping]
client = "B1"
price = "B2"
"#,
        )
        .unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.uploads.max_upload_bytes.as_u64(), 4 << 20);
        assert_eq!(config.uploads.chunk_size.as_u64(), 4096);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.documents.mapping["client"], "B1");
    }
}
