use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::humanize::ByteSize;
use crate::jobs::RetryPolicy;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            uploads: UploadConfig::default(),
            retry: RetryConfig::default(),
            documents: DocumentsConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            history_path: default_history_path(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/history")
}

/// Upload limits and chunking
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: ByteSize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: ByteSize,
    /// Spreadsheet filename extensions accepted by the upload endpoint.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            chunk_size: default_chunk_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_max_upload_bytes() -> ByteSize {
    ByteSize(16 * 1024 * 1024) // 16 MB
}

fn default_chunk_size() -> ByteSize {
    ByteSize(8 * 1024)
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["csv".to_string()]
}

/// Retry behavior for conversion attempts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

/// Document generation: template, output location and the cell mapping
/// (`field name -> cell address`) applied to uploaded worksheets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
            output_dir: default_output_dir(),
            mapping: BTreeMap::new(),
        }
    }
}

fn default_template_path() -> PathBuf {
    PathBuf::from("templates/proposal.md")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_history_ttl_days")]
    pub history_ttl_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            history_ttl_days: default_history_ttl_days(),
        }
    }
}

fn default_history_ttl_days() -> u32 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.uploads.max_upload_bytes.as_u64(), 16 * 1024 * 1024);
        assert_eq!(config.uploads.chunk_size.as_u64(), 8192);
        assert_eq!(config.uploads.allowed_extensions, vec!["csv"]);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retention.history_ttl_days, 30);
    }

    #[test]
    fn retry_config_builds_a_policy() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 250,
        };
        assert_eq!(retry.policy().max_attempts(), 5);
    }
}
