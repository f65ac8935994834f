//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the site's daily pages
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// URL of the archive listing page
    #[serde(default = "default_archive_url")]
    pub archive_url: String,

    /// Directory for the picture store
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Number of pictures retained in the store
    #[serde(default = "default_backlog")]
    pub backlog: usize,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://apod.nasa.gov/apod".to_string()
}

fn default_archive_url() -> String {
    "https://apod.nasa.gov/apod/archivepix.html".to_string()
}

fn default_store_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".apod")
}

fn default_backlog() -> usize {
    5
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("apod/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            archive_url: default_archive_url(),
            store_dir: default_store_dir(),
            backlog: default_backlog(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults; a present but malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
