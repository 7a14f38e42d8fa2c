//! Client configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment override for [`ClientConfig::api_base_url`].
pub const ENV_API_URL: &str = "CLINIC_RX_API_URL";
/// Environment override for [`ClientConfig::session_db_path`].
pub const ENV_SESSION_DB: &str = "CLINIC_RX_SESSION_DB";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Client configuration. Every field has a default, so an empty JSON object
/// is a valid config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// API server base URL (http or https)
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// SQLite file holding the durable session
    pub session_db_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:9090".to_string(),
            request_timeout_secs: 30,
            session_db_path: PathBuf::from("clinic-rx-session.db"),
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&text)?;
        config.with_env_overrides().validated()
    }

    fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_SESSION_DB).ok(),
        )
    }

    fn with_overrides(mut self, api_url: Option<String>, session_db: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(db) = session_db.filter(|p| !p.trim().is_empty()) {
            self.session_db_path = PathBuf::from(db);
        }
        self
    }

    /// Check the base URL and strip any trailing slash.
    pub fn validated(mut self) -> ConfigResult<Self> {
        let normalized = clinic_rx_transport::normalize_base_url(&self.api_base_url)
            .map_err(|e| ConfigError::InvalidUrl {
                url: self.api_base_url.trim().to_string(),
                reason: e.to_string(),
            })?;
        self.api_base_url = normalized;
        Ok(self)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
