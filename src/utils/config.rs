//! Application configuration

use crate::utils::error::MediagrabError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable that overrides the service address
pub const API_URL_ENV: &str = "MEDIAGRAB_API_URL";

/// Service address used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Base address of the conversion service
    pub api_base_url: String,

    /// Where finished artifacts are written
    pub download_location: PathBuf,

    /// Fail a transfer when no chunk arrives for this many seconds.
    /// `None` waits indefinitely (only cancellation interrupts a stall).
    pub stall_timeout_secs: Option<u64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            download_location: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("./downloads")),
            stall_timeout_secs: None,
        }
    }
}

impl AppSettings {
    /// Load settings from an optional JSON file, then apply the environment override.
    pub fn load(path: Option<&Path>) -> Result<Self, MediagrabError> {
        let mut settings = match path {
            Some(path) => {
                debug!("Loading settings from {:?}", path);
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    MediagrabError::ConfigError(format!("cannot read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };
        settings.apply_api_override(std::env::var(API_URL_ENV).ok());
        Ok(settings)
    }

    /// Replace the service address with `value` when it is set and non-blank.
    pub fn apply_api_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            debug!("Service address overridden to {}", url);
            self.api_base_url = url;
        }
    }

    /// Idle timeout between chunks, if configured
    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
