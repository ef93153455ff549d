//! Application configuration.

use crate::error::{AppError, AppResult};
use finboard_dashboard::DashboardConfig;
use finboard_http::ApiClientConfig;
use finboard_persistence::PersistenceConfig;
use finboard_realtime::RealtimeConfig;
use finboard_stream::StreamConfig;
use serde::Deserialize;

/// Stream client reconnect policy (`[stream]` section).
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSettings {
    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Consecutive failures tolerated before the client gives up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

fn default_reconnect_interval_ms() -> u64 {
    3000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl From<&StreamSettings> for StreamConfig {
    fn from(settings: &StreamSettings) -> Self {
        StreamConfig {
            url: String::new(),
            reconnect_interval_ms: settings.reconnect_interval_ms,
            max_reconnect_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Application configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: ApiClientConfig,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}
