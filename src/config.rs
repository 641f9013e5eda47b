//! Configuration management for the bridge.
//!
//! Loads configuration from a TOML file and provides runtime defaults.

use crate::connection::StrategyKind;
use crate::session::{
    StartRequest, DEFAULT_ALTERNATE_LANGUAGE, DEFAULT_KEFAS_BASE_URL, DEFAULT_LANGUAGE,
    DEFAULT_MEETING_ID, DEFAULT_NOTES_TRIGGER, DEFAULT_PRODUCER_HOST, DEFAULT_PRODUCER_PORT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub kefas: KefasConfig,

    #[serde(default)]
    pub propresenter: ProPresenterConfig,

    #[serde(default)]
    pub notes: NotesConfig,

    #[serde(default)]
    pub languages: LanguagesConfig,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for per-run log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KefasConfig {
    /// Bearer token for the messaging API
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_meeting_id")]
    pub meeting_id: String,

    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_ms: u64,
}

impl Default for KefasConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_base_url(),
            meeting_id: default_meeting_id(),
            publish_timeout_ms: default_publish_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProPresenterConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u32,

    /// Remote-control password (websocket strategy only)
    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub strategy: StrategyKind,

    /// Interval between status fetches (polling strategy only)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Bound on connecting and on each status fetch
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

impl Default for ProPresenterConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: String::new(),
            strategy: StrategyKind::default(),
            poll_interval_ms: default_poll_interval(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesConfig {
    /// Replace captions by slide notes when the trigger appears
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_trigger")]
    pub trigger: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger: default_trigger(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagesConfig {
    /// Language of regular captions
    #[serde(default = "default_language")]
    pub default: String,

    /// Language of captions taken from notes
    #[serde(default = "default_alternate_language")]
    pub alternate: String,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            default: default_language(),
            alternate: default_alternate_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_delay")]
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay(),
        }
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    DEFAULT_KEFAS_BASE_URL.to_string()
}

fn default_meeting_id() -> String {
    DEFAULT_MEETING_ID.to_string()
}

fn default_publish_timeout() -> u64 {
    10_000
}

fn default_host() -> String {
    DEFAULT_PRODUCER_HOST.to_string()
}

fn default_port() -> u32 {
    DEFAULT_PRODUCER_PORT
}

fn default_poll_interval() -> u64 {
    5_000
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_trigger() -> String {
    DEFAULT_NOTES_TRIGGER.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_alternate_language() -> String {
    DEFAULT_ALTERNATE_LANGUAGE.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay() -> u64 {
    5_000
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("propresenter-kefas-bridge")
            .join("config.toml")
    }

    /// Write a starter file with the current values
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Start parameters for the bridge, unvalidated
    pub fn to_start_request(&self) -> StartRequest {
        StartRequest {
            token: self.kefas.token.clone(),
            host: self.propresenter.host.clone(),
            port: self.propresenter.port,
            use_notes: self.notes.enabled,
            notes_trigger: self.notes.trigger.clone(),
            max_reconnect_attempts: self.reconnect.max_attempts,
            reconnect_delay_ms: self.reconnect.delay_ms,
            default_language: self.languages.default.clone(),
            alternate_language: self.languages.alternate.clone(),
            strategy: self.propresenter.strategy,
            password: self.propresenter.password.clone(),
            poll_interval_ms: self.propresenter.poll_interval_ms,
            connect_timeout_ms: self.propresenter.connect_timeout_ms,
            kefas_base_url: self.kefas.base_url.clone(),
            meeting_id: self.kefas.meeting_id.clone(),
            publish_timeout_ms: self.kefas.publish_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.propresenter.port, 55056);
        assert_eq!(config.propresenter.strategy, StrategyKind::Chunked);
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.languages.default, "nl");
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[kefas]
token = "abc"
meeting_id = "sunday"

[propresenter]
host = "192.168.1.20"
port = 1025
strategy = "websocket"
password = "control"

[notes]
enabled = true
trigger = "CUE"

[reconnect]
max_attempts = 5
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.kefas.meeting_id, "sunday");
        assert_eq!(config.kefas.base_url, "https://web.kefas.app");
        assert_eq!(config.propresenter.strategy, StrategyKind::WebSocket);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.delay_ms, 5_000);

        let settings = config.to_start_request().validate().unwrap();
        assert_eq!(settings.host, "192.168.1.20");
        assert_eq!(settings.port, 1025);
        assert!(settings.notes.enabled);
        assert_eq!(settings.notes.trigger, "CUE");
        assert_eq!(settings.kefas.messages_url(), "https://web.kefas.app/api/public/meetings/sunday/messages");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(dir.path().join("absent.toml"));
        assert_eq!(config.propresenter.host, "127.0.0.1");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.kefas.token = "saved-token".to_string();
        config.propresenter.strategy = StrategyKind::Polling;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path);
        assert_eq!(loaded.kefas.token, "saved-token");
        assert_eq!(loaded.propresenter.strategy, StrategyKind::Polling);
    }
}
