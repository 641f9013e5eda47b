//! Start parameters, their validation, and the single live session value.

use crate::change_detector::ChangeDetector;
use crate::connection::retry::{FailureTracker, ReconnectPolicy};
use crate::connection::StrategyKind;
use crate::extractor::NotesSettings;
use crate::types::BridgeError;
use std::time::Duration;

pub const DEFAULT_KEFAS_BASE_URL: &str = "https://web.kefas.app";
pub const DEFAULT_MEETING_ID: &str = "live";
pub const DEFAULT_PRODUCER_HOST: &str = "127.0.0.1";
pub const DEFAULT_PRODUCER_PORT: u32 = 55056;
pub const DEFAULT_NOTES_TRIGGER: &str = "Current Slide Notes";
pub const DEFAULT_LANGUAGE: &str = "nl";
pub const DEFAULT_ALTERNATE_LANGUAGE: &str = "en";

pub const MIN_RECONNECT_ATTEMPTS: u32 = 1;
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const MIN_RECONNECT_DELAY_MS: u64 = 1_000;
pub const MAX_RECONNECT_DELAY_MS: u64 = 60_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 250;
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Raw start parameters as handed over by the caller (UI, CLI, config file).
///
/// Numeric fields are wider than their valid range so out-of-range input can
/// be reported instead of being unrepresentable.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub token: String,
    pub host: String,
    pub port: u32,
    pub use_notes: bool,
    pub notes_trigger: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub default_language: String,
    pub alternate_language: String,
    pub strategy: StrategyKind,
    /// Remote-control password (WebSocket strategy only)
    pub password: String,
    pub poll_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub kefas_base_url: String,
    pub meeting_id: String,
    pub publish_timeout_ms: u64,
}

impl Default for StartRequest {
    fn default() -> Self {
        Self {
            token: String::new(),
            host: DEFAULT_PRODUCER_HOST.to_string(),
            port: DEFAULT_PRODUCER_PORT,
            use_notes: false,
            notes_trigger: DEFAULT_NOTES_TRIGGER.to_string(),
            max_reconnect_attempts: 3,
            reconnect_delay_ms: 5_000,
            default_language: DEFAULT_LANGUAGE.to_string(),
            alternate_language: DEFAULT_ALTERNATE_LANGUAGE.to_string(),
            strategy: StrategyKind::default(),
            password: String::new(),
            poll_interval_ms: 5_000,
            connect_timeout_ms: 5_000,
            kefas_base_url: DEFAULT_KEFAS_BASE_URL.to_string(),
            meeting_id: DEFAULT_MEETING_ID.to_string(),
            publish_timeout_ms: 10_000,
        }
    }
}

impl StartRequest {
    pub fn new(token: impl Into<String>, host: impl Into<String>, port: u32) -> Self {
        Self {
            token: token.into(),
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Validate and normalize into session settings.
    ///
    /// Checks run in a fixed order and the first failure is reported.
    pub fn validate(&self) -> Result<SessionSettings, BridgeError> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(config_error(
                "Error: Kefas token is required and must be a non-empty string.",
            ));
        }

        let host = self.host.trim();
        if host.is_empty() {
            return Err(config_error("Error: ProPresenter host is required."));
        }

        let port = match u16::try_from(self.port) {
            Ok(p) if p >= 1 => p,
            _ => {
                return Err(config_error(
                    "Error: Port must be a number between 1 and 65535.",
                ))
            }
        };

        if !(MIN_RECONNECT_ATTEMPTS..=MAX_RECONNECT_ATTEMPTS).contains(&self.max_reconnect_attempts) {
            return Err(config_error(
                "Error: Max reconnection attempts must be between 1 and 10.",
            ));
        }

        if !(MIN_RECONNECT_DELAY_MS..=MAX_RECONNECT_DELAY_MS).contains(&self.reconnect_delay_ms) {
            return Err(config_error(
                "Error: Reconnect delay must be between 1000 and 60000 milliseconds.",
            ));
        }

        let trigger = self.notes_trigger.trim();
        if self.use_notes && trigger.is_empty() {
            return Err(config_error(
                "Error: Notes trigger must not be empty when notes mode is enabled.",
            ));
        }

        if self.strategy == StrategyKind::Polling
            && !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms)
        {
            return Err(config_error(
                "Error: Poll interval must be between 250 and 60000 milliseconds.",
            ));
        }

        if self.strategy == StrategyKind::WebSocket && self.password.trim().is_empty() {
            return Err(config_error(
                "Error: ProPresenter remote password is required for the WebSocket connection.",
            ));
        }

        let base_url = self.kefas_base_url.trim().trim_end_matches('/');

        Ok(SessionSettings {
            token: token.to_string(),
            host: host.to_string(),
            port,
            notes: NotesSettings {
                enabled: self.use_notes,
                trigger: if trigger.is_empty() {
                    DEFAULT_NOTES_TRIGGER.to_string()
                } else {
                    trigger.to_string()
                },
            },
            languages: Languages::new(&self.default_language, &self.alternate_language),
            reconnect: ReconnectPolicy::new(
                self.max_reconnect_attempts,
                Duration::from_millis(self.reconnect_delay_ms),
            ),
            strategy: self.strategy,
            password: self.password.trim().to_string(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms.max(1)),
            kefas: KefasEndpoint {
                base_url: if base_url.is_empty() {
                    DEFAULT_KEFAS_BASE_URL.to_string()
                } else {
                    base_url.to_string()
                },
                meeting_id: non_empty_or(&self.meeting_id, DEFAULT_MEETING_ID),
                timeout: Duration::from_millis(self.publish_timeout_ms.max(1)),
            },
        })
    }
}

fn config_error(message: &str) -> BridgeError {
    BridgeError::Configuration(message.to_string())
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Language tags attached to published messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Languages {
    pub default: String,
    pub alternate: String,
}

impl Languages {
    pub fn new(default: &str, alternate: &str) -> Self {
        Self {
            default: non_empty_or(default, DEFAULT_LANGUAGE),
            alternate: non_empty_or(alternate, DEFAULT_ALTERNATE_LANGUAGE),
        }
    }

    /// Notes content is tagged with the alternate language
    pub fn for_content(&self, is_from_notes: bool) -> &str {
        if is_from_notes {
            &self.alternate
        } else {
            &self.default
        }
    }
}

impl Default for Languages {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE, DEFAULT_ALTERNATE_LANGUAGE)
    }
}

/// Where and how to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KefasEndpoint {
    pub base_url: String,
    pub meeting_id: String,
    pub timeout: Duration,
}

impl KefasEndpoint {
    pub fn messages_url(&self) -> String {
        format!(
            "{}/api/public/meetings/{}/messages",
            self.base_url, self.meeting_id
        )
    }
}

/// Validated, immutable parameters of one bridge run
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub token: String,
    pub host: String,
    pub port: u16,
    pub notes: NotesSettings,
    pub languages: Languages,
    pub reconnect: ReconnectPolicy,
    pub strategy: StrategyKind,
    pub password: String,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub kefas: KefasEndpoint,
}

impl SessionSettings {
    /// Token prefix safe to write to logs
    pub fn redacted_token(&self) -> String {
        let prefix: String = self.token.chars().take(5).collect();
        format!("{}...", prefix)
    }

    pub fn producer_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The single active bridge run.
///
/// Owned by the connection manager task; dropped when the run ends, which
/// resets every field in one go.
#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub settings: SessionSettings,
    pub detector: ChangeDetector,
    pub failures: FailureTracker,
}

impl Session {
    pub fn new(id: u64, settings: SessionSettings) -> Self {
        let failures = FailureTracker::new(settings.reconnect.clone());
        Self {
            id,
            settings,
            detector: ChangeDetector::new(),
            failures,
        }
    }
}
