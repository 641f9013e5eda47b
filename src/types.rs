//! Core types used throughout the bridge.
//!
//! This module defines the extraction result, the connection state broadcast
//! to listeners, the notification envelope and the error taxonomy.

use serde::{Deserialize, Serialize};

/// Slide-status payload as delivered by the presentation engine.
///
/// The schema has moved between producer releases, so it is kept as raw JSON
/// and probed defensively by the extractor.
pub type SlideStatus = serde_json::Value;

/// Result of content extraction for one slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    /// Normalized caption text (never empty)
    pub text: String,
    /// Whether the text was taken from the slide notes instead of the slide body
    pub is_from_notes: bool,
}

impl ExtractedContent {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_from_notes: false,
        }
    }

    pub fn from_notes(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_from_notes: true,
        }
    }
}

/// Link state towards the producer, as reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

/// Connection transition with free-text details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub status: ConnectionState,
    pub details: String,
}

impl ConnectionUpdate {
    pub fn new(status: ConnectionState, details: impl Into<String>) -> Self {
        Self {
            status,
            details: details.into(),
        }
    }
}

/// Notification delivered to every subscriber of a bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Human-readable progress or error message
    Status { message: String },
    /// Connection state transition
    Connection(ConnectionUpdate),
}

impl BridgeEvent {
    /// Status text, if this is a status notification
    pub fn status_message(&self) -> Option<&str> {
        match self {
            BridgeEvent::Status { message } => Some(message),
            BridgeEvent::Connection(_) => None,
        }
    }

    /// Connection update, if this is a connection notification
    pub fn connection(&self) -> Option<&ConnectionUpdate> {
        match self {
            BridgeEvent::Connection(update) => Some(update),
            BridgeEvent::Status { .. } => None,
        }
    }
}

/// Synchronous snapshot returned by `Bridge::status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionUpdate>,
}

/// Errors produced anywhere in the bridge
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("{0}")]
    Configuration(String),

    #[error("Bridge is already running.")]
    AlreadyRunning,

    #[error("Bridge is not running.")]
    NotRunning,

    #[error("{0}")]
    Transport(String),

    #[error("API error {status}: {body}")]
    RemoteApi { status: u16, body: String },

    #[error("Failed to parse payload: {0}")]
    Parse(String),

    #[error("Stream buffer exceeded {limit} bytes without a delimiter")]
    BufferOverflow { limit: usize },

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Connection failed after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl BridgeError {
    /// Whether this error tears down the producer link.
    ///
    /// A malformed or oversized chunk is discarded while the stream stays
    /// connected.
    pub fn counts_as_link_failure(&self) -> bool {
        !matches!(self, BridgeError::Parse(_) | BridgeError::BufferOverflow { .. })
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BridgeError::Transport(format!("Request timed out: {}", e))
        } else if e.is_decode() {
            BridgeError::Parse(e.to_string())
        } else {
            BridgeError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Parse(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BridgeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BridgeError::Transport(e.to_string())
    }
}
