//! Wire types for the remote messaging API

use serde::{Deserialize, Serialize};

/// Message body posted to `/api/public/meetings/{meetingId}/messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Caption text
    pub content: String,

    /// Language code of the caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl MessagePayload {
    pub fn new(content: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            language: Some(language.into()),
        }
    }
}

/// Successful publish result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// HTTP status returned by the remote endpoint
    pub status: u16,
    /// Parsed response body (`Null` when the body was empty)
    pub body: serde_json::Value,
}
