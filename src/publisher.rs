//! Publishing captions to the Kefas messaging API.

use crate::payload::{MessagePayload, PublishReceipt};
use crate::session::SessionSettings;
use crate::types::BridgeError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

/// Sink for extracted captions.
///
/// Implementations do not retry; a failed publish is reported by the caller
/// and the caption stays eligible for the next slide event.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        content: &str,
        is_from_notes: bool,
        settings: &SessionSettings,
    ) -> Result<PublishReceipt, BridgeError>;
}

/// Publisher posting to `{base}/api/public/meetings/{meetingId}/messages`
#[derive(Debug, Clone)]
pub struct KefasPublisher {
    client: Client,
}

impl KefasPublisher {
    pub fn new() -> Result<Self, BridgeError> {
        let client = Client::builder()
            .build()
            .map_err(|e| BridgeError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Publisher for KefasPublisher {
    async fn publish(
        &self,
        content: &str,
        is_from_notes: bool,
        settings: &SessionSettings,
    ) -> Result<PublishReceipt, BridgeError> {
        if settings.token.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "Kefas token not configured. Please set your token in settings.".to_string(),
            ));
        }

        let url = settings.kefas.messages_url();
        let language = settings.languages.for_content(is_from_notes);
        let payload = MessagePayload::new(content, language);

        debug!(
            chars = content.len(),
            language,
            from_notes = is_from_notes,
            "Sending to Kefas"
        );

        let started = Instant::now();
        let res = self
            .client
            .post(&url)
            .bearer_auth(&settings.token)
            .json(&payload)
            .timeout(settings.kefas.timeout)
            .send()
            .await?;

        let status = res.status();
        info!(status = status.as_u16(), elapsed_ms = started.elapsed().as_millis() as u64, "Kefas response");

        // A body that cannot be read is reported as empty
        let text = res.text().await.unwrap_or_default();

        if !status.is_success() {
            let body = if text.trim().is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                text
            };
            return Err(BridgeError::RemoteApi {
                status: status.as_u16(),
                body,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(PublishReceipt {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StartRequest;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> SessionSettings {
        let mut req = StartRequest::new("tok-123", "127.0.0.1", 55056);
        req.kefas_base_url = server.uri();
        req.validate().unwrap()
    }

    #[tokio::test]
    async fn test_publish_posts_with_bearer_and_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/meetings/live/messages"))
            .and(header("authorization", "Bearer tok-123"))
            .and(body_json(json!({ "content": "Line B", "language": "nl" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "m1" })))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = KefasPublisher::new().unwrap();
        let receipt = publisher
            .publish("Line B", false, &settings_for(&server))
            .await
            .unwrap();

        assert_eq!(receipt.status, 201);
        assert_eq!(receipt.body, json!({ "id": "m1" }));
    }

    #[tokio::test]
    async fn test_notes_content_uses_alternate_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({ "content": "Chorus text", "language": "en" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = KefasPublisher::new().unwrap();
        let receipt = publisher
            .publish("Chorus text", true, &settings_for(&server))
            .await
            .unwrap();
        assert_eq!(receipt.body, Value::Null);
    }

    #[tokio::test]
    async fn test_non_success_surfaces_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("meeting closed"))
            .mount(&server)
            .await;

        let publisher = KefasPublisher::new().unwrap();
        let err = publisher
            .publish("Line B", false, &settings_for(&server))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BridgeError::RemoteApi {
                status: 403,
                body: "meeting closed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_error_body_uses_reason_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let publisher = KefasPublisher::new().unwrap();
        let err = publisher
            .publish("Line B", false, &settings_for(&server))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BridgeError::RemoteApi {
                status: 500,
                body: "Internal Server Error".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut req = StartRequest::new("tok-123", "127.0.0.1", 55056);
        req.kefas_base_url = format!("http://{}", addr);
        let settings = req.validate().unwrap();

        let publisher = KefasPublisher::new().unwrap();
        let err = publisher.publish("Line B", false, &settings).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_missing_token_is_configuration_error() {
        let server = MockServer::start().await;
        let mut settings = settings_for(&server);
        settings.token = String::new();

        let publisher = KefasPublisher::new().unwrap();
        let err = publisher.publish("Line B", false, &settings).await.unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }
}
