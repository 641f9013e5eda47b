//! Fixed-interval polling of the slide status endpoint.

use super::{ConnectionStrategy, StrategyKind};
use crate::producer::ProducerClient;
use crate::types::{BridgeError, SlideStatus};
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// Polls `/v1/status/slide` every `interval`
pub struct PollingStrategy {
    client: ProducerClient,
    interval: Duration,
    /// Payload fetched while connecting, delivered first
    pending: Option<SlideStatus>,
    connected: bool,
}

impl PollingStrategy {
    pub fn new(client: ProducerClient, interval: Duration) -> Self {
        Self {
            client,
            interval,
            pending: None,
            connected: false,
        }
    }
}

#[async_trait]
impl ConnectionStrategy for PollingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Polling
    }

    /// A successful first fetch is the connect
    async fn connect(&mut self) -> Result<(), BridgeError> {
        self.connected = false;
        let status = self.client.fetch_slide_status().await?;
        self.pending = Some(status);
        self.connected = true;
        Ok(())
    }

    async fn next_slide(&mut self) -> Result<SlideStatus, BridgeError> {
        if !self.connected {
            return Err(BridgeError::Transport("Not connected".to_string()));
        }

        if let Some(status) = self.pending.take() {
            return Ok(status);
        }

        tokio::time::sleep(self.interval).await;
        trace!("Polling cycle");

        match self.client.fetch_slide_status().await {
            Ok(status) => Ok(status),
            Err(e) => {
                if e.counts_as_link_failure() {
                    self.connected = false;
                }
                Err(e)
            }
        }
    }

    async fn close(&mut self) {
        self.connected = false;
        self.pending = None;
    }

    fn describe(&self) -> String {
        format!("Polling {}", self.client.base_url().trim_start_matches("http://"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy_for(server: &MockServer) -> PollingStrategy {
        let addr = server.address();
        let client =
            ProducerClient::new(&addr.ip().to_string(), addr.port(), Duration::from_secs(2)).unwrap();
        PollingStrategy::new(client, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_first_fetch_is_delivered_after_connect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "current": { "text": "A" } })))
            .mount(&server)
            .await;

        let mut strategy = strategy_for(&server);
        strategy.connect().await.unwrap();
        let first = strategy.next_slide().await.unwrap();
        assert_eq!(first["current"]["text"], "A");

        let second = strategy.next_slide().await.unwrap();
        assert_eq!(second["current"]["text"], "A");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_connect_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut strategy = strategy_for(&server);
        let err = strategy.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::RemoteApi { status: 503, .. }));
        assert!(strategy.next_slide().await.is_err());
    }

    #[test]
    fn test_describe() {
        let client = ProducerClient::new("10.1.1.1", 1025, Duration::from_secs(1)).unwrap();
        let strategy = PollingStrategy::new(client, Duration::from_secs(5));
        assert_eq!(strategy.describe(), "Polling 10.1.1.1:1025");
    }
}
