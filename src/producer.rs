//! HTTP access to the ProPresenter API.
//!
//! Two request shapes are used: a plain status fetch and the chunked
//! long-lived variant of the same endpoint.

use crate::session::SessionSettings;
use crate::types::{BridgeError, SlideStatus};
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::debug;

const SLIDE_STATUS_PATH: &str = "/v1/status/slide";

/// Client for the producer's local HTTP API
#[derive(Debug, Clone)]
pub struct ProducerClient {
    client: Client,
    base_url: String,
    /// Bound on connect and on a full status fetch
    timeout: Duration,
}

impl ProducerClient {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("http://{}:{}", host, port),
            timeout,
        })
    }

    pub fn from_settings(settings: &SessionSettings) -> Result<Self, BridgeError> {
        Self::new(&settings.host, settings.port, settings.connect_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn slide_status_url(&self) -> String {
        format!("{}{}", self.base_url, SLIDE_STATUS_PATH)
    }

    /// Fetch the current slide status once
    pub async fn fetch_slide_status(&self) -> Result<SlideStatus, BridgeError> {
        let url = self.slide_status_url();
        debug!(url = %url, "Fetching slide status");

        let started = Instant::now();
        let res = self.client.get(&url).timeout(self.timeout).send().await?;
        debug!(
            status = res.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Slide status response"
        );

        let res = check_status(res).await?;
        let text = res.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Open the chunked slide stream.
    ///
    /// Only the wait for response headers is bounded; the body stays open for
    /// as long as the producer keeps it open.
    pub async fn open_slide_stream(&self) -> Result<Response, BridgeError> {
        let url = format!("{}?chunked=true", self.slide_status_url());
        debug!(url = %url, "Connecting to chunked stream");

        let res = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| {
                BridgeError::Transport(format!(
                    "Timed out after {}ms connecting to {}",
                    self.timeout.as_millis(),
                    self.base_url
                ))
            })??;

        check_status(res).await
    }
}

/// Convert a non-success response into `RemoteApi`
async fn check_status(res: Response) -> Result<Response, BridgeError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let text = res.text().await.unwrap_or_default();
    let body = if text.trim().is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        text
    };

    Err(BridgeError::RemoteApi {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ProducerClient {
        let addr = server.address();
        ProducerClient::new(&addr.ip().to_string(), addr.port(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_slide_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/status/slide"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "current": { "text": "Line A" } })),
            )
            .mount(&server)
            .await;

        let status = client_for(&server).fetch_slide_status().await.unwrap();
        assert_eq!(status["current"]["text"], "Line A");
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no presentation"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_slide_status().await.unwrap_err();
        assert_eq!(
            err,
            BridgeError::RemoteApi {
                status: 404,
                body: "no presentation".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_malformed_json_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_slide_status().await.unwrap_err();
        assert!(matches!(err, BridgeError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let addr = server.address();
        let client =
            ProducerClient::new(&addr.ip().to_string(), addr.port(), Duration::from_millis(200)).unwrap();
        let err = client.fetch_slide_status().await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_open_stream_uses_chunked_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/status/slide"))
            .and(query_param("chunked", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}\r\n\r\n"))
            .expect(1)
            .mount(&server)
            .await;

        let res = client_for(&server).open_slide_stream().await.unwrap();
        assert_eq!(res.status().as_u16(), 200);
    }
}
