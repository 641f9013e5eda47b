//! Link strategies towards the presentation engine.
//!
//! Three interchangeable ways to learn about slide changes:
//! - Polling: fetch the status endpoint on a fixed interval
//! - Chunked: keep one long-lived chunked response open
//! - WebSocket: listen for remote-control triggers and fetch on demand
//!
//! One strategy is chosen per session; the connection manager drives it
//! without knowing which one it is.

pub mod chunked;
pub mod polling;
pub mod retry;
pub mod websocket;

use crate::producer::ProducerClient;
use crate::session::SessionSettings;
use crate::types::{BridgeError, SlideStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use chunked::{ChunkDecoder, ChunkedStreamStrategy};
pub use polling::PollingStrategy;
pub use websocket::WebSocketStrategy;

/// Which link strategy a session uses
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Fixed-interval status fetches
    Polling,
    /// Long-lived chunked response
    #[default]
    Chunked,
    /// Remote-control socket triggering fetches
    #[value(name = "websocket")]
    WebSocket,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Polling => "polling",
            StrategyKind::Chunked => "chunked",
            StrategyKind::WebSocket => "websocket",
        }
    }
}

/// A live link to the producer.
///
/// `connect` may be called again after a failure to re-establish the link;
/// implementations reset their per-link state there.
#[async_trait]
pub trait ConnectionStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Establish the link, bounded by the connect timeout
    async fn connect(&mut self) -> Result<(), BridgeError>;

    /// Wait for the next slide-status payload.
    ///
    /// `Parse` errors are per-payload and leave the link usable; any other
    /// error means the link is gone.
    async fn next_slide(&mut self) -> Result<SlideStatus, BridgeError>;

    /// Release the link
    async fn close(&mut self);

    /// Human-readable description used in the `connected` details
    fn describe(&self) -> String;
}

/// Builds the strategy for a session
pub trait StrategyFactory: Send + Sync {
    fn create(&self, settings: &SessionSettings) -> Result<Box<dyn ConnectionStrategy>, BridgeError>;
}

/// Factory that talks to a real producer
#[derive(Debug, Default, Clone, Copy)]
pub struct ProducerStrategyFactory;

impl StrategyFactory for ProducerStrategyFactory {
    fn create(&self, settings: &SessionSettings) -> Result<Box<dyn ConnectionStrategy>, BridgeError> {
        let client = ProducerClient::from_settings(settings)?;

        let strategy: Box<dyn ConnectionStrategy> = match settings.strategy {
            StrategyKind::Polling => Box::new(PollingStrategy::new(client, settings.poll_interval)),
            StrategyKind::Chunked => Box::new(ChunkedStreamStrategy::new(client)),
            StrategyKind::WebSocket => Box::new(WebSocketStrategy::new(
                client,
                &settings.host,
                settings.port,
                &settings.password,
                settings.connect_timeout,
            )),
        };

        Ok(strategy)
    }
}
