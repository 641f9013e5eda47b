//! Remote-control socket that triggers on-demand status fetches.
//!
//! The socket itself never carries slide text; it only announces that the
//! slide moved. Each announcement is followed by one HTTP status fetch.

use super::{ConnectionStrategy, StrategyKind};
use crate::producer::ProducerClient;
use crate::types::{BridgeError, SlideStatus};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const REMOTE_PATH: &str = "/remote";
const REMOTE_PROTOCOL: &str = "701";

/// Remote actions that mean the live slide changed
const SLIDE_TRIGGER_ACTIONS: &[&str] = &[
    "presentationTriggerIndex",
    "presentationTriggerNext",
    "presentationTriggerPrevious",
    "presentationSlideIndex",
    "presentationCurrent",
];

pub struct WebSocketStrategy {
    client: ProducerClient,
    url: String,
    password: String,
    timeout: Duration,
    socket: Option<Socket>,
    /// Fetch once right after authenticating
    pending_initial: bool,
}

impl WebSocketStrategy {
    pub fn new(
        client: ProducerClient,
        host: &str,
        port: u16,
        password: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: format!("ws://{}:{}{}", host, port, REMOTE_PATH),
            password: password.to_string(),
            timeout,
            socket: None,
            pending_initial: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Open the remote socket and authenticate
async fn handshake(url: &str, password: &str) -> Result<Socket, BridgeError> {
    let (mut socket, _) = connect_async(url).await?;

    let auth = json!({
        "action": "authenticate",
        "protocol": REMOTE_PROTOCOL,
        "password": password,
    });
    socket.send(Message::text(auth.to_string())).await?;

    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                let reply: Value = match serde_json::from_str(text.as_str()) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "Ignoring non-JSON message during handshake");
                        continue;
                    }
                };
                if reply.get("action").and_then(Value::as_str) != Some("authenticate") {
                    continue;
                }
                return if is_authenticated(&reply) {
                    Ok(socket)
                } else {
                    let reason = reply
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("authentication rejected")
                        .to_string();
                    Err(BridgeError::Handshake(reason))
                };
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(BridgeError::Handshake(
                    "connection closed before authentication".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

fn is_authenticated(reply: &Value) -> bool {
    match reply.get("authenticated") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// True when a remote message announces a slide change
pub fn is_slide_trigger(message: &Value) -> bool {
    message
        .get("action")
        .and_then(Value::as_str)
        .is_some_and(|action| SLIDE_TRIGGER_ACTIONS.contains(&action))
}

#[async_trait]
impl ConnectionStrategy for WebSocketStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WebSocket
    }

    async fn connect(&mut self) -> Result<(), BridgeError> {
        self.close().await;

        let socket = tokio::time::timeout(self.timeout, handshake(&self.url, &self.password))
            .await
            .map_err(|_| {
                BridgeError::Transport(format!(
                    "Timed out after {}ms connecting to {}",
                    self.timeout.as_millis(),
                    self.url
                ))
            })??;

        debug!(url = %self.url, "Remote socket authenticated");
        self.socket = Some(socket);
        self.pending_initial = true;
        Ok(())
    }

    async fn next_slide(&mut self) -> Result<SlideStatus, BridgeError> {
        if self.socket.is_none() {
            return Err(BridgeError::Transport("Not connected".to_string()));
        }

        if self.pending_initial {
            self.pending_initial = false;
            return self.fetch().await;
        }

        loop {
            let Some(socket) = self.socket.as_mut() else {
                return Err(BridgeError::Transport("Not connected".to_string()));
            };

            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    let message: Value = serde_json::from_str(text.as_str())?;
                    if is_slide_trigger(&message) {
                        trace!(action = ?message.get("action"), "Slide trigger");
                        return self.fetch().await;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.socket = None;
                    return Err(BridgeError::Transport("Remote socket closed".to_string()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.socket = None;
                    return Err(e.into());
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        self.pending_initial = false;
    }

    fn describe(&self) -> String {
        format!("Listening on {}", self.client.base_url().trim_start_matches("http://"))
    }
}

impl WebSocketStrategy {
    /// A malformed body is passed up with the socket kept open; any other
    /// fetch failure drops the link.
    async fn fetch(&mut self) -> Result<SlideStatus, BridgeError> {
        let err = match self.client.fetch_slide_status().await {
            Ok(status) => return Ok(status),
            Err(e) => e,
        };

        if err.counts_as_link_failure() {
            if let Some(mut socket) = self.socket.take() {
                let _ = socket.close(None).await;
            }
        }
        Err(err)
    }
}
