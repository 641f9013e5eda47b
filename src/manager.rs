//! Connection manager: drives one strategy through connect, listen and
//! reconnect, and routes every slide event through the publish pipeline.
//!
//! The manager runs as a single task that owns the session. Slide events are
//! handled strictly one after another; the next `next_slide` call is not made
//! until the current publish has settled.

use crate::change_detector::ChangeDecision;
use crate::connection::retry::FailureAction;
use crate::connection::ConnectionStrategy;
use crate::events::{EventBus, SessionGate};
use crate::extractor;
use crate::publisher::Publisher;
use crate::session::Session;
use crate::types::{BridgeError, ConnectionState, SlideStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Characters of a caption shown in the "Sending" status
const PREVIEW_CHARS: usize = 50;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped from outside
    Cancelled,
    /// Reconnect budget used up
    Exhausted { attempts: u32 },
}

pub struct ConnectionManager {
    session: Session,
    strategy: Box<dyn ConnectionStrategy>,
    publisher: Arc<dyn Publisher>,
    events: EventBus,
    cancel: CancellationToken,
    gate: SessionGate,
}

impl ConnectionManager {
    pub fn new(
        session: Session,
        strategy: Box<dyn ConnectionStrategy>,
        publisher: Arc<dyn Publisher>,
        events: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            strategy,
            publisher,
            events,
            cancel,
            gate: SessionGate::default(),
        }
    }

    /// Gate the owner closes before reporting the session as stopped
    pub fn gate(&self) -> SessionGate {
        self.gate.clone()
    }

    /// Run until cancelled or until the reconnect budget is exhausted.
    ///
    /// Terminal notifications for exhaustion are left to the caller, which
    /// also owns clearing the session slot.
    pub async fn run(mut self) -> RunOutcome {
        let cancel = self.cancel.clone();
        info!(
            session = self.session.id,
            strategy = self.strategy.kind().as_str(),
            "Connection manager started"
        );

        loop {
            self.emit_connection(ConnectionState::Connecting, "Connecting to ProPresenter API...");

            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                res = self.strategy.connect() => Some(res),
            };
            let Some(connected) = connected else {
                return self.finish_cancelled().await;
            };

            let failure = match connected {
                Ok(()) => {
                    self.on_connected();
                    match self.listen(&cancel).await {
                        Some(err) => err,
                        None => return self.finish_cancelled().await,
                    }
                }
                Err(e) => e,
            };

            self.strategy.close().await;
            if cancel.is_cancelled() {
                return self.finish_cancelled().await;
            }

            let delay = match self.session.failures.on_failure() {
                FailureAction::Retry { attempt, delay } => {
                    let max = self.session.settings.reconnect.max_attempts;
                    warn!(attempt, max, error = %failure, "Connection failed");
                    self.emit_status(format!(
                        "Connection failed. Retrying in {}s (attempt {}/{})...",
                        delay.as_secs_f64(),
                        attempt,
                        max
                    ));
                    self.emit_connection(
                        ConnectionState::Error,
                        format!("Connection failed, will retry ({}/{})", attempt, max),
                    );
                    delay
                }
                FailureAction::AlreadyScheduled => {
                    debug!(error = %failure, "Failure while reconnect pending");
                    self.session.settings.reconnect.delay
                }
                FailureAction::GiveUp { attempts } => {
                    error!(attempts, error = %failure, "Max reconnection attempts reached");
                    return RunOutcome::Exhausted { attempts };
                }
            };

            if !wait_for_reconnect(&cancel, delay).await {
                return self.finish_cancelled().await;
            }
            self.session.failures.on_reconnect_fired();
            debug!(
                failures = self.session.failures.failures(),
                "Attempting reconnection"
            );
        }
    }

    fn on_connected(&mut self) {
        self.session.failures.on_connected();
        self.session.detector.reset();

        let details = self.strategy.describe();
        info!(session = self.session.id, "{}", details);
        self.emit_connection(ConnectionState::Connected, details);
        self.emit_status("Connected - listening for slide changes...");
    }

    /// Pump slide events until the link fails (returns the error) or the
    /// run is cancelled (returns `None`).
    async fn listen(&mut self, cancel: &CancellationToken) -> Option<BridgeError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                res = self.strategy.next_slide() => res,
            };

            match next {
                Ok(payload) => self.process_slide(&payload, cancel).await,
                Err(e @ BridgeError::BufferOverflow { .. }) => {
                    warn!(error = %e, "Discarding oversized stream chunk");
                    self.emit_status("Buffer overflow - waiting for next valid chunk...");
                }
                Err(e) if !e.counts_as_link_failure() => {
                    warn!(error = %e, "Discarding malformed slide payload");
                }
                Err(e) => return Some(e),
            }

            if cancel.is_cancelled() {
                return None;
            }
        }
    }

    /// Extract, compare and publish one slide event
    async fn process_slide(&mut self, payload: &SlideStatus, cancel: &CancellationToken) {
        let extracted = extractor::extract(payload, &self.session.settings.notes);

        let content = match self.session.detector.check(extracted.as_ref()) {
            ChangeDecision::Empty => {
                self.emit_status("No lyric found on current slide.");
                return;
            }
            ChangeDecision::Baseline => {
                self.emit_status("Connected - waiting for slide change...");
                return;
            }
            ChangeDecision::Unchanged => return,
            ChangeDecision::Changed => match extracted {
                Some(content) => content,
                None => return,
            },
        };

        let language = self
            .session
            .settings
            .languages
            .for_content(content.is_from_notes)
            .to_string();
        debug!(
            len = content.text.len(),
            previous = ?self.session.detector.last_sent(),
            "New caption detected"
        );
        self.emit_status(format!("Sending ({}): {}", language, preview(&content.text)));

        let published = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Publish abandoned on stop");
                return;
            }
            res = self.publisher.publish(&content.text, content.is_from_notes, &self.session.settings) => res,
        };

        match published {
            Ok(receipt) => {
                self.session.detector.mark_sent(&content.text);
                debug!(status = receipt.status, "Caption delivered");
                self.emit_status(format!("Sent ({}) to Kefas successfully.", language));
            }
            Err(e) => {
                warn!(error = %e, "Publish failed");
                self.emit_status(format!("Error: {}", e));
            }
        }
    }

    async fn finish_cancelled(&mut self) -> RunOutcome {
        self.strategy.close().await;
        info!(session = self.session.id, "Connection manager stopped");
        RunOutcome::Cancelled
    }

    // Once stop was requested nothing more is reported for this session.

    fn emit_status(&self, message: impl Into<String>) {
        self.gate.while_open(|| {
            if !self.cancel.is_cancelled() {
                self.events.status(message);
            }
        });
    }

    fn emit_connection(&self, status: ConnectionState, details: impl Into<String>) {
        self.gate.while_open(|| {
            if !self.cancel.is_cancelled() {
                self.events.connection(status, details);
            }
        });
    }
}

/// Sleep out the reconnect delay; false when cancelled meanwhile
async fn wait_for_reconnect(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// First characters of a caption, with an ellipsis when cut
fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
