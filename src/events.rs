//! Status and connection notifications.
//!
//! Notifications fan out over a broadcast channel so any number of
//! listeners can follow a run. The latest connection update is also kept
//! as a snapshot for `Bridge::status`.

use crate::types::{BridgeEvent, ConnectionState, ConnectionUpdate};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BridgeEvent>,
    last_connection: Arc<Mutex<Option<ConnectionUpdate>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            last_connection: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a new listener. It only sees events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "kefas_bridge::status", "{}", message);
        // No listeners is fine
        let _ = self.tx.send(BridgeEvent::Status { message });
    }

    pub fn connection(&self, status: ConnectionState, details: impl Into<String>) {
        let update = ConnectionUpdate::new(status, details);
        info!(
            target: "kefas_bridge::connection",
            status = update.status.as_str(),
            "{}",
            update.details
        );
        *self.last_connection.lock() = Some(update.clone());
        let _ = self.tx.send(BridgeEvent::Connection(update));
    }

    pub fn last_connection(&self) -> Option<ConnectionUpdate> {
        self.last_connection.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Per-session switch that stops a run from reporting once it is closed.
///
/// The open check and the emit run under one lock, so nothing a session
/// emits can land after `close` has returned.
#[derive(Debug, Clone, Default)]
pub struct SessionGate {
    closed: Arc<Mutex<bool>>,
}

impl SessionGate {
    /// Run `emit` unless the gate is closed; returns whether it ran
    pub fn while_open(&self, emit: impl FnOnce()) -> bool {
        let closed = self.closed.lock();
        if *closed {
            return false;
        }
        emit();
        true
    }

    /// Waits for an emit in progress to finish
    pub fn close(&self) {
        *self.closed.lock() = true;
    }
}
