//! Public start/stop/status surface.
//!
//! A `Bridge` holds at most one active session. `start` validates the
//! request, spawns the connection manager and returns straight away; the
//! outcome of connecting is reported through the event bus.

use crate::connection::{ProducerStrategyFactory, StrategyFactory};
use crate::events::{EventBus, SessionGate};
use crate::manager::{ConnectionManager, RunOutcome};
use crate::publisher::{KefasPublisher, Publisher};
use crate::session::{Session, StartRequest};
use crate::types::{BridgeError, BridgeEvent, BridgeStatus, ConnectionState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct ActiveSession {
    id: u64,
    cancel: CancellationToken,
    gate: SessionGate,
    task: JoinHandle<()>,
}

impl ActiveSession {
    /// Silence the manager, then cancel it
    fn halt(&self) {
        self.gate.close();
        self.cancel.cancel();
    }
}

struct BridgeInner {
    events: EventBus,
    publisher: Arc<dyn Publisher>,
    factory: Arc<dyn StrategyFactory>,
    active: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl BridgeInner {
    /// Called from the manager task once its reconnect budget is spent
    fn finish_exhausted(&self, id: u64, attempts: u32) {
        {
            let mut active = self.active.lock();
            if active.as_ref().map(|s| s.id) != Some(id) {
                // Already stopped or replaced
                return;
            }
            *active = None;
        }

        info!(session = id, attempts, "Bridge stopped after max reconnection attempts");
        self.events.connection(
            ConnectionState::Error,
            BridgeError::Exhausted { attempts }.to_string(),
        );
        self.events.status("Bridge stopped after max reconnection attempts.");
        self.events
            .connection(ConnectionState::Disconnected, "Bridge stopped");
    }
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        if let Some(session) = self.active.get_mut().take() {
            session.halt();
        }
    }
}

/// Handle to the bridge. Clones share the same session slot and events.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Bridge publishing to Kefas and reading from a real producer
    pub fn new() -> Result<Self, BridgeError> {
        Ok(Self::with_components(
            Arc::new(KefasPublisher::new()?),
            Arc::new(ProducerStrategyFactory),
        ))
    }

    pub fn with_components(
        publisher: Arc<dyn Publisher>,
        factory: Arc<dyn StrategyFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                events: EventBus::default(),
                publisher,
                factory,
                active: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Listen for status and connection notifications
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.inner.events.subscribe()
    }

    /// Start a session.
    ///
    /// Must be called from within a Tokio runtime. Every rejection is also
    /// emitted as a status notification.
    pub fn start(&self, request: &StartRequest) -> Result<(), BridgeError> {
        let events = &self.inner.events;
        let mut active = self.inner.active.lock();

        if active.is_some() {
            let err = BridgeError::AlreadyRunning;
            events.status(err.to_string());
            return Err(err);
        }

        let settings = request.validate().inspect_err(|e| events.status(e.to_string()))?;

        let prepared = Handle::try_current()
            .map_err(|_| {
                BridgeError::Configuration("Bridge must be started inside a Tokio runtime".to_string())
            })
            .and_then(|handle| {
                let strategy = self.inner.factory.create(&settings)?;
                Ok((handle, strategy))
            });
        let (handle, strategy) =
            prepared.inspect_err(|e| events.status(format!("Error: {}", e)))?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        info!(
            session = id,
            token = %settings.redacted_token(),
            producer = %settings.producer_address(),
            strategy = settings.strategy.as_str(),
            notes = settings.notes.enabled,
            trigger = %settings.notes.trigger,
            max_reconnect = settings.reconnect.max_attempts,
            reconnect_delay_ms = settings.reconnect.delay.as_millis() as u64,
            language = %settings.languages.default,
            alternate_language = %settings.languages.alternate,
            "Starting bridge"
        );
        events.status("Starting bridge - connecting to ProPresenter API...");

        let cancel = CancellationToken::new();
        let manager = ConnectionManager::new(
            Session::new(id, settings),
            strategy,
            self.inner.publisher.clone(),
            events.clone(),
            cancel.clone(),
        );

        let gate = manager.gate();
        let weak: Weak<BridgeInner> = Arc::downgrade(&self.inner);
        let task = handle.spawn(async move {
            if let RunOutcome::Exhausted { attempts } = manager.run().await {
                if let Some(inner) = weak.upgrade() {
                    inner.finish_exhausted(id, attempts);
                }
            }
        });

        *active = Some(ActiveSession { id, cancel, gate, task });
        Ok(())
    }

    /// Stop the active session. Safe to call when nothing is running.
    pub fn stop(&self) -> Result<(), BridgeError> {
        let session = self.take_session()?;
        session.halt();
        self.report_stopped(session.id);
        Ok(())
    }

    /// Stop and wait for the manager task to wind down
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        let session = self.take_session()?;
        session.halt();
        self.report_stopped(session.id);

        if let Err(e) = session.task.await {
            debug!(error = %e, "Manager task ended abnormally");
        }
        Ok(())
    }

    /// Snapshot of the running flag and the latest connection update
    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            running: self.is_running(),
            connection: self.inner.events.last_connection(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    fn take_session(&self) -> Result<ActiveSession, BridgeError> {
        let taken = self.inner.active.lock().take();
        taken.ok_or_else(|| {
            let err = BridgeError::NotRunning;
            self.inner.events.status(err.to_string());
            err
        })
    }

    fn report_stopped(&self, id: u64) {
        info!(session = id, "Bridge stopped");
        self.inner
            .events
            .connection(ConnectionState::Disconnected, "Bridge stopped");
        self.inner.events.status("Bridge stopped.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionStrategy, StrategyKind};
    use crate::payload::PublishReceipt;
    use crate::session::SessionSettings;
    use crate::types::SlideStatus;
    use async_trait::async_trait;

    struct Idle;

    #[async_trait]
    impl ConnectionStrategy for Idle {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Polling
        }
        async fn connect(&mut self) -> Result<(), BridgeError> {
            Ok(())
        }
        async fn next_slide(&mut self) -> Result<SlideStatus, BridgeError> {
            std::future::pending().await
        }
        async fn close(&mut self) {}
        fn describe(&self) -> String {
            "Polling test:1".to_string()
        }
    }

    struct IdleFactory;

    impl StrategyFactory for IdleFactory {
        fn create(
            &self,
            _settings: &SessionSettings,
        ) -> Result<Box<dyn ConnectionStrategy>, BridgeError> {
            Ok(Box::new(Idle))
        }
    }

    struct NoopPublisher;

    #[async_trait]
    impl Publisher for NoopPublisher {
        async fn publish(
            &self,
            _content: &str,
            _is_from_notes: bool,
            _settings: &SessionSettings,
        ) -> Result<PublishReceipt, BridgeError> {
            Ok(PublishReceipt { status: 200, body: serde_json::Value::Null })
        }
    }

    fn bridge() -> Bridge {
        Bridge::with_components(Arc::new(NoopPublisher), Arc::new(IdleFactory))
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_with_status() {
        let bridge = bridge();
        let mut rx = bridge.subscribe();

        let err = bridge.start(&StartRequest::new("  ", "127.0.0.1", 1)).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
        assert!(!bridge.status().running);
        assert_eq!(
            rx.recv().await.unwrap().status_message(),
            Some("Error: Kefas token is required and must be a non-empty string.")
        );
    }

    #[tokio::test]
    async fn test_start_stop_cycle() {
        let bridge = bridge();
        bridge.start(&StartRequest::new("tok", "127.0.0.1", 55056)).unwrap();
        assert!(bridge.status().running);

        bridge.shutdown().await.unwrap();
        let status = bridge.status();
        assert!(!status.running);
        assert_eq!(status.connection.unwrap().status, ConnectionState::Disconnected);

        // Can be started again after a stop
        bridge.start(&StartRequest::new("tok", "127.0.0.1", 55056)).unwrap();
        bridge.stop().unwrap();
    }

    /// Connects at once, then idles
    struct Quick;

    #[async_trait]
    impl ConnectionStrategy for Quick {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Chunked
        }
        async fn connect(&mut self) -> Result<(), BridgeError> {
            tokio::task::yield_now().await;
            Ok(())
        }
        async fn next_slide(&mut self) -> Result<SlideStatus, BridgeError> {
            std::future::pending().await
        }
        async fn close(&mut self) {}
        fn describe(&self) -> String {
            "Streaming from test:1".to_string()
        }
    }

    struct QuickFactory;

    impl StrategyFactory for QuickFactory {
        fn create(
            &self,
            _settings: &SessionSettings,
        ) -> Result<Box<dyn ConnectionStrategy>, BridgeError> {
            Ok(Box::new(Quick))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_nothing_reported_after_stop() {
        let bridge = Bridge::with_components(Arc::new(NoopPublisher), Arc::new(QuickFactory));

        for _ in 0..200 {
            bridge.start(&StartRequest::new("tok", "127.0.0.1", 55056)).unwrap();
            tokio::task::yield_now().await;
            bridge.stop().unwrap();

            let status = bridge.status();
            assert!(!status.running);
            assert_eq!(status.connection.unwrap().status, ConnectionState::Disconnected);

            // Give a straggling manager task the chance to emit
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            assert_eq!(
                bridge.status().connection.unwrap().status,
                ConnectionState::Disconnected
            );
        }
    }

    #[test]
    fn test_start_outside_runtime_is_rejected() {
        let bridge = bridge();
        let err = bridge.start(&StartRequest::new("tok", "127.0.0.1", 55056)).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
        assert!(!bridge.is_running());
    }
}
