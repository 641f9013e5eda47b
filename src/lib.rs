//! ProPresenter to Kefas bridge
//!
//! Watches the slide currently shown by ProPresenter and forwards its text to
//! a Kefas meeting whenever it changes.
//!
//! # Architecture
//!
//! - **Extractor**: pulls the caption out of a slide-status payload
//! - **Change detector**: drops repeats and records the baseline after connect
//! - **Publisher**: posts captions to the messaging API
//! - **Connection manager**: keeps one link strategy alive with bounded retries
//! - **Bridge**: start/stop/status surface with broadcast notifications

pub mod bridge;
pub mod change_detector;
pub mod config;
pub mod connection;
pub mod events;
pub mod extractor;
pub mod logging;
pub mod manager;
pub mod payload;
pub mod producer;
pub mod publisher;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use bridge::Bridge;
pub use change_detector::{ChangeDecision, ChangeDetector};
pub use config::Config;
pub use connection::retry::{FailureAction, FailureTracker, ReconnectPolicy};
pub use connection::{ConnectionStrategy, ProducerStrategyFactory, StrategyFactory, StrategyKind};
pub use events::EventBus;
pub use extractor::{extract, NotesSettings};
pub use manager::{ConnectionManager, RunOutcome};
pub use payload::{MessagePayload, PublishReceipt};
pub use producer::ProducerClient;
pub use publisher::{KefasPublisher, Publisher};
pub use session::{Session, SessionSettings, StartRequest};
pub use types::{
    BridgeError, BridgeEvent, BridgeStatus, ConnectionState, ConnectionUpdate, ExtractedContent,
    SlideStatus,
};
