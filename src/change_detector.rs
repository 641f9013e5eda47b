//! Change detection over published captions.
//!
//! Tracks the last caption known to be on the remote side. The first caption
//! seen after a (re)connect becomes the baseline without being published, so
//! a reconnect never re-sends what is already showing.

use crate::types::ExtractedContent;
use tracing::{debug, trace};

/// Outcome of comparing a freshly extracted caption with the last one sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// Nothing extractable on the slide
    Empty,
    /// First caption since connect, recorded as baseline
    Baseline,
    /// Same caption as last sent
    Unchanged,
    /// New caption, eligible for publishing
    Changed,
}

impl ChangeDecision {
    pub fn should_publish(&self) -> bool {
        matches!(self, ChangeDecision::Changed)
    }
}

/// Change detector holding the last-sent caption
#[derive(Debug, Default)]
pub struct ChangeDetector {
    /// Last caption confirmed on the remote side (or the baseline)
    last_sent: Option<String>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self { last_sent: None }
    }

    /// Classify an extraction result.
    ///
    /// Records the baseline as a side effect; a `Changed` caption is only
    /// recorded once the caller confirms the publish via [`mark_sent`].
    ///
    /// [`mark_sent`]: ChangeDetector::mark_sent
    pub fn check(&mut self, extracted: Option<&ExtractedContent>) -> ChangeDecision {
        let content = match extracted {
            Some(c) => c,
            None => return ChangeDecision::Empty,
        };

        match self.last_sent.as_deref() {
            None => {
                debug!("Initial slide recorded as baseline, not sending");
                self.last_sent = Some(content.text.clone());
                ChangeDecision::Baseline
            }
            Some(last) if last == content.text => {
                trace!("Caption unchanged, not sending");
                ChangeDecision::Unchanged
            }
            Some(_) => ChangeDecision::Changed,
        }
    }

    /// Record a caption after the publisher confirmed delivery
    pub fn mark_sent(&mut self, text: &str) {
        self.last_sent = Some(text.to_string());
    }

    /// Forget the baseline (on every successful connect)
    pub fn reset(&mut self) {
        self.last_sent = None;
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }
}
