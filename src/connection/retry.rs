//! Failure budget and reconnect scheduling.

use std::time::Duration;
use tracing::debug;

/// Bounded retry policy with a fixed delay between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Number of reconnects allowed after the link is lost
    pub max_attempts: u32,
    /// Fixed delay before each reconnect
    pub delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// What to do after a link failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Schedule reconnect number `attempt` after `delay`
    Retry { attempt: u32, delay: Duration },
    /// A reconnect is already pending, nothing new is scheduled
    AlreadyScheduled,
    /// Budget exhausted, the session must end
    GiveUp { attempts: u32 },
}

/// Consecutive-failure counter with at most one pending reconnect
#[derive(Debug, Clone)]
pub struct FailureTracker {
    policy: ReconnectPolicy,
    failures: u32,
    reconnect_pending: bool,
}

impl FailureTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            reconnect_pending: false,
        }
    }

    /// Record a failure and decide the next step.
    ///
    /// Every failure counts. Once all `max_attempts` reconnects have been
    /// spent, the next failure gives up.
    pub fn on_failure(&mut self) -> FailureAction {
        self.failures = self.failures.saturating_add(1);

        if self.failures > self.policy.max_attempts {
            debug!(failures = self.failures, "Reconnect budget exhausted");
            self.reconnect_pending = false;
            return FailureAction::GiveUp {
                attempts: self.policy.max_attempts,
            };
        }

        if self.reconnect_pending {
            debug!(failures = self.failures, "Reconnect already scheduled");
            return FailureAction::AlreadyScheduled;
        }

        self.reconnect_pending = true;
        FailureAction::Retry {
            attempt: self.failures,
            delay: self.policy.delay,
        }
    }

    /// The scheduled reconnect is starting
    pub fn on_reconnect_fired(&mut self) {
        self.reconnect_pending = false;
    }

    /// Link established: the budget is refilled
    pub fn on_connected(&mut self) {
        self.failures = 0;
        self.reconnect_pending = false;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }
}
