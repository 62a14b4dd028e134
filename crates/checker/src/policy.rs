//! Graduated error backoff with deduplicated failure notifications.
//!
//! All cycle failures are one generic kind here: login, navigation and
//! timeout failures are handled identically. After `threshold` consecutive
//! failures the checker switches to the slow retry interval.

use std::time::Duration;
use tracing::warn;

use creneau_core::config::CheckConfig;

#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    pub threshold: u32,
    pub normal_interval: Duration,
    pub degraded_interval: Duration,
}

impl ErrorPolicy {
    pub fn from_config(config: &CheckConfig) -> Self {
        Self {
            threshold: config.max_consecutive_errors,
            normal_interval: Duration::from_secs(config.retry_interval_secs),
            degraded_interval: Duration::from_secs(config.degraded_retry_interval_secs),
        }
    }
}

/// Per-run failure state. Reset on any fully successful cycle.
#[derive(Debug, Default)]
pub struct ErrorState {
    consecutive: u32,
    last_notified_key: Option<String>,
}

impl ErrorState {
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Notification content for a failure that should be reported.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureNote {
    pub message: String,
    pub failure_count: u32,
    pub next_retry_secs: u64,
}

#[derive(Debug)]
pub struct FailureDecision {
    pub retry_in: Duration,
    pub degraded: bool,
    pub notify: Option<FailureNote>,
}

impl ErrorPolicy {
    /// Record one cycle failure and decide the wait plus notification.
    ///
    /// Notify on the first failure and again on entering degraded mode,
    /// deduplicated by kind:message so identical repeats stay quiet.
    pub fn on_failure(&self, state: &mut ErrorState, kind: &str, message: &str) -> FailureDecision {
        state.consecutive += 1;
        let degraded = state.consecutive >= self.threshold;
        let retry_in = if degraded {
            self.degraded_interval
        } else {
            self.normal_interval
        };

        if degraded {
            warn!(
                count = state.consecutive,
                wait_secs = retry_in.as_secs(),
                "Consecutive failures, switching to degraded retry interval"
            );
        }

        let due = state.consecutive == 1 || state.consecutive == self.threshold;
        let key = format!("{}:{}", kind, message);
        let notify = if due && state.last_notified_key.as_deref() != Some(&key) {
            state.last_notified_key = Some(key);
            Some(FailureNote {
                message: message.to_string(),
                failure_count: state.consecutive,
                next_retry_secs: retry_in.as_secs(),
            })
        } else {
            None
        };

        FailureDecision {
            retry_in,
            degraded,
            notify,
        }
    }

    /// Record a fully successful cycle. Returns whether a recovery
    /// notification is due (a failure had been reported earlier).
    pub fn on_success(&self, state: &mut ErrorState) -> bool {
        let recovery_due = state.last_notified_key.is_some();
        state.consecutive = 0;
        state.last_notified_key = None;
        recovery_due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ErrorPolicy {
        ErrorPolicy {
            threshold: 2,
            normal_interval: Duration::from_secs(30),
            degraded_interval: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_first_failure_notifies_with_normal_interval() {
        let policy = policy();
        let mut state = ErrorState::default();
        let decision = policy.on_failure(&mut state, "auth", "bad credentials");
        assert!(!decision.degraded);
        assert_eq!(decision.retry_in, Duration::from_secs(30));
        let note = decision.notify.unwrap();
        assert_eq!(note.failure_count, 1);
        assert_eq!(note.next_retry_secs, 30);
    }

    #[test]
    fn test_threshold_switches_to_degraded_interval() {
        let policy = policy();
        let mut state = ErrorState::default();
        policy.on_failure(&mut state, "auth", "bad credentials");

        let decision = policy.on_failure(&mut state, "navigation", "day cell not found");
        assert!(decision.degraded);
        assert_eq!(decision.retry_in, Duration::from_secs(300));
        // Different key: notified again at the threshold
        let note = decision.notify.unwrap();
        assert_eq!(note.failure_count, 2);
        assert_eq!(note.next_retry_secs, 300);
    }

    #[test]
    fn test_identical_repeats_are_deduplicated() {
        let policy = policy();
        let mut state = ErrorState::default();
        let first = policy.on_failure(&mut state, "timeout", "CDP command timed out");
        assert!(first.notify.is_some());

        // Same failure at the threshold: no second notification
        let second = policy.on_failure(&mut state, "timeout", "CDP command timed out");
        assert!(second.degraded);
        assert!(second.notify.is_none());

        // Past the threshold nothing notifies regardless
        let third = policy.on_failure(&mut state, "auth", "other");
        assert!(third.notify.is_none());
        assert_eq!(state.consecutive(), 3);
    }

    #[test]
    fn test_success_resets_and_reports_recovery_once() {
        let policy = policy();
        let mut state = ErrorState::default();

        // Success without prior failures: no recovery notification
        assert!(!policy.on_success(&mut state));

        policy.on_failure(&mut state, "auth", "boom");
        assert!(policy.on_success(&mut state));
        assert_eq!(state.consecutive(), 0);
        // Already recovered: quiet again
        assert!(!policy.on_success(&mut state));
    }
}
