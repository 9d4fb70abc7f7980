use std::time::Instant;

use log::{info, warn};

use crate::config::ReconnectPolicy;

/// Bookkeeping for a host that polls a controller periodically.
///
/// The session itself never gives up on a link. This tracks consecutive
/// failed refreshes so the host can decide when to force a reconnect and
/// when to report the device offline.
#[derive(Debug, Clone)]
pub struct LinkHealth {
    policy: ReconnectPolicy,
    consecutive_failures: u32,
    last_success: Instant,
}

impl LinkHealth {
    pub fn new(policy: ReconnectPolicy, now: Instant) -> Self {
        LinkHealth {
            policy,
            consecutive_failures: 0,
            last_success: now,
        }
    }

    pub fn record_success(&mut self, now: Instant) {
        if self.consecutive_failures > 0 {
            info!(
                "Link recovered after {} failed attempt(s)",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.last_success = now;
    }

    /// Counts a failed refresh. Returns `true` when the host should drop and
    /// reopen the connection, which happens on every
    /// `max_consecutive_failures`-th failure in a row.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let threshold = self.policy.max_consecutive_failures.max(1);
        let reconnect = self.consecutive_failures % threshold == 0;
        if reconnect {
            warn!(
                "{} consecutive failures, forcing reconnect",
                self.consecutive_failures
            );
        }
        reconnect
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// No successful refresh for at least `offline_after`.
    pub fn is_offline(&self, now: Instant) -> bool {
        self.consecutive_failures > 0
            && now.saturating_duration_since(self.last_success) >= self.policy.offline_after()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            max_consecutive_failures: 3,
            offline_after_secs: 60,
        }
    }

    #[test]
    fn test_reconnect_every_third_failure() {
        let mut health = LinkHealth::new(policy(), Instant::now());
        let decisions: Vec<bool> = (0..6).map(|_| health.record_failure()).collect();
        assert_eq!(decisions, vec![false, false, true, false, false, true]);
        assert_eq!(health.consecutive_failures(), 6);
    }

    #[test]
    fn test_success_resets_failures() {
        let start = Instant::now();
        let mut health = LinkHealth::new(policy(), start);
        health.record_failure();
        health.record_failure();
        health.record_success(start + Duration::from_secs(5));
        assert_eq!(health.consecutive_failures(), 0);
        assert!(!health.record_failure());
    }

    #[test]
    fn test_offline_after_quiet_period() {
        let start = Instant::now();
        let mut health = LinkHealth::new(policy(), start);
        assert!(!health.is_offline(start + Duration::from_secs(120)));

        health.record_failure();
        assert!(!health.is_offline(start + Duration::from_secs(59)));
        assert!(health.is_offline(start + Duration::from_secs(60)));

        health.record_success(start + Duration::from_secs(61));
        assert!(!health.is_offline(start + Duration::from_secs(200)));
    }

    #[test]
    fn test_zero_threshold_reconnects_every_time() {
        let mut health = LinkHealth::new(
            ReconnectPolicy {
                max_consecutive_failures: 0,
                offline_after_secs: 1,
            },
            Instant::now(),
        );
        assert!(health.record_failure());
        assert!(health.record_failure());
    }
}
