//! Exponential backoff with jitter shared by the periodic tasks.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Backoff tuning shared by the poller and the verification sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// First retry delay.
    pub initial: Duration,
    /// Normal delay ceiling.
    pub max: Duration,
    /// Growth factor between attempts.
    pub multiplier: f64,
    /// After this many consecutive failures the ceiling widens; the
    /// watcher never stops retrying.
    pub widen_after: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            widen_after: 5,
        }
    }
}

impl BackoffPolicy {
    /// Ceiling widening applied once failures exceed `widen_after`.
    const WIDEN_FACTOR: u32 = 4;
}

/// Mutable backoff state for one retry loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
    consecutive_failures: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.initial,
            policy,
            consecutive_failures: 0,
        }
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.consecutive_failures += 1;

        let delay = self.current + jitter(self.current);

        let ceiling = if self.consecutive_failures >= self.policy.widen_after {
            self.policy.max * BackoffPolicy::WIDEN_FACTOR
        } else {
            self.policy.max
        };
        let next = self.current.mul_f64(self.policy.multiplier.max(1.0));
        self.current = next.min(ceiling);

        delay
    }

    /// Reset after a successful attempt.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.current = self.policy.initial;
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }
}

fn jitter(base: Duration) -> Duration {
    let range_ms = (base.as_millis() as u64) / 5;
    if range_ms == 0 {
        return Duration::ZERO;
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    Duration::from_millis(u64::from(nanos) % (range_ms + 1))
}
