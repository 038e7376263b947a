//! Circuit breaker for AP restart storms
//!
//! Records failure-driven AP activations in a sliding time window and
//! computes the backoff the supervisor must respect before the next one.

use crate::config::BreakerConfig;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Backoff never exceeds one hour, so the device always eventually retries.
const BACKOFF_CAP: Duration = Duration::from_secs(3600);

/// Sliding-window restart breaker.
///
/// Backoff formula: with `excess` restarts beyond `max_restarts_per_window`
/// inside the window, the delay is `min(backoff_base * 5^excess, 3600s)`.
/// With the default base of 6s that yields 30s, 150s, 750s, then the cap.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    restarts: VecDeque<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            restarts: VecDeque::new(),
        }
    }

    /// Record a failure-driven AP activation.
    pub fn record_restart(&mut self, now: Instant) {
        self.prune(now);
        self.restarts.push_back(now);
    }

    /// Backoff currently required before the next AP activation.
    /// Zero means the breaker is closed.
    pub fn current_backoff(&mut self, now: Instant) -> Duration {
        self.prune(now);
        let excess = self
            .restarts
            .len()
            .saturating_sub(self.config.max_restarts_per_window);
        if excess == 0 {
            return Duration::ZERO;
        }
        let base = self.config.backoff_base_secs.max(1);
        let secs = (0..excess as u32)
            .try_fold(base, |acc, _| acc.checked_mul(5))
            .unwrap_or(BACKOFF_CAP.as_secs());
        Duration::from_secs(secs).min(BACKOFF_CAP)
    }

    /// Clear all recorded restarts. Called on any confirmed successful
    /// client connection.
    pub fn reset(&mut self) {
        self.restarts.clear();
    }

    fn prune(&mut self, now: Instant) {
        let window = Duration::from_secs(self.config.restart_window_secs);
        while let Some(oldest) = self.restarts.front() {
            if now.duration_since(*oldest) > window {
                self.restarts.pop_front();
            } else {
                break;
            }
        }
    }
}
