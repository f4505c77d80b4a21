//! Reconnect delays.

use crate::SyncConfig;
use rand::Rng;
use std::time::Duration;

/// Largest jitter fraction that still keeps successive delays increasing.
const MAX_JITTER: f64 = 0.5;

/// Exponential backoff with upward jitter, capped.
///
/// Each step doubles. A delay is the current step plus up to `jitter` times
/// the step, so with `jitter <= 0.5` every delay is strictly longer than the
/// one before it until the cap is reached.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    jitter: f64,
    step: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, jitter: f64) -> Self {
        let base = base.min(cap);
        Self {
            base,
            cap,
            jitter: jitter.clamp(0.0, MAX_JITTER),
            step: base,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.backoff_base, config.backoff_cap, config.backoff_jitter)
    }

    /// The delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let step = self.step;
        let extra = if self.jitter > 0.0 {
            step.mul_f64(rand::rng().random_range(0.0..self.jitter))
        } else {
            Duration::ZERO
        };
        self.step = step.saturating_mul(2).min(self.cap);
        (step + extra).min(self.cap)
    }

    /// Back to the base delay, after a successful connect.
    pub fn reset(&mut self) {
        self.step = self.base;
    }
}
