//! Blocking waits: retry backoff and human-like pacing between requests

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 3_000,
            max_delay_ms: 7_000,
        }
    }
}

/// Randomized delay between consecutive targets of a site pass
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    min_ms: u64,
    max_ms: u64,
}

impl Pacer {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            min_ms: config.min_delay_ms,
            max_ms: config.max_delay_ms.max(config.min_delay_ms),
        }
    }

    pub fn next_delay(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }

    /// Sleep for a fresh random delay and return how long it was
    pub fn pause(&self, sleeper: &impl Sleeper) -> Duration {
        let delay = self.next_delay();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "pacing before next request");
        sleeper.sleep(delay);
        delay
    }
}
