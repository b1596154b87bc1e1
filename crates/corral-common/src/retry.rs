//! Retry/backoff configuration
//!
//! Used by loops that must survive transient store outages (the stream
//! consumer's read loop). Delays grow exponentially up to a cap, with a
//! jitter factor so that a fleet of consumers does not reconnect in lockstep.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff configuration for store reconnect loops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Initial retry delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Backoff multiplier
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_initial_delay() -> u64 {
    200
}

fn default_max_delay() -> u64 {
    30000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 200,
            max_delay_ms: 30000,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given consecutive-failure count.
    ///
    /// `attempt` counts failures since the last success; 0 means no failure
    /// yet and yields no delay.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32 - 1);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        // Add jitter
        let jitter_range = capped_delay * self.jitter;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        let final_delay = (capped_delay + jitter).max(0.0) as u64;

        Duration::from_millis(final_delay)
    }
}
