//! Retry/backoff for the embed phase, where a slow or rate-limited
//! embedding provider is the most likely transient failure.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  pub backoff_multiplier: f64,
  pub request_timeout: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_backoff: Duration::from_millis(500),
      max_backoff: Duration::from_secs(30),
      backoff_multiplier: 2.0,
      request_timeout: Duration::from_secs(60),
    }
  }
}

impl RetryConfig {
  /// Backoff for `attempt` (0-based), exponential with up to 25% jitter.
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
    let jittered = base * (1.0 + rand_f64() * 0.25);
    Duration::from_secs_f64(jittered.min(self.max_backoff.as_secs_f64()))
  }
}

/// Dependency-free pseudo-random source for jitter; not suitable for
/// anything that needs real entropy.
fn rand_f64() -> f64 {
  use std::time::{SystemTime, UNIX_EPOCH};
  let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
  (nanos as f64 / u32::MAX as f64).fract()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_grows_with_attempt_and_respects_ceiling() {
    let config = RetryConfig::default();
    let first = config.backoff_for_attempt(0);
    let third = config.backoff_for_attempt(3);
    assert!(third >= first);
    assert!(third <= config.max_backoff + Duration::from_millis(1));
  }
}
