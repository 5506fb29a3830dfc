//! Runtime settings for [`crate::ReferenceService`].

use std::time::Duration;

/// Upper bound on `expires_in_days` for a new request.
pub const MAX_EXPIRY_DAYS: u32 = 365;

/// Exponential backoff for the detached aggregate refresh.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
  /// Total attempts including the first; values below 1 are treated as 1.
  pub max_attempts:    u32,
  pub initial_backoff: Duration,
  pub multiplier:      u32,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts:    3,
      initial_backoff: Duration::from_millis(250),
      multiplier:      2,
    }
  }
}

impl RetryPolicy {
  /// Delay after the `attempt`-th failure (1-based).
  pub fn backoff(&self, attempt: u32) -> Duration {
    let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
    self.initial_backoff.saturating_mul(factor)
  }

  pub fn attempts(&self) -> u32 { self.max_attempts.max(1) }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
  /// Base of the referee-facing link; the token is appended as a path segment.
  pub frontend_base_url:   String,
  pub default_expiry_days: u32,
  pub refresh:             RetryPolicy,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      frontend_base_url:   "http://localhost:3000".into(),
      default_expiry_days: 30,
      refresh:             RetryPolicy::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_grows_geometrically() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff(1), Duration::from_millis(250));
    assert_eq!(policy.backoff(2), Duration::from_millis(500));
    assert_eq!(policy.backoff(3), Duration::from_millis(1000));
  }

  #[test]
  fn zero_attempts_still_tries_once() {
    let policy = RetryPolicy { max_attempts: 0, ..Default::default() };
    assert_eq!(policy.attempts(), 1);
  }
}
