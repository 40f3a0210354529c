//! Retry policy: exponential backoff with jitter

use super::error::ErrorRecord;
use crate::config::RetrySettings;
use anyhow::{bail, Result};
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;

/// Failures a policy may choose to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryCondition {
    /// Connection failures and timeouts
    NetworkError,
    /// Any 5xx status
    ServerError,
    /// A specific status code
    Status(u16),
}

/// Stateless retry policy
///
/// Attempt indices start at 0. The wait before retrying attempt `n` is
/// `interval * backoff_factor^n * (1 ± randomness_factor * rand)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval_ms: u64,
    randomness_factor: f64,
    backoff_factor: f64,
    max_interval_ms: Option<u64>,
    conditions: HashSet<RetryCondition>,
}

impl RetryPolicy {
    /// Build a policy from settings, rejecting out-of-range tuning
    pub fn from_settings(settings: &RetrySettings) -> Result<Self> {
        if settings.max_attempts < 1 {
            bail!("retry.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&settings.randomness_factor) {
            bail!(
                "retry.randomness_factor must be within [0, 1], got {}",
                settings.randomness_factor
            );
        }
        if !(settings.backoff_factor > 1.0 && settings.backoff_factor.is_finite()) {
            bail!(
                "retry.backoff_factor must be greater than 1, got {}",
                settings.backoff_factor
            );
        }

        let mut conditions = HashSet::new();
        if settings.retry_network_errors {
            conditions.insert(RetryCondition::NetworkError);
        }
        if settings.retry_server_errors {
            conditions.insert(RetryCondition::ServerError);
        }
        conditions.extend(settings.retry_statuses.iter().copied().map(RetryCondition::Status));

        Ok(Self {
            max_attempts: settings.max_attempts,
            interval_ms: settings.interval_ms,
            randomness_factor: settings.randomness_factor,
            backoff_factor: settings.backoff_factor,
            max_interval_ms: settings.retry_after_limit_ms,
            conditions,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Randomized wait after attempt `attempt` fails
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(-1.0..=1.0);
        self.delay_with_jitter(attempt, jitter)
    }

    /// Wait after attempt `attempt` fails, with `jitter` in [-1, 1]
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.interval_ms as f64 * self.backoff_factor.powi(exponent);
        let spread = 1.0 + self.randomness_factor * jitter.clamp(-1.0, 1.0);
        let mut millis = (base * spread).max(0.0);

        if let Some(limit) = self.max_interval_ms {
            millis = millis.min(limit as f64);
        }

        // Saturating cast; an overflowing exponent yields u64::MAX
        Duration::from_millis(millis.round() as u64)
    }

    /// Wait before the attempt following `attempt`, never shorter than `previous`
    pub fn next_wait(&self, attempt: u32, previous: Duration) -> Duration {
        self.delay_for_attempt(attempt).max(previous)
    }

    /// Whether the failure matches a retryable condition
    pub fn is_retryable(&self, error: &ErrorRecord) -> bool {
        if error.kind.is_network() {
            return self.conditions.contains(&RetryCondition::NetworkError);
        }

        match error.status {
            Some(status) => {
                ((500..600).contains(&status)
                    && self.conditions.contains(&RetryCondition::ServerError))
                    || self.conditions.contains(&RetryCondition::Status(status))
            }
            None => false,
        }
    }

    /// Whether another attempt should follow failed attempt `attempt`
    pub fn should_retry(&self, attempt: u32, error: &ErrorRecord) -> bool {
        attempt.saturating_add(1) < self.max_attempts && self.is_retryable(error)
    }
}
