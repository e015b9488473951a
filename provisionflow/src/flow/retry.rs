//! Retry of transient control-plane errors.
//!
//! Only errors whose [`ApiErrorKind`] is listed by the caller are retried;
//! everything else, including resource failures, propagates on the first
//! occurrence.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::runtime::Timer;
use crate::control_plane::ApiErrorKind;
use crate::errors::FlowError;

/// Jitter applied to retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JitterStrategy {
    /// Exact delays.
    #[default]
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random.
    Equal,
}

/// Retry cadence for transient errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Multiplier applied to the delay after each retry.
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
    /// Retries after the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Cap on a single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_backoff_rate() -> f64 {
    1.05
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_delay_ms() -> u64 {
    300_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            backoff_rate: default_backoff_rate(),
            max_attempts: default_max_attempts(),
            max_delay_ms: default_max_delay_ms(),
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryPolicy {
    /// Sets the first delay.
    #[must_use]
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Sets the backoff rate.
    #[must_use]
    pub fn with_backoff_rate(mut self, rate: f64) -> Self {
        self.backoff_rate = rate;
        self
    }

    /// Sets the number of retries.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (0-indexed).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let scaled = (self.interval_ms as f64 * self.backoff_rate.powi(exponent))
            .min(self.max_delay_ms as f64) as u64;

        let jittered = match self.jitter {
            JitterStrategy::None => scaled,
            JitterStrategy::Full => {
                if scaled == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=scaled)
                }
            }
            JitterStrategy::Equal => {
                let half = scaled / 2;
                if half == 0 {
                    scaled
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };
        Duration::from_millis(jittered)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the delay.
    Retry(Duration),
    /// Retries are exhausted.
    GiveUp,
    /// The error is not one the caller retries.
    NotRetryable,
}

/// Decides whether `error` is retried after `attempt` retries already made.
#[must_use]
pub fn should_retry(
    policy: &RetryPolicy,
    retry_on: &[ApiErrorKind],
    attempt: u32,
    error: &FlowError,
) -> RetryDecision {
    let retryable = error
        .as_api_error()
        .is_some_and(|e| retry_on.contains(&e.kind));
    if !retryable {
        return RetryDecision::NotRetryable;
    }
    if attempt >= policy.max_attempts {
        return RetryDecision::GiveUp;
    }
    RetryDecision::Retry(policy.delay(attempt))
}

/// Runs `operation`, retrying the listed error kinds. Exhaustion returns the
/// last error.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    timer: &dyn Timer,
    retry_on: &[ApiErrorKind],
    key: &str,
    mut operation: F,
) -> Result<T, FlowError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FlowError>>,
{
    let mut attempt = 0;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        match should_retry(policy, retry_on, attempt, &error) {
            RetryDecision::Retry(delay) => {
                attempt += 1;
                debug!(
                    key,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "retrying after transient error"
                );
                timer.sleep(delay).await;
            }
            RetryDecision::GiveUp => {
                warn!(key, attempts = attempt, error = %error, "retries exhausted");
                return Err(error);
            }
            RetryDecision::NotRetryable => return Err(error),
        }
    }
}
