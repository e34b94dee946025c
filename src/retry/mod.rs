//! Retry Mechanism Module
//!
//! Bounded retry around a single provider call, with configurable backoff
//! strategy, jitter, and rate-limit-aware early abort. The executor records
//! every failed attempt so the orchestrator can report what happened.
//!
//! Rate limits get special handling: on an explicit rate-limit signal the
//! executor does not keep retrying against the same provider. It aborts
//! immediately and the orchestrator places the provider under a lockout
//! window instead.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::{RouteError, RouteResult};
use crate::types::AttemptRecord;

/// Backoff strategy for delays between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    /// Constant `base_delay` between attempts.
    Fixed,
    /// `base_delay * attempt`.
    Linear,
    /// `base_delay * 2^(attempt - 1)`.
    #[default]
    Exponential,
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first call.
    pub max_attempts: u32,
    pub strategy: BackoffStrategy,
    /// Base delay fed into the strategy formula.
    pub base_delay: Duration,
    /// Cap applied to the computed delay, jitter included.
    pub max_delay: Duration,
    /// Multiply delays by a uniform random factor in `[0.5, 1.5)`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the retry following the given 1-indexed attempt,
    /// without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let millis = self.base_delay.as_millis() as f64;
        let raw = match self.strategy {
            BackoffStrategy::Fixed => millis,
            BackoffStrategy::Linear => millis * f64::from(attempt),
            BackoffStrategy::Exponential => millis * 2f64.powi(attempt as i32 - 1),
        };
        Duration::from_millis(raw as u64).min(self.max_delay)
    }

    /// Delay before the retry following the given 1-indexed attempt, with
    /// jitter applied when enabled. Never exceeds `max_delay`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        if !self.jitter {
            return base;
        }
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_millis((base.as_millis() as f64 * factor) as u64).min(self.max_delay)
    }
}

/// Per-call retry history, for observability.
#[derive(Debug, Clone, Default)]
pub struct RetryReport {
    /// Every failed attempt, in order.
    pub attempts: Vec<AttemptRecord>,
    /// Total time spent sleeping between attempts.
    pub total_delay: Duration,
}

/// Executes a provider call under a [`RetryPolicy`].
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation with bounded retry.
    ///
    /// Returns the value or the terminal error, alongside the full
    /// per-attempt history.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> (RouteResult<T>, RetryReport)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = RouteResult<T>>,
    {
        self.execute_cancellable(operation, &CancellationToken::new())
            .await
    }

    /// Execute with bounded retry, aborting as soon as the token is
    /// cancelled, including mid-sleep.
    pub async fn execute_cancellable<F, Fut, T>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> (RouteResult<T>, RetryReport)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = RouteResult<T>>,
    {
        let mut report = RetryReport::default();
        let mut last_error = None;
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return (Err(RouteError::Cancelled), report);
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(RouteError::Cancelled),
                outcome = operation() => outcome,
            };

            match outcome {
                Ok(value) => return (Ok(value), report),
                Err(RouteError::Cancelled) => {
                    return (Err(RouteError::Cancelled), report);
                }
                Err(error) => {
                    report.attempts.push(AttemptRecord {
                        attempt,
                        error_kind: error.kind().to_string(),
                        error: error.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        kind = error.kind(),
                        error = %error,
                        "provider call attempt failed"
                    );

                    if error.is_rate_limit() {
                        // Do not burn further attempts against a provider
                        // that told us to back off.
                        return (Err(error), report);
                    }
                    if !error.is_retryable() {
                        return (Err(error), report);
                    }

                    last_error = Some(error);

                    if attempt < max_attempts {
                        let delay = self.policy.calculate_delay(attempt);
                        report.total_delay += delay;
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                return (Err(RouteError::Cancelled), report);
                            }
                            _ = sleep(delay) => {}
                        }
                    }
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| RouteError::Internal("retry executor exhausted without error".into()));
        (Err(error), report)
    }
}
