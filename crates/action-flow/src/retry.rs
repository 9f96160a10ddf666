//! Retry with linear backoff

use crate::errors::FlowError;
use action_primitives::ActionError;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// `attempts` tries with `attempt × backoff_step` slept after each failed
/// try except the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(attempts: u32, backoff_step: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_step,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// Outcome of a retried operation together with the attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, FlowError>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RetryRunner {
    policy: RetryPolicy,
}

impl RetryRunner {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or runs
    /// out of attempts. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Attempted<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ActionError>>,
    {
        let attempts = self.policy.attempts;
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(err) if !err.is_retryable() => {
                    warn!(step = label, attempt, error = %err, "Step failed, not retryable");
                    return Attempted {
                        result: Err(FlowError::Action(err)),
                        attempts: attempt,
                    };
                }
                Err(err) if attempt >= attempts => {
                    warn!(step = label, attempts, error = %err, "Step failed, retries exhausted");
                    return Attempted {
                        result: Err(FlowError::RetriesExhausted {
                            attempts: attempt,
                            last: err,
                        }),
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    let backoff = self.policy.backoff(attempt);
                    info!(
                        step = label,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Step failed, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
