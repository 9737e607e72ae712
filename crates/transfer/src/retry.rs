use std::time::Duration;

use tracing::{debug, info, warn};

use crate::TransferError;

/// Fixed-budget retry with linear back-off between attempts.
///
/// Every failure class is retried identically up to the budget; the
/// upstream APIs return transient and permanent errors with the same
/// status codes often enough that telling them apart is not worth a
/// wrongly-abandoned multi-gigabyte upload.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Back-off unit: failed attempt `n` waits `n * backoff_unit`.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay inserted after failed attempt `attempt` (1-based).
    ///
    /// Linear, not exponential: 10s, 20s, 30s with the default unit.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }

    /// Drives `attempt_fn` up to the budget, sleeping between failures.
    ///
    /// Returns the first success, or [`TransferError::RetriesExhausted`]
    /// wrapping the last underlying error once the budget is spent.
    /// A zero budget is treated as one attempt.
    pub async fn run<F, Fut, T>(&self, op: &str, mut attempt_fn: F) -> Result<T, TransferError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransferError>>,
    {
        let budget = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            info!(op, attempt, budget, "upload attempt");
            match attempt_fn(attempt).await {
                Ok(value) => {
                    debug!(op, attempt, "attempt succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(op, attempt, error = %e, "attempt failed");
                    if attempt >= budget {
                        return Err(TransferError::RetriesExhausted {
                            attempts: budget,
                            last: Box::new(e),
                        });
                    }
                    let delay = self.delay_for_attempt(attempt);
                    info!(op, delay_secs = delay.as_secs(), "waiting before retry");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
