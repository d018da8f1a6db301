use std::fmt::Display;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::types::RetryPolicy;

/// Last error after the attempt budget ran out, or after cancellation cut a
/// delay short.
#[derive(Debug)]
pub struct RetryTerminal<E> {
    pub error: E,
    pub attempts: u32,
    pub cancelled: bool,
}

/// Runs `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// Every failure is logged with its attempt number. `policy.delay` is slept
/// between attempts, never after the final one. On success the attempt number
/// that succeeded is returned alongside the value.
///
/// Cancelling `cancel_token` during a delay ends the loop immediately with the
/// last error and `cancelled` set.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    cancel_token: &CancellationToken,
    mut op: F,
) -> Result<(T, u32), RetryTerminal<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(error) => {
                warn!(
                    event = "retry_attempt_failed",
                    operation,
                    attempt,
                    max_attempts,
                    error = %error,
                    "attempt {attempt}/{max_attempts} failed"
                );
                if attempt >= max_attempts {
                    return Err(RetryTerminal {
                        error,
                        attempts: attempt,
                        cancelled: false,
                    });
                }
                let cancelled = if policy.delay.is_zero() {
                    cancel_token.is_cancelled()
                } else {
                    tokio::select! {
                        biased;
                        _ = cancel_token.cancelled() => true,
                        _ = tokio::time::sleep(policy.delay) => false,
                    }
                };
                if cancelled {
                    warn!(
                        event = "retry_cancelled",
                        operation,
                        attempt,
                        "cancellation requested, abandoning retries"
                    );
                    return Err(RetryTerminal {
                        error,
                        attempts: attempt,
                        cancelled: true,
                    });
                }
                attempt += 1;
            }
        }
    }
}
