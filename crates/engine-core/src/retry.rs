use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Upper bound on a server-provided Retry-After between attempts.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    /// Retry, but wait at least the server-provided interval (capped at
    /// [`MAX_RETRY_AFTER`]).
    RetryAfter(Duration),
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded { attempts: usize, last: E },
    /// The cancellation token fired while waiting between attempts.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Scale each backoff by a random factor in `0.75..=1.25`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_submission()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
            jitter: false,
        }
    }

    /// Batch submission: three attempts, 1s doubling up to 10s, jittered.
    pub fn for_submission() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Executes the operation with the configured retry policy. `op` receives
    /// the 1-based attempt number.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            match op(attempt + 1).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    let delay = match classify(&err) {
                        RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                        RetryDisposition::Retry => self.backoff_delay(attempt),
                        RetryDisposition::RetryAfter(hint) => {
                            hint.min(MAX_RETRY_AFTER).max(self.backoff_delay(attempt))
                        }
                    };

                    if attempt + 1 >= self.max_attempts {
                        return Err(RetryError::AttemptsExceeded {
                            attempts: attempt + 1,
                            last: err,
                        });
                    }

                    if !sleep_or_cancel(delay, cancel).await {
                        return Err(RetryError::Cancelled);
                    }
                    attempt += 1;
                }
            }
        }
    }

    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = 1u128 << attempt.min(6);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis()) as u64;

        if self.jitter {
            let scale = rand::thread_rng().gen_range(0.75..=1.25);
            Duration::from_millis((capped as f64 * scale) as u64)
        } else {
            Duration::from_millis(capped)
        }
    }
}

/// Sleeps for `delay` unless `cancel` fires first. Returns `false` on cancellation.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}
