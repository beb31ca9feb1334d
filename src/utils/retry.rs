use std::future::Future;

/// Verdict of one attempt. Both variants carry the attempt's value so the
/// caller always gets the best-known result back, even when attempts run out.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    Retry(T),
}

#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Attempts actually made, 1-based
    pub attempts: u32,
    /// Whether the last attempt returned `Done`
    pub settled: bool,
}

/// Runs an operation at most `max_attempts` times, sequentially.
#[derive(Debug, Clone, Copy)]
pub struct BoundedRetry {
    max_attempts: u32,
}

impl BoundedRetry {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Attempt::Done(value) => {
                    return RetryOutcome {
                        value,
                        attempts: attempt,
                        settled: true,
                    };
                }
                Attempt::Retry(value) if attempt >= self.max_attempts => {
                    return RetryOutcome {
                        value,
                        attempts: attempt,
                        settled: false,
                    };
                }
                Attempt::Retry(_) => {
                    tracing::debug!("Attempt {}/{} not settled, retrying", attempt, self.max_attempts);
                    attempt += 1;
                }
            }
        }
    }
}
