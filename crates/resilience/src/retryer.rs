//! Bounded exponential backoff with jitter (§4.7). Retries are attempted
//! only for errors the caller classifies as retryable; cancellation is
//! honored implicitly — in async Rust, dropping the future that owns a
//! `Retryer::run` call (e.g. because the client disconnected and the
//! handler task was aborted) cancels any pending backoff sleep at the next
//! await point, with no explicit context object required (see DESIGN.md).

use std::future::Future;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

pub struct Retryer {
    config: RetryConfig,
}

impl Retryer {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.config.initial_backoff.as_secs_f64()
            * self.config.multiplier.powi(attempt as i32);
        let capped = base.min(self.config.max_backoff.as_secs_f64());
        let jitter_span = capped * self.config.jitter;
        let jittered = if jitter_span > 0.0 {
            let delta = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
            (capped + delta).max(0.0)
        } else {
            capped
        };
        Duration::from_secs_f64(jittered)
    }

    /// Runs `f` up to `max_retries + 1` times total. `classify` decides
    /// whether a given error is worth another attempt; the first
    /// non-retryable error (or exhaustion of the attempt budget) is
    /// returned as-is.
    pub async fn run<F, Fut, T, E>(&self, mut f: F, classify: impl Fn(&E) -> bool) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match f(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.config.max_retries && classify(&e) => {
                    let wait = self.backoff_for(attempt);
                    tracing::debug!(attempt, ?wait, "retryer: scheduling retry");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn non_retryable_error_runs_exactly_once() {
        let retryer = Retryer::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), &'static str> = retryer
            .run(
                move |_| {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err("non_retryable")
                    }
                },
                |_| false,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_error_runs_max_retries_plus_one_times() {
        let retryer = Retryer::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), &'static str> = retryer
            .run(
                move |_| {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err("retryable")
                    }
                },
                |_| true,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let retryer = Retryer::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<&'static str, &'static str> = retryer
            .run(
                move |attempt| {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        if attempt < 2 {
                            Err("retryable")
                        } else {
                            Ok("ok")
                        }
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let retryer = Retryer::new(RetryConfig {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            multiplier: 2.0,
            jitter: 0.0,
        });
        assert_eq!(retryer.backoff_for(0), Duration::from_millis(100));
        assert_eq!(retryer.backoff_for(1), Duration::from_millis(200));
        assert_eq!(retryer.backoff_for(2), Duration::from_millis(300));
        assert_eq!(retryer.backoff_for(3), Duration::from_millis(300));
    }
}
