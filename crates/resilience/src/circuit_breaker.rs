//! Per-provider circuit breaker (§4.6): closed → open → half_open → closed,
//! guarded by a single lock per breaker instance. The lock covers only
//! state inspection and transition; the wrapped call always runs unlocked
//! (§5 locking discipline).

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub max_half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            max_half_open_requests: 1,
        }
    }
}

/// The outcome of asking the breaker for admission, distinct from the
/// wrapped function's own error type so the dispatcher can tell "we
/// refused to call upstream" apart from "upstream failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CircuitError {
    #[error("circuit open")]
    Open,
    #[error("half-open probe slots saturated")]
    HalfOpenSaturated,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_time: Option<Instant>,
    half_open_in_flight: u32,
}

/// One breaker instance per provider. Cheap to clone (wraps an `Arc`
/// internally is the caller's responsibility — the breaker itself is
/// typically held behind an `Arc<CircuitBreaker>` alongside its adapter).
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

/// What the caller should do once a call has been admitted.
enum Admission {
    Allowed { as_probe: bool },
    Refused(CircuitError),
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure_time: None,
                half_open_in_flight: 0,
            }),
        }
    }

    fn admit(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => Admission::Allowed { as_probe: false },
            State::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map(|t| t.elapsed() >= self.config.timeout)
                    .unwrap_or(false);
                if elapsed {
                    inner.state = State::HalfOpen;
                    inner.half_open_in_flight = 1;
                    inner.consecutive_successes = 0;
                    tracing::info!(provider = %self.name, "circuit breaker: open -> half_open");
                    Admission::Allowed { as_probe: true }
                } else {
                    Admission::Refused(CircuitError::Open)
                }
            }
            State::HalfOpen => {
                if inner.half_open_in_flight < self.config.max_half_open_requests {
                    inner.half_open_in_flight += 1;
                    Admission::Allowed { as_probe: true }
                } else {
                    Admission::Refused(CircuitError::HalfOpenSaturated)
                }
            }
        }
    }

    fn on_outcome(&self, as_probe: bool, success: bool) {
        let mut inner = self.inner.lock();
        if as_probe {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
        if success {
            match inner.state {
                State::Closed => {
                    inner.consecutive_failures = 0;
                }
                State::HalfOpen => {
                    inner.consecutive_successes += 1;
                    if inner.consecutive_successes >= self.config.success_threshold {
                        inner.state = State::Closed;
                        inner.consecutive_failures = 0;
                        inner.consecutive_successes = 0;
                        tracing::info!(provider = %self.name, "circuit breaker: half_open -> closed");
                    }
                }
                State::Open => {}
            }
        } else {
            match inner.state {
                State::Closed => {
                    inner.consecutive_failures += 1;
                    inner.last_failure_time = Some(Instant::now());
                    if inner.consecutive_failures >= self.config.failure_threshold {
                        inner.state = State::Open;
                        tracing::warn!(provider = %self.name, "circuit breaker: closed -> open");
                    }
                }
                State::HalfOpen => {
                    inner.state = State::Open;
                    inner.last_failure_time = Some(Instant::now());
                    inner.consecutive_successes = 0;
                    tracing::warn!(provider = %self.name, "circuit breaker: half_open -> open");
                }
                State::Open => {}
            }
        }
    }

    /// Runs `f` if the breaker admits the call, updating state from the
    /// outcome. `f`'s own error type `E` is threaded through unchanged; the
    /// breaker only ever injects its own `CircuitError` when it refuses
    /// admission outright.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerOutcome<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let as_probe = match self.admit() {
            Admission::Allowed { as_probe } => as_probe,
            Admission::Refused(e) => return Err(BreakerOutcome::Refused(e)),
        };

        match f().await {
            Ok(v) => {
                self.on_outcome(as_probe, true);
                Ok(v)
            }
            Err(e) => {
                self.on_outcome(as_probe, false);
                Err(BreakerOutcome::Inner(e))
            }
        }
    }

    /// Forces the breaker closed and zeros its counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.half_open_in_flight = 0;
        inner.last_failure_time = None;
    }

    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().state, State::Open)
    }
}

#[derive(Debug)]
pub enum BreakerOutcome<E> {
    Refused(CircuitError),
    Inner(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn cfg() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            timeout: Duration::from_millis(50),
            max_half_open_requests: 1,
        }
    }

    #[tokio::test]
    async fn opens_after_failure_threshold_and_fails_fast() {
        let breaker = CircuitBreaker::new("test", cfg());
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let r: Result<(), BreakerOutcome<&'static str>> = breaker
                .execute(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("boom")
                })
                .await;
            assert!(matches!(r, Err(BreakerOutcome::Inner(_))));
        }
        assert!(breaker.is_open());

        let calls2 = calls.clone();
        let r: Result<(), BreakerOutcome<&'static str>> = breaker
            .execute(|| async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(r, Err(BreakerOutcome::Refused(CircuitError::Open))));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "4th call must not invoke the wrapped fn");
    }

    #[tokio::test]
    async fn half_open_after_timeout_then_closes_on_successes() {
        let breaker = CircuitBreaker::new("test", cfg());
        for _ in 0..3 {
            let _: Result<(), BreakerOutcome<&'static str>> =
                breaker.execute(|| async { Err("boom") }).await;
        }
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(60)).await;

        let r: Result<(), BreakerOutcome<&'static str>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert!(r.is_ok());
        let r: Result<(), BreakerOutcome<&'static str>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert!(r.is_ok());
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn half_open_reopens_on_probe_failure() {
        let breaker = CircuitBreaker::new("test", cfg());
        for _ in 0..3 {
            let _: Result<(), BreakerOutcome<&'static str>> =
                breaker.execute(|| async { Err("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _: Result<(), BreakerOutcome<&'static str>> =
            breaker.execute(|| async { Err("still broken") }).await;
        assert!(breaker.is_open());
    }

    #[test]
    fn reset_forces_closed() {
        let breaker = CircuitBreaker::new("test", cfg());
        {
            let mut inner = breaker.inner.lock();
            inner.state = State::Open;
            inner.consecutive_failures = 10;
        }
        breaker.reset();
        assert!(!breaker.is_open());
    }
}
