//! Shared, process-wide HTTP client (§2 ConnectionPool). One instance is
//! built at startup and cloned (cheaply — `reqwest::Client` is an `Arc`
//! internally) into every adapter.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ConnectionPoolConfig {
    pub max_idle_conns: usize,
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_conns: 100,
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Builds the shared `reqwest::Client`. `reqwest` only exposes
/// per-host idle caps and a pool-wide idle timeout, not a separate
/// global idle-connection cap or a distinct max-active-per-host limit —
/// `max_idle_conns` is folded into `max_idle_per_host` and per-request
/// concurrency is left to the semaphore-like backpressure of the
/// resilience layer rather than a hard connection ceiling.
pub fn build_client(config: ConnectionPoolConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(config.idle_timeout)
        .build()
}
