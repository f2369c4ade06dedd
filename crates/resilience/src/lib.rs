//! The resilience engine: circuit breaker, bounded retry with jitter, and
//! the `ResilientProvider` composition that wraps every upstream call
//! (§4.6–§4.8).

pub mod circuit_breaker;
pub mod resilient_provider;
pub mod retryer;

pub use circuit_breaker::{BreakerOutcome, CircuitBreaker, CircuitBreakerConfig, CircuitError};
pub use resilient_provider::ResilientProvider;
pub use retryer::{RetryConfig, Retryer};
