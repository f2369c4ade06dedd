//! Token-bucket rate limiter, keyed by client identity (§4.5).

mod bucket;
mod limiter;

pub use limiter::{RateLimitDecision, RateLimiter, RateLimiterConfig};
