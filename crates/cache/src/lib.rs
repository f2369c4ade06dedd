//! Fingerprint-keyed response cache (§4.4).

mod cache;
mod fingerprint;
mod store;

pub use cache::{Cache, CacheBackendKind, CacheConfig, CacheLookup};
pub use fingerprint::fingerprint;
pub use store::{ExternalCacheBackend, InProcessCache};
