//! Application state (§9 design notes: "explicit dependency injection" in
//! place of global singletons). Built once at startup in `main.rs` and
//! cloned (cheaply — every field is an `Arc`) into every axum handler.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use metrics_exporter_prometheus::PrometheusHandle;

use llm_gateway_cache::Cache;
use llm_gateway_config::Settings;
use llm_gateway_ratelimit::RateLimiter;
use llm_gateway_router::Router;

/// Shared state across all handlers. `Settings` is wrapped in a lock so a
/// future hot-reload endpoint could swap it in place, matching the
/// teacher's `Arc<RwLock<Settings>>` convention for the same reason.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub router: Arc<Router>,
    pub cache: Arc<Cache>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Known API keys when auth is enabled; `None` means auth is off and
    /// every request is admitted (§6 Auth: "Optional").
    pub api_keys: Option<Arc<HashSet<String>>>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Takes `cache`/`rate_limiter` already wrapped in `Arc` so a caller
    /// that spawned a background sweeper task against the same `Arc` (as
    /// `main.rs` does) shares state with the handlers instead of sweeping
    /// a second, disconnected instance.
    pub fn new(
        config: Settings,
        router: Router,
        cache: Arc<Cache>,
        rate_limiter: Arc<RateLimiter>,
        api_keys: Option<HashSet<String>>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            router: Arc::new(router),
            cache,
            rate_limiter,
            api_keys: api_keys.map(Arc::new),
            metrics_handle,
        }
    }
}
