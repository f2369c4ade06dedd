//! HTTP Endpoints (§6)
//!
//! REST API for the LLM inference gateway: OpenAI-compatible chat,
//! completion, embedding and model-listing routes, the Anthropic-dialect
//! messages route, and the health/readiness/metrics trio.

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::dispatcher;
use crate::metrics::metrics_handler;
use crate::state::AppState;

/// Builds the full application router. `/health`, `/ready` and `/metrics`
/// sit outside the auth/rate-limit middleware stack — they are operator
/// endpoints, not client-facing API surface (§6).
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/v1/chat/completions", post(dispatcher::chat_completions))
        .route("/v1/completions", post(dispatcher::completions))
        .route("/v1/embeddings", post(dispatcher::embeddings))
        .route("/v1/models", get(dispatcher::list_models))
        .route("/v1/messages", post(dispatcher::anthropic_messages))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let ops = Router::new()
        .route("/health", get(dispatcher::health))
        .route("/ready", get(dispatcher::ready))
        .route("/metrics", get(metrics_handler));

    api.merge(ops)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CatchPanicLayer::new())
        .layer(build_cors_layer())
        .with_state(state)
}

/// Permissive CORS (§6): any origin, the methods the API surface uses, and
/// the headers a client might authenticate with.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_gateway_cache::{Cache, CacheConfig};
    use llm_gateway_config::Settings;
    use llm_gateway_ratelimit::{RateLimiter, RateLimiterConfig};
    use llm_gateway_router::Router as GatewayRouter;

    #[test]
    fn router_builds_without_panicking() {
        let state = AppState::new(
            Settings::default(),
            GatewayRouter::new(None),
            std::sync::Arc::new(Cache::new(CacheConfig::default(), None)),
            std::sync::Arc::new(RateLimiter::new(RateLimiterConfig::default())),
            None,
            crate::metrics::init_metrics(),
        );
        let _ = create_router(state);
    }
}
