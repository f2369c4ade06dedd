//! LLM Inference Gateway server
//!
//! axum-based HTTP front door (§6): the Dispatcher, auth/rate-limit
//! middleware, the Prometheus scrape endpoint, and router assembly.

pub mod anthropic_dialect;
pub mod auth;
pub mod dispatcher;
pub mod http;
pub mod metrics;
pub mod state;

pub use auth::auth_middleware;
pub use dispatcher::error_response;
pub use http::create_router;
pub use metrics::init_metrics;
pub use state::AppState;
