//! Observability scrape endpoint (§6 `/metrics`). The core only emits
//! metrics through the `metrics` facade — it never operates the backend
//! that stores them (§1 Out of scope) — so this module's only job is to
//! install a process-local Prometheus recorder and render its buffer.

use std::sync::OnceLock;

use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global recorder on first call; later calls (e.g. several
/// `AppState`s built in one process, as integration tests do) reuse the
/// same handle instead of panicking on a second global-recorder install.
pub fn init_metrics() -> PrometheusHandle {
    RECORDER
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics_handle.render()
}
