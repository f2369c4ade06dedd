//! LLM Inference Gateway entry point
//!
//! Loads configuration, builds one resilient provider per configured
//! vendor, wires the cache and rate limiter, and serves the axum router
//! with graceful shutdown.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use llm_gateway_cache::{Cache, CacheBackendKind, CacheConfig};
use llm_gateway_config::{load_settings, CacheBackendSetting, ProviderSettings, Settings};
use llm_gateway_providers::{
    build_client, AnthropicAdapter, AnthropicConfig, ConnectionPoolConfig, OllamaAdapter,
    OllamaConfig, OpenAiAdapter, OpenAiConfig,
};
use llm_gateway_ratelimit::{RateLimiter, RateLimiterConfig};
use llm_gateway_resilience::{CircuitBreakerConfig, ResilientProvider, RetryConfig};
use llm_gateway_router::Router as GatewayRouter;
use llm_gateway_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("GATEWAY_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: failed to load config: {e}. Using defaults.");
            Settings::default()
        }
    };

    init_tracing(&config);
    tracing::info!("Starting LLM gateway v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = init_metrics();
    tracing::info!("Initialized Prometheus metrics at /metrics");

    let pool_config = ConnectionPoolConfig {
        max_idle_conns: config.connection_pool.max_idle_conns,
        max_idle_per_host: config.connection_pool.max_idle_per_host,
        idle_timeout: config.connection_pool.idle_timeout(),
    };
    let client = build_client(pool_config)?;

    let router = build_router(&config, client);
    tracing::info!(
        providers = router.providers().len(),
        "Registered provider adapters"
    );

    let cache_config = CacheConfig {
        enabled: config.cache.enabled,
        ttl: config.cache.ttl(),
        backend: match config.cache.backend {
            CacheBackendSetting::InProcess => CacheBackendKind::InProcess,
            CacheBackendSetting::External => CacheBackendKind::External,
        },
        max_entries: config.cache.max_entries,
        sweep_interval: Duration::from_secs(60),
    };
    if matches!(config.cache.backend, CacheBackendSetting::External)
        && config.cache.external_store_address.is_none()
    {
        tracing::warn!(
            "cache.backend is 'external' but no external_store_address is configured; falling back to in-process"
        );
    }
    let cache = Arc::new(Cache::new(cache_config, None));
    cache.spawn_sweeper();

    let rate_limiter_config = RateLimiterConfig {
        enabled: config.rate_limit.enabled,
        requests_per_min: config.rate_limit.requests_per_min,
        burst_size: config.rate_limit.burst_size,
        cleanup_interval: config.rate_limit.cleanup_interval(),
    };
    let rate_limiter = Arc::new(RateLimiter::new(rate_limiter_config));
    spawn_rate_limiter_sweeper(rate_limiter.clone(), config.rate_limit.cleanup_interval());

    let api_keys = load_api_keys();

    let state = AppState::new(
        config.clone(),
        router,
        cache,
        rate_limiter,
        api_keys,
        metrics_handle,
    );

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Registers one `ResilientProvider` per configured vendor (§4.2, §4.3).
/// Adapters are matched to vendor behavior by the `providers` map key —
/// `openai`-compatible, `anthropic`, and `ollama` are the three dialects
/// this gateway speaks.
fn build_router(config: &Settings, client: reqwest::Client) -> GatewayRouter {
    let default_provider = if config.providers.contains_key(&config.default_provider) {
        Some(config.default_provider.clone())
    } else {
        None
    };
    let mut router = GatewayRouter::new(default_provider);

    let breaker_config = CircuitBreakerConfig {
        failure_threshold: config.circuit_breaker.failure_threshold,
        success_threshold: config.circuit_breaker.success_threshold,
        timeout: config.circuit_breaker.timeout(),
        max_half_open_requests: config.circuit_breaker.max_half_open_requests,
    };
    let retry_config = RetryConfig {
        max_retries: if config.retry.enabled {
            config.retry.max_retries
        } else {
            0
        },
        initial_backoff: config.retry.initial_backoff(),
        max_backoff: config.retry.max_backoff(),
        multiplier: config.retry.multiplier,
        jitter: 0.2,
    };

    for (name, settings) in &config.providers {
        let adapter: Arc<dyn llm_gateway_core::ProviderAdapter> = match name.as_str() {
            "openai" => Arc::new(OpenAiAdapter::new(
                openai_config(settings),
                client.clone(),
            )),
            "anthropic" => Arc::new(AnthropicAdapter::new(
                anthropic_config(settings),
                client.clone(),
            )),
            "ollama" => Arc::new(OllamaAdapter::new(ollama_config(settings), client.clone())),
            other => {
                tracing::warn!(provider = other, "unknown provider name in config, skipping");
                continue;
            }
        };
        router.register(Arc::new(ResilientProvider::new(
            adapter,
            breaker_config,
            retry_config,
            settings.timeout(),
        )));
    }

    router
}

fn openai_config(settings: &ProviderSettings) -> OpenAiConfig {
    OpenAiConfig {
        api_key: settings.api_key.clone().unwrap_or_default(),
        base_url: settings.base_url.clone(),
        timeout: settings.timeout(),
    }
}

fn anthropic_config(settings: &ProviderSettings) -> AnthropicConfig {
    AnthropicConfig {
        api_key: settings.api_key.clone().unwrap_or_default(),
        base_url: settings.base_url.clone(),
        version: settings
            .version
            .clone()
            .unwrap_or_else(|| "2023-06-01".to_string()),
        timeout: settings.timeout(),
    }
}

fn ollama_config(settings: &ProviderSettings) -> OllamaConfig {
    OllamaConfig {
        base_url: settings.base_url.clone(),
        timeout: settings.timeout(),
    }
}

fn spawn_rate_limiter_sweeper(limiter: Arc<RateLimiter>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = limiter.sweep_idle();
            if removed > 0 {
                tracing::debug!(removed, "rate limiter: swept idle buckets");
            }
        }
    });
}

/// API keys are supplied via `GATEWAY__AUTH__KEYS` as a comma-separated
/// list; auth is disabled (every request admitted) when unset (§6 Auth).
fn load_api_keys() -> Option<HashSet<String>> {
    std::env::var("GATEWAY__AUTH__KEYS").ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

#[cfg(feature = "telemetry")]
fn init_tracing(config: &Settings) {
    use opentelemetry_otlp::WithExportConfig;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("llm_gateway={level},tower_http=debug").into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let otlp_endpoint = std::env::var("GATEWAY_OTLP_ENDPOINT").ok();
    if let Some(endpoint) = otlp_endpoint {
        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(&endpoint))
            .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(
                opentelemetry_sdk::Resource::new(vec![
                    opentelemetry::KeyValue::new("service.name", "llm-gateway"),
                    opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ]),
            ))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(tracer) => {
                let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                subscriber.with(fmt_layer).with(otel_layer).init();
                tracing::info!(endpoint = %endpoint, "OpenTelemetry tracing enabled");
                return;
            }
            Err(e) => eprintln!("Failed to initialize OpenTelemetry: {e}. Falling back."),
        }
    }
    subscriber.with(fmt_layer).init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("llm_gateway={level},tower_http=debug").into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
