//! Composes a `ProviderAdapter` with a `CircuitBreaker` and a `Retryer`
//! into something presenting the same operations as a plain adapter, but
//! resolving to the gateway-level error taxonomy (§4.8). Composition
//! order: `CircuitBreaker.execute(() -> Retryer.run(() -> Adapter.op()))` —
//! the breaker gates the entire retry sequence for one logical request,
//! the retryer is what actually calls the adapter.

use std::sync::Arc;
use std::time::Duration;

use llm_gateway_core::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FrameStream, GatewayError,
    ModelInfo, ProviderAdapter, ProviderError, Result,
};

use crate::circuit_breaker::{BreakerOutcome, CircuitBreaker, CircuitBreakerConfig, CircuitError};
use crate::retryer::{RetryConfig, Retryer};

fn map_outcome<T>(
    name: &str,
    outcome: std::result::Result<T, BreakerOutcome<ProviderError>>,
) -> Result<T> {
    match outcome {
        Ok(v) => Ok(v),
        Err(BreakerOutcome::Refused(CircuitError::Open)) => {
            Err(GatewayError::CircuitOpen(name.to_string()))
        }
        Err(BreakerOutcome::Refused(CircuitError::HalfOpenSaturated)) => {
            Err(GatewayError::CircuitHalfOpenSaturated(name.to_string()))
        }
        Err(BreakerOutcome::Inner(e)) => Err(GatewayError::Provider(e)),
    }
}

/// Wraps one vendor adapter with resilience. Exposes the same operation
/// names as `ProviderAdapter` but is not itself a `ProviderAdapter` impl:
/// its errors are the gateway-level taxonomy (circuit open, timeout, ...),
/// one level above the raw `ProviderError` the adapter trait deals in.
pub struct ResilientProvider {
    adapter: Arc<dyn ProviderAdapter>,
    breaker: CircuitBreaker,
    retryer: Retryer,
    timeout: Duration,
}

impl ResilientProvider {
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        breaker_config: CircuitBreakerConfig,
        retry_config: RetryConfig,
        timeout: Duration,
    ) -> Self {
        let name = adapter.name().to_string();
        Self {
            adapter,
            breaker: CircuitBreaker::new(name, breaker_config),
            retryer: Retryer::new(retry_config),
            timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn inner(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.adapter.list_models()
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.adapter.supports_model(model)
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<T, ProviderError>>,
    ) -> std::result::Result<T, ProviderError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::new(
                504,
                "timeout",
                format!(
                    "provider {} timed out after {:?}",
                    self.adapter.name(),
                    self.timeout
                ),
            )),
        }
    }

    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let adapter = &self.adapter;
        let outcome = self
            .breaker
            .execute(|| {
                self.retryer.run(
                    |attempt| {
                        if attempt > 0 {
                            tracing::debug!(provider = %adapter.name(), attempt, "retrying chat call");
                        }
                        self.with_timeout(adapter.chat(req))
                    },
                    ProviderError::is_retryable,
                )
            })
            .await;
        map_outcome(self.adapter.name(), outcome)
    }

    /// Retry only covers obtaining the stream handle itself — once the
    /// adapter has returned `Ok(stream)`, bytes may already be visible to
    /// the client, so no further attempt is made (§4.8).
    pub async fn chat_stream(&self, req: &ChatRequest) -> Result<FrameStream> {
        let adapter = &self.adapter;
        let outcome = self
            .breaker
            .execute(|| {
                self.retryer
                    .run(|_attempt| adapter.chat_stream(req), ProviderError::is_retryable)
            })
            .await;
        map_outcome(self.adapter.name(), outcome)
    }

    pub async fn embedding(&self, req: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        let adapter = &self.adapter;
        let outcome = self
            .breaker
            .execute(|| {
                self.retryer.run(
                    |_attempt| self.with_timeout(adapter.embedding(req)),
                    ProviderError::is_retryable,
                )
            })
            .await;
        map_outcome(self.adapter.name(), outcome)
    }

    /// Health checks bypass the circuit breaker entirely (§4.3).
    pub async fn health_check(&self) -> Result<()> {
        self.adapter
            .health_check()
            .await
            .map_err(GatewayError::Provider)
    }
}
