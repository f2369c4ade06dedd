//! The `ProviderAdapter` trait (§4.3): the contract every vendor-specific
//! adapter implements, and the one every layer above it (resilience,
//! router, dispatcher) depends on instead of a concrete vendor type.
//!
//! Adapters only ever fail with a `ProviderError` — vendor-HTTP-status
//! level detail. The gateway-level `GatewayError` taxonomy (circuit open,
//! rate limited, ...) is assembled one layer up, in
//! `gateway-resilience::ResilientProvider`.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ProviderError;
use crate::types::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelInfo, StreamFrame,
};

pub type AdapterResult<T> = std::result::Result<T, ProviderError>;

/// A single frame in a translated stream, or a terminal error. The
/// dispatcher consumes this uniformly regardless of whether the adapter
/// passes bytes through (OpenAI) or translates a vendor-native dialect
/// (Ollama NDJSON) — the "frame producer" abstraction from §9.
pub type FrameStream = BoxStream<'static, AdapterResult<StreamFrame>>;

/// One adapter per vendor. Implementations own no resilience logic of
/// their own (no retry, no circuit breaking) — that is layered on top by
/// `gateway-resilience::ResilientProvider`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable adapter name, e.g. `"openai"`, `"anthropic"`, `"ollama"`.
    fn name(&self) -> &'static str;

    /// Non-streaming chat completion.
    async fn chat(&self, req: &ChatRequest) -> AdapterResult<ChatResponse>;

    /// Streaming chat completion. Returns a stream of unified frames;
    /// translation (if any) has already happened by the time frames are
    /// yielded.
    async fn chat_stream(&self, req: &ChatRequest) -> AdapterResult<FrameStream>;

    /// Embeddings. Adapters that cannot serve this (Anthropic) return a
    /// `501`-coded `ProviderError`.
    async fn embedding(&self, req: &EmbeddingRequest) -> AdapterResult<EmbeddingResponse>;

    /// The adapter's model catalog, used by the router for exact-ID match
    /// and by `/v1/models` for the union listing.
    fn list_models(&self) -> Vec<ModelInfo>;

    /// Whether `model` is served by this adapter: a catalog hit or a
    /// prefix-table hit (§4.2).
    fn supports_model(&self, model: &str) -> bool;

    /// Cheap readiness probe. Bypasses the circuit breaker (§4.3).
    async fn health_check(&self) -> AdapterResult<()>;
}
