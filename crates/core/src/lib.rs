//! Unified request/response types, the `ProviderAdapter` contract, and the
//! error taxonomy shared by every other crate in the gateway.

pub mod adapter;
pub mod error;
pub mod types;

pub use adapter::{AdapterResult, FrameStream, ProviderAdapter};
pub use error::{ErrorType, GatewayError, ProviderError, Result};
pub use types::{
    ChatRequest, ChatResponse, Choice, ChunkChoice, CompletionChoice, CompletionRequest,
    CompletionResponse, Delta, EmbeddingData, EmbeddingInput, EmbeddingRequest, EmbeddingResponse,
    FinishReason, Message, ModelInfo, ModelListResponse, Role, StreamFrame, Usage,
};
