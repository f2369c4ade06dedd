//! Concrete provider adapters (§4.3) and the connection-pool/SSE plumbing
//! they share.

pub mod adapters;
pub mod pool;
pub mod sse;

pub use adapters::{
    AnthropicAdapter, AnthropicConfig, OllamaAdapter, OllamaConfig, OpenAiAdapter, OpenAiConfig,
};
pub use pool::{build_client, ConnectionPoolConfig};
