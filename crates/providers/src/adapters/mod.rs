pub mod anthropic;
pub mod ollama;
pub mod openai;

pub use anthropic::{AnthropicAdapter, AnthropicConfig};
pub use ollama::{OllamaAdapter, OllamaConfig};
pub use openai::{OpenAiAdapter, OpenAiConfig};
