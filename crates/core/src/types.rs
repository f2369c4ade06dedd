//! The unified wire format shared by the inbound client API and every
//! outbound provider adapter. Vendor-specific shapes are translated to and
//! from these types at the adapter boundary; nothing above the adapter
//! layer ever sees a vendor-native field name.

use serde::{Deserialize, Serialize};

/// A role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// Token accounting for a completed (non-streaming) request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Unified chat request. `stream` is read by the dispatcher to decide
/// between `chat` and `chat_stream`; adapters receive the same struct
/// either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Validates the invariants from the data model: non-empty model,
    /// non-empty messages, numeric bounds on the sampling parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        if self.messages.is_empty() {
            return Err("messages must not be empty".to_string());
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(format!("temperature must be in [0, 2], got {t}"));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(format!("top_p must be in [0, 1], got {p}"));
            }
        }
        if let Some(stop) = &self.stop {
            if stop.len() > 4 {
                return Err("stop supports at most 4 sequences".to_string());
            }
        }
        Ok(())
    }

    /// Whether a response to this request is a candidate for caching at
    /// all (streaming requests are never cached; see `Cache::set`).
    pub fn is_cacheable_shape(&self) -> bool {
        !self.stream && self.temperature.unwrap_or(0.0) <= 0.5
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: FinishReason,
}

/// Unified (non-streaming) chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

impl ChatResponse {
    pub fn new(id: String, model: String, choices: Vec<Choice>, usage: Usage) -> Self {
        Self {
            id,
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model,
            choices,
            usage,
        }
    }
}

/// A streamed delta: the first frame for a choice carries `role`,
/// subsequent frames carry only `content` increments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// One frame of a streaming chat response. A stream is a sequence of these
/// frames followed by the literal sentinel `[DONE]` (not itself a `StreamFrame`
/// value — see `gateway-core::sse::DONE`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFrame {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl StreamFrame {
    fn new(id: &str, model: &str, choice: ChunkChoice) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![choice],
        }
    }

    pub fn role_frame(id: &str, model: &str, role: Role) -> Self {
        Self::new(
            id,
            model,
            ChunkChoice {
                index: 0,
                delta: Delta {
                    role: Some(role),
                    content: None,
                },
                finish_reason: None,
            },
        )
    }

    pub fn content_frame(id: &str, model: &str, content: impl Into<String>) -> Self {
        Self::new(
            id,
            model,
            ChunkChoice {
                index: 0,
                delta: Delta {
                    role: None,
                    content: Some(content.into()),
                },
                finish_reason: None,
            },
        )
    }

    pub fn finish_frame(id: &str, model: &str, reason: FinishReason) -> Self {
        Self::new(
            id,
            model,
            ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(reason),
            },
        )
    }
}

/// Legacy text-prompt completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
}

impl CompletionRequest {
    /// Legacy completions are translated into a single-message chat
    /// request before being dispatched to a provider (§4.1).
    pub fn into_chat_request(self) -> ChatRequest {
        ChatRequest {
            model: self.model,
            messages: vec![Message::user(self.prompt)],
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stop: self.stop,
            stream: self.stream,
            tools: None,
            response_format: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub text: String,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

impl CompletionResponse {
    /// Surfaces `choices[0].message.content` from a chat response as
    /// `choices[0].text` (§4.1 completion()).
    pub fn from_chat_response(resp: ChatResponse) -> Self {
        Self {
            id: resp.id,
            object: "text_completion".to_string(),
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|c| CompletionChoice {
                    index: c.index,
                    text: c.message.content,
                    finish_reason: c.finish_reason,
                })
                .collect(),
            usage: resp.usage,
        }
    }
}

/// Either a single input string or a batch, matching the OpenAI embeddings
/// request shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            EmbeddingInput::Single(s) => vec![s],
            EmbeddingInput::Batch(v) => v,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: EmbeddingInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingData {
    pub index: u32,
    pub embedding: Vec<f32>,
    pub object: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub object: String,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub usage: Usage,
}

/// One entry in the `/v1/models` catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub owned_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

impl ModelListResponse {
    pub fn new(models: Vec<ModelInfo>) -> Self {
        Self {
            object: "list".to_string(),
            data: models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_rejects_empty_messages() {
        let req = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![],
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            stream: false,
            tools: None,
            response_format: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn chat_request_rejects_out_of_range_temperature() {
        let mut req = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![Message::user("hi")],
            temperature: Some(3.0),
            top_p: None,
            max_tokens: None,
            stop: None,
            stream: false,
            tools: None,
            response_format: None,
        };
        assert!(req.validate().is_err());
        req.temperature = Some(0.7);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn cacheable_shape_excludes_streaming_and_high_temperature() {
        let mut req = ChatRequest {
            model: "m".to_string(),
            messages: vec![Message::user("hi")],
            temperature: Some(0.9),
            top_p: None,
            max_tokens: None,
            stop: None,
            stream: false,
            tools: None,
            response_format: None,
        };
        assert!(!req.is_cacheable_shape());
        req.temperature = Some(0.1);
        assert!(req.is_cacheable_shape());
        req.stream = true;
        assert!(!req.is_cacheable_shape());
    }

    #[test]
    fn completion_request_translates_to_single_user_message() {
        let req = CompletionRequest {
            model: "m".to_string(),
            prompt: "hello".to_string(),
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            stream: false,
        };
        let chat = req.into_chat_request();
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].role, Role::User);
        assert_eq!(chat.messages[0].content, "hello");
    }
}
