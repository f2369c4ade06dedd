//! Inbound Anthropic-dialect translation for `POST /v1/messages` (§6): the
//! client speaks Anthropic's Messages wire shape; the dispatcher converts
//! it to the unified `ChatRequest`/`ChatResponse` and back so the same
//! resilient-provider path serves it as `/v1/chat/completions`. This is
//! the inverse of `gateway-providers::adapters::anthropic`'s outbound
//! translation — hoisting `system` back into a message on the way in,
//! re-extracting it on the way out never applies because we're already
//! holding the unified shape by the time a response comes back.

use serde::{Deserialize, Serialize};

use llm_gateway_core::{ChatRequest, ChatResponse, FinishReason, Message, Role};

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessagesRequest {
    pub model: String,
    #[serde(default)]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
}

impl AnthropicMessagesRequest {
    /// Hoists `system` back into a leading system-role message — the
    /// mirror image of what `AnthropicAdapter::to_vendor_request` does
    /// when translating outbound (§8 invariant 3, read in reverse).
    pub fn into_chat_request(self) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = self.system {
            messages.push(Message {
                role: Role::System,
                content: system,
                tool_call_id: None,
                tool_calls: None,
            });
        }
        messages.extend(self.messages.into_iter().map(|m| Message {
            role: match m.role.as_str() {
                "assistant" => Role::Assistant,
                _ => Role::User,
            },
            content: m.content,
            tool_call_id: None,
            tool_calls: None,
        }));

        ChatRequest {
            model: self.model,
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: Some(self.max_tokens),
            stop: self.stop_sequences,
            stream: self.stream,
            tools: None,
            response_format: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnthropicContentBlock {
    #[serde(rename = "type")]
    pub block_type: &'static str,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct AnthropicMessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub response_type: &'static str,
    pub role: &'static str,
    pub content: Vec<AnthropicContentBlock>,
    pub model: String,
    pub stop_reason: &'static str,
    pub usage: AnthropicUsage,
}

impl From<ChatResponse> for AnthropicMessagesResponse {
    fn from(resp: ChatResponse) -> Self {
        let choice = resp.choices.into_iter().next();
        let (text, finish_reason) = match choice {
            Some(c) => (c.message.content, c.finish_reason),
            None => (String::new(), FinishReason::Stop),
        };
        Self {
            id: resp.id,
            response_type: "message",
            role: "assistant",
            content: vec![AnthropicContentBlock {
                block_type: "text",
                text,
            }],
            model: resp.model,
            stop_reason: match finish_reason {
                FinishReason::Stop => "end_turn",
                FinishReason::Length => "max_tokens",
                FinishReason::ToolCalls => "tool_use",
                FinishReason::ContentFilter => "end_turn",
            },
            usage: AnthropicUsage {
                input_tokens: resp.usage.prompt_tokens,
                output_tokens: resp.usage.completion_tokens,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_field_is_hoisted_into_a_leading_message() {
        let req = AnthropicMessagesRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            system: Some("be terse".to_string()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            max_tokens: 8,
            temperature: None,
            top_p: None,
            stop_sequences: None,
            stream: false,
        };
        let chat = req.into_chat_request();
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, Role::System);
        assert_eq!(chat.messages[0].content, "be terse");
        assert_eq!(chat.messages[1].role, Role::User);
    }
}
