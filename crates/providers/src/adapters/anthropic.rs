//! Anthropic Messages API adapter (§4.3). System messages are hoisted into
//! the top-level `system` field; `max_tokens` defaults to 4096 since the
//! vendor requires it; stream events are translated into unified frames
//! (the spec permits passthrough-or-translation for this vendor, but the
//! gateway's `FrameStream` is typed as `StreamFrame`, not raw bytes, so
//! translation is the only option our abstraction admits — see DESIGN.md).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use llm_gateway_core::{
    AdapterResult, ChatRequest, ChatResponse, Choice, EmbeddingRequest, EmbeddingResponse,
    FinishReason, FrameStream, Message, ModelInfo, ProviderAdapter, ProviderError, Role,
    StreamFrame, Usage,
};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub version: String,
    pub timeout: Duration,
}

pub struct AnthropicAdapter {
    config: AnthropicConfig,
    client: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new(config: AnthropicConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn to_vendor_request(&self, req: &ChatRequest, stream: bool) -> VendorRequest {
        let mut system_parts = Vec::new();
        let mut messages = Vec::new();
        for m in &req.messages {
            if matches!(m.role, Role::System) {
                system_parts.push(m.content.clone());
            } else {
                messages.push(VendorMessage {
                    role: match m.role {
                        Role::Assistant => "assistant",
                        _ => "user",
                    }
                    .to_string(),
                    content: m.content.clone(),
                });
            }
        }

        VendorRequest {
            model: req.model.clone(),
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n"))
            },
            temperature: req.temperature,
            top_p: req.top_p,
            stop_sequences: req.stop.clone(),
            stream,
        }
    }

    fn request(&self) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.version)
            .timeout(self.config.timeout)
    }

    fn map_stop_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        }
    }

    async fn error_for_status(resp: reqwest::Response) -> AdapterResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ProviderError::new(status.as_u16(), "upstream_error", body))
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn chat(&self, req: &ChatRequest) -> AdapterResult<ChatResponse> {
        let vendor_req = self.to_vendor_request(req, false);
        let resp = self
            .request()
            .json(&vendor_req)
            .send()
            .await
            .map_err(|e| ProviderError::new(502, "network_error", e.to_string()))?;
        let resp = Self::error_for_status(resp).await?;

        let vendor_resp: VendorResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::new(502, "invalid_response", e.to_string()))?;

        let text: String = vendor_resp
            .content
            .iter()
            .filter(|c| c.block_type == "text")
            .filter_map(|c| c.text.clone())
            .collect();

        Ok(ChatResponse::new(
            format!("chatcmpl-{}", Uuid::new_v4()),
            vendor_resp.model,
            vec![Choice {
                index: 0,
                message: Message::assistant(text),
                finish_reason: Self::map_stop_reason(vendor_resp.stop_reason.as_deref()),
            }],
            Usage {
                prompt_tokens: vendor_resp.usage.input_tokens,
                completion_tokens: vendor_resp.usage.output_tokens,
                total_tokens: vendor_resp.usage.input_tokens + vendor_resp.usage.output_tokens,
            },
        ))
    }

    async fn chat_stream(&self, req: &ChatRequest) -> AdapterResult<FrameStream> {
        let vendor_req = self.to_vendor_request(req, true);
        let resp = self
            .request()
            .json(&vendor_req)
            .send()
            .await
            .map_err(|e| ProviderError::new(502, "network_error", e.to_string()))?;
        let resp = Self::error_for_status(resp).await?;

        let id = format!("chatcmpl-{}", Uuid::new_v4());
        let model = req.model.clone();

        Ok(Box::pin(async_stream::stream! {
            let mut bytes = resp.bytes_stream();
            let mut buffer = String::new();
            let mut role_sent = false;

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ProviderError::new(502, "network_error", e.to_string()));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim_end_matches('\r').to_string();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() {
                        continue;
                    }

                    let event: VendorStreamEvent = match serde_json::from_str(data) {
                        Ok(e) => e,
                        Err(_) => continue,
                    };

                    match event {
                        VendorStreamEvent::ContentBlockDelta { delta } => {
                            if let Some(text) = delta.text {
                                if !role_sent {
                                    yield Ok(StreamFrame::role_frame(&id, &model, Role::Assistant));
                                    role_sent = true;
                                }
                                yield Ok(StreamFrame::content_frame(&id, &model, text));
                            }
                        }
                        VendorStreamEvent::MessageDelta { delta } => {
                            yield Ok(StreamFrame::finish_frame(
                                &id,
                                &model,
                                AnthropicAdapter::map_stop_reason(delta.stop_reason.as_deref()),
                            ));
                        }
                        VendorStreamEvent::MessageStop => return,
                        _ => {}
                    }
                }
            }
        }))
    }

    async fn embedding(&self, _req: &EmbeddingRequest) -> AdapterResult<EmbeddingResponse> {
        Err(ProviderError::new(
            501,
            "not_supported",
            "Anthropic does not provide an embeddings endpoint",
        ))
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-3-5-sonnet-20241022".to_string(),
                object: "model".to_string(),
                owned_by: "anthropic".to_string(),
            },
            ModelInfo {
                id: "claude-3-opus-20240229".to_string(),
                object: "model".to_string(),
                owned_by: "anthropic".to_string(),
            },
        ]
    }

    fn supports_model(&self, model: &str) -> bool {
        model.starts_with("claude-")
    }

    async fn health_check(&self) -> AdapterResult<()> {
        let probe = ChatRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: vec![Message::user("ping")],
            temperature: None,
            top_p: None,
            max_tokens: Some(1),
            stop: None,
            stream: false,
            tools: None,
            response_format: None,
        };
        self.chat(&probe).await.map(|_| ())
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com".to_string(),
            version: ANTHROPIC_VERSION.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct VendorMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct VendorRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<VendorMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct VendorContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VendorUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct VendorResponse {
    model: String,
    content: Vec<VendorContentBlock>,
    stop_reason: Option<String>,
    usage: VendorUsage,
}

#[derive(Debug, Deserialize)]
struct VendorTextDelta {
    #[serde(rename = "type")]
    _delta_type: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VendorMessageDeltaBody {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum VendorStreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: VendorTextDelta },
    #[serde(rename = "message_delta")]
    MessageDelta { delta: VendorMessageDeltaBody },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_gateway_core::ChatRequest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(base_url: String) -> AnthropicAdapter {
        AnthropicAdapter::new(
            AnthropicConfig {
                api_key: "test-key".to_string(),
                base_url,
                version: ANTHROPIC_VERSION.to_string(),
                timeout: Duration::from_secs(5),
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn system_messages_are_hoisted_and_concatenated() {
        let adapter = adapter("http://localhost".to_string());
        let req = ChatRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: vec![
                Message {
                    role: Role::System,
                    content: "be terse".to_string(),
                    tool_call_id: None,
                    tool_calls: None,
                },
                Message {
                    role: Role::System,
                    content: "never apologize".to_string(),
                    tool_call_id: None,
                    tool_calls: None,
                },
                Message::user("hi"),
            ],
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            stream: false,
            tools: None,
            response_format: None,
        };

        let vendor_req = adapter.to_vendor_request(&req, false);
        assert_eq!(
            vendor_req.system,
            Some("be terse\nnever apologize".to_string())
        );
        assert_eq!(vendor_req.messages.len(), 1);
        assert_eq!(vendor_req.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn explicit_max_tokens_is_preserved() {
        let adapter = adapter("http://localhost".to_string());
        let mut req = ChatRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: vec![Message::user("hi")],
            temperature: None,
            top_p: None,
            max_tokens: Some(128),
            stop: None,
            stream: false,
            tools: None,
            response_format: None,
        };
        req.max_tokens = Some(128);
        assert_eq!(adapter.to_vendor_request(&req, false).max_tokens, 128);
    }

    #[tokio::test]
    async fn chat_concatenates_text_blocks_and_maps_stop_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "claude-3-5-sonnet-20241022",
                "content": [{"type": "text", "text": "hel"}, {"type": "text", "text": "lo"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 3, "output_tokens": 2}
            })))
            .mount(&server)
            .await;

        let req = ChatRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: vec![Message::user("hi")],
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            stream: false,
            tools: None,
            response_format: None,
        };

        let resp = adapter(server.uri()).chat(&req).await.unwrap();
        assert_eq!(resp.choices[0].message.content, "hello");
        assert_eq!(resp.choices[0].finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn embedding_is_not_supported() {
        let a = adapter("http://localhost".to_string());
        let req = EmbeddingRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            input: llm_gateway_core::EmbeddingInput::Single("hi".to_string()),
        };
        let err = a.embedding(&req).await.unwrap_err();
        assert_eq!(err.status_code, 501);
    }
}
