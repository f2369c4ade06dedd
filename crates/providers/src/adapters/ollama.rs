//! Ollama native adapter (§4.3). Unlike OpenAI, the vendor dialect (NDJSON
//! chat, whitespace-based token estimates) does not match the unified
//! shape, so both chat and stream responses require real translation.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use llm_gateway_core::{
    AdapterResult, ChatRequest, ChatResponse, Choice, EmbeddingData, EmbeddingRequest,
    EmbeddingResponse, FinishReason, FrameStream, Message, ModelInfo, ProviderAdapter,
    ProviderError, Role, StreamFrame, Usage,
};

/// Known served model names — Ollama has no wildcard prefix convention,
/// so the router's fallback is the realistic way new local models get
/// served (§4.2: "a fixed set → Ollama").
const KNOWN_MODELS: &[&str] = &["llama3", "llama3.1", "mistral", "phi3", "gemma2"];

pub struct OllamaConfig {
    pub base_url: String,
    pub timeout: Duration,
}

pub struct OllamaAdapter {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaAdapter {
    pub fn new(config: OllamaConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn to_vendor_request(req: &ChatRequest, stream: bool) -> VendorChatRequest {
        VendorChatRequest {
            model: req.model.clone(),
            messages: req
                .messages
                .iter()
                .map(|m| VendorMessage {
                    role: match m.role {
                        Role::System => "system",
                        Role::Assistant => "assistant",
                        Role::Tool => "user",
                        Role::User => "user",
                    }
                    .to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream,
            options: VendorOptions {
                temperature: req.temperature,
                top_p: req.top_p,
                num_predict: req.max_tokens,
                stop: req.stop.clone(),
            },
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
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn chat(&self, req: &ChatRequest) -> AdapterResult<ChatResponse> {
        let vendor_req = Self::to_vendor_request(req, false);
        let resp = self
            .client
            .post(format!("{}/api/chat", self.config.base_url))
            .timeout(self.config.timeout)
            .json(&vendor_req)
            .send()
            .await
            .map_err(|e| ProviderError::new(502, "network_error", e.to_string()))?;
        let resp = Self::error_for_status(resp).await?;

        let vendor_resp: VendorChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::new(502, "invalid_response", e.to_string()))?;

        Ok(ChatResponse::new(
            format!("chatcmpl-{}", Uuid::new_v4()),
            vendor_resp.model,
            vec![Choice {
                index: 0,
                message: Message::assistant(vendor_resp.message.content),
                finish_reason: FinishReason::Stop,
            }],
            Usage {
                prompt_tokens: vendor_resp.prompt_eval_count.unwrap_or(0),
                completion_tokens: vendor_resp.eval_count.unwrap_or(0),
                total_tokens: vendor_resp.prompt_eval_count.unwrap_or(0)
                    + vendor_resp.eval_count.unwrap_or(0),
            },
        ))
    }

    async fn chat_stream(&self, req: &ChatRequest) -> AdapterResult<FrameStream> {
        let vendor_req = Self::to_vendor_request(req, true);
        let resp = self
            .client
            .post(format!("{}/api/chat", self.config.base_url))
            .timeout(self.config.timeout)
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
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }

                    let object: VendorStreamLine = match serde_json::from_str(&line) {
                        Ok(o) => o,
                        Err(e) => {
                            yield Err(ProviderError::new(502, "invalid_response", e.to_string()));
                            return;
                        }
                    };

                    if !role_sent {
                        yield Ok(StreamFrame::role_frame(&id, &model, Role::Assistant));
                        role_sent = true;
                    }

                    if !object.message.content.is_empty() {
                        yield Ok(StreamFrame::content_frame(&id, &model, object.message.content));
                    }

                    if object.done {
                        yield Ok(StreamFrame::finish_frame(&id, &model, FinishReason::Stop));
                        return;
                    }
                }
            }
        }))
    }

    /// Ollama accepts only a single `prompt` string per request — one HTTP
    /// call per input, in order, collected into a batch response.
    async fn embedding(&self, req: &EmbeddingRequest) -> AdapterResult<EmbeddingResponse> {
        let inputs = req.input.clone().into_vec();
        let mut data = Vec::with_capacity(inputs.len());
        let mut total_tokens = 0u32;

        for (index, prompt) in inputs.iter().enumerate() {
            let resp = self
                .client
                .post(format!("{}/api/embeddings", self.config.base_url))
                .timeout(self.config.timeout)
                .json(&VendorEmbeddingRequest {
                    model: req.model.clone(),
                    prompt: prompt.clone(),
                })
                .send()
                .await
                .map_err(|e| ProviderError::new(502, "network_error", e.to_string()))?;
            let resp = Self::error_for_status(resp).await?;

            let vendor_resp: VendorEmbeddingResponse = resp
                .json()
                .await
                .map_err(|e| ProviderError::new(502, "invalid_response", e.to_string()))?;

            total_tokens += prompt.split_whitespace().count() as u32;
            data.push(EmbeddingData {
                index: index as u32,
                embedding: vendor_resp.embedding,
                object: "embedding".to_string(),
            });
        }

        Ok(EmbeddingResponse {
            object: "list".to_string(),
            data,
            model: req.model.clone(),
            usage: Usage {
                prompt_tokens: total_tokens,
                completion_tokens: 0,
                total_tokens,
            },
        })
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        KNOWN_MODELS
            .iter()
            .map(|id| ModelInfo {
                id: id.to_string(),
                object: "model".to_string(),
                owned_by: "ollama".to_string(),
            })
            .collect()
    }

    fn supports_model(&self, model: &str) -> bool {
        KNOWN_MODELS.contains(&model)
    }

    async fn health_check(&self) -> AdapterResult<()> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.config.base_url))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::new(502, "network_error", e.to_string()))?;
        Self::error_for_status(resp).await?;
        Ok(())
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct VendorMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize, Default)]
struct VendorOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct VendorChatRequest {
    model: String,
    messages: Vec<VendorMessage>,
    stream: bool,
    options: VendorOptions,
}

#[derive(Debug, Deserialize)]
struct VendorMessageBody {
    content: String,
}

#[derive(Debug, Deserialize)]
struct VendorChatResponse {
    model: String,
    message: VendorMessageBody,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct VendorStreamLine {
    message: VendorMessageBody,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Serialize)]
struct VendorEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct VendorEmbeddingResponse {
    embedding: Vec<f32>,
}
