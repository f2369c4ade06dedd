//! OpenAI-compatible adapter (§4.3): the unified wire types already match
//! this vendor's shape field-for-field, so chat and stream parsing is a
//! direct (de)serialization with no translation step.

use std::time::Duration;

use async_trait::async_trait;

use llm_gateway_core::{
    AdapterResult, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FrameStream,
    ModelInfo, ProviderAdapter, ProviderError,
};

use crate::sse::sse_frames;

pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

pub struct OpenAiAdapter {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    pub fn new(config: OpenAiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.config.base_url, path))
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
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
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, req: &ChatRequest) -> AdapterResult<ChatResponse> {
        let mut req = req.clone();
        req.stream = false;

        let resp = self
            .request("/chat/completions")
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::new(502, "network_error", e.to_string()))?;
        let resp = Self::error_for_status(resp).await?;

        resp.json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::new(502, "invalid_response", e.to_string()))
    }

    async fn chat_stream(&self, req: &ChatRequest) -> AdapterResult<FrameStream> {
        let mut req = req.clone();
        req.stream = true;

        let resp = self
            .request("/chat/completions")
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::new(502, "network_error", e.to_string()))?;
        let resp = Self::error_for_status(resp).await?;

        Ok(sse_frames(resp.bytes_stream()))
    }

    async fn embedding(&self, req: &EmbeddingRequest) -> AdapterResult<EmbeddingResponse> {
        let resp = self
            .request("/embeddings")
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::new(502, "network_error", e.to_string()))?;
        let resp = Self::error_for_status(resp).await?;

        resp.json::<EmbeddingResponse>()
            .await
            .map_err(|e| ProviderError::new(502, "invalid_response", e.to_string()))
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gpt-4o".to_string(),
                object: "model".to_string(),
                owned_by: "openai".to_string(),
            },
            ModelInfo {
                id: "gpt-4o-mini".to_string(),
                object: "model".to_string(),
                owned_by: "openai".to_string(),
            },
            ModelInfo {
                id: "text-embedding-3-small".to_string(),
                object: "model".to_string(),
                owned_by: "openai".to_string(),
            },
        ]
    }

    fn supports_model(&self, model: &str) -> bool {
        model.starts_with("gpt-") || model.starts_with("text-embedding-") || model.starts_with("o1")
    }

    async fn health_check(&self) -> AdapterResult<()> {
        let resp = self
            .client
            .get(format!("{}/models", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::new(502, "network_error", e.to_string()))?;
        Self::error_for_status(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![llm_gateway_core::Message::user("hi")],
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            stream: false,
            tools: None,
            response_format: None,
        }
    }

    fn adapter(base_url: String) -> OpenAiAdapter {
        OpenAiAdapter::new(
            OpenAiConfig {
                api_key: "test-key".to_string(),
                base_url,
                timeout: Duration::from_secs(5),
            },
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn chat_parses_response_body_directly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1,
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "hello"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
            })))
            .mount(&server)
            .await;

        let resp = adapter(server.uri()).chat(&sample_request()).await.unwrap();
        assert_eq!(resp.choices[0].message.content, "hello");
    }

    #[tokio::test]
    async fn chat_maps_upstream_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = adapter(server.uri())
            .chat(&sample_request())
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 429);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn chat_stream_parses_sse_frames_until_done() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"id\":\"1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hi\"}}]}\n\n",
            "data: {\"id\":\"1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let mut req = sample_request();
        req.stream = true;
        let mut stream = adapter(server.uri()).chat_stream(&req).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.choices[0].delta.content.as_deref(), Some("hi"));
        let second = stream.next().await.unwrap().unwrap();
        assert!(matches!(
            second.choices[0].finish_reason,
            Some(llm_gateway_core::FinishReason::Stop)
        ));
        assert!(stream.next().await.is_none());
    }

    /// Scenario F (§8): dropping the frame stream before it is fully
    /// consumed must not hang or panic — the in-flight response body (and
    /// the upstream connection backing it) is torn down by the stream's
    /// own `Drop`, which is how cancellation propagates without any
    /// explicit cancellation plumbing in the adapter.
    #[tokio::test]
    async fn dropping_the_stream_mid_consumption_does_not_hang() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"id\":\"1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hi\"}}]}\n\n",
            "data: {\"id\":\"1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"more\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let mut req = sample_request();
        req.stream = true;
        let mut stream = adapter(server.uri()).chat_stream(&req).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.choices[0].delta.content.as_deref(), Some("hi"));
        drop(stream);
    }

    #[test]
    fn supports_model_matches_gpt_and_embedding_prefixes() {
        let a = adapter("http://localhost".to_string());
        assert!(a.supports_model("gpt-4o-mini"));
        assert!(a.supports_model("text-embedding-3-small"));
        assert!(!a.supports_model("claude-3-opus"));
    }
}
