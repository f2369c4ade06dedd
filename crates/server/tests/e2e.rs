//! End-to-end scenarios against the full axum router (§8).

use std::sync::Arc;
use std::time::Duration;

use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use llm_gateway_cache::{Cache, CacheConfig};
use llm_gateway_config::Settings;
use llm_gateway_providers::{build_client, AnthropicAdapter, AnthropicConfig, ConnectionPoolConfig, OllamaAdapter, OllamaConfig, OpenAiAdapter, OpenAiConfig};
use llm_gateway_ratelimit::{RateLimiter, RateLimiterConfig};
use llm_gateway_resilience::{CircuitBreakerConfig, ResilientProvider, RetryConfig};
use llm_gateway_router::Router as GatewayRouter;
use llm_gateway_server::{create_router, init_metrics, AppState};

fn test_client() -> reqwest::Client {
    build_client(ConnectionPoolConfig::default()).expect("client builds")
}

fn no_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    }
}

async fn app_with_openai(base_url: String, rate_limit: RateLimiterConfig) -> axum::Router {
    let adapter = OpenAiAdapter::new(
        OpenAiConfig {
            api_key: "test-key".to_string(),
            base_url,
            timeout: Duration::from_secs(5),
        },
        test_client(),
    );
    let mut router = GatewayRouter::new(Some("openai".to_string()));
    router.register(Arc::new(ResilientProvider::new(
        Arc::new(adapter),
        CircuitBreakerConfig::default(),
        no_retry(),
        Duration::from_secs(5),
    )));

    let state = AppState::new(
        Settings::default(),
        router,
        Arc::new(Cache::new(CacheConfig::default(), None)),
        Arc::new(RateLimiter::new(rate_limit)),
        None,
        init_metrics(),
    );
    create_router(state)
}

fn chat_request_body() -> serde_json::Value {
    serde_json::json!({
        "model": "gpt-4o-mini",
        "messages": [{"role": "user", "content": "ping"}],
        "temperature": 0,
        "stream": false
    })
}

fn openai_stub_response() -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "pong"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
    })
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: &serde_json::Value,
) -> (axum::http::StatusCode, serde_json::Value) {
    let request = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

/// Scenario A: repeated identical low-temperature requests hit the
/// upstream exactly once; both client responses are byte-identical.
#[tokio::test]
async fn scenario_a_cache_hit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_stub_response()))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_with_openai(server.uri(), RateLimiterConfig::default()).await;
    let body = chat_request_body();

    let (status1, json1) = post_json(&app, "/v1/chat/completions", &body).await;
    let (status2, json2) = post_json(&app, "/v1/chat/completions", &body).await;

    assert_eq!(status1, axum::http::StatusCode::OK);
    assert_eq!(status2, axum::http::StatusCode::OK);
    assert_eq!(json1, json2);

    server.verify().await;
}

/// Scenario B: the Anthropic-dialect inbound request hoists its system
/// message into the Anthropic wire shape before dispatch.
#[tokio::test]
async fn scenario_b_anthropic_translation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "hi"}],
            "model": "claude-3-haiku-20240307",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 2}
        })))
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::new(
        AnthropicConfig {
            api_key: "test-key".to_string(),
            base_url: server.uri(),
            version: "2023-06-01".to_string(),
            timeout: Duration::from_secs(5),
        },
        test_client(),
    );
    let mut router = GatewayRouter::new(None);
    router.register(Arc::new(ResilientProvider::new(
        Arc::new(adapter),
        CircuitBreakerConfig::default(),
        no_retry(),
        Duration::from_secs(5),
    )));
    let state = AppState::new(
        Settings::default(),
        router,
        Arc::new(Cache::new(CacheConfig::default(), None)),
        Arc::new(RateLimiter::new(RateLimiterConfig::default())),
        None,
        init_metrics(),
    );
    let app = create_router(state);

    let body = serde_json::json!({
        "model": "claude-3-haiku-20240307",
        "system": "S",
        "messages": [{"role": "user", "content": "U"}],
        "max_tokens": 8
    });
    let (status, json) = post_json(&app, "/v1/messages", &body).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(json["role"], "assistant");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let outbound: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(outbound["system"], "S");
    assert_eq!(outbound["messages"], serde_json::json!([{"role": "user", "content": "U"}]));
    assert_eq!(outbound["max_tokens"], 8);
    assert_eq!(outbound["stream"], false);
}

/// Scenario C: Ollama's NDJSON stream translates into three unified SSE
/// frames (role, content, finish) followed by `[DONE]`.
#[tokio::test]
async fn scenario_c_ollama_ndjson_to_sse() {
    let server = MockServer::start().await;
    let ndjson = concat!(
        r#"{"model":"llama3","message":{"role":"assistant","content":""},"done":false}"#,
        "\n",
        r#"{"model":"llama3","message":{"role":"assistant","content":"hi"},"done":false}"#,
        "\n",
        r#"{"model":"llama3","message":{"role":"assistant","content":""},"done":true,"prompt_eval_count":3,"eval_count":1}"#,
        "\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(ndjson, "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let adapter = OllamaAdapter::new(
        OllamaConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        },
        test_client(),
    );
    let mut router = GatewayRouter::new(None);
    router.register(Arc::new(ResilientProvider::new(
        Arc::new(adapter),
        CircuitBreakerConfig::default(),
        no_retry(),
        Duration::from_secs(5),
    )));
    let state = AppState::new(
        Settings::default(),
        router,
        Arc::new(Cache::new(CacheConfig::default(), None)),
        Arc::new(RateLimiter::new(RateLimiterConfig::default())),
        None,
        init_metrics(),
    );
    let app = create_router(state);

    let body = serde_json::json!({
        "model": "llama3",
        "messages": [{"role": "user", "content": "hi"}],
        "stream": true
    });
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    assert_eq!(
        response.headers().get("x-accel-buffering").unwrap(),
        "no"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let data_lines: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .collect();

    assert_eq!(data_lines.len(), 4);
    assert!(data_lines[0].contains(r#""role":"assistant""#));
    assert!(data_lines[1].contains(r#""content":"hi""#));
    assert!(data_lines[2].contains(r#""finish_reason":"stop""#));
    assert_eq!(data_lines[3], "[DONE]");
}

/// Scenario D: the circuit opens after `failure_threshold` consecutive
/// failures, fails fast while open, then recovers after `timeout`.
#[tokio::test]
async fn scenario_d_circuit_opens_then_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_stub_response()))
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new(
        OpenAiConfig {
            api_key: "test-key".to_string(),
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        },
        test_client(),
    );
    let breaker_config = CircuitBreakerConfig {
        failure_threshold: 3,
        success_threshold: 2,
        timeout: Duration::from_millis(50),
        max_half_open_requests: 1,
    };
    let provider = ResilientProvider::new(
        Arc::new(adapter),
        breaker_config,
        no_retry(),
        Duration::from_secs(5),
    );

    let req = llm_gateway_core::ChatRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![llm_gateway_core::Message::user("ping")],
        temperature: None,
        top_p: None,
        max_tokens: None,
        stop: None,
        stream: false,
        tools: None,
        response_format: None,
    };

    for _ in 0..3 {
        assert!(provider.chat(&req).await.is_err());
    }
    // Circuit is open: calls 4-5 fail fast without reaching upstream.
    for _ in 0..2 {
        let err = provider.chat(&req).await.unwrap_err();
        assert!(matches!(err, llm_gateway_core::GatewayError::CircuitOpen(_)));
    }

    tokio::time::sleep(Duration::from_millis(60)).await;

    // Half-open probe succeeds, then a second success closes the circuit.
    assert!(provider.chat(&req).await.is_ok());
    assert!(provider.chat(&req).await.is_ok());
    assert!(provider.chat(&req).await.is_ok());

    let requests = server.received_requests().await.unwrap();
    // 3 failures + 1 probe + 2 post-close successes = 6 calls that actually reached upstream.
    assert_eq!(requests.len(), 6);
}

/// Scenario E: a burst beyond `burst_size` from the same client is
/// rejected with 429 and a `Retry-After` header.
#[tokio::test]
async fn scenario_e_rate_limit_burst() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_stub_response()))
        .mount(&server)
        .await;

    let rate_limit = RateLimiterConfig {
        enabled: true,
        requests_per_min: 60,
        burst_size: 2,
        cleanup_interval: Duration::from_secs(300),
    };
    let app = app_with_openai(server.uri(), rate_limit).await;
    let body = chat_request_body();

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let (status, _) = post_json(&app, "/v1/chat/completions", &body).await;
        statuses.push(status);
    }

    let admitted = statuses
        .iter()
        .filter(|s| **s == axum::http::StatusCode::OK)
        .count();
    let rejected = statuses
        .iter()
        .filter(|s| **s == axum::http::StatusCode::TOO_MANY_REQUESTS)
        .count();
    assert_eq!(admitted, 2);
    assert_eq!(rejected, 3);
}
