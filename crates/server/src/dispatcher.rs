//! The Dispatcher (§4.1): request validation, model resolution, cache
//! lookup/store, and the resilient-provider call for every endpoint in
//! §6. Handlers take the raw request body as `Bytes` and parse it
//! themselves rather than via axum's `Json` extractor so that a malformed
//! body produces the same `{"error":{...}}` envelope as every other
//! failure instead of axum's bare-text 400.

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::stream::{self, StreamExt};

use llm_gateway_core::{
    ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, EmbeddingRequest,
    EmbeddingResponse, GatewayError, ModelListResponse, StreamFrame,
};
use llm_gateway_ratelimit::RateLimitDecision;

use crate::anthropic_dialect::{AnthropicMessagesRequest, AnthropicMessagesResponse};
use crate::auth::ClientIdentity;
use crate::state::AppState;

/// Converts a `GatewayError` into the wire error body from §6/§7:
/// `{"error":{"type":..., "message":...}}` with the matching HTTP status.
/// Rate-limited responses also carry `Retry-After`, set to the bucket's
/// one-minute refill window (§4.5 buckets replenish per-minute).
pub fn error_response(err: GatewayError) -> Response {
    let status = err.status_code();
    let is_rate_limited = matches!(err, GatewayError::RateLimited);
    let body = serde_json::json!({
        "error": {
            "type": err.error_type().as_str(),
            "message": err.to_string(),
        }
    });
    let mut resp = (
        axum::http::StatusCode::from_u16(status).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
        Json(body),
    )
        .into_response();
    if is_rate_limited {
        resp.headers_mut().insert(
            axum::http::header::RETRY_AFTER,
            axum::http::HeaderValue::from_static("60"),
        );
        resp.headers_mut().insert(
            "x-ratelimit-remaining",
            axum::http::HeaderValue::from_static("0"),
        );
    }
    resp
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::InvalidRequest(e.to_string()))
}

fn client_key(identity: &ClientIdentity) -> &str {
    &identity.0
}

async fn admit_or_reject(state: &AppState, identity: &ClientIdentity) -> Result<(), GatewayError> {
    match state.rate_limiter.admit(client_key(identity)) {
        RateLimitDecision::Admitted => Ok(()),
        RateLimitDecision::Rejected => Err(GatewayError::RateLimited),
    }
}

/// Shared path for both `/v1/chat/completions` and the Anthropic-dialect
/// `/v1/messages`: cache lookup, provider resolution, resilient call,
/// cache store (§4.1, §4.4).
async fn do_chat(state: &AppState, req: ChatRequest) -> Result<ChatResponse, GatewayError> {
    req.validate().map_err(GatewayError::InvalidRequest)?;

    if let llm_gateway_cache::CacheLookup::Hit(resp) = state.cache.get(&req).await {
        metrics::counter!("gateway_cache_hits_total").increment(1);
        return Ok(resp);
    }
    metrics::counter!("gateway_cache_misses_total").increment(1);

    let provider = state.router.resolve(&req.model)?;
    let resp = provider.chat(&req).await?;
    state.cache.set(&req, &resp).await;
    Ok(resp)
}

pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    body: Bytes,
) -> Response {
    let req: ChatRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };
    if let Err(e) = admit_or_reject(&state, &identity).await {
        return error_response(e);
    }

    if req.stream {
        return chat_completions_stream(state, req).await;
    }

    match do_chat(&state, req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => error_response(e),
    }
}

/// Builds the SSE body for a streaming chat request (§4.1 chatCompletionStream,
/// §4.9). Resolution and the initial call to obtain the provider's frame
/// stream happen before any SSE headers are written, so a failure at that
/// point (invalid model, circuit open, upstream 4xx before first byte) is
/// still a plain JSON error response (§7: "fail before first frame receive
/// an HTTP error status"). Once the stream is in hand, any error surfaced
/// while *consuming* it is translated into an inline SSE error frame
/// followed by `[DONE]`, since response headers are then already
/// committed. Dropping the body stream (client disconnect) drops the
/// adapter's underlying `FrameStream`, which in turn drops its inner HTTP
/// response body — cancellation propagates upstream for free via Rust's
/// drop semantics, no separate cancellation plumbing required.
async fn chat_completions_stream(state: AppState, req: ChatRequest) -> Response {
    if let Err(e) = req.validate().map_err(GatewayError::InvalidRequest) {
        return error_response(e);
    }

    let provider = match state.router.resolve(&req.model) {
        Ok(p) => p,
        Err(e) => return error_response(e),
    };

    let frames = match provider.chat_stream(&req).await {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };

    let events = frames.map(|item| -> Result<Event, Infallible> {
        match item {
            Ok(frame) => Ok(frame_event(&frame)),
            Err(e) => Ok(error_event(&e.to_string())),
        }
    });
    let done = stream::once(async { Ok::<_, Infallible>(Event::default().data("[DONE]")) });

    let mut resp = Sse::new(events.chain(done)).into_response();
    // §4.1: disable proxy response buffering (nginx honors this header) so
    // frames reach the client as they're flushed instead of being held.
    resp.headers_mut()
        .insert("x-accel-buffering", axum::http::HeaderValue::from_static("no"));
    resp
}

fn frame_event(frame: &StreamFrame) -> Event {
    Event::default().data(serde_json::to_string(frame).unwrap_or_default())
}

fn error_event(message: &str) -> Event {
    let body = serde_json::json!({"error": {"type": "provider_error", "message": message}});
    Event::default().data(body.to_string())
}

pub async fn completions(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    body: Bytes,
) -> Response {
    let req: CompletionRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };
    if let Err(e) = admit_or_reject(&state, &identity).await {
        return error_response(e);
    }

    let stream = req.stream;
    let chat_req = req.into_chat_request();

    if stream {
        return chat_completions_stream(state, chat_req).await;
    }

    match do_chat(&state, chat_req).await {
        Ok(resp) => Json(CompletionResponse::from_chat_response(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn embeddings(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    body: Bytes,
) -> Response {
    let req: EmbeddingRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };
    if let Err(e) = admit_or_reject(&state, &identity).await {
        return error_response(e);
    }

    let provider = match state.router.resolve(&req.model) {
        Ok(p) => p,
        Err(e) => return error_response(e),
    };

    match provider.embedding(&req).await {
        Ok(resp) => embedding_response(resp).into_response(),
        Err(e) => error_response(e),
    }
}

fn embedding_response(resp: EmbeddingResponse) -> Json<EmbeddingResponse> {
    Json(resp)
}

pub async fn list_models(State(state): State<AppState>) -> Response {
    let models = state
        .router
        .providers()
        .iter()
        .flat_map(|p| p.list_models())
        .collect();
    Json(ModelListResponse::new(models)).into_response()
}

/// `POST /v1/messages` (§6): the Anthropic wire dialect, translated to the
/// unified chat path and back.
pub async fn anthropic_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    body: Bytes,
) -> Response {
    let req: AnthropicMessagesRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };
    if let Err(e) = admit_or_reject(&state, &identity).await {
        return error_response(e);
    }

    let stream = req.stream;
    let chat_req = req.into_chat_request();

    if stream {
        return chat_completions_stream(state, chat_req).await;
    }

    match do_chat(&state, chat_req).await {
        Ok(resp) => Json(AnthropicMessagesResponse::from(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn health() -> Response {
    Json(serde_json::json!({"status": "ok"})).into_response()
}

pub async fn ready(State(state): State<AppState>) -> Response {
    let providers = state.router.providers();
    if providers.is_empty() {
        return (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "not_ready", "reason": "no providers registered"})),
        )
            .into_response();
    }
    Json(serde_json::json!({"status": "ready", "providers": providers.len()})).into_response()
}
