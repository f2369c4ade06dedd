//! API-key extraction and client-identity resolution (§6 Auth, §4.5,
//! glossary "Client identity"). Auth is optional: when `AppState::api_keys`
//! is `None` every request is admitted and identity falls back to the
//! remote IP for rate limiting.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::dispatcher::error_response;
use crate::state::AppState;
use llm_gateway_core::GatewayError;

/// Extracted from `Authorization: Bearer <key>`, `X-API-Key: <key>`, or
/// `?api_key=<key>`, in that priority order (§6).
fn extract_api_key(headers: &HeaderMap, query: &str) -> Option<String> {
    if let Some(value) = headers.get("authorization") {
        if let Ok(s) = value.to_str() {
            if let Some(key) = s.strip_prefix("Bearer ") {
                return Some(key.to_string());
            }
        }
    }
    if let Some(value) = headers.get("x-api-key") {
        if let Ok(s) = value.to_str() {
            return Some(s.to_string());
        }
    }
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("api_key="))
        .map(|v| v.to_string())
}

/// Masks an API key down to a short prefix so it is safe to use as a rate
/// limiter bucket key or log field without leaking the secret itself.
pub fn mask_key(key: &str) -> String {
    let visible = key.chars().take(8).collect::<String>();
    format!("{visible}...")
}

/// The identity the rate limiter keys its bucket on (glossary "Client
/// identity"): a masked API-key prefix when auth supplied one, else the
/// remote IP.
#[derive(Debug, Clone)]
pub struct ClientIdentity(pub String);

/// Validates the API key (if auth is enabled) and resolves client
/// identity, attaching both to the request's extensions for downstream
/// handlers. Unknown keys are rejected with 401 before the request
/// reaches the dispatcher.
///
/// `ConnectInfo` is only populated when the router is served through
/// `into_make_service_with_connect_info` (as `main.rs` does); a request
/// dispatched straight to the `Service` (integration tests, or any
/// in-process caller) won't carry it, so it is extracted as `Option` and
/// falls back to an unknown-peer placeholder for rate-limiter identity.
pub async fn auth_middleware(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut req: Request,
    next: Next,
) -> Response {
    let query = req.uri().query().unwrap_or("").to_string();
    let api_key = extract_api_key(req.headers(), &query);

    let identity = if let Some(keys) = &state.api_keys {
        match &api_key {
            Some(key) if keys.contains(key) => ClientIdentity(mask_key(key)),
            _ => return error_response(GatewayError::AuthFailure),
        }
    } else {
        match &api_key {
            Some(key) => ClientIdentity(mask_key(key)),
            None => ClientIdentity(
                connect_info
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
        }
    };

    req.extensions_mut().insert(identity);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_takes_priority() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-abc"));
        headers.insert("x-api-key", HeaderValue::from_static("sk-def"));
        assert_eq!(extract_api_key(&headers, ""), Some("sk-abc".to_string()));
    }

    #[test]
    fn falls_back_to_x_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("sk-def"));
        assert_eq!(extract_api_key(&headers, ""), Some("sk-def".to_string()));
    }

    #[test]
    fn falls_back_to_query_param() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract_api_key(&headers, "api_key=sk-ghi"),
            Some("sk-ghi".to_string())
        );
    }

    #[test]
    fn mask_key_truncates_to_a_short_prefix() {
        assert_eq!(mask_key("sk-abcdefghijklmnop"), "sk-abcde...");
    }
}
