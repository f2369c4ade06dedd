//! The error taxonomy from §7: every failure in the gateway is eventually
//! converted into one of these variants before it reaches the dispatcher,
//! which maps each to an HTTP status and a stable `type` string.

use thiserror::Error;

/// The `type` field of the JSON error body (`{"error":{"type":...}}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    InvalidRequest,
    InvalidModel,
    InvalidApiKey,
    RateLimitExceeded,
    ProviderError,
    CircuitOpen,
    CircuitHalfOpen,
    NotSupported,
    InternalError,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::InvalidRequest => "invalid_request",
            ErrorType::InvalidModel => "invalid_model",
            ErrorType::InvalidApiKey => "invalid_api_key",
            ErrorType::RateLimitExceeded => "rate_limit_exceeded",
            ErrorType::ProviderError => "provider_error",
            ErrorType::CircuitOpen => "circuit_open",
            ErrorType::CircuitHalfOpen => "circuit_half_open",
            ErrorType::NotSupported => "not_supported",
            ErrorType::InternalError => "internal_error",
        }
    }
}

/// Error surfaced by a `ProviderAdapter` call: an upstream status code plus
/// a human-readable message. The resilience layer annotates retryability
/// from this; see `gateway-resilience::is_retryable`.
#[derive(Debug, Clone, Error)]
#[error("provider error ({status_code}): {message}")]
pub struct ProviderError {
    pub status_code: u16,
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(status_code: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            code: code.into(),
            message: message.into(),
        }
    }

    /// §7: UpstreamTransient — 5xx (other than 501) and 429 are retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.status_code,
            429 | 500 | 502 | 503 | 504
        )
    }
}

/// The terminal, taxonomy-level error the dispatcher converts to HTTP.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown model: {0}")]
    InvalidModel(String),

    #[error("invalid api key")]
    AuthFailure,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("operation not supported by provider: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("circuit open for provider {0}")]
    CircuitOpen(String),

    #[error("circuit half-open saturated for provider {0}")]
    CircuitHalfOpenSaturated(String),

    #[error("request timed out or was canceled")]
    TimeoutOrCanceled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::InvalidModel(_) => 400,
            GatewayError::AuthFailure => 401,
            GatewayError::RateLimited => 429,
            GatewayError::NotSupported(_) => 501,
            GatewayError::Provider(e) => e.status_code,
            GatewayError::CircuitOpen(_) => 503,
            GatewayError::CircuitHalfOpenSaturated(_) => 503,
            GatewayError::TimeoutOrCanceled => 504,
            GatewayError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            GatewayError::InvalidRequest(_) => ErrorType::InvalidRequest,
            GatewayError::InvalidModel(_) => ErrorType::InvalidModel,
            GatewayError::AuthFailure => ErrorType::InvalidApiKey,
            GatewayError::RateLimited => ErrorType::RateLimitExceeded,
            GatewayError::NotSupported(_) => ErrorType::NotSupported,
            GatewayError::Provider(_) => ErrorType::ProviderError,
            GatewayError::CircuitOpen(_) => ErrorType::CircuitOpen,
            GatewayError::CircuitHalfOpenSaturated(_) => ErrorType::CircuitHalfOpen,
            GatewayError::TimeoutOrCanceled => ErrorType::InternalError,
            GatewayError::Internal(_) => ErrorType::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
