//! Settings record, layered env/file loading, and validation for the
//! gateway (§6).

mod settings;

pub use settings::{
    CacheBackendSetting, CacheSettings, CircuitBreakerSettings, ConnectionPoolSettings,
    ObservabilitySettings, ProviderSettings, RateLimitSettings, RetrySettings, ServerSettings,
    Settings, load_settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
