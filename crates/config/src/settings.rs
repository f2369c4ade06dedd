//! The `Settings` record (§6) and its layered loader, grounded on the
//! teacher's `load_settings` (`config::Config::builder()` with a
//! default file, an environment-selected file, then env-var overrides).

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
    #[serde(default = "default_provider_name")]
    pub default_provider: String,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub connection_pool: ConnectionPoolSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            providers: HashMap::new(),
            default_provider: default_provider_name(),
            rate_limit: RateLimitSettings::default(),
            cache: CacheSettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            retry: RetrySettings::default(),
            connection_pool: ConnectionPoolSettings::default(),
            observability: ObservabilitySettings::default(),
        }
    }
}

fn default_provider_name() -> String {
    "openai".to_string()
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.rate_limit.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.connection_pool.validate()?;
        if !self.providers.is_empty() && !self.providers.contains_key(&self.default_provider) {
            return Err(ConfigError::InvalidValue {
                field: "default_provider".to_string(),
                message: format!("no provider named '{}' is configured", self.default_provider),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_port() -> u16 {
    8080
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_max_connections() -> u32 {
    1000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            max_connections: default_max_connections(),
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "must not be 0".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.request_timeout_secs".to_string(),
                message: "must not be 0".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_connections".to_string(),
                message: "must not be 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Per-provider credentials and endpoint (§6: `{api_key, base_url, timeout, version}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub version: Option<String>,
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_requests_per_min")]
    pub requests_per_min: u32,
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_requests_per_min() -> u32 {
    600
}
fn default_burst_size() -> u32 {
    20
}
fn default_cleanup_interval_secs() -> u64 {
    300
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            requests_per_min: default_requests_per_min(),
            burst_size: default_burst_size(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl RateLimitSettings {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.requests_per_min == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.requests_per_min".to_string(),
                message: "must be > 0 when rate limiting is enabled".to_string(),
            });
        }
        if self.enabled && self.burst_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.burst_size".to_string(),
                message: "must be > 0 when rate limiting is enabled".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendSetting {
    InProcess,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackendSetting,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default)]
    pub external_store_address: Option<String>,
}

fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_cache_backend() -> CacheBackendSetting {
    CacheBackendSetting::InProcess
}
fn default_max_entries() -> usize {
    10_000
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_secs: default_cache_ttl_secs(),
            backend: default_cache_backend(),
            max_entries: default_max_entries(),
            external_store_address: None,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_breaker_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_half_open_requests")]
    pub max_half_open_requests: u32,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_success_threshold() -> u32 {
    2
}
fn default_breaker_timeout_secs() -> u64 {
    30
}
fn default_max_half_open_requests() -> u32 {
    1
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_secs: default_breaker_timeout_secs(),
            max_half_open_requests: default_max_half_open_requests(),
        }
    }
}

impl CircuitBreakerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "circuit_breaker.failure_threshold".to_string(),
                message: "must be > 0 when enabled".to_string(),
            });
        }
        if self.enabled && self.max_half_open_requests == 0 {
            return Err(ConfigError::InvalidValue {
                field: "circuit_breaker.max_half_open_requests".to_string(),
                message: "must be > 0 when enabled".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    100
}
fn default_max_backoff_ms() -> u64 {
    5_000
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.multiplier".to_string(),
                message: "must be >= 1.0".to_string(),
            });
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.initial_backoff_ms".to_string(),
                message: "must not exceed max_backoff_ms".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoolSettings {
    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: usize,
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
    #[serde(default = "default_max_per_host")]
    pub max_per_host: usize,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_max_idle_conns() -> usize {
    100
}
fn default_max_idle_per_host() -> usize {
    20
}
fn default_max_per_host() -> usize {
    50
}
fn default_idle_timeout_secs() -> u64 {
    90
}

impl Default for ConnectionPoolSettings {
    fn default() -> Self {
        Self {
            max_idle_conns: default_max_idle_conns(),
            max_idle_per_host: default_max_idle_per_host(),
            max_per_host: default_max_per_host(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl ConnectionPoolSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_idle_per_host > self.max_per_host {
            return Err(ConfigError::InvalidValue {
                field: "connection_pool.max_idle_per_host".to_string(),
                message: "must not exceed max_per_host".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
            metrics_port: default_metrics_port(),
        }
    }
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`GATEWAY__` prefix, `__` separator)
/// 2. `config/{env}.yaml` (if `env` is given)
/// 3. `config/default.yaml`
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("GATEWAY")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rate_limit_requires_positive_burst_when_enabled() {
        let mut settings = Settings::default();
        settings.rate_limit.enabled = true;
        settings.rate_limit.burst_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn default_provider_must_be_configured_when_providers_present() {
        let mut settings = Settings::default();
        settings.providers.insert(
            "anthropic".to_string(),
            ProviderSettings {
                api_key: Some("key".to_string()),
                base_url: "https://api.anthropic.com".to_string(),
                timeout_secs: 30,
                version: Some("2023-06-01".to_string()),
            },
        );
        assert!(settings.validate().is_err(), "default_provider is 'openai' but only 'anthropic' is configured");

        settings.default_provider = "anthropic".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn connection_pool_idle_per_host_cannot_exceed_per_host_cap() {
        let mut settings = Settings::default();
        settings.connection_pool.max_idle_per_host = 1000;
        settings.connection_pool.max_per_host = 10;
        assert!(settings.validate().is_err());
    }
}
