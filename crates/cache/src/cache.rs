//! Public cache API (§4.4): fingerprint-based lookup and storage of
//! non-streaming chat responses, backed by an in-process LRU or an
//! external store selected by configuration.

use std::sync::Arc;
use std::time::Duration;

use llm_gateway_core::{ChatRequest, ChatResponse};

use crate::fingerprint::fingerprint;
use crate::store::{ExternalCacheBackend, InProcessCache};

#[derive(Debug, Clone)]
pub enum CacheBackendKind {
    InProcess,
    External,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub backend: CacheBackendKind,
    pub max_entries: usize,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(300),
            backend: CacheBackendKind::InProcess,
            max_entries: 10_000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

pub enum CacheLookup {
    Hit(ChatResponse),
    Miss,
    NotCacheable,
}

enum Backend {
    InProcess(InProcessCache),
    External(Arc<dyn ExternalCacheBackend>),
}

pub struct Cache {
    config: CacheConfig,
    backend: Backend,
}

impl Cache {
    /// Builds the cache per configuration. If an external backend is
    /// requested but `external` is `None` (e.g. it failed to connect at
    /// startup), falls back to in-process with a warning rather than
    /// aborting (§4.4).
    pub fn new(config: CacheConfig, external: Option<Arc<dyn ExternalCacheBackend>>) -> Self {
        let backend = match (&config.backend, external) {
            (CacheBackendKind::External, Some(ext)) => Backend::External(ext),
            (CacheBackendKind::External, None) => {
                tracing::warn!(
                    "cache: external backend configured but unavailable, falling back to in-process"
                );
                Backend::InProcess(InProcessCache::new(config.max_entries))
            }
            (CacheBackendKind::InProcess, _) => {
                Backend::InProcess(InProcessCache::new(config.max_entries))
            }
        };
        Self { config, backend }
    }

    /// Spawns the periodic sweep task for the in-process backend. No-op
    /// for an external backend, which manages its own TTL expiry.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let this = self.clone();
        if let Backend::InProcess(_) = &this.backend {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(this.config.sweep_interval);
                loop {
                    interval.tick().await;
                    if let Backend::InProcess(store) = &this.backend {
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "cache: swept expired entries");
                        }
                    }
                }
            });
        }
    }

    /// Read-only, idempotent lookup. Streaming requests and
    /// high-temperature requests are reported as `NotCacheable` without
    /// ever touching the backend.
    pub async fn get(&self, req: &ChatRequest) -> CacheLookup {
        if !self.config.enabled || !req.is_cacheable_shape() {
            return CacheLookup::NotCacheable;
        }

        let key = fingerprint(req);
        let raw = match &self.backend {
            Backend::InProcess(store) => store.get(&key),
            Backend::External(ext) => match ext.get(&key).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "cache: external backend get failed, treating as miss");
                    None
                }
            },
        };

        match raw {
            Some(bytes) => match serde_json::from_slice::<ChatResponse>(&bytes) {
                Ok(resp) => CacheLookup::Hit(resp),
                Err(_) => CacheLookup::Miss,
            },
            None => CacheLookup::Miss,
        }
    }

    /// Overwrites any existing entry for the same fingerprint. Silently a
    /// no-op for requests outside the cacheable shape (callers should
    /// check `ChatRequest::is_cacheable_shape` themselves to avoid the
    /// wasted serialization, but this is safe to call unconditionally).
    pub async fn set(&self, req: &ChatRequest, resp: &ChatResponse) {
        if !self.config.enabled || !req.is_cacheable_shape() {
            return;
        }
        let key = fingerprint(req);
        let bytes = match serde_json::to_vec(resp) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "cache: failed to serialize response, skipping store");
                return;
            }
        };

        match &self.backend {
            Backend::InProcess(store) => store.set(key, bytes, self.config.ttl),
            Backend::External(ext) => {
                if let Err(e) = ext.set(&key, bytes, self.config.ttl).await {
                    tracing::warn!(error = %e, "cache: external backend set failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_gateway_core::{Choice, FinishReason, Message, Usage};

    fn sample_request(stream: bool, temperature: f32) -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![Message::user("ping")],
            temperature: Some(temperature),
            top_p: None,
            max_tokens: None,
            stop: None,
            stream,
            tools: None,
            response_format: None,
        }
    }

    fn sample_response() -> ChatResponse {
        ChatResponse::new(
            "resp-1".to_string(),
            "gpt-4o-mini".to_string(),
            vec![Choice {
                index: 0,
                message: Message::assistant("pong"),
                finish_reason: FinishReason::Stop,
            }],
            Usage {
                prompt_tokens: 1,
                completion_tokens: 1,
                total_tokens: 2,
            },
        )
    }

    #[tokio::test]
    async fn miss_then_hit_after_set() {
        let cache = Cache::new(CacheConfig::default(), None);
        let req = sample_request(false, 0.0);
        assert!(matches!(cache.get(&req).await, CacheLookup::Miss));
        cache.set(&req, &sample_response()).await;
        match cache.get(&req).await {
            CacheLookup::Hit(resp) => assert_eq!(resp.id, "resp-1"),
            _ => panic!("expected cache hit"),
        }
    }

    #[tokio::test]
    async fn streaming_requests_are_never_cacheable() {
        let cache = Cache::new(CacheConfig::default(), None);
        let req = sample_request(true, 0.0);
        cache.set(&req, &sample_response()).await;
        assert!(matches!(cache.get(&req).await, CacheLookup::NotCacheable));
    }

    #[tokio::test]
    async fn high_temperature_requests_bypass_cache() {
        let cache = Cache::new(CacheConfig::default(), None);
        let req = sample_request(false, 0.9);
        cache.set(&req, &sample_response()).await;
        assert!(matches!(cache.get(&req).await, CacheLookup::NotCacheable));
    }

    #[tokio::test]
    async fn disabled_cache_is_always_not_cacheable() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = Cache::new(config, None);
        let req = sample_request(false, 0.0);
        assert!(matches!(cache.get(&req).await, CacheLookup::NotCacheable));
    }
}
