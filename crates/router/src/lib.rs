//! Model → provider resolution (§4.2).
//!
//! Each adapter owns its own prefix tables and model catalog via
//! `ProviderAdapter::supports_model`; the router only decides resolution
//! order and the default-provider fallback.

use std::collections::HashMap;
use std::sync::Arc;

use llm_gateway_core::GatewayError;
use llm_gateway_resilience::ResilientProvider;

/// Holds one resilient provider per configured vendor and resolves
/// `model` identifiers against them in registration order.
pub struct Router {
    providers: Vec<Arc<ResilientProvider>>,
    by_name: HashMap<String, Arc<ResilientProvider>>,
    default_provider: Option<String>,
}

impl Router {
    pub fn new(default_provider: Option<String>) -> Self {
        Self {
            providers: Vec::new(),
            by_name: HashMap::new(),
            default_provider,
        }
    }

    pub fn register(&mut self, provider: Arc<ResilientProvider>) {
        self.by_name
            .insert(provider.name().to_string(), provider.clone());
        self.providers.push(provider);
    }

    /// Resolves `model` to a provider: first adapter (in registration
    /// order) whose prefix table or catalog matches; on miss, the
    /// configured default provider; otherwise `invalid_model`.
    pub fn resolve(&self, model: &str) -> Result<Arc<ResilientProvider>, GatewayError> {
        for provider in &self.providers {
            if provider.supports_model(model) {
                return Ok(provider.clone());
            }
        }

        if let Some(default_name) = &self.default_provider {
            if let Some(provider) = self.by_name.get(default_name) {
                tracing::debug!(
                    model,
                    provider = %default_name,
                    "no adapter claims this model, falling back to default provider"
                );
                return Ok(provider.clone());
            }
        }

        Err(GatewayError::InvalidModel(model.to_string()))
    }

    pub fn provider_by_name(&self, name: &str) -> Option<Arc<ResilientProvider>> {
        self.by_name.get(name).cloned()
    }

    pub fn providers(&self) -> &[Arc<ResilientProvider>] {
        &self.providers
    }
}
