//! Provider registry and the per-role gateway handle
//!
//! Providers are looked up by name, so new ones can be registered without
//! touching the workflow. Gateways are built lazily per role; a role whose
//! credentials are missing only fails when it is actually needed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use llmcompare_config::{Config, LlmRole, ProviderConfig};
use llmcompare_utils::{ConfigError, GatewayError};

use crate::gemini_backend::GeminiBackend;
use crate::openai_backend::{OpenAiBackend, OpenAiFlavor};
use crate::retrying_backend::{RetryPolicy, RetryingBackend};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message};

/// Builds a backend for one role from its provider settings
pub type BackendFactory =
    Arc<dyn Fn(LlmRole, &ProviderConfig) -> Result<Arc<dyn LlmBackend>, ConfigError> + Send + Sync>;

#[derive(Clone)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtin_providers()
    }
}

impl ProviderRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// `openai`, `azure`, `grok` and `gemini`
    #[must_use]
    pub fn with_builtin_providers() -> Self {
        let mut registry = Self::empty();
        for flavor in [OpenAiFlavor::OpenAi, OpenAiFlavor::Azure, OpenAiFlavor::Grok] {
            registry.register(
                flavor.provider_name(),
                Arc::new(
                    move |role: LlmRole,
                          config: &ProviderConfig|
                          -> Result<Arc<dyn LlmBackend>, ConfigError> {
                        Ok(Arc::new(OpenAiBackend::from_provider_config(
                            flavor, role, config,
                        )?))
                    },
                ),
            );
        }
        registry.register(
            "gemini",
            Arc::new(
                |role: LlmRole, config: &ProviderConfig| -> Result<Arc<dyn LlmBackend>, ConfigError> {
                    Ok(Arc::new(GeminiBackend::from_provider_config(role, config)?))
                },
            ),
        );
        registry
    }

    /// Add or replace a provider
    pub fn register(&mut self, name: impl Into<String>, factory: BackendFactory) {
        self.factories.insert(name.into(), factory);
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Build the gateway for `role`, wrapped in the configured retry policy.
    ///
    /// # Errors
    /// `UnknownProvider` for an unregistered provider name, or whatever the
    /// provider factory reports (typically `MissingCredentials`).
    pub fn gateway(&self, config: &Config, role: LlmRole) -> Result<Gateway, ConfigError> {
        let provider_config = config.llm.for_role(role);
        let factory =
            self.factories
                .get(&provider_config.provider)
                .ok_or_else(|| ConfigError::UnknownProvider {
                    name: provider_config.provider.clone(),
                    known: self.names(),
                })?;
        let backend = factory(role, provider_config)?;
        let retrying = RetryingBackend::new(backend, RetryPolicy::from(&config.retry));
        Ok(Gateway::new(role, Arc::new(retrying), provider_config))
    }
}

/// Ready-to-call handle for one LLM role
#[derive(Clone)]
pub struct Gateway {
    role: LlmRole,
    backend: Arc<dyn LlmBackend>,
    model: String,
    timeout: Duration,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    llm_version: String,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("role", &self.role)
            .field("llm_version", &self.llm_version)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(role: LlmRole, backend: Arc<dyn LlmBackend>, config: &ProviderConfig) -> Self {
        Self {
            role,
            backend,
            model: config.model.clone(),
            timeout: config.timeout(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            llm_version: config.llm_version(),
        }
    }

    #[must_use]
    pub fn role(&self) -> LlmRole {
        self.role
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        self.backend.provider()
    }

    /// `provider/model`
    #[must_use]
    pub fn llm_version(&self) -> &str {
        &self.llm_version
    }

    /// Send one prompt, with an optional system prompt
    pub async fn complete(
        &self,
        purpose: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<LlmResult, GatewayError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));

        let mut inv = LlmInvocation::new(purpose, self.model.clone(), self.timeout, messages);
        inv.temperature = self.temperature;
        inv.max_tokens = self.max_tokens;
        inv.metadata
            .insert("role".to_string(), self.role.key().to_string());
        self.backend.invoke(inv).await
    }
}
