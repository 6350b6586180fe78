//! Scripted backend for tests
//!
//! Test seam; not part of public API stability guarantees.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use llmcompare_config::{LlmRole, ProviderConfig};
use llmcompare_utils::{ConfigError, GatewayError};

use crate::registry::BackendFactory;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};

type Script = dyn Fn(&LlmInvocation) -> Result<String, GatewayError> + Send + Sync;

/// Answers every invocation with a closure; clones share counters
#[derive(Clone)]
pub struct ScriptedBackend {
    script: Arc<Script>,
    calls: Arc<AtomicUsize>,
    purposes: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new(
        script: impl Fn(&LlmInvocation) -> Result<String, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Arc::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
            purposes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replies with the user prompt unchanged
    #[must_use]
    pub fn echo() -> Self {
        Self::new(|inv| Ok(inv.user_text().to_string()))
    }

    /// Replies with the same text every time
    #[must_use]
    pub fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Fails every call with `error`
    #[must_use]
    pub fn failing(error: GatewayError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Purposes of every invocation so far, in call order
    #[must_use]
    pub fn purposes(&self) -> Vec<String> {
        self.purposes
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Factory for [`ProviderRegistry::register`](crate::ProviderRegistry::register)
    #[must_use]
    pub fn factory(&self) -> BackendFactory {
        let backend = self.clone();
        Arc::new(
            move |_: LlmRole, _: &ProviderConfig| -> Result<Arc<dyn LlmBackend>, ConfigError> {
                Ok(Arc::new(backend.clone()))
            },
        )
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut purposes) = self.purposes.lock() {
            purposes.push(inv.purpose.clone());
        }
        let text = (self.script)(&inv)?;
        Ok(LlmResult::new(text, "scripted", inv.model.clone()))
    }
}
