//! Core types for the LLM gateway

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use llmcompare_utils::GatewayError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// One request to an LLM backend
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// What the call is for, e.g. `raw_ll1:gen_003` or `evaluate:style`; logged only
    pub purpose: String,
    pub model: String,
    pub timeout: Duration,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub metadata: HashMap<String, String>,
}

impl LlmInvocation {
    pub fn new(
        purpose: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            purpose: purpose.into(),
            model: model.into(),
            timeout,
            messages,
            temperature: None,
            max_tokens: None,
            metadata: HashMap::new(),
        }
    }

    /// Concatenated content of every system message
    #[must_use]
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Content of the last user message
    #[must_use]
    pub fn user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map_or("", |m| m.content.as_str())
    }
}

/// Result of a successful LLM call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResult {
    pub text: String,
    pub provider: String,
    pub model_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_input: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_output: Option<u64>,
    /// Wall time of the successful attempt
    pub elapsed_ms: u64,
}

impl LlmResult {
    pub fn new(
        text: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
            elapsed_ms: 0,
        }
    }
}

/// A provider able to answer an invocation
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Registry name of the provider, used in logs and errors
    fn provider(&self) -> &str;

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, GatewayError>;
}
