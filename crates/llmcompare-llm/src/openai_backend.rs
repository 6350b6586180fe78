//! OpenAI-compatible chat completions backend
//!
//! Serves the `openai`, `grok` and `azure` providers. They share the request
//! and response shapes and differ in endpoint and auth header.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use llmcompare_config::{LlmRole, ProviderConfig};
use llmcompare_utils::{ConfigError, GatewayError};

use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const GROK_ENDPOINT: &str = "https://api.x.ai/v1/chat/completions";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Which flavour of the OpenAI wire format to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiFlavor {
    OpenAi,
    Grok,
    /// Azure OpenAI: endpoint is mandatory, key goes in the `api-key` header
    Azure,
}

impl OpenAiFlavor {
    #[must_use]
    pub fn provider_name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Grok => "grok",
            Self::Azure => "azure",
        }
    }

    fn default_endpoint(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some(OPENAI_ENDPOINT),
            Self::Grok => Some(GROK_ENDPOINT),
            Self::Azure => None,
        }
    }
}

pub struct OpenAiBackend {
    client: HttpClient,
    flavor: OpenAiFlavor,
    api_key: String,
    endpoint: String,
}

impl OpenAiBackend {
    /// Build a backend from one role's provider settings.
    ///
    /// # Errors
    /// `MissingCredentials` without an API key; `MissingRequired` for Azure
    /// without an endpoint.
    pub fn from_provider_config(
        flavor: OpenAiFlavor,
        role: LlmRole,
        config: &ProviderConfig,
    ) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key(role)?.to_string();
        let endpoint = match (&config.endpoint, flavor.default_endpoint()) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Some(default)) => default.to_string(),
            (None, None) => {
                return Err(ConfigError::MissingRequired(format!(
                    "llm.{}.endpoint",
                    role.key()
                )));
            }
        };
        let client = HttpClient::new().map_err(|e| ConfigError::InvalidValue {
            key: format!("llm.{}.provider", role.key()),
            value: e.to_string(),
        })?;

        Ok(Self {
            client,
            flavor,
            api_key,
            endpoint,
        })
    }

    fn build_request(&self, inv: &LlmInvocation) -> ChatRequest {
        ChatRequest {
            model: inv.model.clone(),
            messages: inv
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: inv.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: inv.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            stream: false,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn provider(&self) -> &str {
        self.flavor.provider_name()
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, GatewayError> {
        let provider = self.flavor.provider_name();
        let body = self.build_request(&inv);
        let started = Instant::now();

        let request = self.client.post(&self.endpoint).json(&body);
        let request = match self.flavor {
            OpenAiFlavor::Azure => request.header("api-key", &self.api_key),
            OpenAiFlavor::OpenAi | OpenAiFlavor::Grok => request.bearer_auth(&self.api_key),
        };

        let response = self.client.execute(request, inv.timeout, provider).await?;
        let parsed: ChatResponse = response.json().await.map_err(|e| {
            GatewayError::InvalidRequest(format!("{provider} returned an unreadable body: {e}"))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!("{provider} returned no choices"))
            })?;

        let mut result = LlmResult::new(text, provider, inv.model.clone());
        if let Some(usage) = parsed.usage {
            result.tokens_input = Some(usage.prompt_tokens);
            result.tokens_output = Some(usage.completion_tokens);
        }
        result.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        debug!(
            provider,
            purpose = %inv.purpose,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Chat completion finished"
        );
        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
