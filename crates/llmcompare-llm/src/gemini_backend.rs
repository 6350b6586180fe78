//! Google Gemini `generateContent` backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use llmcompare_config::{LlmRole, ProviderConfig};
use llmcompare_utils::{ConfigError, GatewayError};

use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Role};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const PROVIDER: &str = "gemini";

pub struct GeminiBackend {
    client: HttpClient,
    api_key: String,
    /// Base URL; the model path is appended per call
    base_url: String,
}

impl GeminiBackend {
    /// # Errors
    /// `MissingCredentials` without an API key.
    pub fn from_provider_config(role: LlmRole, config: &ProviderConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key(role)?.to_string();
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| GEMINI_BASE_URL.to_string());
        let client = HttpClient::new().map_err(|e| ConfigError::InvalidValue {
            key: format!("llm.{}.provider", role.key()),
            value: e.to_string(),
        })?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, model: &str) -> String {
        format!("{}/{model}:generateContent", self.base_url)
    }

    fn build_request(inv: &LlmInvocation) -> GenerateRequest {
        let contents = inv
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(match m.role {
                    Role::Assistant => "model".to_string(),
                    _ => "user".to_string(),
                }),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GenerateRequest {
            contents,
            system_instruction: inv.system_text().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig {
                temperature: inv.temperature,
                max_output_tokens: inv.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, GatewayError> {
        let body = Self::build_request(&inv);
        let started = Instant::now();

        let request = self
            .client
            .post(&format!("{}?key={}", self.url_for(&inv.model), self.api_key))
            .json(&body);

        let response = self.client.execute(request, inv.timeout, PROVIDER).await?;
        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            GatewayError::InvalidRequest(format!("gemini returned an unreadable body: {e}"))
        })?;

        let text = parsed.first_text().ok_or_else(|| {
            GatewayError::InvalidRequest("gemini returned no candidates".to_string())
        })?;

        let mut result = LlmResult::new(text, PROVIDER, inv.model.clone());
        if let Some(usage) = parsed.usage_metadata {
            result.tokens_input = usage.prompt_token_count;
            result.tokens_output = usage.candidates_token_count;
        }
        result.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        debug!(
            provider = PROVIDER,
            purpose = %inv.purpose,
            tokens_output = ?result.tokens_output,
            "generateContent finished"
        );
        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        Some(text)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}
