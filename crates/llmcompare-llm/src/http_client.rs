//! Shared HTTP client for the HTTP-based providers
//!
//! One `reqwest::Client` is built per backend and reused for every call.
//! This layer only classifies failures; retries belong to
//! [`RetryingBackend`](crate::RetryingBackend).

use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use llmcompare_utils::GatewayError;
use llmcompare_utils::redaction::redact_secrets;

/// Upper bound for any single request
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest provider error body quoted in an error message
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                GatewayError::Misconfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
        })
    }

    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(url)
    }

    /// Send one request and classify the outcome.
    ///
    /// 401/403 map to `ProviderAuth`, 429 to `ProviderQuota`, other 4xx to
    /// `InvalidRequest`, 5xx to `ProviderOutage`. A client-side timeout maps
    /// to `Timeout` and any other send failure to `Transport`.
    pub async fn execute(
        &self,
        request_builder: reqwest::RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, GatewayError> {
        let effective_timeout = request_timeout.min(self.max_timeout);

        let request = request_builder
            .timeout(effective_timeout)
            .build()
            .map_err(|e| {
                GatewayError::InvalidRequest(format!(
                    "Failed to build request: {}",
                    redact_secrets(&e.to_string())
                ))
            })?;

        debug!(
            provider = provider_name,
            timeout_secs = effective_timeout.as_secs(),
            "Executing HTTP request"
        );

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let body = response.text().await.unwrap_or_default();
                Err(map_status_error(status, provider_name, &body))
            }
            Err(e) if e.is_timeout() => Err(GatewayError::Timeout {
                duration: effective_timeout,
            }),
            Err(e) => Err(GatewayError::Transport(format!(
                "{provider_name} request failed: {}",
                redact_secrets(&e.to_string())
            ))),
        }
    }
}

/// Map a non-success HTTP status to a gateway error
pub(crate) fn map_status_error(status: StatusCode, provider_name: &str, body: &str) -> GatewayError {
    let detail = error_detail(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::ProviderAuth(format!(
            "{provider_name} authentication failed: {status}{detail}"
        )),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::ProviderQuota(format!(
            "{provider_name} rate limit exceeded: {status}{detail}"
        )),
        s if s.is_server_error() => GatewayError::ProviderOutage(format!(
            "{provider_name} returned server error: {status}{detail}"
        )),
        _ => GatewayError::InvalidRequest(format!(
            "{provider_name} rejected the request: {status}{detail}"
        )),
    }
}

fn error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let clipped: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!(" ({})", redact_secrets(&clipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_construction() {
        let client = HttpClient::with_max_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(client.max_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_map_401_and_403_to_provider_auth() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            match map_status_error(status, "openai", "") {
                GatewayError::ProviderAuth(msg) => {
                    assert!(msg.contains("openai"));
                    assert!(msg.contains(status.as_str()));
                }
                other => panic!("expected ProviderAuth for {status}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_map_429_to_provider_quota() {
        let err = map_status_error(StatusCode::TOO_MANY_REQUESTS, "gemini", "slow down");
        match err {
            GatewayError::ProviderQuota(msg) => {
                assert!(msg.contains("429"));
                assert!(msg.contains("slow down"));
            }
            other => panic!("expected ProviderQuota, got {other:?}"),
        }
        assert!(
            map_status_error(StatusCode::TOO_MANY_REQUESTS, "gemini", "").is_transient()
        );
    }

    #[test]
    fn test_map_5xx_to_outage_and_other_4xx_to_invalid_request() {
        assert!(matches!(
            map_status_error(StatusCode::BAD_GATEWAY, "grok", ""),
            GatewayError::ProviderOutage(_)
        ));
        let bad = map_status_error(StatusCode::BAD_REQUEST, "grok", "");
        assert!(matches!(bad, GatewayError::InvalidRequest(_)));
        assert!(!bad.is_transient());
    }

    #[test]
    fn test_error_body_is_clipped_and_redacted() {
        let body = format!(
            "invalid key sk-abcdefghijklmnopqrstuvwxyz0123456789 {}",
            "x".repeat(1000)
        );
        let err = map_status_error(StatusCode::UNAUTHORIZED, "openai", &body);
        let msg = err.to_string();
        assert!(!msg.contains("sk-abcdefghijklmnopqrstuvwxyz0123456789"));
        assert!(msg.len() < 500);
    }
}
