//! Retry and timeout wrapper around any `LlmBackend`
//!
//! Every attempt is bounded by the invocation timeout. Transient failures
//! (transport, quota, outage, timeout) are retried with exponential backoff;
//! permanent ones surface immediately.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use llmcompare_config::RetrySettings;
use llmcompare_utils::GatewayError;

use crate::types::{LlmBackend, LlmInvocation, LlmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, doubling from the initial value
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }
}

pub struct RetryingBackend {
    inner: Arc<dyn LlmBackend>,
    policy: RetryPolicy,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn LlmBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl LlmBackend for RetryingBackend {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, GatewayError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(inv.timeout, self.inner.invoke(inv.clone())).await
            {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout {
                    duration: inv.timeout,
                }),
            };

            let error = match outcome {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(
                            provider = self.provider(),
                            purpose = %inv.purpose,
                            attempt,
                            "LLM call succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !error.is_transient() {
                return Err(error);
            }

            if attempt >= max_attempts {
                warn!(
                    provider = self.provider(),
                    purpose = %inv.purpose,
                    attempts = attempt,
                    error = %error,
                    "LLM call failed, retries exhausted"
                );
                return Err(GatewayError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let backoff = self.policy.backoff_for(attempt);
            warn!(
                provider = self.provider(),
                purpose = %inv.purpose,
                attempt,
                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Transient LLM failure, will retry"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the queued errors, then succeeds
    struct FlakyBackend {
        failures: Mutex<Vec<GatewayError>>,
        calls: AtomicU32,
    }

    impl FlakyBackend {
        fn new(mut failures: Vec<GatewayError>) -> Self {
            failures.reverse();
            Self {
                failures: Mutex::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for FlakyBackend {
        fn provider(&self) -> &str {
            "flaky"
        }

        async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failures.lock().unwrap().pop() {
                Some(err) => Err(err),
                None => Ok(LlmResult::new("ok", "flaky", "m")),
            }
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl LlmBackend for SlowBackend {
        fn provider(&self) -> &str {
            "slow"
        }

        async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(LlmResult::new("late", "slow", "m"))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn invocation(timeout: Duration) -> LlmInvocation {
        LlmInvocation::new("test", "m", timeout, vec![Message::user("hi")])
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(10), Duration::from_millis(300));
    }

    #[test]
    fn test_policy_from_settings_has_at_least_one_attempt() {
        let settings = RetrySettings {
            max_attempts: 0,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
        };
        assert_eq!(RetryPolicy::from(&settings).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let inner = Arc::new(FlakyBackend::new(vec![
            GatewayError::ProviderOutage("503".to_string()),
            GatewayError::ProviderQuota("429".to_string()),
        ]));
        let backend = RetryingBackend::new(inner.clone(), fast_policy(3));

        let result = backend.invoke(invocation(Duration::from_secs(5))).await.unwrap();
        assert_eq!(result.text, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let inner = Arc::new(FlakyBackend::new(vec![GatewayError::ProviderAuth(
            "401".to_string(),
        )]));
        let backend = RetryingBackend::new(inner.clone(), fast_policy(3));

        let err = backend.invoke(invocation(Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, GatewayError::ProviderAuth(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_reports_attempts() {
        let inner = Arc::new(FlakyBackend::new(vec![
            GatewayError::Transport("reset".to_string()),
            GatewayError::Transport("reset".to_string()),
            GatewayError::Transport("reset".to_string()),
        ]));
        let backend = RetryingBackend::new(inner.clone(), fast_policy(2));

        let err = backend.invoke(invocation(Duration::from_secs(5))).await.unwrap_err();
        match &err {
            GatewayError::RetriesExhausted { attempts, last } => {
                assert_eq!(*attempts, 2);
                assert!(matches!(**last, GatewayError::Transport(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(err.attempts(), 2);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let backend = RetryingBackend::new(Arc::new(SlowBackend), fast_policy(1));
        let err = backend
            .invoke(invocation(Duration::from_millis(20)))
            .await
            .unwrap_err();
        match err {
            GatewayError::RetriesExhausted { last, .. } => {
                assert_eq!(
                    *last,
                    GatewayError::Timeout {
                        duration: Duration::from_millis(20)
                    }
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
