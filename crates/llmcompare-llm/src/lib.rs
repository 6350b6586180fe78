//! LLM gateway for llmcompare
//!
//! All providers implement [`LlmBackend`]. The [`ProviderRegistry`] turns a
//! role's provider settings into a [`Gateway`]: the backend wrapped with
//! per-call timeout and retry, plus the model parameters for that role.

mod gemini_backend;
pub(crate) mod http_client;
pub mod json_sanitizer;
mod openai_backend;
mod registry;
mod retrying_backend;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use gemini_backend::GeminiBackend;
pub use openai_backend::{OpenAiBackend, OpenAiFlavor};
pub use registry::{BackendFactory, Gateway, ProviderRegistry};
pub use retrying_backend::{RetryPolicy, RetryingBackend};
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};
