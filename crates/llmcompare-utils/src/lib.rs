//! Foundation crate for llmcompare: errors, exit codes, atomic file writes,
//! canonical JSON, logging and the shared data model.

pub mod atomic_write;
pub mod canonicalization;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod redaction;
pub mod types;

pub use error::{
    ApiError, ConfigError, ErrorCategory, EvaluationError, GatewayError, GatewayErrorKind,
    GenerationError, LlmCompareError, LockError, NotFoundError, StateError, StoreError,
    UserFriendlyError,
};
pub use exit_codes::ExitCode;
