use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::redaction::redact_secrets;
use crate::types::Phase;
pub use llmcompare_lock::LockError;

/// Library-level error type for llmcompare operations.
///
/// | Variant | Meaning | Exit code |
/// |---------|---------|-----------|
/// | `Config` | missing/invalid credentials, unknown feature, bad config file | 2 |
/// | `State` | illegal workflow transition, unresolved selection | 3 |
/// | `NotFound` | dataset, baseline, inputs file or report missing | 4 |
/// | `Lock` | another writer held the feature lock too long | 9 |
/// | `Api` | gateway failure after retries, or a permanent one | 70 |
/// | `Evaluation`, `Generation` | unusable evaluator/generator output | 70 |
/// | `Store`, `Io` | corrupt files, filesystem failures | 1 |
///
/// Library code returns this type and never exits the process; the CLI maps
/// it with [`to_exit_code`](Self::to_exit_code) and prints
/// [`display_for_user`](Self::display_for_user).
#[derive(Error, Debug)]
pub enum LlmCompareError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Workflow state error: {0}")]
    State(#[from] StateError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Input generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that provide user-facing context and suggestions
pub trait UserFriendlyError {
    fn user_message(&self) -> String;

    fn context(&self) -> Option<String>;

    fn suggestions(&self) -> Vec<String>;

    fn category(&self) -> ErrorCategory;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Workflow,
    Storage,
    Provider,
    Concurrency,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Workflow => write!(f, "Workflow"),
            Self::Storage => write!(f, "Storage"),
            Self::Provider => write!(f, "LLM Provider"),
            Self::Concurrency => write!(f, "Concurrency"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Unknown feature '{name}' (known: {})", .known.join(", "))]
    UnknownFeature { name: String, known: Vec<String> },

    #[error("Unknown LLM provider '{name}' (known: {})", .known.join(", "))]
    UnknownProvider { name: String, known: Vec<String> },

    #[error("Missing API key for the {role} LLM (set {env_var})")]
    MissingCredentials { role: String, env_var: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => format!("Configuration file has invalid format: {reason}"),
            Self::MissingRequired(key) => format!("Required configuration '{key}' is missing"),
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::UnknownFeature { name, .. } => format!("Feature '{name}' is not configured"),
            Self::UnknownProvider { name, .. } => format!("LLM provider '{name}' is not supported"),
            Self::MissingCredentials { role, .. } => {
                format!("No API key is configured for the {role} LLM")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::UnknownFeature { known, .. } => Some(format!("Known features: {}", known.join(", "))),
            Self::UnknownProvider { known, .. } => {
                Some(format!("Registered providers: {}", known.join(", ")))
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .llmcompare/config.toml".to_string(),
                "Pass --config to point at a different file".to_string(),
            ],
            Self::NotFound { .. } => {
                vec!["Check the path given to --config".to_string()]
            }
            Self::UnknownFeature { .. } => vec![
                "Run 'llmcompare list-features' to see available features".to_string(),
                "Add the feature under [features.<name>] in the config file".to_string(),
            ],
            Self::UnknownProvider { .. } => {
                vec!["Use one of: openai, azure, grok, gemini".to_string()]
            }
            Self::MissingCredentials { env_var, .. } => vec![
                format!("Export {env_var} with a valid API key"),
                "Or set api_key_env for this LLM in the config file".to_string(),
            ],
            Self::MissingRequired(_) | Self::InvalidValue { .. } => {
                vec!["Review the configuration values and defaults".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Cannot {event} for feature '{feature}' in phase {from}: {reason}")]
    IllegalTransition {
        feature: String,
        from: Phase,
        event: String,
        reason: String,
    },

    #[error("Feature '{feature}' has no baselines")]
    NoBaselines { feature: String },

    #[error("Feature '{feature}' has {count} baselines and none is selected")]
    AmbiguousBaseline { feature: String, count: usize },

    #[error("The {side} dataset for feature '{feature}' has not been evaluated")]
    NotEvaluated { feature: String, side: String },

    #[error("Workflow state for feature '{feature}' is inconsistent: {reason}")]
    Corrupt { feature: String, reason: String },
}

impl UserFriendlyError for StateError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::IllegalTransition { from, .. } => Some(format!("Current phase: {from}")),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::IllegalTransition { .. } => vec![
                "Run 'llmcompare status --feature <name>' to see the next step".to_string(),
            ],
            Self::NoBaselines { .. } => {
                vec!["Run the baseline phase first: llmcompare run --phase baseline".to_string()]
            }
            Self::AmbiguousBaseline { .. } => vec![
                "List baselines with 'llmcompare baselines --feature <name>'".to_string(),
                "Pick one with 'llmcompare select-baseline' or pass --baseline".to_string(),
            ],
            Self::NotEvaluated { .. } => vec![
                "Rerun the phase without --skip-evaluation".to_string(),
                "Or pass --allow-partial to compare unevaluated datasets".to_string(),
            ],
            Self::Corrupt { .. } => {
                vec!["Inspect or remove the feature's state file".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Workflow
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotFoundError {
    #[error("Dataset '{id}' for feature '{feature}' not found")]
    Dataset { feature: String, id: String },

    #[error("Baseline '{id}' for feature '{feature}' not found")]
    Baseline { feature: String, id: String },

    #[error("Inputs file not found: {path}")]
    InputsFile { path: String },

    #[error("Report not found: {path}")]
    Report { path: String },
}

/// Failure reported by an LLM gateway call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Network/transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// 401/403 or missing key
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// 429
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// 5xx
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Request rejected as malformed (other 4xx, unparsable response)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<GatewayError>,
    },
}

/// Retry classification of a [`GatewayError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Transient,
    Permanent,
}

impl GatewayError {
    #[must_use]
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::Transport(_)
            | Self::ProviderQuota(_)
            | Self::ProviderOutage(_)
            | Self::Timeout { .. } => GatewayErrorKind::Transient,
            Self::ProviderAuth(_)
            | Self::InvalidRequest(_)
            | Self::Misconfiguration(_)
            | Self::Unsupported(_)
            | Self::RetriesExhausted { .. } => GatewayErrorKind::Permanent,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == GatewayErrorKind::Transient
    }

    /// Number of attempts made before this error surfaced
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

/// A gateway failure surfaced to the workflow
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{provider} call failed after {attempts} attempt(s): {source}")]
pub struct ApiError {
    pub provider: String,
    pub attempts: u32,
    pub source: GatewayError,
}

impl ApiError {
    #[must_use]
    pub fn from_gateway(provider: impl Into<String>, error: GatewayError) -> Self {
        Self {
            provider: provider.into(),
            attempts: error.attempts(),
            source: error,
        }
    }
}

impl UserFriendlyError for ApiError {
    fn user_message(&self) -> String {
        format!("The {} LLM call failed", self.provider)
    }

    fn context(&self) -> Option<String> {
        Some(format!("{} (attempts: {})", self.source, self.attempts))
    }

    fn suggestions(&self) -> Vec<String> {
        let root = match &self.source {
            GatewayError::RetriesExhausted { last, .. } => last.as_ref(),
            other => other,
        };
        match root {
            GatewayError::ProviderAuth(_) => vec!["Check the API key for this provider".to_string()],
            GatewayError::ProviderQuota(_) => vec![
                "Wait for the provider's rate limit to reset".to_string(),
                "Lower evaluator.max_concurrency".to_string(),
            ],
            GatewayError::Timeout { .. } => {
                vec!["Increase timeout_secs for this LLM in the config file".to_string()]
            }
            GatewayError::ProviderOutage(_) | GatewayError::Transport(_) => {
                vec!["Retry later; the provider appears unavailable".to_string()]
            }
            _ => vec!["Check the provider, model and endpoint configuration".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Provider
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Corrupt JSON in {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("No dimension of dataset '{dataset_id}' could be scored: {}", .failures.join("; "))]
    AllDimensionsFailed {
        dataset_id: String,
        failures: Vec<String>,
    },

    #[error("Dataset '{dataset_id}' has no outputs to evaluate")]
    EmptyDataset { dataset_id: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Generator reply for feature '{feature}' is not valid JSON: {reason}")]
    Unparsable { feature: String, reason: String },

    #[error("No usable inputs for feature '{feature}': {reason}")]
    NoUsableInputs { feature: String, reason: String },
}

impl LlmCompareError {
    /// Error message with context and suggestions for terminal output.
    ///
    /// Secrets are redacted as a final safety net.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        redact_secrets(&output)
    }

    /// Map this error to its CLI exit code
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::State(_) => ExitCode::STATE,
            Self::NotFound(_) => ExitCode::NOT_FOUND,
            Self::Lock(LockError::Timeout { .. }) => ExitCode::LOCK_HELD,
            Self::Api(_) | Self::Evaluation(_) | Self::Generation(_) => ExitCode::API_FAILURE,
            Self::Lock(_) | Self::Store(_) | Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}

impl UserFriendlyError for LlmCompareError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::State(e) => e.user_message(),
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::State(e) => e.context(),
            Self::Api(e) => e.context(),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::State(e) => e.suggestions(),
            Self::Api(e) => e.suggestions(),
            Self::NotFound(_) => vec![
                "Run 'llmcompare status --feature <name>' to see what exists".to_string(),
            ],
            Self::Lock(_) => vec![
                "Another llmcompare run is updating this feature; retry when it finishes"
                    .to_string(),
            ],
            Self::Evaluation(_) => vec![
                "Check that the evaluator model follows the 'label: score' reply format"
                    .to_string(),
            ],
            Self::Generation(_) => vec![
                "Provide inputs explicitly with --inputs <file>".to_string(),
            ],
            Self::Store(_) | Self::Io(_) => vec![
                "Check permissions and free space in the data, state and reports directories"
                    .to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::State(_) => ErrorCategory::Workflow,
            Self::Api(_) => ErrorCategory::Provider,
            Self::Lock(_) => ErrorCategory::Concurrency,
            Self::Evaluation(_) | Self::Generation(_) => ErrorCategory::Validation,
            Self::NotFound(_) | Self::Store(_) | Self::Io(_) => ErrorCategory::Storage,
        }
    }
}
