use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use llmcompare_utils::ConfigError;

use crate::features::{FeatureRegistry, FeatureSpec};

pub const DEFAULT_NUM_PATTERNS: usize = 10;
pub const DEFAULT_MAX_FILES_TO_KEEP: usize = 10;
pub const DEFAULT_LOCK_WAIT_SECS: u64 = 30;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 8000;
pub const DEFAULT_EVALUATOR_CONCURRENCY: usize = 5;
pub const DEFAULT_DEGRADED_SCORE: f64 = 0.5;
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 5;

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    Env(String),
    ConfigFile(PathBuf),
    /// Set through [`ConfigBuilder`](crate::ConfigBuilder)
    Programmatic,
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Env(var) => write!(f, "env:{var}"),
            Self::ConfigFile(path) => write!(f, "config:{}", path.display()),
            Self::Programmatic => write!(f, "programmatic"),
            Self::Defaults => write!(f, "defaults"),
        }
    }
}

/// Values the CLI can override
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub feature: Option<String>,
    pub num_patterns: Option<usize>,
    pub data_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
}

/// Workflow-wide defaults
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub feature: Option<String>,
    pub num_patterns: usize,
    /// Root of per-feature dataset directories
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
    pub reports_dir: PathBuf,
    /// Dataset files kept per feature and role when pruning
    pub max_files_to_keep: usize,
    pub lock_wait_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            feature: None,
            num_patterns: DEFAULT_NUM_PATTERNS,
            data_dir: PathBuf::from("poc_data"),
            state_dir: PathBuf::from("workflow_states"),
            reports_dir: PathBuf::from("reports"),
            max_files_to_keep: DEFAULT_MAX_FILES_TO_KEEP,
            lock_wait_secs: DEFAULT_LOCK_WAIT_SECS,
        }
    }
}

impl Defaults {
    #[must_use]
    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }
}

/// The LLM roles of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmRole {
    /// LL1, the deployed configuration
    Baseline,
    /// LL2, the candidate configuration
    Target,
    /// LL3, the scorer
    Evaluator,
    /// Writes mock inputs; falls back to the evaluator's settings
    Generator,
}

impl LlmRole {
    pub const ALL: [LlmRole; 4] = [Self::Baseline, Self::Target, Self::Evaluator, Self::Generator];

    /// Environment variable prefix for this role
    #[must_use]
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::Baseline => "LL1",
            Self::Target => "LL2",
            Self::Evaluator => "LLM3",
            Self::Generator => "LLMGEN",
        }
    }

    /// Key of this role under `[llm]`
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Target => "target",
            Self::Evaluator => "evaluator",
            Self::Generator => "generator",
        }
    }
}

impl fmt::Display for LlmRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Connection settings for one LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Registry key: openai, azure, grok, gemini, ...
    pub provider: String,
    pub model: String,
    /// Resolved key; filled from `api_key_env` during discovery
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Environment variable holding the key
    pub api_key_env: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    #[must_use]
    pub fn default_for(role: LlmRole) -> Self {
        let (provider, model) = match role {
            LlmRole::Baseline | LlmRole::Target => ("openai", "gpt-4o-mini"),
            LlmRole::Evaluator | LlmRole::Generator => ("gemini", "gemini-2.0-flash"),
        };
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            api_key: None,
            api_key_env: format!("{}_API_KEY", role.env_prefix()),
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temperature: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `provider/model`, recorded on every dataset
    #[must_use]
    pub fn llm_version(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }

    /// The API key, or `MissingCredentials` naming the variable to set
    pub fn require_api_key(&self, role: LlmRole) -> Result<&str, ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredentials {
                role: role.to_string(),
                env_var: self.api_key_env.clone(),
            }),
        }
    }
}

/// Settings for every LLM role
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub baseline: ProviderConfig,
    pub target: ProviderConfig,
    pub evaluator: ProviderConfig,
    pub generator: Option<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            baseline: ProviderConfig::default_for(LlmRole::Baseline),
            target: ProviderConfig::default_for(LlmRole::Target),
            evaluator: ProviderConfig::default_for(LlmRole::Evaluator),
            generator: None,
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn for_role(&self, role: LlmRole) -> &ProviderConfig {
        match role {
            LlmRole::Baseline => &self.baseline,
            LlmRole::Target => &self.target,
            LlmRole::Evaluator => &self.evaluator,
            LlmRole::Generator => self.generator.as_ref().unwrap_or(&self.evaluator),
        }
    }

    pub(crate) fn for_role_mut(&mut self, role: LlmRole) -> &mut ProviderConfig {
        match role {
            LlmRole::Baseline => &mut self.baseline,
            LlmRole::Target => &mut self.target,
            LlmRole::Evaluator => &mut self.evaluator,
            LlmRole::Generator => self
                .generator
                .get_or_insert_with(|| ProviderConfig::default_for(LlmRole::Generator)),
        }
    }
}

/// Bounded exponential backoff for transient gateway failures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first call
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorSettings {
    /// Dimensions scored concurrently
    pub max_concurrency: usize,
    /// Group score used when none of its dimensions could be parsed
    pub degraded_default: f64,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_EVALUATOR_CONCURRENCY,
            degraded_default: DEFAULT_DEGRADED_SCORE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparatorSettings {
    pub max_recommendations: usize,
}

impl Default for ComparatorSettings {
    fn default() -> Self {
        Self {
            max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
        }
    }
}

/// Effective configuration after merging CLI, environment, file and defaults
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub llm: LlmConfig,
    pub retry: RetrySettings,
    pub evaluator: EvaluatorSettings,
    pub comparator: ComparatorSettings,
    pub features: FeatureRegistry,
    /// Config file that was loaded, if any
    pub config_path: Option<PathBuf>,
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            llm: LlmConfig::default(),
            retry: RetrySettings::default(),
            evaluator: EvaluatorSettings::default(),
            comparator: ComparatorSettings::default(),
            features: FeatureRegistry::builtin(),
            config_path: None,
            source_attribution: HashMap::new(),
        }
    }
}

impl Config {
    /// Resolve a feature by name
    pub fn feature(&self, name: &str) -> Result<&FeatureSpec, ConfigError> {
        self.features.get(name)
    }

    /// Feature from the CLI/env/file, or `MissingRequired`
    pub fn default_feature(&self) -> Result<&FeatureSpec, ConfigError> {
        let name = self
            .defaults
            .feature
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired("feature".to_string()))?;
        self.feature(name)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.defaults.num_patterns == 0 {
            errors.push(("num_patterns", "0".to_string()));
        }
        if self.retry.max_attempts == 0 {
            errors.push(("retry.max_attempts", "0".to_string()));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            errors.push((
                "retry.initial_backoff_ms",
                format!(
                    "{} exceeds max_backoff_ms {}",
                    self.retry.initial_backoff_ms, self.retry.max_backoff_ms
                ),
            ));
        }
        if self.evaluator.max_concurrency == 0 {
            errors.push(("evaluator.max_concurrency", "0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.evaluator.degraded_default) {
            errors.push((
                "evaluator.degraded_default",
                self.evaluator.degraded_default.to_string(),
            ));
        }
        for role in LlmRole::ALL {
            let provider = self.llm.for_role(role);
            if provider.timeout_secs == 0 {
                errors.push(("llm.*.timeout_secs", format!("0 for {role}")));
            }
            if provider.model.trim().is_empty() {
                errors.push(("llm.*.model", format!("empty for {role}")));
            }
        }

        match errors.into_iter().next() {
            None => Ok(()),
            Some((key, value)) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        }
    }

    /// Where a value came from, for `--verbose` diagnostics
    #[must_use]
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.source_attribution
            .get(key)
            .cloned()
            .unwrap_or(ConfigSource::Defaults)
    }
}
