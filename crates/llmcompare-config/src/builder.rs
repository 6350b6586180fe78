use std::collections::HashMap;
use std::path::PathBuf;

use llmcompare_utils::ConfigError;

use crate::features::{FeatureOverride, FeatureRegistry};
use crate::model::{
    ComparatorSettings, Config, ConfigSource, Defaults, EvaluatorSettings, LlmConfig, LlmRole,
    ProviderConfig, RetrySettings,
};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// No files or environment variables are consulted; values not set on the
    /// builder keep their defaults.
    ///
    /// ```rust
    /// use llmcompare_config::Config;
    ///
    /// let config = Config::builder()
    ///     .feature("generate_code")
    ///     .data_dir("/tmp/llmcompare/data")
    ///     .num_patterns(3)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.defaults.num_patterns, 3);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Fluent builder for [`Config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    defaults: Defaults,
    llm: LlmConfig,
    retry: RetrySettings,
    evaluator: EvaluatorSettings,
    comparator: ComparatorSettings,
    features: Vec<(String, FeatureOverride)>,
    set_keys: Vec<String>,
}

impl ConfigBuilder {
    fn mark(mut self, key: &str) -> Self {
        self.set_keys.push(key.to_string());
        self
    }

    #[must_use]
    pub fn feature(mut self, name: impl Into<String>) -> Self {
        self.defaults.feature = Some(name.into());
        self.mark("feature")
    }

    #[must_use]
    pub fn num_patterns(mut self, n: usize) -> Self {
        self.defaults.num_patterns = n;
        self.mark("num_patterns")
    }

    #[must_use]
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.defaults.data_dir = path.into();
        self.mark("data_dir")
    }

    #[must_use]
    pub fn state_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.defaults.state_dir = path.into();
        self.mark("state_dir")
    }

    #[must_use]
    pub fn reports_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.defaults.reports_dir = path.into();
        self.mark("reports_dir")
    }

    /// Put data, state and reports under one root directory
    #[must_use]
    pub fn root_dir(self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.data_dir(root.join("poc_data"))
            .state_dir(root.join("workflow_states"))
            .reports_dir(root.join("reports"))
    }

    #[must_use]
    pub fn max_files_to_keep(mut self, n: usize) -> Self {
        self.defaults.max_files_to_keep = n;
        self.mark("max_files_to_keep")
    }

    #[must_use]
    pub fn lock_wait_secs(mut self, secs: u64) -> Self {
        self.defaults.lock_wait_secs = secs;
        self.mark("lock_wait_secs")
    }

    #[must_use]
    pub fn provider(mut self, role: LlmRole, provider: ProviderConfig) -> Self {
        match role {
            LlmRole::Baseline => self.llm.baseline = provider,
            LlmRole::Target => self.llm.target = provider,
            LlmRole::Evaluator => self.llm.evaluator = provider,
            LlmRole::Generator => self.llm.generator = Some(provider),
        }
        let key = format!("llm.{}", role.key());
        self.mark(&key)
    }

    #[must_use]
    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self.mark("retry")
    }

    #[must_use]
    pub fn evaluator_settings(mut self, settings: EvaluatorSettings) -> Self {
        self.evaluator = settings;
        self.mark("evaluator")
    }

    #[must_use]
    pub fn max_recommendations(mut self, n: usize) -> Self {
        self.comparator.max_recommendations = n;
        self.mark("comparator.max_recommendations")
    }

    #[must_use]
    pub fn feature_override(mut self, name: impl Into<String>, ov: FeatureOverride) -> Self {
        self.features.push((name.into(), ov));
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut features = FeatureRegistry::builtin();
        for (name, ov) in self.features {
            features.apply_override(&name, ov)?;
        }

        let source_attribution: HashMap<String, ConfigSource> = self
            .set_keys
            .into_iter()
            .map(|k| (k, ConfigSource::Programmatic))
            .collect();

        let config = Config {
            defaults: self.defaults,
            llm: self.llm,
            retry: self.retry,
            evaluator: self.evaluator,
            comparator: self.comparator,
            features,
            config_path: None,
            source_attribution,
        };
        config.validate()?;
        Ok(config)
    }
}
