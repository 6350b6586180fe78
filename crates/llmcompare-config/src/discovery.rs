use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use llmcompare_utils::ConfigError;

use crate::features::FeatureOverride;
use crate::model::{
    CliArgs, ComparatorSettings, Config, ConfigSource, EvaluatorSettings, LlmRole, RetrySettings,
};

/// Config file name, looked up in `.llmcompare/` directories
pub const CONFIG_DIR: &str = ".llmcompare";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<FileDefaults>,
    llm: Option<FileLlm>,
    retry: Option<FileRetry>,
    evaluator: Option<FileEvaluator>,
    comparator: Option<FileComparator>,
    features: Option<BTreeMap<String, FeatureOverride>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileDefaults {
    feature: Option<String>,
    num_patterns: Option<usize>,
    data_dir: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
    max_files_to_keep: Option<usize>,
    lock_wait_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLlm {
    baseline: Option<FileProvider>,
    target: Option<FileProvider>,
    evaluator: Option<FileProvider>,
    generator: Option<FileProvider>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileProvider {
    provider: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    api_key_env: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRetry {
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileEvaluator {
    max_concurrency: Option<usize>,
    degraded_default: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileComparator {
    max_recommendations: Option<usize>,
}

/// Overwrite `$target` with `$value` if present and record where it came from
macro_rules! apply {
    ($attr:expr, $key:expr, $source:expr, $target:expr, $value:expr) => {
        if let Some(v) = $value {
            $target = v;
            $attr.insert($key.to_string(), $source.clone());
        }
    };
}

impl Config {
    /// Discover configuration from the current directory and process environment.
    ///
    /// Precedence: CLI > environment > config file > defaults.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::InvalidValue {
            key: "current_dir".to_string(),
            value: e.to_string(),
        })?;
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::discover_from(&start_dir, cli_args, &env)
    }

    /// Path- and environment-driven discovery, used directly by tests.
    pub fn discover_from(
        start_dir: &Path,
        cli_args: &CliArgs,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        let mut attr = HashMap::new();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            let file = load_config_file(path)?;
            let src = ConfigSource::ConfigFile(path.clone());
            config.apply_file(file, &src, &mut attr)?;
        }

        config.apply_env(env, &mut attr);

        let cli = ConfigSource::Cli;
        let d = &mut config.defaults;
        apply!(attr, "feature", cli, d.feature, cli_args.feature.clone().map(Some));
        apply!(attr, "num_patterns", cli, d.num_patterns, cli_args.num_patterns);
        apply!(attr, "data_dir", cli, d.data_dir, cli_args.data_dir.clone());
        apply!(attr, "state_dir", cli, d.state_dir, cli_args.state_dir.clone());
        apply!(attr, "reports_dir", cli, d.reports_dir, cli_args.reports_dir.clone());

        config.config_path = config_path;
        config.source_attribution = attr;
        config.validate()?;
        Ok(config)
    }

    /// Search `start_dir` and its ancestors for `.llmcompare/config.toml`,
    /// stopping at a repository root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if dir.join(".git").exists() || dir.join(".hg").exists() {
                break;
            }
            current = dir.parent();
        }
        None
    }

    fn apply_file(
        &mut self,
        file: TomlConfig,
        src: &ConfigSource,
        attr: &mut HashMap<String, ConfigSource>,
    ) -> Result<(), ConfigError> {
        if let Some(fd) = file.defaults {
            let d = &mut self.defaults;
            apply!(attr, "feature", src, d.feature, fd.feature.map(Some));
            apply!(attr, "num_patterns", src, d.num_patterns, fd.num_patterns);
            apply!(attr, "data_dir", src, d.data_dir, fd.data_dir);
            apply!(attr, "state_dir", src, d.state_dir, fd.state_dir);
            apply!(attr, "reports_dir", src, d.reports_dir, fd.reports_dir);
            apply!(attr, "max_files_to_keep", src, d.max_files_to_keep, fd.max_files_to_keep);
            apply!(attr, "lock_wait_secs", src, d.lock_wait_secs, fd.lock_wait_secs);
        }

        if let Some(llm) = file.llm {
            let sections = [
                (LlmRole::Baseline, llm.baseline),
                (LlmRole::Target, llm.target),
                (LlmRole::Evaluator, llm.evaluator),
                (LlmRole::Generator, llm.generator),
            ];
            for (role, section) in sections {
                let Some(fp) = section else { continue };
                let key = |field: &str| format!("llm.{}.{field}", role.key());
                let p = self.llm.for_role_mut(role);
                apply!(attr, key("provider"), src, p.provider, fp.provider);
                apply!(attr, key("model"), src, p.model, fp.model);
                apply!(attr, key("api_key"), src, p.api_key, fp.api_key.map(Some));
                apply!(attr, key("api_key_env"), src, p.api_key_env, fp.api_key_env);
                apply!(attr, key("endpoint"), src, p.endpoint, fp.endpoint.map(Some));
                apply!(attr, key("timeout_secs"), src, p.timeout_secs, fp.timeout_secs);
                apply!(attr, key("temperature"), src, p.temperature, fp.temperature.map(Some));
                apply!(attr, key("max_tokens"), src, p.max_tokens, fp.max_tokens.map(Some));
            }
        }

        if let Some(fr) = file.retry {
            let r: &mut RetrySettings = &mut self.retry;
            apply!(attr, "retry.max_attempts", src, r.max_attempts, fr.max_attempts);
            apply!(attr, "retry.initial_backoff_ms", src, r.initial_backoff_ms, fr.initial_backoff_ms);
            apply!(attr, "retry.max_backoff_ms", src, r.max_backoff_ms, fr.max_backoff_ms);
        }

        if let Some(fe) = file.evaluator {
            let e: &mut EvaluatorSettings = &mut self.evaluator;
            apply!(attr, "evaluator.max_concurrency", src, e.max_concurrency, fe.max_concurrency);
            apply!(attr, "evaluator.degraded_default", src, e.degraded_default, fe.degraded_default);
        }

        if let Some(fc) = file.comparator {
            let c: &mut ComparatorSettings = &mut self.comparator;
            apply!(
                attr,
                "comparator.max_recommendations",
                src,
                c.max_recommendations,
                fc.max_recommendations
            );
        }

        for (name, ov) in file.features.unwrap_or_default() {
            self.features.apply_override(&name, ov)?;
            attr.insert(format!("features.{name}"), src.clone());
        }

        Ok(())
    }

    fn apply_env(&mut self, env: &HashMap<String, String>, attr: &mut HashMap<String, ConfigSource>) {
        let get = |var: &str| {
            env.get(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let d = &mut self.defaults;
        for (var, key) in [
            ("LLMCOMPARE_FEATURE", "feature"),
            ("LLMCOMPARE_DATA_DIR", "data_dir"),
            ("LLMCOMPARE_STATE_DIR", "state_dir"),
            ("LLMCOMPARE_REPORTS_DIR", "reports_dir"),
        ] {
            let Some(value) = get(var) else { continue };
            match key {
                "feature" => d.feature = Some(value),
                "data_dir" => d.data_dir = PathBuf::from(value),
                "state_dir" => d.state_dir = PathBuf::from(value),
                _ => d.reports_dir = PathBuf::from(value),
            }
            attr.insert(key.to_string(), ConfigSource::Env(var.to_string()));
        }

        for role in LlmRole::ALL {
            let prefix = role.env_prefix();
            let has_role_env = ["PROVIDER", "MODEL", "API_URL"]
                .iter()
                .any(|suffix| get(&format!("{prefix}_{suffix}")).is_some());

            // The generator only gets its own section when configured explicitly
            if role == LlmRole::Generator && self.llm.generator.is_none() && !has_role_env {
                continue;
            }

            let p = self.llm.for_role_mut(role);
            for (suffix, field) in [("PROVIDER", "provider"), ("MODEL", "model"), ("API_URL", "endpoint")] {
                let var = format!("{prefix}_{suffix}");
                let Some(value) = get(&var) else { continue };
                match field {
                    "provider" => p.provider = value.to_lowercase(),
                    "model" => p.model = value,
                    _ => p.endpoint = Some(value),
                }
                attr.insert(format!("llm.{}.{field}", role.key()), ConfigSource::Env(var));
            }

            if let Some(key) = get(&p.api_key_env) {
                p.api_key = Some(key);
                attr.insert(
                    format!("llm.{}.api_key", role.key()),
                    ConfigSource::Env(p.api_key_env.clone()),
                );
            }
        }

        // A generator without its own key borrows the evaluator's
        if let Some(generator) = self.llm.generator.as_mut() {
            if generator.api_key.is_none() && generator.provider == self.llm.evaluator.provider {
                generator.api_key = self.llm.evaluator.api_key.clone();
            }
        }
    }
}

fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.display().to_string(),
        },
        _ => ConfigError::InvalidFile(format!("{}: {e}", path.display())),
    })?;
    toml::from_str(&content)
        .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let config = Config::discover_from(dir.path(), &CliArgs::default(), &env(&[])).unwrap();
        assert!(config.config_path.is_none());
        assert_eq!(config.defaults.num_patterns, 10);
        assert_eq!(config.source_of("num_patterns"), ConfigSource::Defaults);
    }

    #[test]
    fn test_file_is_discovered_upwards() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[defaults]\nnum_patterns = 4\n");
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::discover_from(&nested, &CliArgs::default(), &env(&[])).unwrap();
        assert_eq!(config.defaults.num_patterns, 4);
        assert!(matches!(
            config.source_of("num_patterns"),
            ConfigSource::ConfigFile(_)
        ));
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
[defaults]
feature = "chat_window"
data_dir = "from-file"
state_dir = "state-from-file"

[llm.target]
provider = "grok"
model = "grok-2"
"#,
        );

        let vars = env(&[
            ("LLMCOMPARE_DATA_DIR", "from-env"),
            ("LLMCOMPARE_STATE_DIR", "state-from-env"),
            ("LL2_MODEL", "grok-3"),
            ("LL2_API_KEY", "xai-test"),
        ]);
        let cli = CliArgs {
            data_dir: Some(PathBuf::from("from-cli")),
            ..CliArgs::default()
        };

        let config = Config::discover_from(dir.path(), &cli, &vars).unwrap();
        assert_eq!(config.defaults.data_dir, PathBuf::from("from-cli"));
        assert_eq!(config.defaults.state_dir, PathBuf::from("state-from-env"));
        assert_eq!(config.defaults.feature.as_deref(), Some("chat_window"));
        assert_eq!(config.llm.target.provider, "grok");
        assert_eq!(config.llm.target.model, "grok-3");
        assert_eq!(config.llm.target.api_key.as_deref(), Some("xai-test"));
        assert_eq!(config.source_of("data_dir"), ConfigSource::Cli);
        assert_eq!(
            config.source_of("llm.target.model"),
            ConfigSource::Env("LL2_MODEL".to_string())
        );
    }

    #[test]
    fn test_custom_api_key_env() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[llm.evaluator]\napi_key_env = \"MY_JUDGE_KEY\"\n");

        let config =
            Config::discover_from(dir.path(), &CliArgs::default(), &env(&[("MY_JUDGE_KEY", "k")]))
                .unwrap();
        assert_eq!(config.llm.evaluator.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_generator_borrows_evaluator_key() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[llm.generator]\nmodel = \"gemini-1.5-pro\"\n");

        let config =
            Config::discover_from(dir.path(), &CliArgs::default(), &env(&[("LLM3_API_KEY", "g")]))
                .unwrap();
        let generator = config.llm.for_role(LlmRole::Generator);
        assert_eq!(generator.model, "gemini-1.5-pro");
        assert_eq!(generator.api_key.as_deref(), Some("g"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[defaults\nnum_patterns = ");

        let err = Config::discover_from(dir.path(), &CliArgs::default(), &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile(_)));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[defaults]\nnum_pattern = 3\n");

        let err = Config::discover_from(dir.path(), &CliArgs::default(), &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile(_)));
    }

    #[test]
    fn test_explicit_missing_config_path() {
        let dir = TempDir::new().unwrap();
        let cli = CliArgs {
            config_path: Some(dir.path().join("nope.toml")),
            ..CliArgs::default()
        };
        let err = Config::discover_from(dir.path(), &cli, &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_custom_feature_from_file() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
[features.summarize]
prompt_id = "summarize"
description = "Summarize test results"

[features.summarize.evaluation_criteria]
brevity = "Is the summary short?"
"#,
        );

        let config = Config::discover_from(dir.path(), &CliArgs::default(), &env(&[])).unwrap();
        let spec = config.feature("summarize").unwrap();
        assert_eq!(spec.evaluation_criteria.len(), 1);
        assert_eq!(config.features.names().len(), 4);
    }

    #[test]
    fn test_validation_runs_after_merge() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[evaluator]\nmax_concurrency = 0\n");

        let err = Config::discover_from(dir.path(), &CliArgs::default(), &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
