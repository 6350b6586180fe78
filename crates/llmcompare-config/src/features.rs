//! Feature registry: the product features whose LLM backends are compared
//!
//! Three features are built in. Additional ones (or overrides of the built-in
//! ones) come from `[features.<name>]` tables in the config file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use llmcompare_utils::ConfigError;

/// Everything the workflow needs to know about one product feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    /// Identifier every input of this feature must carry
    pub prompt_id: String,
    pub description: String,
    /// System prompt sent to the product LLM with every input
    pub system_prompt: String,
    /// Shape of a prompt, shown to the input generator
    pub prompt_format: String,
    /// What a good input looks like, shown to the input generator
    pub generation_hint: String,
    /// Inputs whose prompt is shorter than this are rejected
    #[serde(default)]
    pub min_prompt_chars: usize,
    /// Criterion name to question, shown to the evaluator
    pub evaluation_criteria: BTreeMap<String, String>,
}

/// Partial feature definition from the config file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeatureOverride {
    pub prompt_id: Option<String>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub prompt_format: Option<String>,
    pub generation_hint: Option<String>,
    pub min_prompt_chars: Option<usize>,
    pub evaluation_criteria: Option<BTreeMap<String, String>>,
}

fn criteria(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn builtin_features() -> Vec<FeatureSpec> {
    vec![
        FeatureSpec {
            name: "generate_code".to_string(),
            prompt_id: "generate-code".to_string(),
            description: "Generate automation test code from a requirement written as a code comment"
                .to_string(),
            system_prompt: "Write a test script for the requirement. Prefer the framework's built-in \
                keywords, reference test objects inline, do not wrap the answer in code blocks, and \
                precede each line of code with a short comment explaining the keyword. Only define \
                functions when the requirement asks for a keyword, method or function, and document \
                them with a Javadoc block."
                .to_string(),
            prompt_format: "code_comment".to_string(),
            generation_hint: "A code generation request written as a single-line or block comment \
                covering web UI, mobile, API, data-driven or custom keyword scenarios."
                .to_string(),
            min_prompt_chars: 0,
            evaluation_criteria: criteria(&[
                ("completeness", "Does the code address all requirements from the prompt?"),
                ("correctness", "Is the syntax valid and are the framework keywords used properly?"),
                ("readability", "Is the code well-structured with proper indentation and comments?"),
                ("functionality", "Would this code execute successfully?"),
            ]),
        },
        FeatureSpec {
            name: "explain_code".to_string(),
            prompt_id: "multi-line-explain-code".to_string(),
            description: "Explain a selected block of test code".to_string(),
            system_prompt: "Summarize the code in one sentence. Do not explain the programming \
                language. Start with a verb in base form. Format the result as: // <summary>"
                .to_string(),
            prompt_format: "code_snippet".to_string(),
            generation_hint: "An actual multi-line test script snippet (UI, mobile or custom \
                keywords) that needs explanation."
                .to_string(),
            min_prompt_chars: 20,
            evaluation_criteria: criteria(&[
                ("completeness", "Does the explanation cover all aspects of the code?"),
                ("accuracy", "Is the explanation technically correct?"),
                ("clarity", "Is the explanation easy to understand?"),
                ("context", "Does it properly explain framework-specific elements?"),
            ]),
        },
        FeatureSpec {
            name: "chat_window".to_string(),
            prompt_id: "chat-window".to_string(),
            description: "Answer questions about the testing products".to_string(),
            system_prompt: "You are a software quality assurance assistant with expertise in \
                manual and automated testing of web, mobile and native apps. Answer the user's \
                request helpfully and professionally. Do not invent product features; when the \
                answer depends on recent releases, point the user to the official documentation."
                .to_string(),
            prompt_format: "question".to_string(),
            generation_hint: "A question about product features, best practices, troubleshooting \
                or advanced topics."
                .to_string(),
            min_prompt_chars: 0,
            evaluation_criteria: criteria(&[
                ("relevance", "Is the answer relevant to the question?"),
                ("accuracy", "Is the information provided accurate?"),
                ("completeness", "Does it fully answer the question?"),
                ("helpfulness", "Would this answer help the user?"),
            ]),
        },
    ]
}

/// Known features, keyed by name
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRegistry {
    features: BTreeMap<String, FeatureSpec>,
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FeatureRegistry {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            features: builtin_features()
                .into_iter()
                .map(|f| (f.name.clone(), f))
                .collect(),
        }
    }

    /// Apply a config-file definition.
    ///
    /// Overrides of a built-in feature may be partial; a new feature must at
    /// least name its `prompt_id`.
    pub fn apply_override(&mut self, name: &str, ov: FeatureOverride) -> Result<(), ConfigError> {
        let spec = match self.features.remove(name) {
            Some(existing) => existing,
            None => FeatureSpec {
                name: name.to_string(),
                prompt_id: ov.prompt_id.clone().ok_or_else(|| {
                    ConfigError::MissingRequired(format!("features.{name}.prompt_id"))
                })?,
                description: String::new(),
                system_prompt: String::new(),
                prompt_format: "question".to_string(),
                generation_hint: String::new(),
                min_prompt_chars: 0,
                evaluation_criteria: BTreeMap::new(),
            },
        };

        let merged = FeatureSpec {
            name: spec.name,
            prompt_id: ov.prompt_id.unwrap_or(spec.prompt_id),
            description: ov.description.unwrap_or(spec.description),
            system_prompt: ov.system_prompt.unwrap_or(spec.system_prompt),
            prompt_format: ov.prompt_format.unwrap_or(spec.prompt_format),
            generation_hint: ov.generation_hint.unwrap_or(spec.generation_hint),
            min_prompt_chars: ov.min_prompt_chars.unwrap_or(spec.min_prompt_chars),
            evaluation_criteria: ov.evaluation_criteria.unwrap_or(spec.evaluation_criteria),
        };

        if merged.prompt_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("features.{name}.prompt_id"),
                value: "(empty)".to_string(),
            });
        }

        self.features.insert(merged.name.clone(), merged);
        Ok(())
    }

    /// Look up a feature by name
    ///
    /// # Errors
    /// `ConfigError::UnknownFeature` listing the known names.
    pub fn get(&self, name: &str) -> Result<&FeatureSpec, ConfigError> {
        self.features
            .get(name)
            .ok_or_else(|| ConfigError::UnknownFeature {
                name: name.to_string(),
                known: self.names(),
            })
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.features.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.features.values()
    }
}
