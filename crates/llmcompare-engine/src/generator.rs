//! Ask the generator LLM for feature-specific test inputs

use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

use llmcompare_config::FeatureSpec;
use llmcompare_llm::Gateway;
use llmcompare_llm::json_sanitizer::extract_json;
use llmcompare_utils::types::Input;
use llmcompare_utils::{ApiError, GenerationError, LlmCompareError};

pub struct InputGenerator {
    gateway: Gateway,
    feature: FeatureSpec,
}

impl InputGenerator {
    #[must_use]
    pub fn new(gateway: Gateway, feature: FeatureSpec) -> Self {
        Self { gateway, feature }
    }

    #[must_use]
    pub fn generation_prompt(&self, count: usize) -> String {
        let f = &self.feature;
        format!(
            "Generate {count} diverse requests for the '{name}' feature: {description}.\n\n\
             For each request provide:\n\
             - input_id: unique identifier (e.g. {name}_001, {name}_002)\n\
             - feature: must be '{name}'\n\
             - prompt: {format}\n\
             - config: JSON object with UI settings for the request\n\
             - prompt_id: must be '{prompt_id}'\n\n\
             {hint}\n\n\
             Return only a valid JSON array of {count} objects with proper escaping.",
            name = f.name,
            description = f.description,
            format = f.prompt_format,
            prompt_id = f.prompt_id,
            hint = f.generation_hint,
        )
    }

    /// Generate up to `count` validated inputs.
    ///
    /// # Errors
    /// `ApiError` on gateway failure, `GenerationError` when the reply is not
    /// JSON or holds no usable input.
    pub async fn generate(&self, count: usize) -> Result<Vec<Input>, LlmCompareError> {
        info!(
            feature = %self.feature.name,
            count,
            provider = %self.gateway.provider(),
            "Generating inputs"
        );
        let reply = self
            .gateway
            .complete(
                "generate_inputs",
                Some("You produce test data as strict JSON."),
                &self.generation_prompt(count),
            )
            .await
            .map_err(|e| ApiError::from_gateway(self.gateway.provider(), e))?;

        let value = extract_json(&reply.text).map_err(|reason| GenerationError::Unparsable {
            feature: self.feature.name.clone(),
            reason,
        })?;
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("inputs") {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            },
            other => {
                return Err(GenerationError::Unparsable {
                    feature: self.feature.name.clone(),
                    reason: format!("expected a JSON array, got {other}"),
                }
                .into());
            }
        };

        let mut inputs = self.validate(items);
        inputs.truncate(count);
        if inputs.is_empty() {
            return Err(GenerationError::NoUsableInputs {
                feature: self.feature.name.clone(),
                reason: "every generated item failed validation".to_string(),
            }
            .into());
        }
        info!(feature = %self.feature.name, kept = inputs.len(), "Generated inputs");
        Ok(inputs)
    }

    /// Turn raw JSON items into inputs, dropping invalid ones with a warning
    #[must_use]
    pub fn validate(&self, items: Vec<Value>) -> Vec<Input> {
        let mut seen = HashSet::new();
        let mut inputs = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            match self.validate_one(index, item) {
                Ok(mut input) => {
                    if !seen.insert(input.input_id.clone()) {
                        let base = input.input_id.clone();
                        let mut k = 2;
                        while !seen.insert(format!("{base}_{k}")) {
                            k += 1;
                        }
                        input.input_id = format!("{base}_{k}");
                    }
                    inputs.push(input);
                }
                Err(reason) => {
                    warn!(feature = %self.feature.name, index, reason = %reason, "Dropping generated input");
                }
            }
        }
        inputs
    }

    fn validate_one(&self, index: usize, item: Value) -> Result<Input, String> {
        let Value::Object(map) = item else {
            return Err("not a JSON object".to_string());
        };
        let f = &self.feature;

        let prompt = map
            .get("prompt")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or("missing prompt")?;
        if prompt.chars().count() < f.min_prompt_chars {
            return Err(format!(
                "prompt shorter than {} characters",
                f.min_prompt_chars
            ));
        }
        if let Some(feature) = map.get("feature").and_then(Value::as_str)
            && feature != f.name
        {
            return Err(format!("feature '{feature}' does not match '{}'", f.name));
        }
        if let Some(prompt_id) = map.get("prompt_id").and_then(Value::as_str)
            && prompt_id != f.prompt_id
        {
            return Err(format!(
                "prompt_id '{prompt_id}' does not match '{}'",
                f.prompt_id
            ));
        }
        let input_id = match map.get("input_id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => format!("{}_{n}", f.name),
            _ => format!("{}_{:03}", f.name, index + 1),
        };

        Ok(Input {
            input_id,
            feature: f.name.clone(),
            prompt: prompt.to_string(),
            prompt_id: f.prompt_id.clone(),
            config: map.get("config").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Keep the inputs that belong to `feature`, at most `limit` of them
#[must_use]
pub fn select_for_feature(inputs: Vec<Input>, feature: &FeatureSpec, limit: usize) -> Vec<Input> {
    let total = inputs.len();
    let kept: Vec<Input> = inputs
        .into_iter()
        .filter(|i| i.feature == feature.name)
        .take(limit)
        .collect();
    if kept.len() < total.min(limit) {
        warn!(
            feature = %feature.name,
            total,
            kept = kept.len(),
            "Ignored inputs of other features"
        );
    }
    kept
}
