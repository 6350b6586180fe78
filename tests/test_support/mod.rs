//! Shared helpers for integration tests.
//!
//! Workflows built here talk to a [`ScriptedBackend`] registered as provider
//! `scripted` for every LLM role, so no network access or API key is needed.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use llmcompare::config::{LlmRole, ProviderConfig, RetrySettings};
use llmcompare::llm::ProviderRegistry;
use llmcompare::{BaselineOptions, Config, InputsSource, TargetOptions, TestMode, Workflow};
use llmcompare_llm::test_support::ScriptedBackend;
use serde_json::json;

pub const FEATURE: &str = "chat_window";

/// Product LLMs upper-case the prompt, the evaluator answers `score` for
/// every dimension and the generator returns the prompts `a` and `b`.
pub fn scripted(score: f64) -> ScriptedBackend {
    ScriptedBackend::new(move |inv| {
        let purpose = inv.purpose.as_str();
        Ok(if let Some(label) = purpose.strip_prefix("evaluate:") {
            format!("{label}: {score}")
        } else if purpose == "generate_inputs" {
            r#"[{"prompt": "a"}, {"prompt": "b"}]"#.to_string()
        } else {
            inv.user_text().to_uppercase()
        })
    })
}

pub fn config(root: &Path) -> Config {
    let mut builder = Config::builder()
        .root_dir(root)
        .feature(FEATURE)
        .lock_wait_secs(10)
        .retry(RetrySettings {
            max_attempts: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
        });
    for role in LlmRole::ALL {
        let mut provider = ProviderConfig::default_for(role);
        provider.provider = "scripted".to_string();
        builder = builder.provider(role, provider);
    }
    builder.build().expect("test config is valid")
}

pub fn workflow(root: &Path, backend: &ScriptedBackend) -> Workflow {
    let mut registry = ProviderRegistry::empty();
    registry.register("scripted", backend.factory());
    Workflow::with_registry(config(root), FEATURE, registry).expect("workflow for chat_window")
}

/// Bare inputs file with one chat input per prompt
pub fn write_inputs(dir: &Path, prompts: &[&str]) -> PathBuf {
    let inputs: Vec<_> = prompts
        .iter()
        .enumerate()
        .map(|(i, prompt)| {
            json!({
                "input_id": format!("chat_{:03}", i + 1),
                "feature": FEATURE,
                "prompt": prompt,
                "prompt_id": "chat-window",
                "config": {}
            })
        })
        .collect();
    let path = dir.join("inputs.json");
    std::fs::write(&path, serde_json::to_string_pretty(&inputs).unwrap()).unwrap();
    path
}

pub fn baseline_opts() -> BaselineOptions {
    BaselineOptions {
        num_patterns: Some(2),
        inputs: InputsSource::Generate,
        skip_evaluation: false,
    }
}

pub fn target_opts(mode: TestMode) -> TargetOptions {
    TargetOptions {
        mode,
        num_patterns: Some(2),
        skip_evaluation: false,
        baseline: None,
    }
}

pub fn state_bytes(wf: &Workflow) -> Vec<u8> {
    std::fs::read(wf.states().state_path(FEATURE)).unwrap_or_default()
}
