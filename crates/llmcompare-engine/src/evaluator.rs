//! Score a dataset with the evaluator LLM
//!
//! Samples are split into chunks of [`MAX_SAMPLES`]; every chunk gets one
//! rubric prompt per dimension, dispatched concurrently. Each reply must end
//! with a `label: score` line (see [`crate::score_parser`]). A dimension's
//! score is the mean of its parsed chunk scores.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{debug, info, warn};

use llmcompare_config::{EvaluatorSettings, FeatureSpec};
use llmcompare_llm::Gateway;
use llmcompare_utils::types::{Dataset, Dimension, Metrics};
use llmcompare_utils::{ApiError, EvaluationError, GatewayError, LlmCompareError};

use crate::fanout::bounded_map;
use crate::score_parser::parse_score;

/// Samples shown to the evaluator per prompt
pub const MAX_SAMPLES: usize = 10;
/// Longest prompt or answer excerpt shown, in characters
pub const MAX_SAMPLE_CHARS: usize = 2000;

const EVALUATOR_SYSTEM: &str = "You are a strict reviewer of answers produced by a code assistant. \
Score only the dimension you are asked about and always finish with the requested score line.";

fn dimension_question(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Stability => {
            "Would the assistant give essentially the same answer if asked again? Penalize \
             answers that look arbitrary, contradict each other or drift between similar prompts."
        }
        Dimension::Behavior => {
            "Does each answer do what the prompt asks, without refusals, errors, truncation or \
             unrelated content?"
        }
        Dimension::Style => {
            "Is the formatting consistent and appropriate for the feature (comments, lists, code \
             blocks, length)?"
        }
        Dimension::Correctness => {
            "Are the answers technically correct and free of invented APIs or wrong statements?"
        }
        Dimension::Quality => "Are the answers clear, well structured and useful to the user?",
        Dimension::Coverage => "Do the answers address every part of each request?",
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(max).collect();
        clipped.push_str(" [...]");
        clipped
    }
}

pub struct Evaluator {
    gateway: Gateway,
    feature: FeatureSpec,
    settings: EvaluatorSettings,
}

impl Evaluator {
    #[must_use]
    pub fn new(gateway: Gateway, feature: FeatureSpec, settings: EvaluatorSettings) -> Self {
        Self {
            gateway,
            feature,
            settings,
        }
    }

    /// Rubric prompts for one dimension of `dataset`, one per chunk of
    /// [`MAX_SAMPLES`] samples
    #[must_use]
    pub fn rubric_prompts(&self, dimension: Dimension, dataset: &Dataset) -> Vec<String> {
        sample_chunks(dataset.outputs.len())
            .into_iter()
            .map(|range| self.rubric_prompt(dimension, dataset, range))
            .collect()
    }

    fn rubric_prompt(&self, dimension: Dimension, dataset: &Dataset, range: Range<usize>) -> String {
        let label = dimension.label();
        let mut prompt = format!(
            "Feature: {} ({})\n\nDimension: {label}\n{}\n",
            self.feature.name,
            self.feature.description,
            dimension_question(dimension)
        );

        if !self.feature.evaluation_criteria.is_empty() {
            prompt.push_str("\nFeature criteria:\n");
            for (name, question) in &self.feature.evaluation_criteria {
                prompt.push_str(&format!("- {name}: {question}\n"));
            }
        }

        prompt.push_str(&format!(
            "\nSamples ({}-{} of {}):\n",
            range.start + 1,
            range.end,
            dataset.outputs.len()
        ));
        let start = range.start;
        for (n, (input, output)) in dataset
            .inputs
            .iter()
            .zip(dataset.outputs.iter())
            .enumerate()
            .skip(start)
            .take(range.len())
        {
            let answer = match &output.error {
                Some(error) => format!("[no answer: {}]", clip(error, 200)),
                None => clip(&output.text, MAX_SAMPLE_CHARS),
            };
            prompt.push_str(&format!(
                "\n### Sample {}\nPrompt:\n{}\n\nAnswer:\n{}\n",
                n + 1,
                clip(&input.prompt, MAX_SAMPLE_CHARS),
                answer
            ));
        }

        prompt.push_str(&format!(
            "\nExplain your judgement in at most three sentences, then end with a line of the \
             form\n{label}: <score>\nwhere <score> is a number between 0 and 1.\n"
        ));
        prompt
    }

    /// Score every dimension of `dataset`.
    ///
    /// # Errors
    /// - `EvaluationError::EmptyDataset` when there are no outputs
    /// - `ApiError` when any gateway call fails, after all calls finished
    /// - `EvaluationError::AllDimensionsFailed` when no reply could be parsed
    pub async fn evaluate(&self, dataset: &Dataset) -> Result<Metrics, LlmCompareError> {
        if dataset.outputs.is_empty() {
            return Err(EvaluationError::EmptyDataset {
                dataset_id: dataset.id.clone(),
            }
            .into());
        }
        info!(
            feature = %dataset.feature,
            dataset = %dataset.id,
            provider = %self.gateway.provider(),
            "Evaluating dataset"
        );

        let jobs: Vec<(Dimension, String)> = Dimension::ALL
            .iter()
            .flat_map(|d| {
                self.rubric_prompts(*d, dataset)
                    .into_iter()
                    .map(move |prompt| (*d, prompt))
            })
            .collect();
        let dimensions: Vec<Dimension> = jobs.iter().map(|(d, _)| *d).collect();
        let gateway = self.gateway.clone();
        let replies = bounded_map(jobs, self.settings.max_concurrency, move |(dimension, prompt)| {
            let gateway = gateway.clone();
            async move {
                gateway
                    .complete(
                        &format!("evaluate:{}", dimension.label()),
                        Some(EVALUATOR_SYSTEM),
                        &prompt,
                    )
                    .await
            }
        })
        .await?;

        let mut chunk_scores: BTreeMap<Dimension, Vec<f64>> = BTreeMap::new();
        let mut failures = Vec::new();
        let mut first_error: Option<GatewayError> = None;

        for (dimension, reply) in dimensions.into_iter().zip(replies) {
            match reply {
                Some(Ok(result)) => match parse_score(&result.text, dimension.label()) {
                    Some(score) => {
                        debug!(dimension = %dimension, score, "Parsed evaluator score");
                        chunk_scores.entry(dimension).or_default().push(score);
                    }
                    None => {
                        warn!(
                            dataset = %dataset.id,
                            dimension = %dimension,
                            "Evaluator reply has no usable score"
                        );
                        failures.push(format!("{dimension}: no score in reply"));
                    }
                },
                Some(Err(error)) => {
                    failures.push(format!("{dimension}: {error}"));
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                None => failures.push(format!("{dimension}: task did not complete")),
            }
        }

        if let Some(error) = first_error {
            return Err(ApiError::from_gateway(self.gateway.provider(), error).into());
        }
        let scores: BTreeMap<Dimension, f64> = chunk_scores
            .into_iter()
            .map(|(d, v)| (d, v.iter().sum::<f64>() / v.len() as f64))
            .collect();
        if scores.is_empty() {
            return Err(EvaluationError::AllDimensionsFailed {
                dataset_id: dataset.id.clone(),
                failures,
            }
            .into());
        }

        Ok(Metrics::assemble(
            |d| scores.get(&d).copied(),
            self.settings.degraded_default,
        ))
    }
}

/// Consecutive sample ranges of at most [`MAX_SAMPLES`] covering `total`
fn sample_chunks(total: usize) -> Vec<Range<usize>> {
    (0..total)
        .step_by(MAX_SAMPLES)
        .map(|start| start..(start + MAX_SAMPLES).min(total))
        .collect()
}

/// The evaluated counterpart of `raw`, ready to be saved as a new dataset
#[must_use]
pub fn evaluated_copy(raw: &Dataset, metrics: Metrics, now: DateTime<Utc>) -> Dataset {
    let mut evaluated = raw.clone();
    evaluated.id = String::new();
    evaluated.created_at = now;
    evaluated.role = raw.role.evaluated();
    evaluated.derived_from = Some(raw.id.clone());
    evaluated.metrics = Some(metrics);
    evaluated
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llmcompare_config::{FeatureRegistry, LlmRole, ProviderConfig};
    use llmcompare_llm::test_support::ScriptedBackend;
    use llmcompare_llm::{LlmBackend, LlmInvocation, LlmResult};
    use llmcompare_utils::types::{CallSummary, DatasetRole, Input, Output};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn feature() -> FeatureSpec {
        FeatureRegistry::builtin().get("chat_window").unwrap().clone()
    }

    fn gateway(backend: Arc<dyn LlmBackend>) -> Gateway {
        Gateway::new(
            LlmRole::Evaluator,
            backend,
            &ProviderConfig::default_for(LlmRole::Evaluator),
        )
    }

    fn dataset(n: usize) -> Dataset {
        Dataset {
            id: "llmcompare_chat_window_raw_ll1_20250101_000000_2".to_string(),
            created_at: Utc::now(),
            feature: "chat_window".to_string(),
            role: DatasetRole::RawLl1,
            llm_version: "openai/gpt-4o".to_string(),
            test_mode: None,
            baseline_id: None,
            derived_from: None,
            inputs_hash: "h".to_string(),
            inputs: (0..n)
                .map(|i| Input {
                    input_id: format!("in_{i}"),
                    feature: "chat_window".to_string(),
                    prompt: format!("How do I open a browser? ({i})"),
                    prompt_id: "chat-window".to_string(),
                    config: serde_json::Value::Null,
                })
                .collect(),
            outputs: (0..n)
                .map(|i| Output {
                    input_id: format!("in_{i}"),
                    text: "Use WebUI.openBrowser".to_string(),
                    error: None,
                    response_time_ms: 5,
                })
                .collect(),
            metrics: None,
            summary: CallSummary::default(),
        }
    }

    fn settings() -> EvaluatorSettings {
        EvaluatorSettings {
            max_concurrency: 3,
            degraded_default: 0.5,
        }
    }

    /// Answers `label: score` for the dimension in the invocation purpose
    fn scoring(score_of: fn(&str) -> Option<f64>) -> ScriptedBackend {
        ScriptedBackend::new(move |inv| {
            let label = inv.purpose.trim_start_matches("evaluate:");
            Ok(match score_of(label) {
                Some(v) => format!("Looks fine.\n{label}: {v}"),
                None => "I cannot judge this.".to_string(),
            })
        })
    }

    #[tokio::test]
    async fn test_all_dimensions_scored() {
        let backend = scoring(|label| Some(if label == "coverage" { 0.6 } else { 0.9 }));
        let evaluator = Evaluator::new(gateway(Arc::new(backend.clone())), feature(), settings());

        let metrics = evaluator.evaluate(&dataset(2)).await.unwrap();
        assert_eq!(backend.calls(), 6);
        assert_eq!(metrics.consistency.score, 0.9);
        assert!((metrics.accuracy.score - 0.8).abs() < 1e-9);
        assert!(!metrics.consistency.degraded && !metrics.accuracy.degraded);
    }

    #[tokio::test]
    async fn test_unparsable_style_is_excluded() {
        let backend = scoring(|label| match label {
            "style" => None,
            "stability" => Some(1.0),
            _ => Some(0.8),
        });
        let evaluator = Evaluator::new(gateway(Arc::new(backend)), feature(), settings());

        let metrics = evaluator.evaluate(&dataset(2)).await.unwrap();
        assert_eq!(metrics.consistency.style, None);
        assert!((metrics.consistency.score - 0.9).abs() < 1e-9);
        assert!(!metrics.consistency.degraded);
    }

    #[tokio::test]
    async fn test_whole_group_unparsable_is_degraded() {
        let backend = scoring(|label| match label {
            "correctness" | "quality" | "coverage" => None,
            _ => Some(0.7),
        });
        let evaluator = Evaluator::new(gateway(Arc::new(backend)), feature(), settings());

        let metrics = evaluator.evaluate(&dataset(1)).await.unwrap();
        assert!(metrics.accuracy.degraded);
        assert_eq!(metrics.accuracy.score, 0.5);
        assert!((metrics.overall - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nothing_parsable_fails() {
        let backend = scoring(|_| None);
        let evaluator = Evaluator::new(gateway(Arc::new(backend)), feature(), settings());

        let err = evaluator.evaluate(&dataset(1)).await.unwrap_err();
        match err {
            LlmCompareError::Evaluation(EvaluationError::AllDimensionsFailed { failures, .. }) => {
                assert_eq!(failures.len(), 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_gateway_error_fails_whole_evaluation() {
        let backend = ScriptedBackend::new(|inv| {
            if inv.purpose == "evaluate:quality" {
                Err(GatewayError::ProviderAuth("bad key".to_string()))
            } else {
                Ok(format!("{}: 0.9", inv.purpose.trim_start_matches("evaluate:")))
            }
        });
        let evaluator = Evaluator::new(gateway(Arc::new(backend.clone())), feature(), settings());

        let err = evaluator.evaluate(&dataset(1)).await.unwrap_err();
        assert!(matches!(err, LlmCompareError::Api(_)));
        // fan-in waits for every dimension before failing
        assert_eq!(backend.calls(), 6);
    }

    #[tokio::test]
    async fn test_empty_dataset() {
        let evaluator = Evaluator::new(
            gateway(Arc::new(ScriptedBackend::constant("style: 1"))),
            feature(),
            settings(),
        );
        let err = evaluator.evaluate(&dataset(0)).await.unwrap_err();
        assert!(matches!(
            err,
            LlmCompareError::Evaluation(EvaluationError::EmptyDataset { .. })
        ));
    }

    #[test]
    fn test_rubric_prompt_contents() {
        let evaluator = Evaluator::new(
            gateway(Arc::new(ScriptedBackend::echo())),
            feature(),
            settings(),
        );
        let mut ds = dataset(3);
        ds.outputs[0].error = Some("timeout".to_string());
        let prompts = evaluator.rubric_prompts(Dimension::Coverage, &ds);
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];

        assert!(prompt.contains("Dimension: coverage"));
        assert!(prompt.contains("Samples (1-3 of 3)"));
        assert!(prompt.contains("[no answer: timeout]"));
        assert!(prompt.trim_end().ends_with("where <score> is a number between 0 and 1."));
        for name in feature().evaluation_criteria.keys() {
            assert!(prompt.contains(name.as_str()));
        }
    }

    #[test]
    fn test_every_sample_reaches_a_prompt() {
        let evaluator = Evaluator::new(
            gateway(Arc::new(ScriptedBackend::echo())),
            feature(),
            settings(),
        );
        let prompts = evaluator.rubric_prompts(Dimension::Style, &dataset(12));
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Samples (1-10 of 12)"));
        assert!(prompts[1].contains("Samples (11-12 of 12)"));
        assert!(prompts[1].contains("### Sample 12\n"));
        assert!(prompts[1].contains("(11)"));
        assert!(!prompts[0].contains("(11)"));
    }

    #[test]
    fn test_sample_chunks() {
        assert!(sample_chunks(0).is_empty());
        assert_eq!(sample_chunks(10), vec![0..10]);
        assert_eq!(sample_chunks(21), vec![0..10, 10..20, 20..21]);
    }

    #[tokio::test]
    async fn test_chunk_scores_are_averaged() {
        // first chunk scores high, the trailing chunk low
        let backend = ScriptedBackend::new(|inv| {
            let label = inv.purpose.trim_start_matches("evaluate:");
            let score = if inv.user_text().contains("Samples (11-12 of 12)") {
                0.4
            } else {
                0.8
            };
            Ok(format!("{label}: {score}"))
        });
        let evaluator = Evaluator::new(gateway(Arc::new(backend.clone())), feature(), settings());

        let metrics = evaluator.evaluate(&dataset(12)).await.unwrap();
        assert_eq!(backend.calls(), 12);
        assert!((metrics.consistency.stability.unwrap() - 0.6).abs() < 1e-9);
        assert!((metrics.overall - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unparsable_chunk_is_excluded() {
        let backend = ScriptedBackend::new(|inv| {
            let label = inv.purpose.trim_start_matches("evaluate:");
            Ok(if inv.user_text().contains("Samples (11-12 of 12)") {
                "No opinion.".to_string()
            } else {
                format!("{label}: 0.9")
            })
        });
        let evaluator = Evaluator::new(gateway(Arc::new(backend)), feature(), settings());

        let metrics = evaluator.evaluate(&dataset(12)).await.unwrap();
        assert_eq!(metrics.accuracy.quality, Some(0.9));
        assert!(!metrics.accuracy.degraded);
    }

    #[test]
    fn test_evaluated_copy() {
        let raw = dataset(1);
        let metrics = Metrics::assemble(|_| Some(1.0), 0.5);
        let evaluated = evaluated_copy(&raw, metrics, Utc::now());
        assert_eq!(evaluated.role, DatasetRole::EvaluatedLl1);
        assert_eq!(evaluated.derived_from.as_deref(), Some(raw.id.as_str()));
        assert_eq!(evaluated.inputs, raw.inputs);
        assert!(evaluated.is_evaluated());
    }

    struct SlowScorer {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl LlmBackend for SlowScorer {
        fn provider(&self) -> &str {
            "slow"
        }

        async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, GatewayError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let label = inv.purpose.trim_start_matches("evaluate:").to_string();
            Ok(LlmResult::new(format!("{label}: 0.5"), "slow", inv.model))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let backend = Arc::new(SlowScorer {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let evaluator = Evaluator::new(
            gateway(backend.clone()),
            feature(),
            EvaluatorSettings {
                max_concurrency: 2,
                degraded_default: 0.5,
            },
        );
        let metrics = evaluator.evaluate(&dataset(1)).await.unwrap();
        assert_eq!(metrics.overall, 0.5);
        assert!(backend.peak.load(Ordering::SeqCst) <= 2);
    }
}
