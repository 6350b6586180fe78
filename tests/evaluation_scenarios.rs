//! Evaluator replies that are partially unusable, end to end through the
//! workflow.

mod test_support;

use llmcompare::utils::{EvaluationError, GatewayError};
use llmcompare::{BaselineOptions, CompareOptions, InputsSource, LlmCompareError, Phase, TestMode};
use std::sync::{Arc, Mutex};
use llmcompare_llm::test_support::ScriptedBackend;
use tempfile::TempDir;
use test_support::*;

/// Scores every dimension except those in `unparsable`, which get prose
fn evaluator_with_gaps(unparsable: &'static [&'static str]) -> ScriptedBackend {
    ScriptedBackend::new(move |inv| {
        let purpose = inv.purpose.as_str();
        Ok(if let Some(label) = purpose.strip_prefix("evaluate:") {
            if unparsable.contains(&label) {
                "The answers look reasonable overall.".to_string()
            } else if label == "stability" {
                format!("**{label}**: 0.9")
            } else {
                format!("{label}: 0.7")
            }
        } else if purpose == "generate_inputs" {
            r#"[{"prompt": "a"}, {"prompt": "b"}]"#.to_string()
        } else {
            inv.user_text().to_uppercase()
        })
    })
}

#[tokio::test]
async fn test_unparsable_style_drops_out_of_the_mean() {
    let dir = TempDir::new().unwrap();
    let backend = evaluator_with_gaps(&["style"]);
    let wf = workflow(dir.path(), &backend);

    let record = wf.run_baseline(baseline_opts()).await.unwrap();
    let dataset = wf.datasets().load(FEATURE, &record.dataset_id).unwrap();
    let consistency = dataset.metrics.unwrap().consistency;

    assert_eq!(consistency.style, None);
    assert_eq!(consistency.stability, Some(0.9));
    assert_eq!(consistency.behavior, Some(0.7));
    assert!((consistency.score - 0.8).abs() < 1e-9);
    assert!(!consistency.degraded);
}

#[tokio::test]
async fn test_unparsable_group_uses_degraded_default() {
    let dir = TempDir::new().unwrap();
    let backend = evaluator_with_gaps(&["correctness", "quality", "coverage"]);
    let wf = workflow(dir.path(), &backend);

    let record = wf.run_baseline(baseline_opts()).await.unwrap();
    let metrics = wf
        .datasets()
        .load(FEATURE, &record.dataset_id)
        .unwrap()
        .metrics
        .unwrap();
    assert!(metrics.accuracy.degraded);
    assert_eq!(metrics.accuracy.score, wf.config().evaluator.degraded_default);
    assert!(!metrics.consistency.degraded);
}

#[tokio::test]
async fn test_evaluator_with_no_scores_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let backend = evaluator_with_gaps(&[
        "stability",
        "behavior",
        "style",
        "correctness",
        "quality",
        "coverage",
    ]);
    let wf = workflow(dir.path(), &backend);

    let err = wf.run_baseline(baseline_opts()).await.unwrap_err();
    assert!(matches!(
        err,
        LlmCompareError::Evaluation(EvaluationError::AllDimensionsFailed { .. })
    ));
    assert_eq!(err.to_exit_code().as_i32(), 70);
    assert_eq!(wf.status().unwrap().phase, Phase::New);
}

#[tokio::test]
async fn test_evaluator_outage_aborts_target_and_keeps_phase() {
    let dir = TempDir::new().unwrap();
    let good = scripted(0.8);
    workflow(dir.path(), &good)
        .run_baseline(baseline_opts())
        .await
        .unwrap();

    let failing = ScriptedBackend::new(|inv| {
        if inv.purpose.starts_with("evaluate:") {
            Err(GatewayError::ProviderOutage("503 from evaluator".to_string()))
        } else {
            Ok(inv.user_text().to_uppercase())
        }
    });
    let wf = workflow(dir.path(), &failing);
    let err = wf
        .run_target(target_opts(TestMode::Consistency))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmCompareError::Api(_)));

    let status = wf.status().unwrap();
    assert_eq!(status.phase, Phase::BaselineCreated);
    assert!(status.target.is_none());
}

#[tokio::test]
async fn test_skipped_evaluation_compares_as_partial() {
    let dir = TempDir::new().unwrap();
    let backend = scripted(0.8);
    let wf = workflow(dir.path(), &backend);
    wf.run_baseline(baseline_opts()).await.unwrap();

    let mut opts = target_opts(TestMode::Consistency);
    opts.skip_evaluation = true;
    wf.run_target(opts).await.unwrap();

    let err = wf.run_compare(CompareOptions::default()).await.unwrap_err();
    assert!(matches!(err, LlmCompareError::State(_)));
    assert_eq!(wf.status().unwrap().phase, Phase::TargetCreated);

    let report = wf
        .run_compare(CompareOptions { allow_partial: true })
        .await
        .unwrap()
        .report;
    assert!(report.partial);
    assert!(report.metrics.consistency.is_some());
    assert!(report.metrics.accuracy.is_none());
    assert!(report.metrics.accuracy_delta.is_none());
}

#[tokio::test]
async fn test_every_output_reaches_the_evaluator() {
    let dir = TempDir::new().unwrap();
    let prompts: Vec<String> = (1..=12).map(|i| format!("question number {i:02}")).collect();
    let refs: Vec<&str> = prompts.iter().map(String::as_str).collect();
    let inputs = write_inputs(dir.path(), &refs);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let backend = ScriptedBackend::new({
        let seen = seen.clone();
        move |inv| {
            Ok(match inv.purpose.strip_prefix("evaluate:") {
                Some(label) => {
                    seen.lock().unwrap().push(inv.user_text().to_string());
                    format!("{label}: 0.8")
                }
                None => inv.user_text().to_uppercase(),
            })
        }
    });
    let wf = workflow(dir.path(), &backend);
    let record = wf
        .run_baseline(BaselineOptions {
            num_patterns: Some(12),
            inputs: InputsSource::File(inputs),
            skip_evaluation: false,
        })
        .await
        .unwrap();
    assert_eq!(record.num_inputs, 12);

    let seen = seen.lock().unwrap();
    for prompt in &prompts {
        assert!(
            seen.iter().any(|p| p.contains(prompt.as_str())),
            "{prompt} was never shown to the evaluator"
        );
    }
}
