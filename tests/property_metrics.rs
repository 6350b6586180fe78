//! Property tests: every score the comparator reports lies in [0, 1],
//! whatever the evaluator or the product LLMs produced.

use chrono::Utc;
use proptest::prelude::*;

use llmcompare::config::ComparatorSettings;
use llmcompare::engine::comparator::compare;
use llmcompare::utils::types::{CallSummary, Dimension, Input, Output};
use llmcompare::{Dataset, DatasetRole, Metrics, TestMode};

fn dataset(role: DatasetRole, texts: &[(String, bool)], metrics: Option<Metrics>) -> Dataset {
    let inputs: Vec<Input> = (0..texts.len())
        .map(|i| Input {
            input_id: format!("chat_{i}"),
            feature: "chat_window".to_string(),
            prompt: format!("question {i}"),
            prompt_id: "chat-window".to_string(),
            config: serde_json::Value::Null,
        })
        .collect();
    let outputs = texts
        .iter()
        .zip(&inputs)
        .map(|((text, failed), input)| Output {
            input_id: input.input_id.clone(),
            text: if *failed { String::new() } else { text.clone() },
            error: failed.then(|| "timeout".to_string()),
            response_time_ms: 10,
        })
        .collect();
    Dataset {
        id: format!("{role}_id"),
        created_at: Utc::now(),
        feature: "chat_window".to_string(),
        role,
        llm_version: "scripted/model".to_string(),
        test_mode: matches!(role, DatasetRole::RawLl2 | DatasetRole::EvaluatedLl2)
            .then_some(TestMode::Consistency),
        baseline_id: None,
        derived_from: None,
        inputs_hash: "same".to_string(),
        inputs,
        outputs,
        metrics,
        summary: CallSummary::default(),
    }
}

/// Evaluator scores, possibly missing or out of range
fn scores() -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::of(-2.0f64..3.0), 6)
}

fn metrics_from(scores: &[Option<f64>], default: f64) -> Metrics {
    Metrics::assemble(
        |d| {
            let i = Dimension::ALL.iter().position(|x| *x == d).unwrap_or(0);
            scores[i]
        },
        default,
    )
}

fn texts() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::vec(("[a-zA-Z .!?\n]{0,40}", any::<bool>()), 0..8)
}

fn in_unit(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

proptest! {
    #[test]
    fn prop_report_scores_in_unit_interval(
        base_texts in texts(),
        target_texts in texts(),
        base_scores in scores(),
        target_scores in scores(),
        default in 0.0f64..=1.0,
        evaluated in any::<(bool, bool)>(),
    ) {
        let n = base_texts.len().min(target_texts.len());
        let base_metrics = evaluated.0.then(|| metrics_from(&base_scores, default));
        let target_metrics = evaluated.1.then(|| metrics_from(&target_scores, default));
        let baseline = dataset(DatasetRole::EvaluatedLl1, &base_texts[..n], base_metrics);
        let target = dataset(DatasetRole::EvaluatedLl2, &target_texts[..n], target_metrics);

        let report = compare(&baseline, &target, "baseline_x", &ComparatorSettings::default(), Utc::now());
        let m = &report.metrics;

        prop_assert!(in_unit(m.overall));
        if let Some(c) = &m.consistency {
            prop_assert!(in_unit(c.score));
            for v in [c.stability, c.behavior, c.style].into_iter().flatten() {
                prop_assert!(in_unit(v));
            }
        }
        if let Some(a) = &m.accuracy {
            prop_assert!(in_unit(a.score));
        }
        if let Some(delta) = m.accuracy_delta {
            prop_assert!((-1.0..=1.0).contains(&delta));
        }
        prop_assert!(report.recommendations.len() <= ComparatorSettings::default().max_recommendations);
    }

    #[test]
    fn prop_assembled_metrics_in_unit_interval(s in scores(), default in 0.0f64..=1.0) {
        let m = metrics_from(&s, default);
        prop_assert!(in_unit(m.consistency.score));
        prop_assert!(in_unit(m.accuracy.score));
        prop_assert!(in_unit(m.overall));
    }
}
