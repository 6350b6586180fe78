//! Compare a target dataset against its baseline
//!
//! Consistency comes from pairwise similarity of outputs aligned by position
//! and is only meaningful when both datasets answered the same inputs.
//! Accuracy comes from the target's own evaluator scores.

use chrono::{DateTime, Utc};
use tracing::debug;

use llmcompare_config::ComparatorSettings;
use llmcompare_utils::types::{
    ComparisonMetrics, ComparisonReport, Confidence, ConsistencyMetrics, ConsistencyStatus,
    Dataset, Decision, DecisionSummary, TestMode,
};

use crate::recommendations;
use crate::similarity::{behavior_similarity, style_similarity, word_jaccard};

/// Accuracy gain above which the target is clearly better
const CLEAR_GAIN: f64 = 0.05;

/// Consistency over output pairs, or `None` when no pair is comparable.
/// Pairs where both sides errored are skipped. Returns the pair count too.
#[must_use]
pub fn pairwise_consistency(baseline: &Dataset, target: &Dataset) -> (Option<ConsistencyMetrics>, usize) {
    let mut stability = 0.0;
    let mut behavior = 0.0;
    let mut style = 0.0;
    let mut pairs = 0usize;

    for (b, t) in baseline.outputs.iter().zip(target.outputs.iter()) {
        if b.is_error() && t.is_error() {
            continue;
        }
        stability += word_jaccard(&b.text, &t.text);
        behavior += behavior_similarity(b, t);
        style += style_similarity(&b.text, &t.text);
        pairs += 1;
    }

    if pairs == 0 {
        return (None, 0);
    }
    let n = pairs as f64;
    let metrics = ConsistencyMetrics::from_dimensions(
        Some(stability / n),
        Some(behavior / n),
        Some(style / n),
        0.0,
    );
    (Some(metrics), pairs)
}

/// Build the comparison report for `target` against `baseline`
#[must_use]
pub fn compare(
    baseline: &Dataset,
    target: &Dataset,
    baseline_id: &str,
    settings: &ComparatorSettings,
    now: DateTime<Utc>,
) -> ComparisonReport {
    let test_mode = target.test_mode.unwrap_or(TestMode::Consistency);
    let same_inputs = baseline.inputs_hash == target.inputs_hash;

    let (consistency, pairs_compared) = if test_mode == TestMode::Consistency && same_inputs {
        pairwise_consistency(baseline, target)
    } else {
        (None, 0)
    };
    if test_mode == TestMode::Consistency && !same_inputs {
        debug!(
            feature = %target.feature,
            "Input hashes differ; consistency is not applicable"
        );
    }

    let accuracy = target.metrics.as_ref().map(|m| m.accuracy.clone());
    let accuracy_delta = match (&baseline.metrics, &target.metrics) {
        (Some(b), Some(t)) => Some(t.accuracy.score - b.accuracy.score),
        _ => None,
    };

    let overall = match (&consistency, &accuracy) {
        (Some(c), Some(a)) => (c.score + a.score) / 2.0,
        (Some(c), None) => c.score,
        (None, Some(a)) => a.score,
        (None, None) => 0.0,
    };
    let partial = consistency.is_none()
        || accuracy.is_none()
        || !baseline.is_evaluated()
        || !target.is_evaluated();

    let metrics = ComparisonMetrics {
        consistency_status: if consistency.is_some() {
            ConsistencyStatus::Applicable
        } else {
            ConsistencyStatus::NotApplicable
        },
        consistency,
        accuracy,
        accuracy_delta,
        overall,
    };

    let recommendations = recommendations::recommend(&metrics, settings.max_recommendations);
    let decision = decide(&metrics);

    ComparisonReport {
        feature: target.feature.clone(),
        baseline_id: baseline_id.to_string(),
        baseline_dataset_id: baseline.id.clone(),
        target_dataset_id: target.id.clone(),
        target_created_at: target.created_at,
        test_mode,
        metrics,
        recommendations,
        decision,
        pairs_compared,
        partial,
        generated_at: now,
    }
}

/// Decide whether to switch to the target.
///
/// Without consistency (accuracy mode) only the accuracy change counts and
/// confidence drops one level.
#[must_use]
pub fn decide(metrics: &ComparisonMetrics) -> DecisionSummary {
    let consistency = metrics.consistency.as_ref().map(|c| c.score);
    let Some(delta) = metrics.accuracy_delta else {
        return DecisionSummary {
            decision: Decision::NeedsMoreTesting,
            confidence: Confidence::Low,
            rationale: "Accuracy of both sides is needed to decide; evaluate both datasets"
                .to_string(),
        };
    };

    let consistency_note = consistency.map_or_else(
        || "consistency not applicable".to_string(),
        |c| format!("consistency {c:.2}"),
    );
    let lowered = |confidence: Confidence| match (consistency, confidence) {
        (Some(_), c) => c,
        (None, Confidence::High) => Confidence::Medium,
        (None, _) => Confidence::Low,
    };

    let (decision, confidence, reason) = if delta > CLEAR_GAIN && consistency.is_none_or(|c| c > 0.8) {
        (
            Decision::RecommendTarget,
            lowered(Confidence::High),
            "significant accuracy gain",
        )
    } else if delta > 0.0 && consistency.is_none_or(|c| c > 0.7) {
        (
            Decision::ConsiderTarget,
            lowered(Confidence::Medium),
            "moderate accuracy gain",
        )
    } else if delta < -CLEAR_GAIN || consistency.is_some_and(|c| c < 0.6) {
        (
            Decision::KeepBaseline,
            Confidence::High,
            "accuracy regression or low consistency",
        )
    } else {
        (
            Decision::NeedsMoreTesting,
            Confidence::Low,
            "marginal differences",
        )
    };

    DecisionSummary {
        decision,
        confidence,
        rationale: format!("{reason} (accuracy delta {delta:+.2}, {consistency_note})"),
    }
}
