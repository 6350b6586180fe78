//! Rule table turning comparison metrics into recommendations

use llmcompare_utils::types::ComparisonMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Metric a rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMetric {
    Overall,
    AccuracyDelta,
    Consistency,
    Stability,
    Behavior,
    Style,
    Accuracy,
    Correctness,
    Quality,
    Coverage,
}

impl RuleMetric {
    fn value(self, metrics: &ComparisonMetrics) -> Option<f64> {
        let consistency = metrics.consistency.as_ref();
        let accuracy = metrics.accuracy.as_ref();
        match self {
            Self::Overall => Some(metrics.overall),
            Self::AccuracyDelta => metrics.accuracy_delta,
            Self::Consistency => consistency.map(|c| c.score),
            Self::Stability => consistency.and_then(|c| c.stability),
            Self::Behavior => consistency.and_then(|c| c.behavior),
            Self::Style => consistency.and_then(|c| c.style),
            Self::Accuracy => accuracy.map(|a| a.score),
            Self::Correctness => accuracy.and_then(|a| a.correctness),
            Self::Quality => accuracy.and_then(|a| a.quality),
            Self::Coverage => accuracy.and_then(|a| a.coverage),
        }
    }
}

/// Fires when `metric < threshold`
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub metric: RuleMetric,
    pub threshold: f64,
    pub severity: Severity,
    pub message: &'static str,
}

pub const RULES: &[Rule] = &[
    Rule {
        metric: RuleMetric::Overall,
        threshold: 0.5,
        severity: Severity::Critical,
        message: "Overall score is below 0.5; do not roll out the target configuration",
    },
    Rule {
        metric: RuleMetric::AccuracyDelta,
        threshold: -0.05,
        severity: Severity::Critical,
        message: "Target accuracy dropped versus the baseline; review the lowest-scoring samples before switching",
    },
    Rule {
        metric: RuleMetric::Consistency,
        threshold: 0.6,
        severity: Severity::High,
        message: "Target outputs diverge strongly from the baseline; check the system prompt and model parameters",
    },
    Rule {
        metric: RuleMetric::Correctness,
        threshold: 0.6,
        severity: Severity::High,
        message: "Correctness is low; verify the target model follows the feature's instructions",
    },
    Rule {
        metric: RuleMetric::Stability,
        threshold: 0.7,
        severity: Severity::Medium,
        message: "Wording differs noticeably from the baseline; consider a lower temperature",
    },
    Rule {
        metric: RuleMetric::Behavior,
        threshold: 0.7,
        severity: Severity::Medium,
        message: "Answer length or structure changed; check max_tokens and truncated replies",
    },
    Rule {
        metric: RuleMetric::Quality,
        threshold: 0.7,
        severity: Severity::Medium,
        message: "Answer quality is below target; refine the feature's system prompt",
    },
    Rule {
        metric: RuleMetric::Coverage,
        threshold: 0.7,
        severity: Severity::Medium,
        message: "Answers miss parts of the request; add examples covering multi-step prompts",
    },
    Rule {
        metric: RuleMetric::Style,
        threshold: 0.8,
        severity: Severity::Low,
        message: "Formatting differs from the baseline (comments, lists or code fences)",
    },
    Rule {
        metric: RuleMetric::Accuracy,
        threshold: 0.8,
        severity: Severity::Low,
        message: "Accuracy has headroom; collect more samples to confirm the trend",
    },
];

/// Messages of the firing rules, most severe first, at most `max` of them
#[must_use]
pub fn recommend(metrics: &ComparisonMetrics, max: usize) -> Vec<String> {
    recommend_with(RULES, metrics, max)
}

fn recommend_with(rules: &[Rule], metrics: &ComparisonMetrics, max: usize) -> Vec<String> {
    let mut fired: Vec<&Rule> = rules
        .iter()
        .filter(|rule| {
            rule.metric
                .value(metrics)
                .is_some_and(|value| value < rule.threshold)
        })
        .collect();
    fired.sort_by_key(|rule| rule.severity);
    fired
        .into_iter()
        .take(max)
        .map(|rule| rule.message.to_string())
        .collect()
}
