//! Shared data model: datasets, metrics, workflow state and comparison reports
//!
//! These types are the on-disk JSON contracts. Field names are stable; new
//! optional fields must carry `#[serde(default)]` so older files keep loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString, IntoStaticStr};

/// Render a timestamp as the `YYYYMMDD_HHMMSS` token used in ids and file names
#[must_use]
pub fn timestamp_token(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Phase of a feature's comparison workflow
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    New,
    BaselineCreated,
    TargetCreated,
    Compared,
}

/// How a target run chooses its inputs
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TestMode {
    /// Replay the selected baseline's inputs verbatim
    Consistency,
    /// Generate fresh inputs
    Accuracy,
}

/// Which LLM produced a dataset and whether it has been scored
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DatasetRole {
    RawLl1,
    EvaluatedLl1,
    RawLl2,
    EvaluatedLl2,
}

impl DatasetRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    #[must_use]
    pub fn is_evaluated(self) -> bool {
        matches!(self, Self::EvaluatedLl1 | Self::EvaluatedLl2)
    }

    /// The evaluated counterpart of a raw role
    #[must_use]
    pub fn evaluated(self) -> Self {
        match self {
            Self::RawLl1 | Self::EvaluatedLl1 => Self::EvaluatedLl1,
            Self::RawLl2 | Self::EvaluatedLl2 => Self::EvaluatedLl2,
        }
    }

    pub const ALL: [DatasetRole; 4] = [
        Self::RawLl1,
        Self::EvaluatedLl1,
        Self::RawLl2,
        Self::EvaluatedLl2,
    ];
}

/// One prompt sent to the product LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub input_id: String,
    pub feature: String,
    pub prompt: String,
    pub prompt_id: String,
    /// Feature-specific extras (language, context, ...)
    #[serde(default)]
    pub config: serde_json::Value,
}

/// The product LLM's answer to one [`Input`], aligned by position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub input_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub response_time_ms: u64,
}

impl Output {
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFailure {
    pub input_id: String,
    pub error: String,
}

/// Per-dataset record of how the product LLM calls went
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub total_inputs: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    #[serde(default)]
    pub errors: Vec<CallFailure>,
}

/// Metric group a dimension contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetricGroup {
    Consistency,
    Accuracy,
}

/// A single scored dimension
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Dimension {
    Stability,
    Behavior,
    Style,
    Correctness,
    Quality,
    Coverage,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Self::Stability,
        Self::Behavior,
        Self::Style,
        Self::Correctness,
        Self::Quality,
        Self::Coverage,
    ];

    #[must_use]
    pub fn group(self) -> MetricGroup {
        match self {
            Self::Stability | Self::Behavior | Self::Style => MetricGroup::Consistency,
            Self::Correctness | Self::Quality | Self::Coverage => MetricGroup::Accuracy,
        }
    }

    /// Label the evaluator is asked to echo in front of its score
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Stability => "stability",
            Self::Behavior => "behavior",
            Self::Style => "style",
            Self::Correctness => "correctness",
            Self::Quality => "quality",
            Self::Coverage => "coverage",
        }
    }
}

/// Mean of the present scores, or `(default, true)` when none are present.
///
/// Present values are clamped to `[0, 1]`.
#[must_use]
pub fn group_score(values: &[Option<f64>], default: f64) -> (f64, bool) {
    let present: Vec<f64> = values.iter().flatten().map(|v| v.clamp(0.0, 1.0)).collect();
    if present.is_empty() {
        (default.clamp(0.0, 1.0), true)
    } else {
        (present.iter().sum::<f64>() / present.len() as f64, false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyMetrics {
    pub stability: Option<f64>,
    pub behavior: Option<f64>,
    pub style: Option<f64>,
    pub score: f64,
    #[serde(default)]
    pub degraded: bool,
}

impl ConsistencyMetrics {
    #[must_use]
    pub fn from_dimensions(
        stability: Option<f64>,
        behavior: Option<f64>,
        style: Option<f64>,
        degraded_default: f64,
    ) -> Self {
        let (score, degraded) = group_score(&[stability, behavior, style], degraded_default);
        Self {
            stability,
            behavior,
            style,
            score,
            degraded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub correctness: Option<f64>,
    pub quality: Option<f64>,
    pub coverage: Option<f64>,
    pub score: f64,
    #[serde(default)]
    pub degraded: bool,
}

impl AccuracyMetrics {
    #[must_use]
    pub fn from_dimensions(
        correctness: Option<f64>,
        quality: Option<f64>,
        coverage: Option<f64>,
        degraded_default: f64,
    ) -> Self {
        let (score, degraded) = group_score(&[correctness, quality, coverage], degraded_default);
        Self {
            correctness,
            quality,
            coverage,
            score,
            degraded,
        }
    }
}

/// Evaluator scores for one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub consistency: ConsistencyMetrics,
    pub accuracy: AccuracyMetrics,
    pub overall: f64,
}

impl Metrics {
    /// Build metrics from per-dimension scores (`None` = could not be parsed)
    #[must_use]
    pub fn assemble(score_of: impl Fn(Dimension) -> Option<f64>, degraded_default: f64) -> Self {
        let consistency = ConsistencyMetrics::from_dimensions(
            score_of(Dimension::Stability),
            score_of(Dimension::Behavior),
            score_of(Dimension::Style),
            degraded_default,
        );
        let accuracy = AccuracyMetrics::from_dimensions(
            score_of(Dimension::Correctness),
            score_of(Dimension::Quality),
            score_of(Dimension::Coverage),
            degraded_default,
        );
        let overall = (consistency.score + accuracy.score) / 2.0;
        Self {
            consistency,
            accuracy,
            overall,
        }
    }

    #[must_use]
    pub fn dimension(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Stability => self.consistency.stability,
            Dimension::Behavior => self.consistency.behavior,
            Dimension::Style => self.consistency.style,
            Dimension::Correctness => self.accuracy.correctness,
            Dimension::Quality => self.accuracy.quality,
            Dimension::Coverage => self.accuracy.coverage,
        }
    }
}

/// Inputs, outputs and (once evaluated) metrics from one phase run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// File stem of the dataset's artifact in the store
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub feature: String,
    pub role: DatasetRole,
    /// `provider/model` of the LLM that produced the outputs
    pub llm_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_mode: Option<TestMode>,
    /// Baseline a target was produced against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_id: Option<String>,
    /// Raw dataset an evaluated dataset was scored from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
    /// Content hash of `inputs`; equal hashes mean replayed inputs
    pub inputs_hash: String,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    #[serde(default)]
    pub metrics: Option<Metrics>,
    #[serde(default)]
    pub summary: CallSummary,
}

impl Dataset {
    #[must_use]
    pub fn size(&self) -> usize {
        self.inputs.len()
    }

    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.metrics.is_some()
    }

    /// Model half of `llm_version`
    #[must_use]
    pub fn model(&self) -> &str {
        self.llm_version
            .split_once('/')
            .map_or(self.llm_version.as_str(), |(_, model)| model)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BaselineState {
    Raw,
    Evaluated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BaselineOrigin {
    Generated,
    PromotedTarget,
}

/// A baseline registered in the workflow state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub num_inputs: usize,
    pub state: BaselineState,
    /// Dataset used for comparison (evaluated when available, raw otherwise)
    pub dataset_id: String,
    pub raw_dataset_id: String,
    pub llm_version: String,
    pub origin: BaselineOrigin,
    /// Insertion order, used to break `created_at` ties
    pub seq: u64,
}

/// Where the last comparison report was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRef {
    pub generated_at: DateTime<Utc>,
    pub json_path: String,
    pub html_path: String,
}

/// Per-feature workflow record; the only mutable shared state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub feature: String,
    pub current_phase: Phase,
    #[serde(default)]
    pub baselines: BTreeMap<String, BaselineRecord>,
    #[serde(default)]
    pub selected_baseline_id: Option<String>,
    #[serde(default)]
    pub target_dataset: Option<Dataset>,
    #[serde(default)]
    pub last_report: Option<ReportRef>,
    #[serde(default)]
    pub next_seq: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl WorkflowState {
    #[must_use]
    pub fn new(feature: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            feature: feature.into(),
            current_phase: Phase::New,
            baselines: BTreeMap::new(),
            selected_baseline_id: None,
            target_dataset: None,
            last_report: None,
            next_seq: 0,
            created_at: now,
            last_updated: now,
        }
    }

    /// Baselines oldest first; equal timestamps keep insertion order
    #[must_use]
    pub fn baselines_ordered(&self) -> Vec<&BaselineRecord> {
        let mut records: Vec<&BaselineRecord> = self.baselines.values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));
        records
    }

    #[must_use]
    pub fn selected_baseline(&self) -> Option<&BaselineRecord> {
        self.selected_baseline_id
            .as_deref()
            .and_then(|id| self.baselines.get(id))
    }

    /// Check the cross-field invariants of a loaded state.
    ///
    /// # Errors
    /// Returns a description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.current_phase {
            Phase::New if !self.baselines.is_empty() => {
                Err("phase NEW but baselines are registered".to_string())
            }
            Phase::TargetCreated | Phase::Compared if self.target_dataset.is_none() => Err(
                format!("phase {} requires a target dataset", self.current_phase),
            ),
            Phase::TargetCreated if self.selected_baseline().is_none() => Err(
                "phase TARGET_CREATED requires a selected baseline present in baselines"
                    .to_string(),
            ),
            _ => Ok(()),
        }
    }

    /// Allocate the next insertion sequence number
    pub fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Whether the consistency group could be computed for a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConsistencyStatus {
    Applicable,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<ConsistencyMetrics>,
    pub consistency_status: ConsistencyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<AccuracyMetrics>,
    /// Target accuracy minus baseline accuracy, when both were evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_delta: Option<f64>,
    pub overall: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    RecommendTarget,
    ConsiderTarget,
    KeepBaseline,
    NeedsMoreTesting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub decision: Decision,
    pub confidence: Confidence,
    pub rationale: String,
}

/// Result of comparing a target dataset against its baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub feature: String,
    pub baseline_id: String,
    pub baseline_dataset_id: String,
    pub target_dataset_id: String,
    pub target_created_at: DateTime<Utc>,
    pub test_mode: TestMode,
    pub metrics: ComparisonMetrics,
    pub recommendations: Vec<String>,
    pub decision: DecisionSummary,
    /// Output pairs that went into the consistency scores
    pub pairs_compared: usize,
    /// Set when one side was not evaluated or a metric group is missing
    pub partial: bool,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(id: &str, created_at: DateTime<Utc>, seq: u64) -> BaselineRecord {
        BaselineRecord {
            id: id.to_string(),
            created_at,
            num_inputs: 2,
            state: BaselineState::Raw,
            dataset_id: format!("{id}-data"),
            raw_dataset_id: format!("{id}-data"),
            llm_version: "openai/gpt-4o".to_string(),
            origin: BaselineOrigin::Generated,
            seq,
        }
    }

    #[test]
    fn test_timestamp_token_format() {
        let t = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(timestamp_token(&t), "20260304_050607");
    }

    #[test]
    fn test_dataset_model_is_split_from_llm_version() {
        let mut dataset = Dataset {
            id: "d".to_string(),
            created_at: at(0),
            feature: "chat_window".to_string(),
            role: DatasetRole::RawLl1,
            llm_version: "openai/gpt-4o".to_string(),
            test_mode: None,
            baseline_id: None,
            derived_from: None,
            inputs_hash: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            metrics: None,
            summary: CallSummary::default(),
        };
        assert_eq!(dataset.model(), "gpt-4o");
        dataset.llm_version = "local".to_string();
        assert_eq!(dataset.model(), "local");
    }

    #[test]
    fn test_phase_serialization_is_screaming_snake() {
        let json = serde_json::to_string(&Phase::BaselineCreated).unwrap();
        assert_eq!(json, "\"BASELINE_CREATED\"");
        assert_eq!(Phase::TargetCreated.to_string(), "TARGET_CREATED");
    }

    #[test]
    fn test_test_mode_parses_case_insensitively() {
        assert_eq!(TestMode::from_str("CONSISTENCY").unwrap(), TestMode::Consistency);
        assert_eq!(TestMode::from_str("accuracy").unwrap(), TestMode::Accuracy);
        assert!(TestMode::from_str("speed").is_err());
    }

    #[test]
    fn test_group_score_excludes_missing_dimensions() {
        let (score, degraded) = group_score(&[Some(0.8), Some(0.6), None], 0.5);
        assert!((score - 0.7).abs() < 1e-9);
        assert!(!degraded);
    }

    #[test]
    fn test_group_score_all_missing_uses_default() {
        let (score, degraded) = group_score(&[None, None, None], 0.5);
        assert_eq!(score, 0.5);
        assert!(degraded);
    }

    #[test]
    fn test_metrics_assemble_overall_is_mean_of_groups() {
        let metrics = Metrics::assemble(
            |d| match d {
                Dimension::Stability | Dimension::Behavior | Dimension::Style => Some(1.0),
                _ => Some(0.5),
            },
            0.5,
        );
        assert_eq!(metrics.consistency.score, 1.0);
        assert_eq!(metrics.accuracy.score, 0.5);
        assert!((metrics.overall - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_dimension_groups() {
        let consistency: Vec<_> = Dimension::ALL
            .iter()
            .filter(|d| d.group() == MetricGroup::Consistency)
            .collect();
        assert_eq!(consistency.len(), 3);
        assert_eq!(Dimension::Coverage.label(), "coverage");
    }

    #[test]
    fn test_baselines_ordered_breaks_ties_by_seq() {
        let mut state = WorkflowState::new("generate_code", at(0));
        state.baselines.insert("z".into(), record("z", at(5), 0));
        state.baselines.insert("a".into(), record("a", at(5), 1));
        state.baselines.insert("m".into(), record("m", at(1), 2));

        let ids: Vec<&str> = state
            .baselines_ordered()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["m", "z", "a"]);
    }

    #[test]
    fn test_check_invariants_rejects_target_phase_without_selection() {
        let mut state = WorkflowState::new("generate_code", at(0));
        state.current_phase = Phase::TargetCreated;
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_take_seq_is_monotonic() {
        let mut state = WorkflowState::new("chat_window", at(0));
        assert_eq!(state.take_seq(), 0);
        assert_eq!(state.take_seq(), 1);
        assert_eq!(state.next_seq, 2);
    }

    #[test]
    fn test_dataset_role_strings() {
        assert_eq!(DatasetRole::RawLl1.as_str(), "raw_ll1");
        assert_eq!(DatasetRole::RawLl2.evaluated(), DatasetRole::EvaluatedLl2);
        assert!(DatasetRole::EvaluatedLl1.is_evaluated());
    }
}
