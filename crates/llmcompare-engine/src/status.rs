//! Read-only status view of a feature's workflow

use chrono::{DateTime, Utc};
use serde::Serialize;

use llmcompare_utils::types::{
    BaselineRecord, DatasetRole, Phase, ReportRef, TestMode, WorkflowState,
};

use crate::transitions::next_action;

/// Summary of the active target without its inputs and outputs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSummary {
    pub dataset_id: String,
    pub created_at: DateTime<Utc>,
    pub role: DatasetRole,
    pub llm_version: String,
    pub test_mode: Option<TestMode>,
    pub baseline_id: Option<String>,
    pub num_inputs: usize,
    pub failed_calls: usize,
    pub evaluated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub feature: String,
    pub phase: Phase,
    /// Oldest first, ties broken by insertion order
    pub baselines: Vec<BaselineRecord>,
    pub selected_baseline_id: Option<String>,
    pub target: Option<TargetSummary>,
    pub last_report: Option<ReportRef>,
    pub next_action: String,
    pub last_updated: DateTime<Utc>,
}

impl StatusReport {
    #[must_use]
    pub fn from_state(state: &WorkflowState) -> Self {
        let target = state.target_dataset.as_ref().map(|t| TargetSummary {
            dataset_id: t.id.clone(),
            created_at: t.created_at,
            role: t.role,
            llm_version: t.llm_version.clone(),
            test_mode: t.test_mode,
            baseline_id: t.baseline_id.clone(),
            num_inputs: t.size(),
            failed_calls: t.summary.failed_calls,
            evaluated: t.is_evaluated(),
        });

        Self {
            feature: state.feature.clone(),
            phase: state.current_phase,
            baselines: state.baselines_ordered().into_iter().cloned().collect(),
            selected_baseline_id: state.selected_baseline_id.clone(),
            target,
            last_report: state.last_report.clone(),
            next_action: next_action(state.current_phase).to_string(),
            last_updated: state.last_updated,
        }
    }

    /// Multi-line human-readable rendering for the terminal
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!("Feature: {}\nPhase:   {}\n", self.feature, self.phase);

        if self.baselines.is_empty() {
            out.push_str("Baselines: none\n");
        } else {
            out.push_str("Baselines:\n");
            for b in &self.baselines {
                let marker = if self.selected_baseline_id.as_deref() == Some(b.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                out.push_str(&format!(
                    "  {marker} {} ({}, {} inputs, {}, {})\n",
                    b.id,
                    b.state,
                    b.num_inputs,
                    b.llm_version,
                    b.created_at.format("%Y-%m-%d %H:%M:%S")
                ));
            }
        }

        if let Some(t) = &self.target {
            out.push_str(&format!(
                "Target: {} ({}, {} inputs, {} failed, {})\n",
                t.dataset_id,
                t.llm_version,
                t.num_inputs,
                t.failed_calls,
                if t.evaluated { "evaluated" } else { "raw" }
            ));
        }
        if let Some(r) = &self.last_report {
            out.push_str(&format!("Last report: {}\n", r.html_path));
        }
        out.push_str(&format!("Next: {}\n", self.next_action));
        out
    }
}
