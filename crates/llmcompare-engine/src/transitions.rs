//! Legal phase transitions of the comparison workflow
//!
//! ```text
//! NEW ──run_baseline──▶ BASELINE_CREATED ──run_target──▶ TARGET_CREATED
//!                            ▲                                │
//!                            │ promote                 run_compare
//!                            │                                ▼
//!                            └──────────────────────────── COMPARED ──run_target──▶ TARGET_CREATED
//! ```
//!
//! `run_baseline` is allowed from every phase. From `TARGET_CREATED` and
//! `COMPARED` it adds a baseline without moving the phase.

use strum::Display;

use llmcompare_utils::types::{Phase, WorkflowState};
use llmcompare_utils::{LlmCompareError, NotFoundError, StateError};

/// Workflow operation that mutates state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Event {
    RunBaseline,
    RunTarget,
    RunCompare,
    #[strum(serialize = "promote_target_to_baseline")]
    Promote,
}

fn illegal(state: &WorkflowState, event: Event, reason: &str) -> StateError {
    StateError::IllegalTransition {
        feature: state.feature.clone(),
        from: state.current_phase,
        event: event.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate `event` against `state` and return the phase it leads to.
///
/// # Errors
/// `StateError` when the event is not legal from the current phase or its
/// precondition does not hold. `run_target` also resolves the baseline and
/// may fail with `NoBaselines` / `AmbiguousBaseline`.
pub fn check(state: &WorkflowState, event: Event) -> Result<Phase, StateError> {
    let phase = state.current_phase;
    match event {
        Event::RunBaseline => Ok(match phase {
            Phase::New => Phase::BaselineCreated,
            other => other,
        }),
        Event::RunTarget => match phase {
            Phase::New => Err(StateError::NoBaselines {
                feature: state.feature.clone(),
            }),
            Phase::TargetCreated => Err(illegal(
                state,
                event,
                "a target is waiting to be compared; run the compare phase first",
            )),
            Phase::BaselineCreated | Phase::Compared => {
                resolve_baseline(state)?;
                Ok(Phase::TargetCreated)
            }
        },
        Event::RunCompare => match phase {
            Phase::TargetCreated if state.target_dataset.is_some() => Ok(Phase::Compared),
            Phase::TargetCreated | Phase::New | Phase::BaselineCreated => Err(illegal(
                state,
                event,
                "no target dataset; run the target phase first",
            )),
            Phase::Compared => Err(illegal(
                state,
                event,
                "the current target was already compared; run a new target first",
            )),
        },
        Event::Promote => match phase {
            Phase::Compared if state.target_dataset.is_some() => Ok(Phase::BaselineCreated),
            _ => Err(illegal(
                state,
                event,
                "only a compared target can be promoted",
            )),
        },
    }
}

/// The baseline a target run should use: the selection, or the only
/// baseline when exactly one exists.
///
/// # Errors
/// `NoBaselines` when none are registered, `AmbiguousBaseline` when several
/// exist and none is selected, `Corrupt` when the selection is dangling.
pub fn resolve_baseline(state: &WorkflowState) -> Result<String, StateError> {
    if let Some(id) = &state.selected_baseline_id {
        return if state.baselines.contains_key(id) {
            Ok(id.clone())
        } else {
            Err(StateError::Corrupt {
                feature: state.feature.clone(),
                reason: format!("selected baseline '{id}' is not registered"),
            })
        };
    }
    match state.baselines.len() {
        0 => Err(StateError::NoBaselines {
            feature: state.feature.clone(),
        }),
        1 => Ok(state.baselines.keys().next().cloned().unwrap_or_default()),
        count => Err(StateError::AmbiguousBaseline {
            feature: state.feature.clone(),
            count,
        }),
    }
}

/// Point the selection at `id`
///
/// # Errors
/// `NotFoundError::Baseline` when `id` is not registered.
pub fn select(state: &mut WorkflowState, id: &str) -> Result<(), LlmCompareError> {
    if !state.baselines.contains_key(id) {
        return Err(NotFoundError::Baseline {
            feature: state.feature.clone(),
            id: id.to_string(),
        }
        .into());
    }
    state.selected_baseline_id = Some(id.to_string());
    Ok(())
}

/// Suggested next step for a phase
#[must_use]
pub fn next_action(phase: Phase) -> &'static str {
    match phase {
        Phase::New => "run the baseline phase: llmcompare run --phase baseline",
        Phase::BaselineCreated => "run the target phase: llmcompare run --phase target",
        Phase::TargetCreated => "run the compare phase: llmcompare run --phase compare",
        Phase::Compared => {
            "review the report, then promote the target or run a new target"
        }
    }
}
