//! Phased comparison workflow for one feature.
//!
//! [`Workflow`] is the entry point for the CLI and for embedding llmcompare.
//! Each operation follows the same shape:
//!
//! 1. load the feature's state and validate the transition (fail fast, no
//!    LLM call is made for an illegal transition)
//! 2. do the slow work: generate inputs, call the product LLM, evaluate,
//!    and persist every dataset as soon as it exists
//! 3. commit: reload the state under the feature lock, validate the
//!    transition again and write the new state atomically
//!
//! A dropped future never commits, since the commit is the last step. The
//! datasets it already wrote stay on disk unreferenced and are pruned later.
//!
//! # Example
//!
//! ```rust,no_run
//! use llmcompare_config::Config;
//! use llmcompare_engine::{BaselineOptions, InputsSource, Workflow};
//!
//! # async fn run() -> Result<(), llmcompare_utils::LlmCompareError> {
//! let config = Config::builder().feature("chat_window").build()?;
//! let workflow = Workflow::new(config, "chat_window")?;
//! let record = workflow
//!     .run_baseline(BaselineOptions {
//!         num_patterns: Some(5),
//!         inputs: InputsSource::Generate,
//!         skip_evaluation: false,
//!     })
//!     .await?;
//! println!("created {}", record.id);
//! # Ok(())
//! # }
//! ```

use camino::Utf8PathBuf;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{Instrument, debug, info, warn};

use llmcompare_config::{Config, FeatureSpec, LlmRole};
use llmcompare_llm::{Gateway, ProviderRegistry};
use llmcompare_store::{DatasetStore, ReportStore, StateStore};
use llmcompare_utils::canonicalization::content_hash;
use llmcompare_utils::logging::{log_phase_complete, log_phase_error, log_phase_start, phase_span};
use llmcompare_utils::redaction::redact_secrets;
use llmcompare_utils::types::{
    BaselineOrigin, BaselineRecord, BaselineState, CallFailure, CallSummary, ComparisonReport,
    Dataset, DatasetRole, Input, Output, Phase, ReportRef, TestMode, WorkflowState,
    timestamp_token,
};
use llmcompare_utils::{
    ApiError, ConfigError, GatewayError, GenerationError, LlmCompareError, NotFoundError,
    StateError,
};

use crate::comparator;
use crate::evaluator::{Evaluator, evaluated_copy};
use crate::fanout::bounded_map;
use crate::generator::{InputGenerator, select_for_feature};
use crate::report_html::render_html;
use crate::status::StatusReport;
use crate::transitions::{self, Event};

/// Where baseline inputs come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputsSource {
    /// Ask the generator LLM
    Generate,
    /// Read a saved inputs file (or a bare JSON array of inputs)
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct BaselineOptions {
    /// Defaults to `defaults.num_patterns`
    pub num_patterns: Option<usize>,
    pub inputs: InputsSource,
    pub skip_evaluation: bool,
}

#[derive(Debug, Clone)]
pub struct TargetOptions {
    pub mode: TestMode,
    /// Ignored in consistency mode, which replays the baseline's inputs
    pub num_patterns: Option<usize>,
    pub skip_evaluation: bool,
    /// Use and select this baseline instead of the current selection
    pub baseline: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompareOptions {
    /// Compare even when a dataset was not evaluated; the report is marked partial
    pub allow_partial: bool,
}

#[derive(Debug, Clone)]
pub struct CompareOutcome {
    pub report: ComparisonReport,
    pub report_ref: ReportRef,
}

/// A configured feature and, when it has been run, its phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureOverview {
    pub name: String,
    pub prompt_id: String,
    pub description: String,
    pub phase: Option<Phase>,
}

fn utf8_dir(path: &Path, key: &str) -> Result<Utf8PathBuf, ConfigError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|p| ConfigError::InvalidValue {
        key: key.to_string(),
        value: format!("{} is not valid UTF-8", p.display()),
    })
}

/// Configured features with the phase of those that have a state file
pub fn feature_overview(config: &Config) -> Result<Vec<FeatureOverview>, LlmCompareError> {
    let states = StateStore::new(utf8_dir(&config.defaults.state_dir, "state_dir")?);
    let with_state: BTreeSet<String> = states.list_features()?.into_iter().collect();

    config
        .features
        .iter()
        .map(|f| {
            let phase = if with_state.contains(&f.name) {
                Some(states.load(&f.name)?.current_phase)
            } else {
                None
            };
            Ok(FeatureOverview {
                name: f.name.clone(),
                prompt_id: f.prompt_id.clone(),
                description: f.description.clone(),
                phase,
            })
        })
        .collect()
}

/// Orchestrates the baseline → target → compare workflow of one feature
pub struct Workflow {
    config: Config,
    feature: FeatureSpec,
    registry: ProviderRegistry,
    datasets: DatasetStore,
    states: StateStore,
    reports: ReportStore,
}

impl Workflow {
    /// Workflow for `feature` with the built-in LLM providers.
    ///
    /// # Errors
    /// `ConfigError` for an unknown feature or a non-UTF-8 directory.
    pub fn new(config: Config, feature: &str) -> Result<Self, LlmCompareError> {
        Self::with_registry(config, feature, ProviderRegistry::with_builtin_providers())
    }

    /// Workflow using a custom provider registry
    pub fn with_registry(
        config: Config,
        feature: &str,
        registry: ProviderRegistry,
    ) -> Result<Self, LlmCompareError> {
        let spec = config.feature(feature)?.clone();
        llmcompare_store::naming::validate_feature_name(&spec.name)?;

        let lock_wait = config.defaults.lock_wait();
        let datasets = DatasetStore::new(utf8_dir(&config.defaults.data_dir, "data_dir")?);
        let states = StateStore::new(utf8_dir(&config.defaults.state_dir, "state_dir")?)
            .with_lock_wait(lock_wait);
        let reports = ReportStore::new(utf8_dir(&config.defaults.reports_dir, "reports_dir")?)
            .with_lock_wait(lock_wait);

        Ok(Self {
            config,
            feature: spec,
            registry,
            datasets,
            states,
            reports,
        })
    }

    #[must_use]
    pub fn feature(&self) -> &FeatureSpec {
        &self.feature
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn datasets(&self) -> &DatasetStore {
        &self.datasets
    }

    #[must_use]
    pub fn states(&self) -> &StateStore {
        &self.states
    }

    #[must_use]
    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }

    /// Current phase, baselines, target and suggested next step. Read-only.
    pub fn status(&self) -> Result<StatusReport, LlmCompareError> {
        let state = self.states.load(&self.feature.name)?;
        Ok(StatusReport::from_state(&state))
    }

    /// Registered baselines, oldest first
    pub fn baselines(&self) -> Result<Vec<BaselineRecord>, LlmCompareError> {
        let state = self.states.load(&self.feature.name)?;
        Ok(state.baselines_ordered().into_iter().cloned().collect())
    }

    /// Run the baseline LLM over new inputs and register the result as a
    /// baseline.
    ///
    /// # Errors
    /// `ConfigError` for missing credentials, `NotFoundError` for a missing
    /// inputs file, `ApiError`/`GenerationError`/`EvaluationError` from the
    /// LLM stages, `LockError` when the state stays locked.
    pub async fn run_baseline(&self, opts: BaselineOptions) -> Result<BaselineRecord, LlmCompareError> {
        self.timed("baseline", self.run_baseline_inner(opts)).await
    }

    async fn run_baseline_inner(&self, opts: BaselineOptions) -> Result<BaselineRecord, LlmCompareError> {
        let state = self.states.load(&self.feature.name)?;
        transitions::check(&state, Event::RunBaseline)?;
        let count = self.pattern_count(opts.num_patterns)?;

        let inputs = match &opts.inputs {
            InputsSource::Generate => self.generate_inputs(count).await?,
            InputsSource::File(path) => self.load_inputs(path, count)?,
        };
        let gateway = self.registry.gateway(&self.config, LlmRole::Baseline)?;
        let raw = self
            .call_product(&gateway, DatasetRole::RawLl1, inputs, None, None)
            .await?;
        let evaluated = if opts.skip_evaluation {
            None
        } else {
            Some(self.evaluate_and_save(&raw).await?)
        };

        let record = self
            .commit(move |state| {
                let next = transitions::check(state, Event::RunBaseline)?;
                let now = Utc::now();
                let id = unique_baseline_id(state, &now, raw.size());
                let seq = state.take_seq();
                let record = BaselineRecord {
                    id: id.clone(),
                    created_at: now,
                    num_inputs: raw.size(),
                    state: if evaluated.is_some() {
                        BaselineState::Evaluated
                    } else {
                        BaselineState::Raw
                    },
                    dataset_id: evaluated.as_ref().map_or_else(|| raw.id.clone(), |e| e.id.clone()),
                    raw_dataset_id: raw.id.clone(),
                    llm_version: raw.llm_version.clone(),
                    origin: BaselineOrigin::Generated,
                    seq,
                };
                state.baselines.insert(id, record.clone());
                state.current_phase = next;
                Ok(record)
            })
            .await?;

        info!(
            feature = %self.feature.name,
            baseline_id = %record.id,
            num_inputs = record.num_inputs,
            "Baseline registered"
        );
        self.prune_datasets();
        Ok(record)
    }

    /// Point the selection at a registered baseline. The phase is unchanged.
    pub async fn select_baseline(&self, id: &str) -> Result<(), LlmCompareError> {
        let id = id.to_string();
        self.commit(move |state| transitions::select(state, &id)).await
    }

    /// Run the target LLM against the selected baseline.
    ///
    /// Consistency mode replays the baseline's inputs; accuracy mode asks the
    /// generator for fresh ones. Running from `COMPARED` replaces the
    /// previous target.
    pub async fn run_target(&self, opts: TargetOptions) -> Result<Dataset, LlmCompareError> {
        self.timed("target", self.run_target_inner(opts)).await
    }

    async fn run_target_inner(&self, opts: TargetOptions) -> Result<Dataset, LlmCompareError> {
        let state = self.states.load(&self.feature.name)?;
        let (baseline_id, _) = target_baseline(&state, opts.baseline.as_deref())?;
        let record = state
            .baselines
            .get(&baseline_id)
            .cloned()
            .ok_or_else(|| NotFoundError::Baseline {
                feature: self.feature.name.clone(),
                id: baseline_id.clone(),
            })?;

        let inputs = match opts.mode {
            TestMode::Consistency => {
                let baseline = self.datasets.load(&self.feature.name, &record.dataset_id)?;
                if opts.num_patterns.is_some_and(|n| n != baseline.size()) {
                    warn!(
                        feature = %self.feature.name,
                        baseline_inputs = baseline.size(),
                        "Consistency mode replays every baseline input; ignoring num_patterns"
                    );
                }
                baseline.inputs
            }
            TestMode::Accuracy => {
                let count = self.pattern_count(opts.num_patterns)?;
                self.generate_inputs(count).await?
            }
        };

        let gateway = self.registry.gateway(&self.config, LlmRole::Target)?;
        let raw = self
            .call_product(
                &gateway,
                DatasetRole::RawLl2,
                inputs,
                Some(opts.mode),
                Some(baseline_id.clone()),
            )
            .await?;
        let target = if opts.skip_evaluation {
            raw
        } else {
            self.evaluate_and_save(&raw).await?
        };

        let committed = target.clone();
        let feature = self.feature.name.clone();
        self.commit(move |state| {
            let (_, next) = target_baseline(state, Some(&baseline_id))?;
            if let Some(old) = &state.target_dataset {
                warn!(
                    feature = %feature,
                    old_target = %old.id,
                    new_target = %committed.id,
                    "Replacing the previous target"
                );
            }
            state.selected_baseline_id = Some(baseline_id);
            state.target_dataset = Some(committed);
            state.current_phase = next;
            Ok(())
        })
        .await?;

        self.prune_datasets();
        Ok(target)
    }

    /// Compare the current target with its baseline and write the report.
    ///
    /// # Errors
    /// `StateError` without a target, or when a dataset is unevaluated and
    /// `allow_partial` is not set.
    pub async fn run_compare(&self, opts: CompareOptions) -> Result<CompareOutcome, LlmCompareError> {
        self.timed("compare", self.run_compare_inner(opts)).await
    }

    async fn run_compare_inner(&self, opts: CompareOptions) -> Result<CompareOutcome, LlmCompareError> {
        let state = self.states.load(&self.feature.name)?;
        transitions::check(&state, Event::RunCompare)?;
        let Some(target) = state.target_dataset.clone() else {
            return Err(StateError::IllegalTransition {
                feature: self.feature.name.clone(),
                from: state.current_phase,
                event: Event::RunCompare.to_string(),
                reason: "no target dataset".to_string(),
            }
            .into());
        };

        let baseline_id = target
            .baseline_id
            .clone()
            .or_else(|| state.selected_baseline_id.clone())
            .ok_or_else(|| StateError::Corrupt {
                feature: self.feature.name.clone(),
                reason: "target does not name its baseline".to_string(),
            })?;
        let record = state
            .baselines
            .get(&baseline_id)
            .ok_or_else(|| NotFoundError::Baseline {
                feature: self.feature.name.clone(),
                id: baseline_id.clone(),
            })?;
        let baseline = self.datasets.load(&self.feature.name, &record.dataset_id)?;

        if !opts.allow_partial {
            for (side, dataset) in [("baseline", &baseline), ("target", &target)] {
                if !dataset.is_evaluated() {
                    return Err(StateError::NotEvaluated {
                        feature: self.feature.name.clone(),
                        side: side.to_string(),
                    }
                    .into());
                }
            }
        }

        let report = comparator::compare(
            &baseline,
            &target,
            &baseline_id,
            &self.config.comparator,
            Utc::now(),
        );
        let report_ref = self.reports.save(&report, &render_html(&report))?;

        let target_id = target.id.clone();
        let committed_ref = report_ref.clone();
        self.commit(move |state| {
            let next = transitions::check(state, Event::RunCompare)?;
            if state.target_dataset.as_ref().map(|t| t.id.as_str()) != Some(target_id.as_str()) {
                return Err(StateError::IllegalTransition {
                    feature: state.feature.clone(),
                    from: state.current_phase,
                    event: Event::RunCompare.to_string(),
                    reason: "the target changed while the comparison ran".to_string(),
                }
                .into());
            }
            state.last_report = Some(committed_ref);
            state.current_phase = next;
            Ok(())
        })
        .await?;

        // only committed comparisons reach the dashboard
        if let Err(e) = self.reports.publish(&report, &report_ref) {
            warn!(
                feature = %self.feature.name,
                report = %report_ref.json_path,
                error = %e,
                "Report saved but not added to the index"
            );
        }

        info!(
            feature = %self.feature.name,
            decision = %report.decision.decision,
            overall = report.metrics.overall,
            partial = report.partial,
            "Comparison complete"
        );
        Ok(CompareOutcome { report, report_ref })
    }

    /// Turn the compared target into a new, selected baseline
    pub async fn promote_target_to_baseline(&self) -> Result<BaselineRecord, LlmCompareError> {
        self.timed("promote", async {
            self.commit(|state| {
                let next = transitions::check(state, Event::Promote)?;
                let Some(target) = state.target_dataset.take() else {
                    return Err(StateError::IllegalTransition {
                        feature: state.feature.clone(),
                        from: state.current_phase,
                        event: Event::Promote.to_string(),
                        reason: "no target dataset".to_string(),
                    }
                    .into());
                };

                let now = Utc::now();
                let id = unique_baseline_id(state, &now, target.size());
                let seq = state.take_seq();
                let record = BaselineRecord {
                    id: id.clone(),
                    created_at: now,
                    num_inputs: target.size(),
                    state: if target.is_evaluated() {
                        BaselineState::Evaluated
                    } else {
                        BaselineState::Raw
                    },
                    dataset_id: target.id.clone(),
                    raw_dataset_id: target.derived_from.clone().unwrap_or_else(|| target.id.clone()),
                    llm_version: target.llm_version.clone(),
                    origin: BaselineOrigin::PromotedTarget,
                    seq,
                };
                state.baselines.insert(id.clone(), record.clone());
                state.selected_baseline_id = Some(id);
                state.current_phase = next;
                Ok(record)
            })
            .await
        })
        .await
    }

    async fn timed<T>(
        &self,
        phase: &str,
        fut: impl Future<Output = Result<T, LlmCompareError>>,
    ) -> Result<T, LlmCompareError> {
        let feature = self.feature.name.as_str();
        log_phase_start(feature, phase);
        let started = Instant::now();
        let result = fut.instrument(phase_span(feature, phase)).await;
        let elapsed = started.elapsed().as_millis();
        match &result {
            Ok(_) => log_phase_complete(feature, phase, elapsed),
            Err(e) => log_phase_error(feature, phase, &e.to_string(), elapsed),
        }
        result
    }

    /// Apply `f` to the state under the feature lock, off the async runtime
    async fn commit<T, F>(&self, f: F) -> Result<T, LlmCompareError>
    where
        F: FnOnce(&mut WorkflowState) -> Result<T, LlmCompareError> + Send + 'static,
        T: Send + 'static,
    {
        let states = self.states.clone();
        let feature = self.feature.name.clone();
        tokio::task::spawn_blocking(move || states.update(&feature, f))
            .await
            .map_err(|e| io::Error::other(format!("state update task failed: {e}")))?
    }

    fn pattern_count(&self, requested: Option<usize>) -> Result<usize, ConfigError> {
        let count = requested.unwrap_or(self.config.defaults.num_patterns);
        if count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "num_patterns".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(count)
    }

    async fn generate_inputs(&self, count: usize) -> Result<Vec<Input>, LlmCompareError> {
        let gateway = self.registry.gateway(&self.config, LlmRole::Generator)?;
        let inputs = InputGenerator::new(gateway, self.feature.clone())
            .generate(count)
            .await?;
        let path = self
            .datasets
            .save_inputs(&self.feature.name, &inputs, Utc::now())?;
        debug!(path = %path, "Generated inputs saved");
        Ok(inputs)
    }

    fn load_inputs(&self, path: &Path, count: usize) -> Result<Vec<Input>, LlmCompareError> {
        let path = utf8_dir(path, "inputs")?;
        let inputs = select_for_feature(DatasetStore::load_inputs(&path)?, &self.feature, count);
        if inputs.is_empty() {
            return Err(GenerationError::NoUsableInputs {
                feature: self.feature.name.clone(),
                reason: format!("{path} has no inputs for this feature"),
            }
            .into());
        }
        Ok(inputs)
    }

    /// Send every input to the product LLM and persist the raw dataset.
    ///
    /// Per-input failures are recorded on the output and in the call
    /// summary. The run fails when every call failed or when a failure shows
    /// the provider itself is unusable (bad credentials, misconfiguration).
    async fn call_product(
        &self,
        gateway: &Gateway,
        role: DatasetRole,
        inputs: Vec<Input>,
        test_mode: Option<TestMode>,
        baseline_id: Option<String>,
    ) -> Result<Dataset, LlmCompareError> {
        let created_at = Utc::now();
        let inputs_hash = content_hash(&inputs).map_err(|e| io::Error::other(e.to_string()))?;
        info!(
            feature = %self.feature.name,
            role = %role,
            provider = %gateway.provider(),
            inputs = inputs.len(),
            "Calling product LLM"
        );

        let system = self.feature.system_prompt.clone();
        let gw = gateway.clone();
        let replies = bounded_map(
            inputs.clone(),
            self.config.evaluator.max_concurrency,
            move |input| {
                let gw = gw.clone();
                let system = system.clone();
                async move {
                    let started = Instant::now();
                    let reply = gw.complete("product", Some(&system), &input.prompt).await;
                    (reply, started.elapsed().as_millis() as u64)
                }
            },
        )
        .await?;

        let mut outputs = Vec::with_capacity(inputs.len());
        let mut summary = CallSummary {
            total_inputs: inputs.len(),
            ..CallSummary::default()
        };
        let mut fatal: Option<GatewayError> = None;
        let mut first_error: Option<GatewayError> = None;

        for (input, reply) in inputs.iter().zip(replies) {
            let (text, error, elapsed) = match reply {
                Some((Ok(result), elapsed)) => (result.text, None, elapsed),
                Some((Err(e), elapsed)) => {
                    if fatal.is_none()
                        && matches!(e, GatewayError::ProviderAuth(_) | GatewayError::Misconfiguration(_))
                    {
                        fatal = Some(e.clone());
                    }
                    let message = redact_secrets(&e.to_string());
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    (String::new(), Some(message), elapsed)
                }
                None => (String::new(), Some("call did not complete".to_string()), 0),
            };
            match &error {
                None => summary.successful_calls += 1,
                Some(message) => {
                    summary.failed_calls += 1;
                    summary.errors.push(CallFailure {
                        input_id: input.input_id.clone(),
                        error: message.clone(),
                    });
                    warn!(input_id = %input.input_id, error = %message, "Product call failed");
                }
            }
            outputs.push(Output {
                input_id: input.input_id.clone(),
                text,
                error,
                response_time_ms: elapsed,
            });
        }

        if let Some(e) = fatal {
            return Err(ApiError::from_gateway(gateway.provider(), e).into());
        }
        if !inputs.is_empty() && summary.successful_calls == 0 {
            return Err(match first_error {
                Some(e) => ApiError::from_gateway(gateway.provider(), e).into(),
                None => io::Error::other("no product call completed").into(),
            });
        }

        let mut dataset = Dataset {
            id: String::new(),
            created_at,
            feature: self.feature.name.clone(),
            role,
            llm_version: gateway.llm_version().to_string(),
            test_mode,
            baseline_id,
            derived_from: None,
            inputs_hash,
            inputs,
            outputs,
            metrics: None,
            summary,
        };
        self.datasets.save(&mut dataset)?;
        Ok(dataset)
    }

    async fn evaluate_and_save(&self, raw: &Dataset) -> Result<Dataset, LlmCompareError> {
        let gateway = self.registry.gateway(&self.config, LlmRole::Evaluator)?;
        let evaluator = Evaluator::new(gateway, self.feature.clone(), self.config.evaluator);
        let metrics = evaluator.evaluate(raw).await?;
        let mut evaluated = evaluated_copy(raw, metrics, Utc::now());
        self.datasets.save(&mut evaluated)?;
        Ok(evaluated)
    }

    /// Best-effort cleanup of datasets and inputs files beyond `max_files_to_keep`
    fn prune_datasets(&self) {
        let feature = &self.feature.name;
        let protected = match self.states.load(feature) {
            Ok(state) => referenced_datasets(&state),
            Err(e) => {
                warn!(feature = %feature, error = %e, "Skipping dataset pruning");
                return;
            }
        };
        for role in DatasetRole::ALL {
            if let Err(e) =
                self.datasets
                    .prune(feature, role, self.config.defaults.max_files_to_keep, &protected)
            {
                warn!(feature = %feature, role = %role, error = %e, "Dataset pruning failed");
            }
        }
        if let Err(e) = self
            .datasets
            .prune_inputs(feature, self.config.defaults.max_files_to_keep)
        {
            warn!(feature = %feature, error = %e, "Inputs pruning failed");
        }
    }
}

/// Baseline id for a new record, unique within `state`
fn unique_baseline_id(state: &WorkflowState, at: &chrono::DateTime<Utc>, size: usize) -> String {
    let base = format!("baseline_{}_{size}", timestamp_token(at));
    if !state.baselines.contains_key(&base) {
        return base;
    }
    (2..)
        .map(|k| format!("{base}_{k}"))
        .find(|id| !state.baselines.contains_key(id))
        .unwrap_or(base)
}

/// Baseline a target run uses and the phase it leads to.
///
/// An explicit id must be registered; otherwise the selection (or the only
/// baseline) is used.
fn target_baseline(
    state: &WorkflowState,
    explicit: Option<&str>,
) -> Result<(String, Phase), LlmCompareError> {
    match explicit {
        Some(id) => {
            if !state.baselines.contains_key(id) {
                return Err(NotFoundError::Baseline {
                    feature: state.feature.clone(),
                    id: id.to_string(),
                }
                .into());
            }
            let mut probe = state.clone();
            probe.selected_baseline_id = Some(id.to_string());
            let next = transitions::check(&probe, Event::RunTarget)?;
            Ok((id.to_string(), next))
        }
        None => {
            let next = transitions::check(state, Event::RunTarget)?;
            Ok((transitions::resolve_baseline(state)?, next))
        }
    }
}

/// Dataset ids the state still points at
fn referenced_datasets(state: &WorkflowState) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for record in state.baselines.values() {
        ids.insert(record.dataset_id.clone());
        ids.insert(record.raw_dataset_id.clone());
    }
    if let Some(target) = &state.target_dataset {
        ids.insert(target.id.clone());
        if let Some(raw) = &target.derived_from {
            ids.insert(raw.clone());
        }
    }
    ids
}
