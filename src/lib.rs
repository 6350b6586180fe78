//! llmcompare - compare a target LLM against a baseline
//!
//! A feature (a product prompt such as `chat_window`) is run through the
//! baseline LLM (LL1), then through a candidate target LLM (LL2). An
//! evaluator LLM (LL3) scores both datasets and the comparator turns the pair
//! into a report with a keep/switch recommendation.
//!
//! llmcompare can be used in two ways:
//! - **CLI**: `llmcompare run --feature chat_window --phase baseline`
//! - **Library**: build a [`Config`] and drive a [`Workflow`]
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Baseline with generated inputs, scored by the evaluator
//! llmcompare run --feature chat_window --phase baseline --num-patterns 10
//!
//! # Replay the same inputs against the target model
//! llmcompare run --feature chat_window --phase target --mode consistency
//!
//! # Score the pair and write JSON + HTML reports
//! llmcompare run --feature chat_window --phase compare
//!
//! llmcompare status --feature chat_window --json
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use llmcompare::{CompareOptions, Config, TargetOptions, TestMode, Workflow};
//!
//! # async fn run() -> Result<(), llmcompare::LlmCompareError> {
//! let config = Config::builder().build()?;
//! let workflow = Workflow::new(config, "chat_window")?;
//! workflow
//!     .run_target(TargetOptions {
//!         mode: TestMode::Consistency,
//!         num_patterns: None,
//!         skip_evaluation: false,
//!         baseline: None,
//!     })
//!     .await?;
//! let outcome = workflow.run_compare(CompareOptions::default()).await?;
//! println!("{}", outcome.report.decision.decision);
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`Workflow`] and its option types
//! - [`Config`], [`ConfigBuilder`] and [`CliArgs`]
//! - [`LlmCompareError`] and [`ExitCode`]
//! - [`ComparisonReport`], [`StatusReport`] and the dataset types
//! - [`emit_jcs`] for canonical JSON output
//!
//! The member crates are re-exported under `#[doc(hidden)]` module paths and
//! are not covered by semver.

pub use llmcompare_config::{CliArgs, Config, ConfigBuilder};
pub use llmcompare_engine::{
    BaselineOptions, CompareOptions, CompareOutcome, FeatureOverview, InputsSource,
    StatusReport, TargetOptions, Workflow, feature_overview,
};
pub use llmcompare_utils::canonicalization::emit_jcs;
pub use llmcompare_utils::error::{ErrorCategory, LlmCompareError, UserFriendlyError};
pub use llmcompare_utils::exit_codes::ExitCode;
pub use llmcompare_utils::types::{
    BaselineRecord, ComparisonReport, Dataset, DatasetRole, Decision, Metrics, Phase, TestMode,
    WorkflowState,
};

#[doc(hidden)]
pub use llmcompare_config as config;
#[doc(hidden)]
pub use llmcompare_engine as engine;
#[doc(hidden)]
pub use llmcompare_llm as llm;
#[doc(hidden)]
pub use llmcompare_store as store;
#[doc(hidden)]
pub use llmcompare_utils as utils;

// Exported with #[doc(hidden)] to allow white-box testing of CLI flag parsing
#[doc(hidden)]
pub mod cli;
