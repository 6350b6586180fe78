//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and the `Commands` enum.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use llmcompare_utils::types::TestMode;

/// llmcompare - compare a target LLM against a baseline
#[derive(Parser, Debug)]
#[command(name = "llmcompare")]
#[command(about = "Compare a target LLM against a baseline LLM using an evaluator LLM")]
#[command(long_about = r#"
llmcompare runs a feature's prompts through a baseline LLM (LL1) and a target
LLM (LL2), scores both with an evaluator LLM (LL3) and recommends whether to
switch.

EXAMPLES:
  # Create a baseline from 10 generated inputs
  llmcompare run --feature chat_window --phase baseline --num-patterns 10

  # Create a baseline from a saved inputs file, without scoring it
  llmcompare run --feature chat_window --phase baseline --inputs inputs.json --skip-evaluation

  # Replay the baseline inputs against the target model
  llmcompare run --feature chat_window --phase target --mode consistency

  # Compare and write the JSON + HTML report
  llmcompare run --feature chat_window --phase compare

  # Make the compared target the new baseline
  llmcompare promote --feature chat_window

  llmcompare status --feature chat_window --json

CONFIGURATION:
  Precedence: CLI flags > environment > config file > defaults
  The config file is discovered by searching upward from CWD for .llmcompare/config.toml
  Credentials: LL1_API_KEY (baseline), LL2_API_KEY (target), LLM3_API_KEY (evaluator)

PHASES:
  NEW → BASELINE_CREATED → TARGET_CREATED → COMPARED
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for datasets and generated inputs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory for per-feature workflow state files
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Directory for comparison reports
    #[arg(long, global = true)]
    pub reports_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Workflow step for `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PhaseArg {
    Baseline,
    Target,
    Compare,
}

/// Target test mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Replay the baseline inputs; consistency and accuracy are measured
    Consistency,
    /// Fresh inputs; only accuracy is measured
    Accuracy,
}

impl From<ModeArg> for TestMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Consistency => TestMode::Consistency,
            ModeArg::Accuracy => TestMode::Accuracy,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one workflow step for a feature
    ///
    /// EXAMPLES:
    ///   llmcompare run --feature generate_code --phase baseline
    ///   llmcompare run --feature generate_code --phase target --mode accuracy --num-patterns 5
    ///   llmcompare run --feature generate_code --phase compare --allow-partial
    Run {
        /// Feature to run (defaults to `defaults.feature` from config)
        #[arg(long)]
        feature: Option<String>,

        #[arg(long, value_enum)]
        phase: PhaseArg,

        /// Target test mode
        #[arg(long, value_enum, default_value = "consistency")]
        mode: ModeArg,

        /// Number of inputs to generate
        #[arg(long)]
        num_patterns: Option<usize>,

        /// Saved inputs file to use instead of generating (baseline only)
        #[arg(long)]
        inputs: Option<PathBuf>,

        /// Keep the raw dataset without evaluator scores
        #[arg(long)]
        skip_evaluation: bool,

        /// Baseline to run the target against (selects it)
        #[arg(long)]
        baseline: Option<String>,

        /// Compare even when a dataset was not evaluated
        #[arg(long)]
        allow_partial: bool,
    },

    /// Show the workflow phase, baselines and target of a feature
    Status {
        #[arg(long)]
        feature: Option<String>,

        /// Output as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Turn the compared target into the selected baseline
    Promote {
        #[arg(long)]
        feature: Option<String>,
    },

    /// List the registered baselines of a feature, oldest first
    Baselines {
        #[arg(long)]
        feature: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Select the baseline used by the next target run
    SelectBaseline {
        #[arg(long)]
        feature: Option<String>,

        /// Baseline id (see `llmcompare baselines`)
        id: String,
    },

    /// List configured features and their phase
    ListFeatures {
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// `--feature` of the subcommand, if it takes one
    #[must_use]
    pub fn feature(&self) -> Option<&str> {
        match self {
            Self::Run { feature, .. }
            | Self::Status { feature, .. }
            | Self::Promote { feature }
            | Self::Baselines { feature, .. }
            | Self::SelectBaseline { feature, .. } => feature.as_deref(),
            Self::ListFeatures { .. } => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Status { .. } => "status",
            Self::Promote { .. } => "promote",
            Self::Baselines { .. } => "baselines",
            Self::SelectBaseline { .. } => "select-baseline",
            Self::ListFeatures { .. } => "list-features",
        }
    }
}
