//! Workflow engine for llmcompare.
//!
//! Runs the baseline → target → compare cycle for a feature: generates
//! inputs, calls the product LLMs, scores datasets with the evaluator LLM and
//! turns two evaluated datasets into a comparison report with a decision.
//!
//! Most callers only need [`Workflow`].

pub mod comparator;
pub mod evaluator;
mod fanout;
pub mod generator;
pub mod recommendations;
pub mod report_html;
pub mod score_parser;
pub mod similarity;
pub mod status;
pub mod transitions;
pub mod workflow;

pub use comparator::{compare, decide};
pub use evaluator::Evaluator;
pub use generator::InputGenerator;
pub use report_html::render_html;
pub use status::{StatusReport, TargetSummary};
pub use transitions::Event;
pub use workflow::{
    BaselineOptions, CompareOptions, CompareOutcome, FeatureOverview, InputsSource,
    TargetOptions, Workflow, feature_overview,
};
