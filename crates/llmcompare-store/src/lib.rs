//! Durable storage for llmcompare
//!
//! - [`DatasetStore`]: immutable datasets and generated inputs, one directory per feature
//! - [`StateStore`]: the per-feature workflow state, mutated only under its lock
//! - [`ReportStore`]: comparison reports and the dashboard `index.json`
//!
//! Every write is atomic. JSON is pretty-printed on disk; two records are the
//! same when their canonical (JCS) forms are equal.

mod dataset_store;
pub mod naming;
mod report_store;
mod state_store;

pub use dataset_store::{DatasetEntry, DatasetStore, InputsEntry, InputsFile};
pub use report_store::{IndexMetrics, ReportIndexEntry, ReportStore};
pub use state_store::StateStore;
