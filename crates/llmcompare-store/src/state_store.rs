//! Per-feature workflow state under `<state_dir>/`
//!
//! Reads are lock-free: the state file is only ever replaced atomically. All
//! mutations go through [`StateStore::update`], which performs the whole
//! load, modify, validate, write cycle inside the feature's lock.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use std::fs;
use std::time::Duration;
use tracing::debug;

use llmcompare_lock::{DEFAULT_LOCK_WAIT, FeatureLock};
use llmcompare_utils::types::WorkflowState;
use llmcompare_utils::{LlmCompareError, StateError, StoreError};

use crate::dataset_store::{read_json, replace_file, to_pretty_json};
use crate::naming;

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: Utf8PathBuf,
    lock_wait: Duration,
}

impl StateStore {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    #[must_use]
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    #[must_use]
    pub fn state_path(&self, feature: &str) -> Utf8PathBuf {
        self.dir.join(naming::state_file_name(feature))
    }

    #[must_use]
    pub fn lock_path(&self, feature: &str) -> Utf8PathBuf {
        self.dir.join(naming::lock_file_name(feature))
    }

    #[must_use]
    pub fn exists(&self, feature: &str) -> bool {
        self.state_path(feature).is_file()
    }

    /// Current state of `feature`; a feature never run is in phase `NEW`.
    ///
    /// # Errors
    /// `StoreError::Corrupt` for unparsable JSON, `StateError::Corrupt` when
    /// the file violates the state invariants.
    pub fn load(&self, feature: &str) -> Result<WorkflowState, LlmCompareError> {
        naming::validate_feature_name(feature)?;
        let path = self.state_path(feature);
        if !path.is_file() {
            return Ok(WorkflowState::new(feature, Utc::now()));
        }

        let state: WorkflowState = read_json(&path)?;
        if state.feature != feature {
            return Err(StateError::Corrupt {
                feature: feature.to_string(),
                reason: format!("state file belongs to feature '{}'", state.feature),
            }
            .into());
        }
        state.check_invariants().map_err(|reason| StateError::Corrupt {
            feature: feature.to_string(),
            reason,
        })?;
        Ok(state)
    }

    /// Apply `f` to freshly loaded state under the feature lock and persist
    /// the result.
    ///
    /// If `f` fails, or the mutated state breaks an invariant, nothing is
    /// written and the state file stays byte-for-byte unchanged.
    pub fn update<T>(
        &self,
        feature: &str,
        f: impl FnOnce(&mut WorkflowState) -> Result<T, LlmCompareError>,
    ) -> Result<T, LlmCompareError> {
        naming::validate_feature_name(feature)?;
        let lock = FeatureLock::new(self.lock_path(feature), feature).with_wait(self.lock_wait);

        lock.run(|| {
            let mut state = self.load(feature)?;
            let before = state.current_phase;
            let out = f(&mut state)?;

            state.check_invariants().map_err(|reason| StateError::Corrupt {
                feature: feature.to_string(),
                reason,
            })?;
            state.last_updated = Utc::now();

            let path = self.state_path(feature);
            let content = to_pretty_json(&state, &path)?;
            replace_file(&path, &content)?;

            debug!(
                feature,
                from = %before,
                to = %state.current_phase,
                "Workflow state committed"
            );
            Ok(out)
        })
    }

    /// Features with a state file, sorted by name
    pub fn list_features(&self) -> Result<Vec<String>, LlmCompareError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let read_dir = fs::read_dir(&self.dir).map_err(|e| StoreError::Read {
            path: self.dir.to_string(),
            reason: e.to_string(),
        })?;

        let mut features: Vec<String> = read_dir
            .filter_map(Result::ok)
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(naming::STATE_SUFFIX))
                    .map(str::to_string)
            })
            .filter(|feature| naming::validate_feature_name(feature).is_ok())
            .collect();
        features.sort();
        Ok(features)
    }
}
