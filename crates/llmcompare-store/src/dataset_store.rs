//! Dataset and inputs files under `<data_dir>/<feature>/`
//!
//! Datasets are written once with a no-clobber create; two writers that pick
//! the same name in the same second get distinct `_<n>` suffixes.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use tracing::{debug, info, warn};

use llmcompare_utils::atomic_write::{
    AtomicWriteResult, CreateOutcome, create_file_atomic, write_file_atomic,
};
use llmcompare_utils::types::{Dataset, DatasetRole, Input};
use llmcompare_utils::{LlmCompareError, NotFoundError, StoreError};

use crate::naming::{self, DatasetName};

/// Suffixes tried before giving up on a free file name
const MAX_COLLISIONS: u32 = 1000;

/// A dataset file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub id: String,
    pub path: Utf8PathBuf,
    pub role: DatasetRole,
    pub timestamp: NaiveDateTime,
    pub size: usize,
    collision: u32,
}

/// A generated inputs file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputsEntry {
    pub id: String,
    pub path: Utf8PathBuf,
    pub timestamp: NaiveDateTime,
    pub count: usize,
    collision: u32,
}

/// On-disk shape of a generated inputs file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputsFile {
    pub feature: String,
    pub generated_at: DateTime<Utc>,
    pub inputs: Vec<Input>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputsFileShape {
    Wrapped(InputsFile),
    Bare(Vec<Input>),
}

#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: Utf8PathBuf,
}

impl DatasetStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    #[must_use]
    pub fn feature_dir(&self, feature: &str) -> Utf8PathBuf {
        self.root.join(feature)
    }

    /// Persist a new dataset, assigning its id from the chosen file name.
    ///
    /// # Errors
    /// `StoreError::Write` when no free name is found or the write fails.
    pub fn save(&self, dataset: &mut Dataset) -> Result<Utf8PathBuf, LlmCompareError> {
        naming::validate_feature_name(&dataset.feature)?;
        let dir = self.feature_dir(&dataset.feature);

        for collision in 0..MAX_COLLISIONS {
            let stem = naming::dataset_stem(
                &dataset.feature,
                dataset.role,
                &dataset.created_at,
                dataset.size(),
                collision,
            );
            let path = dir.join(format!("{stem}.json"));
            dataset.id = stem;
            let content = to_pretty_json(dataset, &path)?;

            match create_file_atomic(&path, &content).map_err(|e| write_error(&path, &e))? {
                CreateOutcome::Created => {
                    info!(
                        feature = %dataset.feature,
                        role = %dataset.role,
                        dataset_id = %dataset.id,
                        size = dataset.size(),
                        "Dataset saved"
                    );
                    return Ok(path);
                }
                CreateOutcome::AlreadyExists => {
                    debug!(path = %path, "Dataset name taken, trying next suffix");
                }
            }
        }

        Err(StoreError::Write {
            path: dir.to_string(),
            reason: format!("no free dataset file name after {MAX_COLLISIONS} attempts"),
        }
        .into())
    }

    /// Load a dataset by id.
    ///
    /// # Errors
    /// `NotFoundError::Dataset` for a missing file, `StoreError::Corrupt` for
    /// unparsable JSON.
    pub fn load(&self, feature: &str, id: &str) -> Result<Dataset, LlmCompareError> {
        let path = self.feature_dir(feature).join(format!("{id}.json"));
        if !path.is_file() {
            return Err(NotFoundError::Dataset {
                feature: feature.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        read_json(&path)
    }

    /// Datasets of a feature, oldest first; same-second files keep write order.
    pub fn list(
        &self,
        feature: &str,
        role: Option<DatasetRole>,
    ) -> Result<Vec<DatasetEntry>, LlmCompareError> {
        let mut entries = Vec::new();
        for (stem, path) in self.json_stems(feature)? {
            let Some(DatasetName {
                role: found,
                timestamp,
                size,
                collision,
            }) = naming::parse_dataset_stem(feature, &stem)
            else {
                continue;
            };
            if role.is_some_and(|r| r != found) {
                continue;
            }
            entries.push(DatasetEntry {
                id: stem,
                path,
                role: found,
                timestamp,
                size,
                collision,
            });
        }

        entries.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.collision.cmp(&b.collision))
                .then(a.id.cmp(&b.id))
        });
        Ok(entries)
    }

    /// Delete the oldest `role` datasets beyond `keep`, never touching ids in
    /// `protected`. Returns the deleted ids.
    pub fn prune(
        &self,
        feature: &str,
        role: DatasetRole,
        keep: usize,
        protected: &BTreeSet<String>,
    ) -> Result<Vec<String>, LlmCompareError> {
        let entries = self.list(feature, Some(role))?;
        let excess = entries.len().saturating_sub(keep);
        let mut removed = Vec::new();

        for entry in entries.into_iter().take(excess) {
            if protected.contains(&entry.id) {
                continue;
            }
            match fs::remove_file(&entry.path) {
                Ok(()) => removed.push(entry.id),
                Err(e) => warn!(path = %entry.path, error = %e, "Failed to prune dataset"),
            }
        }

        if !removed.is_empty() {
            info!(feature, role = %role, removed = removed.len(), "Pruned old datasets");
        }
        Ok(removed)
    }

    /// Generated inputs files of a feature, oldest first
    pub fn list_inputs(&self, feature: &str) -> Result<Vec<InputsEntry>, LlmCompareError> {
        let mut entries: Vec<InputsEntry> = self
            .json_stems(feature)?
            .into_iter()
            .filter_map(|(stem, path)| {
                let name = naming::parse_inputs_stem(feature, &stem)?;
                Some(InputsEntry {
                    id: stem,
                    path,
                    timestamp: name.timestamp,
                    count: name.count,
                    collision: name.collision,
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.collision.cmp(&b.collision))
                .then(a.id.cmp(&b.id))
        });
        Ok(entries)
    }

    /// Delete the oldest inputs files beyond `keep`. Returns the deleted ids.
    pub fn prune_inputs(&self, feature: &str, keep: usize) -> Result<Vec<String>, LlmCompareError> {
        let entries = self.list_inputs(feature)?;
        let excess = entries.len().saturating_sub(keep);
        let mut removed = Vec::new();

        for entry in entries.into_iter().take(excess) {
            match fs::remove_file(&entry.path) {
                Ok(()) => removed.push(entry.id),
                Err(e) => warn!(path = %entry.path, error = %e, "Failed to prune inputs file"),
            }
        }

        if !removed.is_empty() {
            info!(feature, removed = removed.len(), "Pruned old inputs files");
        }
        Ok(removed)
    }

    /// `(stem, path)` of every `.json` file in the feature directory
    fn json_stems(&self, feature: &str) -> Result<Vec<(String, Utf8PathBuf)>, LlmCompareError> {
        let dir = self.feature_dir(feature);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let read_dir = fs::read_dir(&dir).map_err(|e| StoreError::Read {
            path: dir.to_string(),
            reason: e.to_string(),
        })?;
        let mut stems = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| StoreError::Read {
                path: dir.to_string(),
                reason: e.to_string(),
            })?;
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(stem) = file_name.strip_suffix(".json") {
                stems.push((stem.to_string(), dir.join(&file_name)));
            }
        }
        Ok(stems)
    }

    /// Persist generated inputs next to the datasets of their feature
    pub fn save_inputs(
        &self,
        feature: &str,
        inputs: &[Input],
        at: DateTime<Utc>,
    ) -> Result<Utf8PathBuf, LlmCompareError> {
        naming::validate_feature_name(feature)?;
        let dir = self.feature_dir(feature);
        let file = InputsFile {
            feature: feature.to_string(),
            generated_at: at,
            inputs: inputs.to_vec(),
        };

        for collision in 0..MAX_COLLISIONS {
            let stem = naming::inputs_stem(feature, &at, inputs.len(), collision);
            let path = dir.join(format!("{stem}.json"));
            let content = to_pretty_json(&file, &path)?;
            if create_file_atomic(&path, &content).map_err(|e| write_error(&path, &e))?
                == CreateOutcome::Created
            {
                debug!(path = %path, count = inputs.len(), "Inputs saved");
                return Ok(path);
            }
        }

        Err(StoreError::Write {
            path: dir.to_string(),
            reason: format!("no free inputs file name after {MAX_COLLISIONS} attempts"),
        }
        .into())
    }

    /// Read an inputs file: either a saved [`InputsFile`] or a bare JSON array
    /// of inputs.
    ///
    /// # Errors
    /// `NotFoundError::InputsFile` when the path does not exist.
    pub fn load_inputs(path: &Utf8Path) -> Result<Vec<Input>, LlmCompareError> {
        if !path.is_file() {
            return Err(NotFoundError::InputsFile {
                path: path.to_string(),
            }
            .into());
        }
        let shape: InputsFileShape = read_json(path)?;
        Ok(match shape {
            InputsFileShape::Wrapped(file) => file.inputs,
            InputsFileShape::Bare(inputs) => inputs,
        })
    }
}

pub(crate) fn to_pretty_json<T: Serialize>(
    value: &T,
    path: &Utf8Path,
) -> Result<String, LlmCompareError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        StoreError::Write {
            path: path.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

pub(crate) fn read_json<T: for<'de> Deserialize<'de>>(path: &Utf8Path) -> Result<T, LlmCompareError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::Read {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| {
        StoreError::Corrupt {
            path: path.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

pub(crate) fn write_error(path: &Utf8Path, error: &anyhow::Error) -> LlmCompareError {
    StoreError::Write {
        path: path.to_string(),
        reason: format!("{error:#}"),
    }
    .into()
}

/// Atomically replace `path`, logging any write warnings
pub(crate) fn replace_file(path: &Utf8Path, content: &str) -> Result<(), LlmCompareError> {
    let result = write_file_atomic(path, content).map_err(|e| write_error(path, &e))?;
    note_write_warnings(path, &result);
    Ok(())
}

/// Log the warnings of an atomic write; true when the cross-filesystem
/// fallback was used
pub(crate) fn note_write_warnings(path: &Utf8Path, result: &AtomicWriteResult) -> bool {
    for warning in &result.warnings {
        warn!(path = %path, "{warning}");
    }
    result.used_cross_filesystem_fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use llmcompare_utils::canonicalization::emit_jcs;
    use llmcompare_utils::types::{CallSummary, Output};
    use tempfile::TempDir;

    #[test]
    fn test_replace_file_overwrites_and_reports_fallback() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let path = root.join("nested").join("state.json");
        replace_file(&path, "{}").unwrap();
        replace_file(&path, "{\"a\":1}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}");

        assert!(!note_write_warnings(&path, &AtomicWriteResult::default()));
        let fallback = AtomicWriteResult {
            used_cross_filesystem_fallback: true,
            warnings: vec!["Used cross-filesystem fallback (copy, fsync, replace)".to_string()],
        };
        assert!(note_write_warnings(&path, &fallback));
    }

    fn store() -> (TempDir, DatasetStore) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, DatasetStore::new(root))
    }

    fn dataset(role: DatasetRole, second: u32) -> Dataset {
        let inputs = vec![Input {
            input_id: "gen_001".to_string(),
            feature: "chat_window".to_string(),
            prompt: "a".to_string(),
            prompt_id: "chat-window".to_string(),
            config: serde_json::json!({}),
        }];
        let outputs = vec![Output {
            input_id: "gen_001".to_string(),
            text: "A".to_string(),
            error: None,
            response_time_ms: 12,
        }];
        Dataset {
            id: String::new(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, second).unwrap(),
            feature: "chat_window".to_string(),
            role,
            llm_version: "openai/gpt-4o-mini".to_string(),
            test_mode: None,
            baseline_id: None,
            derived_from: None,
            inputs_hash: "h".to_string(),
            inputs,
            outputs,
            metrics: None,
            summary: CallSummary {
                total_inputs: 1,
                successful_calls: 1,
                failed_calls: 0,
                errors: Vec::new(),
            },
        }
    }

    #[test]
    fn test_save_assigns_id_and_round_trips() {
        let (_dir, store) = store();
        let mut ds = dataset(DatasetRole::RawLl1, 5);
        let path = store.save(&mut ds).unwrap();

        assert_eq!(ds.id, "llmcompare_chat_window_raw_ll1_20250102_030405_1");
        assert_eq!(path.file_stem(), Some(ds.id.as_str()));

        let loaded = store.load("chat_window", &ds.id).unwrap();
        assert_eq!(emit_jcs(&loaded).unwrap(), emit_jcs(&ds).unwrap());
    }

    #[test]
    fn test_same_second_saves_get_suffixes() {
        let (_dir, store) = store();
        let mut first = dataset(DatasetRole::RawLl1, 5);
        let mut second = dataset(DatasetRole::RawLl1, 5);
        let mut third = dataset(DatasetRole::RawLl1, 5);
        store.save(&mut first).unwrap();
        store.save(&mut second).unwrap();
        store.save(&mut third).unwrap();

        assert_ne!(first.id, second.id);
        assert!(second.id.ends_with("_1_1"));
        assert!(third.id.ends_with("_1_2"));

        let ids: Vec<String> = store
            .list("chat_window", None)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.load("chat_window", "nope").unwrap_err();
        assert!(matches!(err, LlmCompareError::NotFound(NotFoundError::Dataset { .. })));
    }

    #[test]
    fn test_load_corrupt_is_store_error() {
        let (_dir, store) = store();
        let dir = store.feature_dir("chat_window");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("broken.json"), "{ not json").unwrap();
        let err = store.load("chat_window", "broken").unwrap_err();
        assert!(matches!(err, LlmCompareError::Store(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_list_filters_by_role_and_orders_by_time() {
        let (_dir, store) = store();
        let mut late = dataset(DatasetRole::RawLl1, 30);
        let mut early = dataset(DatasetRole::RawLl1, 10);
        let mut other = dataset(DatasetRole::RawLl2, 20);
        store.save(&mut late).unwrap();
        store.save(&mut early).unwrap();
        store.save(&mut other).unwrap();

        let raw_ll1: Vec<String> = store
            .list("chat_window", Some(DatasetRole::RawLl1))
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(raw_ll1, vec![early.id, late.id]);
        assert!(store.list("generate_code", None).unwrap().is_empty());
    }

    #[test]
    fn test_prune_keeps_newest_and_protected() {
        let (_dir, store) = store();
        let mut ids = Vec::new();
        for second in 0..5 {
            let mut ds = dataset(DatasetRole::RawLl1, second);
            store.save(&mut ds).unwrap();
            ids.push(ds.id);
        }
        let protected: BTreeSet<String> = [ids[0].clone()].into_iter().collect();

        let removed = store
            .prune("chat_window", DatasetRole::RawLl1, 2, &protected)
            .unwrap();
        assert_eq!(removed, vec![ids[1].clone(), ids[2].clone()]);

        let left: Vec<String> = store
            .list("chat_window", None)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(left, vec![ids[0].clone(), ids[3].clone(), ids[4].clone()]);
    }

    #[test]
    fn test_prune_inputs_keeps_newest() {
        let (_dir, store) = store();
        let inputs = dataset(DatasetRole::RawLl1, 0).inputs;
        let mut ids = Vec::new();
        for second in 0..4 {
            let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, second).unwrap();
            let path = store.save_inputs("chat_window", &inputs, at).unwrap();
            ids.push(path.file_stem().unwrap().to_string());
        }
        let mut ds = dataset(DatasetRole::RawLl1, 0);
        store.save(&mut ds).unwrap();

        let removed = store.prune_inputs("chat_window", 2).unwrap();
        assert_eq!(removed, vec![ids[0].clone(), ids[1].clone()]);

        let left: Vec<String> = store
            .list_inputs("chat_window")
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(left, vec![ids[2].clone(), ids[3].clone()]);
        // datasets are not inputs files
        assert_eq!(store.list("chat_window", None).unwrap().len(), 1);
    }

    #[test]
    fn test_inputs_round_trip_and_bare_array() {
        let (_dir, store) = store();
        let inputs = dataset(DatasetRole::RawLl1, 0).inputs;
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let path = store.save_inputs("chat_window", &inputs, at).unwrap();
        assert!(path.as_str().ends_with("llmcompare_chat_window_inputs_20250102_030405_1.json"));
        assert_eq!(DatasetStore::load_inputs(&path).unwrap(), inputs);

        let bare = store.root().join("bare.json");
        fs::write(&bare, serde_json::to_string(&inputs).unwrap()).unwrap();
        assert_eq!(DatasetStore::load_inputs(&bare).unwrap(), inputs);

        let missing = store.root().join("missing.json");
        assert!(matches!(
            DatasetStore::load_inputs(&missing),
            Err(LlmCompareError::NotFound(NotFoundError::InputsFile { .. }))
        ));
    }
}
