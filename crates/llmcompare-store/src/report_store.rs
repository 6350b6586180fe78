//! Comparison reports and the dashboard index under `<reports_dir>/`

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use llmcompare_lock::{DEFAULT_LOCK_WAIT, FeatureLock};
use llmcompare_utils::atomic_write::{CreateOutcome, create_file_atomic};
use llmcompare_utils::types::{ComparisonReport, ReportRef};
use llmcompare_utils::{LlmCompareError, NotFoundError, StoreError};

use crate::dataset_store::{read_json, replace_file, to_pretty_json, write_error};
use crate::naming;

const MAX_COLLISIONS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexMetrics {
    pub consistency: Option<f64>,
    pub accuracy: Option<f64>,
    pub overall: f64,
}

/// One line of `index.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportIndexEntry {
    pub feature: String,
    pub date: DateTime<Utc>,
    /// HTML page, relative to the reports directory
    pub url: String,
    pub metrics: IndexMetrics,
}

impl ReportIndexEntry {
    fn for_report(report: &ComparisonReport, html_name: &str) -> Self {
        Self {
            feature: report.feature.clone(),
            date: report.generated_at,
            url: html_name.to_string(),
            metrics: IndexMetrics {
                consistency: report.metrics.consistency.as_ref().map(|c| c.score),
                accuracy: report.metrics.accuracy.as_ref().map(|a| a.score),
                overall: report.metrics.overall,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: Utf8PathBuf,
    lock_wait: Duration,
}

impl ReportStore {
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
    pub fn index_path(&self) -> Utf8PathBuf {
        self.dir.join(naming::INDEX_FILE)
    }

    /// Write the report JSON and HTML. The index is left alone until
    /// [`ReportStore::publish`].
    pub fn save(&self, report: &ComparisonReport, html: &str) -> Result<ReportRef, LlmCompareError> {
        naming::validate_feature_name(&report.feature)?;
        let content = to_pretty_json(report, &self.dir)?;

        let mut chosen = None;
        for collision in 0..MAX_COLLISIONS {
            let stem = naming::report_stem(&report.feature, &report.generated_at, collision);
            let json_path = self.dir.join(format!("{stem}.json"));
            if create_file_atomic(&json_path, &content).map_err(|e| write_error(&json_path, &e))?
                == CreateOutcome::Created
            {
                chosen = Some((stem, json_path));
                break;
            }
        }
        let (stem, json_path) = chosen.ok_or_else(|| StoreError::Write {
            path: self.dir.to_string(),
            reason: format!("no free report file name after {MAX_COLLISIONS} attempts"),
        })?;

        let html_name = format!("{stem}.html");
        let html_path = self.dir.join(&html_name);
        replace_file(&html_path, html)?;

        info!(
            feature = %report.feature,
            report = %json_path,
            "Comparison report saved"
        );
        Ok(ReportRef {
            generated_at: report.generated_at,
            json_path: json_path.to_string(),
            html_path: html_path.to_string(),
        })
    }

    /// Append a saved report to `index.json`
    pub fn publish(&self, report: &ComparisonReport, saved: &ReportRef) -> Result<(), LlmCompareError> {
        let html_path = Utf8Path::new(&saved.html_path);
        let html_name = html_path.file_name().unwrap_or(html_path.as_str());
        self.append_index(ReportIndexEntry::for_report(report, html_name))
    }

    pub fn load(&self, path: &Utf8Path) -> Result<ComparisonReport, LlmCompareError> {
        if !path.is_file() {
            return Err(NotFoundError::Report {
                path: path.to_string(),
            }
            .into());
        }
        read_json(path)
    }

    /// Index entries in append order; empty before the first report
    pub fn read_index(&self) -> Result<Vec<ReportIndexEntry>, LlmCompareError> {
        let path = self.index_path();
        if !path.is_file() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    fn append_index(&self, entry: ReportIndexEntry) -> Result<(), LlmCompareError> {
        let lock = FeatureLock::new(self.dir.join(naming::INDEX_LOCK_FILE), "reports index")
            .with_wait(self.lock_wait);
        lock.run(|| {
            let mut entries = self.read_index()?;
            entries.push(entry);
            let path = self.index_path();
            let content = to_pretty_json(&entries, &path)?;
            replace_file(&path, &content)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use llmcompare_utils::types::{
        ComparisonMetrics, Confidence, ConsistencyStatus, Decision, DecisionSummary, TestMode,
    };
    use tempfile::TempDir;

    fn store() -> (TempDir, ReportStore) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, ReportStore::new(root.join("reports")))
    }

    fn report() -> ComparisonReport {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        ComparisonReport {
            feature: "generate_code".to_string(),
            baseline_id: "baseline_20250601_110000_3".to_string(),
            baseline_dataset_id: "b".to_string(),
            target_dataset_id: "t".to_string(),
            target_created_at: at,
            test_mode: TestMode::Accuracy,
            metrics: ComparisonMetrics {
                consistency: None,
                consistency_status: ConsistencyStatus::NotApplicable,
                accuracy: None,
                accuracy_delta: None,
                overall: 0.0,
            },
            recommendations: vec!["Collect more samples".to_string()],
            decision: DecisionSummary {
                decision: Decision::NeedsMoreTesting,
                confidence: Confidence::Low,
                rationale: "no metrics".to_string(),
            },
            pairs_compared: 0,
            partial: true,
            generated_at: at,
        }
    }

    #[test]
    fn test_save_writes_json_html_and_index() {
        let (_dir, store) = store();
        let reference = store.save(&report(), "<html></html>").unwrap();
        assert!(store.read_index().unwrap().is_empty());
        store.publish(&report(), &reference).unwrap();

        assert!(reference
            .json_path
            .ends_with("comparison_report_generate_code_20250601_120000.json"));
        assert!(Utf8Path::new(&reference.html_path).is_file());
        assert_eq!(
            store.load(Utf8Path::new(&reference.json_path)).unwrap(),
            report()
        );

        let index = store.read_index().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].url, "comparison_report_generate_code_20250601_120000.html");
        assert_eq!(index[0].metrics.consistency, None);
    }

    #[test]
    fn test_same_second_reports_do_not_overwrite() {
        let (_dir, store) = store();
        let first = store.save(&report(), "<p>1</p>").unwrap();
        let second = store.save(&report(), "<p>2</p>").unwrap();
        assert_ne!(first.json_path, second.json_path);
        assert!(second.html_path.ends_with("_1.html"));
        store.publish(&report(), &first).unwrap();
        store.publish(&report(), &second).unwrap();
        let urls: Vec<String> = store.read_index().unwrap().into_iter().map(|e| e.url).collect();
        assert_eq!(
            urls,
            vec![
                "comparison_report_generate_code_20250601_120000.html".to_string(),
                "comparison_report_generate_code_20250601_120000_1.html".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_report_is_not_found() {
        let (_dir, store) = store();
        let missing = store.dir().join("nope.json");
        assert!(matches!(
            store.load(&missing),
            Err(LlmCompareError::NotFound(NotFoundError::Report { .. }))
        ));
    }
}
