//! File naming for datasets, inputs, state, locks and reports

use chrono::{DateTime, NaiveDateTime, Utc};

use llmcompare_utils::ConfigError;
use llmcompare_utils::types::{DatasetRole, timestamp_token};

pub const FILE_PREFIX: &str = "llmcompare";
pub const STATE_SUFFIX: &str = "_state.json";
pub const LOCK_SUFFIX: &str = ".lock";
pub const REPORT_PREFIX: &str = "comparison_report";
pub const INDEX_FILE: &str = "index.json";
pub const INDEX_LOCK_FILE: &str = ".index.lock";

/// Feature names become path segments, so keep them to `[A-Za-z0-9_-]`
pub fn validate_feature_name(feature: &str) -> Result<(), ConfigError> {
    let ok = !feature.is_empty()
        && feature
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: "feature".to_string(),
            value: feature.to_string(),
        })
    }
}

/// `llmcompare_<feature>_<role>_<ts>_<size>[_<n>]`
#[must_use]
pub fn dataset_stem(
    feature: &str,
    role: DatasetRole,
    at: &DateTime<Utc>,
    size: usize,
    collision: u32,
) -> String {
    let base = format!(
        "{FILE_PREFIX}_{feature}_{}_{}_{size}",
        role.as_str(),
        timestamp_token(at)
    );
    with_collision(base, collision)
}

/// `llmcompare_<feature>_inputs_<ts>_<n>[_<k>]`
#[must_use]
pub fn inputs_stem(feature: &str, at: &DateTime<Utc>, count: usize, collision: u32) -> String {
    let base = format!("{FILE_PREFIX}_{feature}_inputs_{}_{count}", timestamp_token(at));
    with_collision(base, collision)
}

/// `comparison_report_<feature>_<ts>[_<n>]`
#[must_use]
pub fn report_stem(feature: &str, at: &DateTime<Utc>, collision: u32) -> String {
    let base = format!("{REPORT_PREFIX}_{feature}_{}", timestamp_token(at));
    with_collision(base, collision)
}

#[must_use]
pub fn state_file_name(feature: &str) -> String {
    format!("{feature}{STATE_SUFFIX}")
}

#[must_use]
pub fn lock_file_name(feature: &str) -> String {
    format!("{feature}{LOCK_SUFFIX}")
}

fn with_collision(base: String, collision: u32) -> String {
    if collision == 0 {
        base
    } else {
        format!("{base}_{collision}")
    }
}

/// Fields recovered from a dataset file stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetName {
    pub role: DatasetRole,
    pub timestamp: NaiveDateTime,
    pub size: usize,
    /// Same-second collision counter, 0 for the first file
    pub collision: u32,
}

/// Parse a dataset stem written by [`dataset_stem`] for `feature`
#[must_use]
pub fn parse_dataset_stem(feature: &str, stem: &str) -> Option<DatasetName> {
    let rest = stem.strip_prefix(&format!("{FILE_PREFIX}_{feature}_"))?;
    let (role, rest) = DatasetRole::ALL.iter().find_map(|role| {
        rest.strip_prefix(role.as_str())
            .and_then(|r| r.strip_prefix('_'))
            .map(|r| (*role, r))
    })?;

    let (timestamp, size, collision) = parse_stamp(rest)?;
    Some(DatasetName {
        role,
        timestamp,
        size,
        collision,
    })
}

/// Fields recovered from an inputs file stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputsName {
    pub timestamp: NaiveDateTime,
    pub count: usize,
    pub collision: u32,
}

/// Parse an inputs stem written by [`inputs_stem`] for `feature`
#[must_use]
pub fn parse_inputs_stem(feature: &str, stem: &str) -> Option<InputsName> {
    let rest = stem.strip_prefix(&format!("{FILE_PREFIX}_{feature}_inputs_"))?;
    let (timestamp, count, collision) = parse_stamp(rest)?;
    Some(InputsName {
        timestamp,
        count,
        collision,
    })
}

/// `<YYYYMMDD>_<HHMMSS>_<size>[_<n>]`
fn parse_stamp(rest: &str) -> Option<(NaiveDateTime, usize, u32)> {
    let parts: Vec<&str> = rest.split('_').collect();
    let (date, time, size, collision) = match parts.as_slice() {
        [date, time, size] => (*date, *time, *size, 0),
        [date, time, size, n] => (*date, *time, *size, n.parse().ok()?),
        _ => return None,
    };
    let timestamp = NaiveDateTime::parse_from_str(&format!("{date}_{time}"), "%Y%m%d_%H%M%S").ok()?;
    Some((timestamp, size.parse().ok()?, collision))
}
