//! Canonical JSON (RFC 8785 / JCS) and content hashing

use anyhow::{Context, Result};
use serde::Serialize;

/// Serialize `value` as canonical JSON (JCS).
///
/// Two values are considered the same record when their JCS forms are
/// byte-identical; stored datasets and workflow state are compared this way.
///
/// ```rust
/// use llmcompare_utils::canonicalization::emit_jcs;
/// use serde_json::json;
///
/// let json = emit_jcs(&json!({"b": 1, "a": [true, null]})).unwrap();
/// assert_eq!(json, r#"{"a":[true,null],"b":1}"#);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value = serde_json::to_value(value).context("Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .context("Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).context("JCS output contained invalid UTF-8")
}

/// BLAKE3 hex digest of the canonical JSON form of `value`
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let canonical = emit_jcs(value)?;
    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}
