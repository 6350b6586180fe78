//! Recover JSON from free-form LLM replies
//!
//! Models wrap JSON in code fences, add prose around it, or emit
//! Python-style literals. Tries, in order: the fenced or raw text as-is, the
//! outermost `[...]` or `{...}` span, and finally that span with single
//! quotes and `None`/`True`/`False` repaired.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").unwrap());

static PY_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(None|True|False)\b").unwrap());

/// Parse the JSON value embedded in `reply`.
///
/// # Errors
/// A short reason when nothing parseable was found.
pub fn extract_json(reply: &str) -> Result<Value, String> {
    let body = strip_fences(reply);
    let body = body.trim();
    if body.is_empty() {
        return Err("reply is empty".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }

    let span = outermost_span(body).ok_or_else(|| "reply contains no JSON array or object".to_string())?;
    if let Ok(value) = serde_json::from_str::<Value>(span) {
        return Ok(value);
    }

    let repaired = repair(span);
    serde_json::from_str::<Value>(&repaired).map_err(|e| format!("reply is not valid JSON: {e}"))
}

fn strip_fences(reply: &str) -> String {
    match FENCE.captures(reply) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).to_string(),
        None => reply.to_string(),
    }
}

/// From the first opening bracket to the last matching closing bracket
fn outermost_span(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let close = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn repair(span: &str) -> String {
    let swapped = PY_LITERAL.replace_all(span, |caps: &regex::Captures<'_>| match &caps[1] {
        "None" => "null",
        "True" => "true",
        _ => "false",
    });
    if swapped.contains('"') {
        swapped.into_owned()
    } else {
        swapped.replace('\'', "\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(extract_json(r#"[{"a":1}]"#).unwrap(), json!([{"a": 1}]));
    }

    #[test]
    fn test_fenced_json() {
        let reply = "Here you go:\n```json\n[{\"prompt\": \"x\"}]\n```\nEnjoy.";
        assert_eq!(extract_json(reply).unwrap(), json!([{"prompt": "x"}]));
    }

    #[test]
    fn test_prose_around_json() {
        let reply = "Sure! {\"inputs\": [1, 2]} Let me know.";
        assert_eq!(extract_json(reply).unwrap(), json!({"inputs": [1, 2]}));
    }

    #[test]
    fn test_python_literals_repaired() {
        let reply = "[{'prompt': 'hello', 'config': None, 'ok': True}]";
        assert_eq!(
            extract_json(reply).unwrap(),
            json!([{"prompt": "hello", "config": null, "ok": true}])
        );
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(extract_json("I cannot help with that").is_err());
        assert!(extract_json("   ").is_err());
        assert!(extract_json("[ not json at all").is_err());
    }
}
