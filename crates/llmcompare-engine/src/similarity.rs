//! Pairwise similarity of two outputs for the consistency group
//!
//! All scores are in `[0, 1]`, with 1 meaning indistinguishable.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use llmcompare_utils::types::Output;

static LIST_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([-*+]\s|\d+[.)]\s)").unwrap());

const COMMENT_PREFIXES: [&str; 5] = ["//", "#", "/*", "*/", "--"];

/// Jaccard similarity of the lower-cased whitespace-separated word sets.
/// Two empty texts are identical; exactly one empty text scores 0.
#[must_use]
pub fn word_jaccard(a: &str, b: &str) -> f64 {
    let left: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let right: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();

    match (left.is_empty(), right.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => {
            let intersection = left.intersection(&right).count();
            let union = left.union(&right).count();
            intersection as f64 / union as f64
        }
    }
}

fn ratio(a: usize, b: usize) -> f64 {
    let (min, max) = if a <= b { (a, b) } else { (b, a) };
    if max == 0 { 1.0 } else { min as f64 / max as f64 }
}

/// 0 when exactly one side errored, otherwise the mean of the character
/// length ratio and the line count ratio.
#[must_use]
pub fn behavior_similarity(a: &Output, b: &Output) -> f64 {
    if a.is_error() != b.is_error() {
        return 0.0;
    }
    let chars = ratio(a.text.chars().count(), b.text.chars().count());
    let lines = ratio(a.text.lines().count(), b.text.lines().count());
    (chars + lines) / 2.0
}

/// Shape of a text: how much of it is comments, blank lines, lists and code
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleProfile {
    pub comment_ratio: f64,
    pub blank_ratio: f64,
    pub list_ratio: f64,
    /// 1 when the text contains a fenced code block
    pub code_fence: f64,
}

impl StyleProfile {
    #[must_use]
    pub fn of(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len();
        let mut comments = 0;
        let mut blanks = 0;
        let mut lists = 0;

        for line in &lines {
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                blanks += 1;
            } else if COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
                comments += 1;
            } else if LIST_LINE.is_match(trimmed) {
                lists += 1;
            }
        }

        let share = |n: usize| if total == 0 { 0.0 } else { n as f64 / total as f64 };
        Self {
            comment_ratio: share(comments),
            blank_ratio: share(blanks),
            list_ratio: share(lists),
            code_fence: if text.contains("```") { 1.0 } else { 0.0 },
        }
    }

    fn features(&self) -> [f64; 4] {
        [
            self.comment_ratio,
            self.blank_ratio,
            self.list_ratio,
            self.code_fence,
        ]
    }
}

/// `1 − mean |Δ|` over the two style profiles
#[must_use]
pub fn style_similarity(a: &str, b: &str) -> f64 {
    let left = StyleProfile::of(a).features();
    let right = StyleProfile::of(b).features();
    let total: f64 = left.iter().zip(right.iter()).map(|(x, y)| (x - y).abs()).sum();
    (1.0 - total / left.len() as f64).clamp(0.0, 1.0)
}
