//! Extract `label: score` values from evaluator replies
//!
//! A scoring line is optional leading whitespace, optional markdown
//! decoration (`*`, `_`, `` ` ``, `#`, `-`), the label, optional decoration,
//! then `:` or `=` and a number. Labels match case-insensitively and the first
//! matching line wins. The score must lie in `[0, 1]`.

use regex::Regex;

/// Score for `label` in `reply`, or `None` when no line matches or the first
/// matching line holds a value outside `[0, 1]`.
#[must_use]
pub fn parse_score(reply: &str, label: &str) -> Option<f64> {
    let pattern = format!(
        r"(?im)^[*_`# \t-]*{}[*_`#-]*[ \t]*[:=][ \t]*[*_`]*(\d+(?:\.\d*)?|\.\d+)",
        regex::escape(label)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(reply)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    (0.0..=1.0).contains(&value).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_line() {
        assert_eq!(parse_score("stability: 0.85", "stability"), Some(0.85));
        assert_eq!(parse_score("Style = 1", "style"), Some(1.0));
        assert_eq!(parse_score("quality: .5", "quality"), Some(0.5));
        assert_eq!(parse_score("quality: 1.", "quality"), Some(1.0));
    }

    #[test]
    fn test_markdown_decoration() {
        assert_eq!(parse_score("**Coverage**: 0.7", "coverage"), Some(0.7));
        assert_eq!(parse_score("## Behavior: 0.4", "behavior"), Some(0.4));
        assert_eq!(parse_score("- `correctness`: 0.9", "correctness"), Some(0.9));
        assert_eq!(parse_score("  __STABILITY__ : 0.25", "stability"), Some(0.25));
    }

    #[test]
    fn test_first_matching_line_wins() {
        let reply = "Reasoning first.\nstyle: 0.3\nstyle: 0.9";
        assert_eq!(parse_score(reply, "style"), Some(0.3));
    }

    #[test]
    fn test_label_must_start_the_line() {
        assert_eq!(parse_score("The stability: 0.5", "stability"), None);
        assert_eq!(parse_score("stability score: 0.5", "stability"), None);
    }

    #[test]
    fn test_out_of_range_and_non_numeric() {
        assert_eq!(parse_score("quality: 7", "quality"), None);
        assert_eq!(parse_score("quality: 1.5", "quality"), None);
        assert_eq!(parse_score("quality: high", "quality"), None);
        assert_eq!(parse_score("", "quality"), None);
    }

    #[test]
    fn test_other_labels_ignored() {
        assert_eq!(parse_score("quality: 0.8", "coverage"), None);
    }

    proptest! {
        #[test]
        fn prop_never_panics_and_stays_in_range(reply in ".{0,200}") {
            if let Some(v) = parse_score(&reply, "style") {
                prop_assert!((0.0..=1.0).contains(&v));
            }
        }

        #[test]
        fn prop_formatted_score_round_trips(v in 0.0f64..=1.0) {
            let reply = format!("Style: {v:.4}");
            let parsed = parse_score(&reply, "style").unwrap();
            prop_assert!((parsed - v).abs() < 1e-3);
        }
    }
}
