//! Static HTML rendering of a comparison report

use llmcompare_utils::types::{ComparisonReport, Decision};

/// Colour band for a score in `[0, 1]`
#[must_use]
pub fn band(score: f64) -> &'static str {
    if score >= 0.8 {
        "good"
    } else if score >= 0.6 {
        "fair"
    } else {
        "poor"
    }
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn metric_row(html: &mut String, name: &str, value: Option<f64>) {
    match value {
        Some(v) => html.push_str(&format!(
            "<tr><td>{name}</td><td class=\"{}\">{v:.3}</td></tr>\n",
            band(v)
        )),
        None => html.push_str(&format!(
            "<tr><td>{name}</td><td class=\"na\">n/a</td></tr>\n"
        )),
    }
}

#[must_use]
pub fn render_html(report: &ComparisonReport) -> String {
    let feature = escape_html(&report.feature);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\"><head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>Comparison report: {feature}</title>\n"));
    html.push_str("<style>\n");
    html.push_str("body { font-family: system-ui, sans-serif; max-width: 900px; margin: 2rem auto; padding: 0 1rem; }\n");
    html.push_str("table { border-collapse: collapse; margin: 1rem 0; }\n");
    html.push_str("td, th { padding: 0.3rem 0.8rem; border-bottom: 1px solid #ddd; text-align: left; }\n");
    html.push_str(".good { background: #d4edda; }\n");
    html.push_str(".fair { background: #fff3cd; }\n");
    html.push_str(".poor { background: #f8d7da; }\n");
    html.push_str(".na { color: #888; }\n");
    html.push_str(".partial { border-left: 4px solid #f0ad4e; padding-left: 0.5rem; }\n");
    html.push_str("</style>\n</head><body>\n");

    html.push_str(&format!("<h1>Comparison report: {feature}</h1>\n"));
    html.push_str(&format!(
        "<p><strong>Baseline:</strong> {} (<code>{}</code>)<br>\n<strong>Target:</strong> <code>{}</code> created {}<br>\n<strong>Mode:</strong> {} &middot; <strong>Generated:</strong> {}</p>\n",
        escape_html(&report.baseline_id),
        escape_html(&report.baseline_dataset_id),
        escape_html(&report.target_dataset_id),
        report.target_created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.test_mode,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    ));
    if report.partial {
        html.push_str(
            "<p class=\"partial\">Partial report: a metric group is missing or a dataset was not evaluated.</p>\n",
        );
    }

    let decision_class = match report.decision.decision {
        Decision::RecommendTarget => "good",
        Decision::ConsiderTarget | Decision::NeedsMoreTesting => "fair",
        Decision::KeepBaseline => "poor",
    };
    html.push_str("<h2>Decision</h2>\n");
    html.push_str(&format!(
        "<p class=\"{decision_class}\"><strong>{}</strong> ({} confidence): {}</p>\n",
        report.decision.decision,
        report.decision.confidence,
        escape_html(&report.decision.rationale)
    ));

    let m = &report.metrics;
    html.push_str("<h2>Metrics</h2>\n<table>\n<tr><th>Metric</th><th>Score</th></tr>\n");
    metric_row(&mut html, "Overall", Some(m.overall));
    match &m.consistency {
        Some(c) => {
            metric_row(&mut html, "Consistency", Some(c.score));
            metric_row(&mut html, "&nbsp;&nbsp;Stability", c.stability);
            metric_row(&mut html, "&nbsp;&nbsp;Behavior", c.behavior);
            metric_row(&mut html, "&nbsp;&nbsp;Style", c.style);
        }
        None => metric_row(&mut html, "Consistency (not applicable)", None),
    }
    match &m.accuracy {
        Some(a) => {
            metric_row(&mut html, "Accuracy", Some(a.score));
            metric_row(&mut html, "&nbsp;&nbsp;Correctness", a.correctness);
            metric_row(&mut html, "&nbsp;&nbsp;Quality", a.quality);
            metric_row(&mut html, "&nbsp;&nbsp;Coverage", a.coverage);
        }
        None => metric_row(&mut html, "Accuracy", None),
    }
    if let Some(delta) = m.accuracy_delta {
        html.push_str(&format!(
            "<tr><td>Accuracy change vs baseline</td><td>{delta:+.3}</td></tr>\n"
        ));
    }
    html.push_str(&format!(
        "<tr><td>Output pairs compared</td><td>{}</td></tr>\n</table>\n",
        report.pairs_compared
    ));

    html.push_str("<h2>Recommendations</h2>\n");
    if report.recommendations.is_empty() {
        html.push_str("<p>No issues found.</p>\n");
    } else {
        html.push_str("<ol>\n");
        for rec in &report.recommendations {
            html.push_str(&format!("<li>{}</li>\n", escape_html(rec)));
        }
        html.push_str("</ol>\n");
    }

    html.push_str("</body></html>\n");
    html
}
