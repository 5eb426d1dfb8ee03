use crate::core::models::{Category, ReviewResult};

const SKIPPED_FILES_SHOWN: usize = 20;

/// Render the aggregated review into one markdown comment body.
/// Pure and deterministic: the same result always renders to the same
/// bytes.
pub fn render(result: &ReviewResult) -> String {
    let summary = &result.summary;
    let mut lines: Vec<String> = vec![
        "## :robot: Automated PR Analysis".to_string(),
        String::new(),
        "### Summary".to_string(),
        format!("**Purpose:** {}", summary.purpose),
        String::new(),
        "**Changes:**".to_string(),
    ];
    for change in &summary.changes {
        lines.push(format!("- {change}"));
    }

    if !summary.key_files.is_empty() {
        lines.push(String::new());
        lines.push("**Key Files:**".to_string());
        for f in &summary.key_files {
            lines.push(format!("- `{f}`"));
        }
    }

    if !summary.risk_areas.is_empty() {
        lines.push(String::new());
        lines.push(":warning: **Areas Requiring Attention:**".to_string());
        for r in &summary.risk_areas {
            lines.push(format!("- {r}"));
        }
    }

    if let Some(note) = &summary.test_coverage_note {
        lines.push(String::new());
        lines.push(format!("**Tests:** {note}"));
    }

    let review_count = result
        .comments
        .iter()
        .filter(|c| c.category != Category::Logging)
        .count();
    let logging_count = result.comments.len() - review_count;

    let mut stats = vec![
        format!(":page_facing_up: {} file(s) reviewed", result.files_reviewed),
        format!(":speech_balloon: {review_count} review comment(s)"),
    ];
    if logging_count > 0 {
        stats.push(format!(":memo: {logging_count} logging suggestion(s)"));
    }
    stats.push(format!(
        ":stopwatch: {}s",
        format_seconds(result.duration_seconds)
    ));

    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(format!("<sub>{}</sub>", stats.join(" | ")));
    lines.push(String::new());
    lines.push(
        "<sub>:thumbsup: / :thumbsdown: on review comments helps us improve</sub>".to_string(),
    );

    if !result.skipped_files.is_empty() {
        lines.push(String::new());
        lines.push("<details>".to_string());
        lines.push(format!(
            "<summary>Skipped {} file(s)</summary>",
            result.skipped_files.len()
        ));
        lines.push(String::new());
        for sf in result.skipped_files.iter().take(SKIPPED_FILES_SHOWN) {
            lines.push(format!("- `{sf}`"));
        }
        if result.skipped_files.len() > SKIPPED_FILES_SHOWN {
            lines.push(format!(
                "- ... and {} more",
                result.skipped_files.len() - SKIPPED_FILES_SHOWN
            ));
        }
        lines.push(String::new());
        lines.push("</details>".to_string());
    }

    lines.join("\n")
}

/// Seconds with at least one and at most two decimals: 12 -> "12.0",
/// 12.5 -> "12.5", 3.07 -> "3.07".
fn format_seconds(seconds: f64) -> String {
    let mut text = format!("{seconds:.2}");
    if text.ends_with('0') {
        text.pop();
    }
    text
}
