use serde::{Deserialize, Serialize};

/// One file touched by the pull request, as fetched from the hosting API.
///
/// `token_count` is computed from `patch` at construction time and never
/// recomputed afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    pub filename: String,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    pub patch: Option<String>,
    pub previous_filename: Option<String>,
    pub language: String,
    pub token_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl FileStatus {
    /// Total parse: unrecognized provider statuses (e.g. "copied",
    /// "changed") are treated as plain modifications.
    pub fn parse(value: &str) -> Self {
        match value {
            "added" => FileStatus::Added,
            "removed" => FileStatus::Removed,
            "renamed" => FileStatus::Renamed,
            _ => FileStatus::Modified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Removed => "removed",
            FileStatus::Renamed => "renamed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Suggestion,
    Nitpick,
}

impl Severity {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            "suggestion" => Severity::Suggestion,
            "nitpick" => Severity::Nitpick,
            _ => Severity::Suggestion,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Suggestion => "suggestion",
            Severity::Nitpick => "nitpick",
        }
    }

    pub fn badge(&self) -> &'static str {
        match self {
            Severity::Critical => ":rotating_light:",
            Severity::Warning => ":warning:",
            Severity::Suggestion => ":bulb:",
            Severity::Nitpick => ":mag:",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BugRisk,
    Security,
    Performance,
    Maintainability,
    ErrorHandling,
    BestPractice,
    Logic,
    Concurrency,
    ResourceManagement,
    Logging,
}

impl Category {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "bug_risk" => Category::BugRisk,
            "security" => Category::Security,
            "performance" => Category::Performance,
            "maintainability" => Category::Maintainability,
            "error_handling" => Category::ErrorHandling,
            "best_practice" => Category::BestPractice,
            "logic" => Category::Logic,
            "concurrency" => Category::Concurrency,
            "resource_management" => Category::ResourceManagement,
            "logging" => Category::Logging,
            _ => Category::BestPractice,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::BugRisk => "Bug Risk",
            Category::Security => "Security",
            Category::Performance => "Performance",
            Category::Maintainability => "Maintainability",
            Category::ErrorHandling => "Error Handling",
            Category::BestPractice => "Best Practice",
            Category::Logic => "Logic",
            Category::Concurrency => "Concurrency",
            Category::ResourceManagement => "Resource Management",
            Category::Logging => "Logging",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Error => ":red_circle:",
            LogLevel::Warn => ":large_orange_diamond:",
            LogLevel::Info => ":blue_circle:",
            LogLevel::Debug => ":white_circle:",
        }
    }
}

/// A validated, line-anchored review comment ready to post.
///
/// `line` is always a key of the file's line map: either the model's
/// original number existed, or a nearby number was substituted during
/// validation. Comments that fail both checks are never constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewComment {
    pub path: String,
    pub line: u64,
    pub body: String,
    pub severity: Severity,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrSummary {
    pub purpose: String,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub key_files: Vec<String>,
    #[serde(default)]
    pub risk_areas: Vec<String>,
    #[serde(default)]
    pub test_coverage_note: Option<String>,
}

/// Token accounting for a single gateway call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
}

impl TokenUsage {
    pub fn merge(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        if !other.model.is_empty() {
            self.model = other.model.clone();
        }
    }
}

/// Terminal aggregate of one review run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub pr_number: u64,
    pub repo: String,
    pub head_sha: String,
    pub summary: PrSummary,
    pub comments: Vec<ReviewComment>,
    pub skipped_files: Vec<String>,
    pub files_reviewed: usize,
    pub duration_seconds: f64,
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parse_known_values() {
        assert_eq!(Severity::parse("critical"), Severity::Critical);
        assert_eq!(Severity::parse("WARNING"), Severity::Warning);
        assert_eq!(Severity::parse("nitpick"), Severity::Nitpick);
    }

    #[test]
    fn severity_parse_unknown_defaults_to_suggestion() {
        assert_eq!(Severity::parse("blocker"), Severity::Suggestion);
        assert_eq!(Severity::parse(""), Severity::Suggestion);
    }

    #[test]
    fn category_parse_unknown_defaults_to_best_practice() {
        assert_eq!(Category::parse("style"), Category::BestPractice);
        assert_eq!(Category::parse("bug_risk"), Category::BugRisk);
        assert_eq!(Category::parse("error_handling"), Category::ErrorHandling);
    }

    #[test]
    fn log_level_parse_unknown_defaults_to_info() {
        assert_eq!(LogLevel::parse("trace"), LogLevel::Info);
        assert_eq!(LogLevel::parse("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("ERROR"), LogLevel::Error);
    }

    #[test]
    fn file_status_parse_handles_provider_extras() {
        assert_eq!(FileStatus::parse("copied"), FileStatus::Modified);
        assert_eq!(FileStatus::parse("removed"), FileStatus::Removed);
    }

    #[test]
    fn usage_merge_accumulates_and_tracks_last_model() {
        let mut total = TokenUsage::default();
        total.merge(&TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
            model: "model-a".into(),
        });
        total.merge(&TokenUsage {
            input_tokens: 50,
            output_tokens: 10,
            model: "model-b".into(),
        });
        total.merge(&TokenUsage::default());
        assert_eq!(total.input_tokens, 150);
        assert_eq!(total.output_tokens, 30);
        assert_eq!(total.model, "model-b");
    }
}
