//! Review pipeline: one summary pass over a budgeted combined diff,
//! then bounded-concurrency per-file review and (optionally) logging
//! suggestion passes, with every model-reported line validated against
//! the diff before anything is surfaced.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::adapters::llm::{CompletionClient, ModelTier};
use crate::core::budget::{compress_diff_for_summary, TokenCounter};
use crate::core::diff::{find_closest_line, parse_patch_line_map};
use crate::core::models::{
    Category, FileDiff, LogLevel, PrSummary, ReviewComment, ReviewResult, Severity, TokenUsage,
};
use crate::core::prompts;

pub const DEFAULT_LIGHTWEIGHT_THRESHOLD: u64 = 15;
pub const DEFAULT_MAX_CONCURRENT_REVIEWS: usize = 5;
pub const DEFAULT_MAX_COMMENTS_PER_FILE: usize = 3;
pub const DEFAULT_MAX_DIFF_TOKENS: usize = 120_000;

const SUMMARY_BUDGET_CAP: usize = 40_000;
const SUMMARY_MAX_OUTPUT_TOKENS: usize = 2048;
const REVIEW_MAX_OUTPUT_TOKENS: usize = 3000;
const LOGGING_MAX_OUTPUT_TOKENS: usize = 2000;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub max_diff_tokens: usize,
    pub suggest_logging: bool,
    /// Files with at most this many added AND deleted lines go to the
    /// lightweight model.
    pub lightweight_threshold: u64,
    pub max_concurrent_reviews: usize,
    pub max_comments_per_file: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_diff_tokens: DEFAULT_MAX_DIFF_TOKENS,
            suggest_logging: true,
            lightweight_threshold: DEFAULT_LIGHTWEIGHT_THRESHOLD,
            max_concurrent_reviews: DEFAULT_MAX_CONCURRENT_REVIEWS,
            max_comments_per_file: DEFAULT_MAX_COMMENTS_PER_FILE,
        }
    }
}

/// Everything the pipeline needs about one pull request.
#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub pr_number: u64,
    pub repo: String,
    pub head_sha: String,
    pub title: String,
    pub body: Option<String>,
    pub author: String,
    pub additions: u64,
    pub deletions: u64,
    pub files: Vec<FileDiff>,
    pub skipped_files: Vec<String>,
}

pub struct ReviewEngine {
    client: Arc<dyn CompletionClient>,
    counter: Arc<TokenCounter>,
    options: EngineOptions,
}

impl ReviewEngine {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        counter: Arc<TokenCounter>,
        options: EngineOptions,
    ) -> Self {
        Self {
            client,
            counter,
            options,
        }
    }

    /// Run the full pipeline. Never fails: per-file and per-stage
    /// problems degrade to fewer comments or the fallback summary.
    pub async fn review(&self, input: ReviewInput) -> ReviewResult {
        let start = Instant::now();
        let mut usage = TokenUsage::default();

        let (summary, summary_usage) = self.generate_summary(&input).await;
        usage.merge(&summary_usage);

        let (mut comments, review_usage) = self
            .review_files(&input.title, &summary.purpose, &input.files)
            .await;
        usage.merge(&review_usage);

        if self.options.suggest_logging {
            let (log_comments, log_usage) = self.suggest_logging_for_files(&input.files).await;
            info!(
                "logging suggestions: {} across {} files",
                log_comments.len(),
                input.files.len()
            );
            comments.extend(log_comments);
            usage.merge(&log_usage);
        }

        let duration_seconds = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        info!(
            "review complete: {} files, {} comments, {:.1}s",
            input.files.len(),
            comments.len(),
            duration_seconds
        );

        ReviewResult {
            pr_number: input.pr_number,
            repo: input.repo,
            head_sha: input.head_sha,
            summary,
            files_reviewed: input.files.len(),
            comments,
            skipped_files: input.skipped_files,
            duration_seconds,
            usage,
        }
    }

    // ── Stage 0: summary ────────────────────────────────────────────────

    async fn generate_summary(&self, input: &ReviewInput) -> (PrSummary, TokenUsage) {
        let changed_files = input.files.len() + input.skipped_files.len();
        let budget = (self.options.max_diff_tokens / 3).min(SUMMARY_BUDGET_CAP);
        let diff_text = compress_diff_for_summary(&input.files, budget, &self.counter);

        let prompt = prompts::summary_prompt(
            &input.title,
            input.body.as_deref().unwrap_or("(no description)"),
            &input.author,
            changed_files,
            input.additions,
            input.deletions,
            &diff_text,
        );

        match self
            .client
            .complete_json(
                prompts::SYSTEM_PROMPT,
                &prompt,
                ModelTier::Primary,
                SUMMARY_MAX_OUTPUT_TOKENS,
            )
            .await
        {
            Ok((value, usage)) if value.is_object() => {
                match serde_json::from_value::<PrSummary>(value) {
                    Ok(summary) => return (summary, usage),
                    Err(err) => warn!("summary response had wrong shape: {err}"),
                }
            }
            Ok(_) => warn!("summary response was not a JSON object"),
            Err(err) => warn!("summary generation failed, using fallback: {err}"),
        }

        let fallback = PrSummary {
            purpose: format!("Changes in {} file(s): {}", changed_files, input.title),
            changes: vec![format!(
                "+{}/-{} lines changed",
                input.additions, input.deletions
            )],
            key_files: Vec::new(),
            risk_areas: Vec::new(),
            test_coverage_note: None,
        };
        (fallback, TokenUsage::default())
    }

    // ── Stage 1: per-file review ────────────────────────────────────────

    async fn review_files(
        &self,
        title: &str,
        purpose: &str,
        files: &[FileDiff],
    ) -> (Vec<ReviewComment>, TokenUsage) {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_reviews));
        let mut join_set = JoinSet::new();

        for (idx, file) in files.iter().enumerate() {
            if file.patch.is_none() {
                continue;
            }
            let client = Arc::clone(&self.client);
            let sem = Arc::clone(&semaphore);
            let title = title.to_string();
            let purpose = purpose.to_string();
            let file = file.clone();
            let threshold = self.options.lightweight_threshold;
            let max_comments = self.options.max_comments_per_file;

            join_set.spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let out =
                    review_single_file(client, title, purpose, file, threshold, max_comments)
                        .await;
                (idx, out)
            });
        }

        collect_in_input_order(join_set).await
    }

    // ── Stage 2: logging suggestions ────────────────────────────────────

    async fn suggest_logging_for_files(
        &self,
        files: &[FileDiff],
    ) -> (Vec<ReviewComment>, TokenUsage) {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_reviews));
        let mut join_set = JoinSet::new();

        for (idx, file) in files.iter().enumerate() {
            if file.patch.is_none() {
                continue;
            }
            let client = Arc::clone(&self.client);
            let sem = Arc::clone(&semaphore);
            let file = file.clone();

            join_set.spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let out = suggest_logging_single_file(client, file).await;
                (idx, out)
            });
        }

        collect_in_input_order(join_set).await
    }
}

/// Join all per-file tasks and fold their results back into file input
/// order. Completion order depends on network timing; reports must not.
/// Usage deltas are summed here, after all tasks have joined, so no two
/// writers ever touch the totals concurrently.
async fn collect_in_input_order(
    mut join_set: JoinSet<(usize, (Vec<ReviewComment>, TokenUsage))>,
) -> (Vec<ReviewComment>, TokenUsage) {
    let mut slots: Vec<(usize, (Vec<ReviewComment>, TokenUsage))> = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(item) => slots.push(item),
            Err(err) => warn!("file review task failed: {err}"),
        }
    }
    slots.sort_by_key(|(idx, _)| *idx);

    let mut comments = Vec::new();
    let mut usage = TokenUsage::default();
    for (_, (file_comments, file_usage)) in slots {
        comments.extend(file_comments);
        usage.merge(&file_usage);
    }
    (comments, usage)
}

async fn review_single_file(
    client: Arc<dyn CompletionClient>,
    title: String,
    purpose: String,
    file: FileDiff,
    threshold: u64,
    max_comments: usize,
) -> (Vec<ReviewComment>, TokenUsage) {
    let Some(patch) = file.patch.as_deref() else {
        return (Vec::new(), TokenUsage::default());
    };

    let lightweight = file.additions <= threshold && file.deletions <= threshold;
    let lang = if file.language.is_empty() {
        "text"
    } else {
        file.language.as_str()
    };

    let (prompt, tier) = if lightweight {
        (
            prompts::lightweight_review_prompt(&file.filename, lang, patch),
            ModelTier::Lightweight,
        )
    } else {
        (
            prompts::review_prompt(&title, &purpose, &file.filename, lang, patch, max_comments),
            ModelTier::Primary,
        )
    };

    let (data, usage) = match client
        .complete_json(prompts::SYSTEM_PROMPT, &prompt, tier, REVIEW_MAX_OUTPUT_TOKENS)
        .await
    {
        Ok(ok) => ok,
        Err(err) => {
            warn!("review failed for {}: {err}", file.filename);
            return (Vec::new(), TokenUsage::default());
        }
    };

    let Some(items) = data.as_array() else {
        warn!("review response for {} was not an array", file.filename);
        return (Vec::new(), usage);
    };

    let line_map = parse_patch_line_map(patch);
    let mut comments = Vec::new();

    for item in items {
        let Some(obj) = item.as_object() else { continue };
        let Some(line) = obj.get("line").and_then(Value::as_u64) else {
            continue;
        };
        let body = obj
            .get("body")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if line == 0 || body.is_empty() {
            continue;
        }

        let Some(line) = find_closest_line(line, &line_map) else {
            debug!("skipping comment with invalid line in {}", file.filename);
            continue;
        };

        let severity = Severity::parse(obj.get("severity").and_then(Value::as_str).unwrap_or(""));
        let category = Category::parse(obj.get("category").and_then(Value::as_str).unwrap_or(""));

        let formatted = format!(
            "{} **{}** | {}\n\n{}",
            severity.badge(),
            severity.as_str().to_uppercase(),
            category.label(),
            body
        );

        comments.push(ReviewComment {
            path: file.filename.clone(),
            line,
            body: formatted,
            severity,
            category,
        });
    }

    (comments, usage)
}

async fn suggest_logging_single_file(
    client: Arc<dyn CompletionClient>,
    file: FileDiff,
) -> (Vec<ReviewComment>, TokenUsage) {
    let Some(patch) = file.patch.as_deref() else {
        return (Vec::new(), TokenUsage::default());
    };

    let lang = if file.language.is_empty() {
        "text"
    } else {
        file.language.as_str()
    };
    let prompt = prompts::logging_prompt(&file.filename, lang, patch);

    let (data, usage) = match client
        .complete_json(
            prompts::LOGGING_SYSTEM_PROMPT,
            &prompt,
            ModelTier::Lightweight,
            LOGGING_MAX_OUTPUT_TOKENS,
        )
        .await
    {
        Ok(ok) => ok,
        Err(err) => {
            warn!("logging suggestion failed for {}: {err}", file.filename);
            return (Vec::new(), TokenUsage::default());
        }
    };

    let Some(items) = data.as_array() else {
        return (Vec::new(), usage);
    };

    let line_map = parse_patch_line_map(patch);
    let mut comments = Vec::new();

    for item in items {
        let Some(obj) = item.as_object() else { continue };
        let Some(line) = obj.get("line").and_then(Value::as_u64) else {
            continue;
        };
        let statement = obj
            .get("log_statement")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if line == 0 || statement.is_empty() {
            continue;
        }

        let Some(line) = find_closest_line(line, &line_map) else {
            debug!(
                "skipping logging suggestion with invalid line in {}",
                file.filename
            );
            continue;
        };

        let reason = obj
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        let level = LogLevel::parse(obj.get("level").and_then(Value::as_str).unwrap_or(""));

        let body = format!(
            ":memo: **LOGGING** | {} `{}`\n\n**Suggested log statement:**\n```{}\n{}\n```\n_{}_",
            level.emoji(),
            level.as_str().to_uppercase(),
            lang,
            statement,
            reason
        );

        comments.push(ReviewComment {
            path: file.filename.clone(),
            line,
            body,
            severity: Severity::Suggestion,
            category: Category::Logging,
        });
    }

    (comments, usage)
}
