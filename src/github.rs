//! Thin async wrapper around the GitHub REST API, scoped to what one
//! review run needs: PR metadata, the changed-file list, cleanup of a
//! previous run's comments, and posting the new review.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::budget::TokenCounter;
use crate::core::diff::{detect_language, is_binary, should_skip_file};
use crate::core::models::{FileDiff, FileStatus, ReviewComment};

const GITHUB_API: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

/// Marker embedded in our summary comments so a re-run can find and
/// delete them.
pub const REVIEW_MARKER: &str = "<!-- prscope-review-agent -->";

pub struct GitHubClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub title: String,
    pub body: Option<String>,
    pub user: Author,
    #[serde(default)]
    pub draft: bool,
    pub head: Head,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub login: String,
    #[serde(rename = "type", default)]
    pub author_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Head {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    patch: Option<String>,
    #[serde(default)]
    previous_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExistingComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<Author>,
}

#[derive(Serialize)]
struct InlineComment<'a> {
    path: &'a str,
    line: u64,
    side: &'static str,
    body: &'a str,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, GITHUB_API.to_string())
    }

    pub fn with_base_url(token: &str, base_url: String) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("token {token}"))
            .context("invalid GitHub token")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = Client::builder()
            .user_agent(concat!("prscope/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build GitHub HTTP client")?;

        Ok(Self { http, base_url })
    }

    pub async fn get_pr(&self, repo: &str, pr_number: u64) -> Result<PullRequest> {
        let url = format!("{}/repos/{repo}/pulls/{pr_number}", self.base_url);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let pr = response.json().await.context("failed to parse PR metadata")?;
        Ok(pr)
    }

    /// Fetch changed files with filtering. Returns (reviewable files,
    /// skipped filenames annotated with the reason).
    pub async fn get_pr_files(
        &self,
        repo: &str,
        pr_number: u64,
        ignore_patterns: &[String],
        max_files: usize,
        counter: &TokenCounter,
    ) -> Result<(Vec<FileDiff>, Vec<String>)> {
        let mut files: Vec<FileDiff> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        let url = format!("{}/repos/{repo}/pulls/{pr_number}/files", self.base_url);
        let mut page = 1usize;

        loop {
            let batch: Vec<RawFile> = self
                .http
                .get(&url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("failed to parse PR file list")?;
            if batch.is_empty() {
                break;
            }

            for raw in batch {
                if is_binary(&raw.filename) {
                    skipped.push(format!("{} (binary)", raw.filename));
                    continue;
                }
                if should_skip_file(&raw.filename, ignore_patterns) {
                    skipped.push(format!("{} (ignored)", raw.filename));
                    continue;
                }
                let Some(patch) = raw.patch.filter(|p| !p.is_empty()) else {
                    skipped.push(format!("{} (no diff)", raw.filename));
                    continue;
                };

                let token_count = counter.count(&patch);
                files.push(FileDiff {
                    language: detect_language(&raw.filename).to_string(),
                    filename: raw.filename,
                    status: FileStatus::parse(&raw.status),
                    additions: raw.additions,
                    deletions: raw.deletions,
                    patch: Some(patch),
                    previous_filename: raw.previous_filename,
                    token_count,
                });
            }

            page += 1;
            // Hard stop: huge PRs would page forever and get truncated anyway.
            if files.len() + skipped.len() >= max_files * 3 {
                break;
            }
        }

        if files.len() > max_files {
            for f in files.drain(max_files..) {
                skipped.push(format!("{} (over limit)", f.filename));
            }
        }

        Ok((files, skipped))
    }

    /// Delete the previous run's summary comment and inline bot
    /// comments so re-pushed commits get one fresh review, not a pile.
    pub async fn cleanup_previous_reviews(&self, repo: &str, pr_number: u64) -> Result<()> {
        let mut deleted = 0usize;

        let issue_url = format!(
            "{}/repos/{repo}/issues/{pr_number}/comments",
            self.base_url
        );
        let mut page = 1usize;
        loop {
            let batch: Vec<ExistingComment> = self
                .http
                .get(&issue_url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            if batch.is_empty() {
                break;
            }
            for comment in batch {
                if comment.body.as_deref().is_some_and(|b| b.contains(REVIEW_MARKER)) {
                    let url = format!(
                        "{}/repos/{repo}/issues/comments/{}",
                        self.base_url, comment.id
                    );
                    if self.http.delete(&url).send().await?.status().is_success() {
                        deleted += 1;
                    }
                }
            }
            page += 1;
        }

        let review_url = format!("{}/repos/{repo}/pulls/{pr_number}/comments", self.base_url);
        let mut page = 1usize;
        loop {
            let batch: Vec<ExistingComment> = self
                .http
                .get(&review_url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            if batch.is_empty() {
                break;
            }
            for comment in batch {
                let is_bot = comment.user.as_ref().is_some_and(|u| {
                    u.login == "github-actions[bot]" || u.author_type == "Bot"
                });
                if is_bot {
                    let url = format!(
                        "{}/repos/{repo}/pulls/comments/{}",
                        self.base_url, comment.id
                    );
                    if self.http.delete(&url).send().await?.status().is_success() {
                        deleted += 1;
                    }
                }
            }
            page += 1;
        }

        if deleted > 0 {
            info!("cleaned up {deleted} comment(s) from previous review run");
        }
        Ok(())
    }

    /// Post the summary as a marked issue comment and the inline
    /// comments as one review against `head_sha`. Returns the review id
    /// (0 when there were no inline comments).
    pub async fn post_review(
        &self,
        repo: &str,
        pr_number: u64,
        head_sha: &str,
        body: &str,
        comments: &[ReviewComment],
    ) -> Result<u64> {
        let marked_body = format!("{REVIEW_MARKER}\n{body}");
        let url = format!(
            "{}/repos/{repo}/issues/{pr_number}/comments",
            self.base_url
        );
        self.http
            .post(&url)
            .json(&serde_json::json!({ "body": marked_body }))
            .send()
            .await?
            .error_for_status()
            .context("failed to post summary comment")?;

        let mut review_id = 0u64;
        if !comments.is_empty() {
            let inline: Vec<InlineComment<'_>> = comments
                .iter()
                .map(|c| InlineComment {
                    path: &c.path,
                    line: c.line,
                    side: "RIGHT",
                    body: &c.body,
                })
                .collect();
            let payload = serde_json::json!({
                "commit_id": head_sha,
                "event": "COMMENT",
                "body": "",
                "comments": inline,
            });
            let url = format!("{}/repos/{repo}/pulls/{pr_number}/reviews", self.base_url);
            let response = self
                .http
                .post(&url)
                .json(&payload)
                .send()
                .await?
                .error_for_status()
                .context("failed to post review")?;
            let created: serde_json::Value = response.json().await?;
            review_id = created.get("id").and_then(|v| v.as_u64()).unwrap_or(0);
        }

        info!(
            "posted summary + review {review_id} with {} inline comment(s)",
            comments.len()
        );
        Ok(review_id)
    }
}
