mod adapters;
mod config;
mod core;
mod github;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::llm::{create_client, Provider};
use crate::config::Settings;
use crate::core::budget::TokenCounter;
use crate::core::report;
use crate::core::reviewer::{
    EngineOptions, ReviewEngine, ReviewInput, DEFAULT_LIGHTWEIGHT_THRESHOLD,
    DEFAULT_MAX_COMMENTS_PER_FILE, DEFAULT_MAX_CONCURRENT_REVIEWS, DEFAULT_MAX_DIFF_TOKENS,
};
use crate::github::GitHubClient;

/// Review one pull request and post the results back. Defaults come
/// from the environment a GitHub Actions workflow provides.
#[derive(Parser)]
#[command(name = "prscope")]
#[command(about = "AI pull-request review agent", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    #[arg(long, env = "GITHUB_REPOSITORY", value_name = "OWNER/REPO")]
    repo: String,

    #[arg(long, env = "PR_NUMBER")]
    pr: u64,

    #[arg(long, env = "INPUT_AI_PROVIDER", value_enum, default_value = "anthropic")]
    provider: Provider,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "INPUT_MODEL_PRIMARY")]
    model_primary: Option<String>,

    #[arg(long, env = "INPUT_MODEL_LIGHTWEIGHT")]
    model_lightweight: Option<String>,

    #[arg(long, env = "INPUT_MAX_FILES", default_value_t = 50)]
    max_files: usize,

    #[arg(
        long,
        env = "INPUT_SKIP_DRAFTS",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::value_parser!(bool)
    )]
    skip_drafts: bool,

    #[arg(long, env = "INPUT_MAX_DIFF_TOKENS", default_value_t = DEFAULT_MAX_DIFF_TOKENS)]
    max_diff_tokens: usize,

    #[arg(
        long,
        env = "INPUT_SUGGEST_LOGGING",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::value_parser!(bool)
    )]
    suggest_logging: bool,

    #[arg(long, env = "INPUT_MAX_CONCURRENT", default_value_t = DEFAULT_MAX_CONCURRENT_REVIEWS)]
    max_concurrent: usize,

    #[arg(long, env = "INPUT_LIGHTWEIGHT_THRESHOLD", default_value_t = DEFAULT_LIGHTWEIGHT_THRESHOLD)]
    lightweight_threshold: u64,

    #[arg(long, env = "INPUT_MAX_COMMENTS", default_value_t = DEFAULT_MAX_COMMENTS_PER_FILE)]
    max_comments: usize,

    #[arg(long, env = "INPUT_IGNORE_PATTERNS", value_delimiter = ',')]
    ignore_patterns: Vec<String>,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_settings(self) -> Result<Settings> {
        let api_key = match self.provider {
            Provider::Anthropic => self
                .anthropic_api_key
                .context("ANTHROPIC_API_KEY is required for the anthropic provider")?,
            Provider::Openai => self
                .openai_api_key
                .context("OPENAI_API_KEY is required for the openai provider")?,
        };
        let (default_primary, default_lightweight) = config::default_models(self.provider);

        let settings = Settings {
            github_token: self.github_token,
            repo: self.repo,
            pr_number: self.pr,
            provider: self.provider,
            api_key,
            model_primary: self
                .model_primary
                .unwrap_or_else(|| default_primary.to_string()),
            model_lightweight: self
                .model_lightweight
                .unwrap_or_else(|| default_lightweight.to_string()),
            max_files: self.max_files,
            skip_drafts: self.skip_drafts,
            engine: EngineOptions {
                max_diff_tokens: self.max_diff_tokens,
                suggest_logging: self.suggest_logging,
                lightweight_threshold: self.lightweight_threshold,
                max_concurrent_reviews: self.max_concurrent,
                max_comments_per_file: self.max_comments,
            },
            extra_ignore_patterns: self.ignore_patterns,
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = cli.into_settings()?;
    run(settings).await
}

async fn run(settings: Settings) -> Result<()> {
    let gh = GitHubClient::new(&settings.github_token)?;

    let pr = gh
        .get_pr(&settings.repo, settings.pr_number)
        .await
        .context("failed to fetch PR metadata")?;
    info!(
        "PR #{}: {} by {} ({} files)",
        settings.pr_number, pr.title, pr.user.login, pr.changed_files
    );

    // Gatekeeper: drafts and bot-authored PRs are not reviewed.
    if settings.skip_drafts && pr.draft {
        info!("skipping draft PR #{}", settings.pr_number);
        return Ok(());
    }
    if config::IGNORED_AUTHORS.contains(&pr.user.login.as_str()) || pr.user.author_type == "Bot" {
        info!(
            "skipping bot PR #{} by {}",
            settings.pr_number, pr.user.login
        );
        return Ok(());
    }

    let counter = Arc::new(TokenCounter::new()?);
    let (files, skipped) = gh
        .get_pr_files(
            &settings.repo,
            settings.pr_number,
            &settings.ignore_patterns(),
            settings.max_files,
            &counter,
        )
        .await
        .context("failed to fetch PR files")?;

    if files.is_empty() {
        info!("no reviewable files in PR #{}", settings.pr_number);
        return Ok(());
    }

    let client = create_client(&settings.provider_config())?;
    let engine = ReviewEngine::new(client, Arc::clone(&counter), settings.engine.clone());

    let result = engine
        .review(ReviewInput {
            pr_number: settings.pr_number,
            repo: settings.repo.clone(),
            head_sha: pr.head.sha,
            title: pr.title,
            body: pr.body,
            author: pr.user.login,
            additions: pr.additions,
            deletions: pr.deletions,
            files,
            skipped_files: skipped,
        })
        .await;

    let body = report::render(&result);

    // Stale comments from a previous push are noise; clear them first.
    // A cleanup failure is not worth losing the new review over.
    if let Err(err) = gh
        .cleanup_previous_reviews(&settings.repo, settings.pr_number)
        .await
    {
        warn!("cleanup of previous review comments failed: {err:#}");
    }

    gh.post_review(
        &settings.repo,
        settings.pr_number,
        &result.head_sha,
        &body,
        &result.comments,
    )
    .await
    .context("failed to post review")?;

    info!(
        "done: {} comment(s) posted, {:.1}s total",
        result.comments.len(),
        result.duration_seconds
    );
    Ok(())
}
