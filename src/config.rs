use anyhow::{bail, Result};

use crate::adapters::llm::{Provider, ProviderConfig};
use crate::core::diff::DEFAULT_IGNORE_PATTERNS;
use crate::core::reviewer::EngineOptions;

/// PR authors whose pull requests are never reviewed.
pub const IGNORED_AUTHORS: &[&str] = &[
    "dependabot[bot]",
    "renovate[bot]",
    "github-actions[bot]",
];

/// Fully validated run configuration. The pipeline assumes every field
/// here is usable; anything missing fails before the run starts.
#[derive(Debug, Clone)]
pub struct Settings {
    pub github_token: String,
    pub repo: String,
    pub pr_number: u64,
    pub provider: Provider,
    pub api_key: String,
    pub model_primary: String,
    pub model_lightweight: String,
    pub max_files: usize,
    pub skip_drafts: bool,
    pub engine: EngineOptions,
    pub extra_ignore_patterns: Vec<String>,
}

impl Settings {
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider,
            api_key: self.api_key.clone(),
            base_url: None,
            model_primary: self.model_primary.clone(),
            model_lightweight: self.model_lightweight.clone(),
        }
    }

    /// Built-in skip set plus any caller-supplied extras.
    pub fn ignore_patterns(&self) -> Vec<String> {
        DEFAULT_IGNORE_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .chain(
                self.extra_ignore_patterns
                    .iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            )
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.github_token.is_empty() {
            bail!("GitHub token is empty");
        }
        if self.api_key.is_empty() {
            bail!("API key for {:?} is empty", self.provider);
        }
        if !self.repo.contains('/') {
            bail!("repository must be in owner/repo form, got {:?}", self.repo);
        }
        Ok(())
    }
}

/// Default model pair for a provider, used when the workflow doesn't
/// pin explicit model ids.
pub fn default_models(provider: Provider) -> (&'static str, &'static str) {
    match provider {
        Provider::Anthropic => ("claude-sonnet-4-5-20250929", "claude-haiku-4-5-20251001"),
        Provider::Openai => ("gpt-4o", "gpt-4o-mini"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            github_token: "tok".into(),
            repo: "acme/widgets".into(),
            pr_number: 1,
            provider: Provider::Anthropic,
            api_key: "key".into(),
            model_primary: "m1".into(),
            model_lightweight: "m2".into(),
            max_files: 50,
            skip_drafts: true,
            engine: EngineOptions::default(),
            extra_ignore_patterns: vec![" *.gen.ts ".into(), "".into()],
        }
    }

    #[test]
    fn ignore_patterns_merge_defaults_with_trimmed_extras() {
        let patterns = settings().ignore_patterns();
        assert!(patterns.contains(&"*.lock".to_string()));
        assert!(patterns.contains(&"*.gen.ts".to_string()));
        assert!(!patterns.contains(&"".to_string()));
    }

    #[test]
    fn validate_rejects_bad_repo() {
        let mut s = settings();
        s.repo = "widgets".into();
        assert!(s.validate().is_err());
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn default_models_per_provider() {
        let (primary, light) = default_models(Provider::Openai);
        assert_eq!(primary, "gpt-4o");
        assert_eq!(light, "gpt-4o-mini");
    }
}
