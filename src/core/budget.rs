use anyhow::{Context, Result};
use tiktoken_rs::CoreBPE;

use crate::core::models::{FileDiff, FileStatus};

/// Deterministic token estimator backed by the cl100k_base encoding.
///
/// Constructed once at startup and passed by reference; loading the
/// encoding is expensive.
pub struct TokenCounter {
    bpe: CoreBPE,
}

impl TokenCounter {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().context("failed to load cl100k_base encoding")?;
        Ok(Self { bpe })
    }

    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Build a combined diff string for the summary prompt within a token
/// budget.
///
/// Removed files are consolidated into a single compact line. Active
/// files are packed largest-change-first; a file that would blow the
/// budget is deferred to an overflow list rather than truncating the
/// packing, so a smaller later file may still fit. Every file is at
/// least named somewhere in the output.
pub fn compress_diff_for_summary(
    files: &[FileDiff],
    max_tokens: usize,
    counter: &TokenCounter,
) -> String {
    let removed: Vec<&FileDiff> = files
        .iter()
        .filter(|f| f.status == FileStatus::Removed)
        .collect();
    let mut active: Vec<&FileDiff> = files
        .iter()
        .filter(|f| f.status != FileStatus::Removed)
        .collect();
    active.sort_by(|a, b| b.additions.cmp(&a.additions));

    let mut parts: Vec<String> = Vec::new();
    let mut used_tokens = 0usize;
    let mut overflow: Vec<&str> = Vec::new();

    if !removed.is_empty() {
        let names: Vec<&str> = removed.iter().map(|f| f.filename.as_str()).collect();
        let removed_list = format!("Deleted files: {}", names.join(", "));
        used_tokens += counter.count(&removed_list);
        parts.push(removed_list);
    }

    for f in active {
        let entry = format!(
            "--- {} ({}, +{}/-{})\n{}",
            f.filename,
            f.status.as_str(),
            f.additions,
            f.deletions,
            f.patch.as_deref().unwrap_or(""),
        );
        let entry_tokens = counter.count(&entry);

        if used_tokens + entry_tokens > max_tokens {
            overflow.push(&f.filename);
            continue;
        }

        parts.push(entry);
        used_tokens += entry_tokens;
    }

    if !overflow.is_empty() {
        let shown: Vec<&str> = overflow.iter().take(10).copied().collect();
        let suffix = if overflow.len() > 10 { " ...]" } else { "]" };
        parts.push(format!(
            "\n[{} additional file(s) not shown: {}{}",
            overflow.len(),
            shown.join(", "),
            suffix
        ));
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, status: FileStatus, additions: u64, patch: &str) -> FileDiff {
        FileDiff {
            filename: name.to_string(),
            status,
            additions,
            deletions: 0,
            patch: if patch.is_empty() {
                None
            } else {
                Some(patch.to_string())
            },
            previous_filename: None,
            language: String::new(),
            token_count: 0,
        }
    }

    #[test]
    fn count_is_positive_and_empty_is_zero() {
        let counter = TokenCounter::new().unwrap();
        assert!(counter.count("Hello, world!") > 0);
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn count_is_stable_across_calls() {
        let counter = TokenCounter::new().unwrap();
        let text = "fn main() { println!(\"hi\"); }";
        assert_eq!(counter.count(text), counter.count(text));
    }

    #[test]
    fn fits_within_budget() {
        let counter = TokenCounter::new().unwrap();
        let files = vec![file(
            "main.py",
            FileStatus::Modified,
            5,
            "@@ -1,3 +1,4 @@\n context\n+added\n context",
        )];
        let result = compress_diff_for_summary(&files, 1000, &counter);
        assert!(result.contains("main.py"));
        assert!(result.contains("+added"));
    }

    #[test]
    fn overflow_files_are_named_not_silently_dropped() {
        let counter = TokenCounter::new().unwrap();
        let big_patch = "x".repeat(5000);
        let files: Vec<FileDiff> = (0..20)
            .map(|i| file(&format!("file{i}.py"), FileStatus::Modified, 100, &big_patch))
            .collect();
        let result = compress_diff_for_summary(&files, 100, &counter);
        assert!(result.contains("additional file(s) not shown"));
        // More than 10 overflow entries get the truncation marker
        assert!(result.contains(" ...]"));
        assert!(result.contains("file0.py"));
    }

    #[test]
    fn packed_entries_recount_within_budget() {
        let counter = TokenCounter::new().unwrap();
        let files: Vec<FileDiff> = (0..10)
            .map(|i| {
                let patch = format!(
                    "@@ -1,2 +1,{} @@\n{}",
                    i + 3,
                    "+value = compute_next_value()\n".repeat(i + 2)
                );
                file(&format!("mod{i}.py"), FileStatus::Modified, (10 - i) as u64, &patch)
            })
            .collect();
        let max_tokens = 150;
        let result = compress_diff_for_summary(&files, max_tokens, &counter);
        assert!(result.contains("additional file(s) not shown"));
        // The packed portion (everything before the overflow notice)
        // must itself fit the budget when recounted.
        let packed = result.split("\n\n\n[").next().unwrap();
        assert!(
            counter.count(packed) <= max_tokens,
            "packed output exceeds budget: {} > {max_tokens}",
            counter.count(packed)
        );
    }

    #[test]
    fn removed_files_consolidated_into_one_line() {
        let counter = TokenCounter::new().unwrap();
        let files = vec![
            file("old.py", FileStatus::Removed, 0, ""),
            file("new.py", FileStatus::Added, 10, "+line"),
        ];
        let result = compress_diff_for_summary(&files, 5000, &counter);
        assert!(result.contains("Deleted files: old.py"));
        assert!(result.contains("new.py"));
    }

    #[test]
    fn smaller_file_still_packed_after_larger_one_skipped() {
        let counter = TokenCounter::new().unwrap();
        let files = vec![
            file("huge.py", FileStatus::Modified, 500, &"y ".repeat(4000)),
            file("tiny.py", FileStatus::Modified, 1, "+x = 1"),
        ];
        let result = compress_diff_for_summary(&files, 60, &counter);
        assert!(result.contains("+x = 1"));
        assert!(result.contains("not shown: huge.py"));
    }

    #[test]
    fn every_file_appears_somewhere() {
        let counter = TokenCounter::new().unwrap();
        let files = vec![
            file("kept.py", FileStatus::Modified, 3, "+small"),
            file("gone.py", FileStatus::Removed, 0, ""),
            file("big.py", FileStatus::Modified, 200, &"z ".repeat(4000)),
        ];
        let result = compress_diff_for_summary(&files, 80, &counter);
        for name in ["kept.py", "gone.py", "big.py"] {
            assert!(result.contains(name), "missing {name}");
        }
    }
}
