//! Prompt templates for the review engine.

pub const SYSTEM_PROMPT: &str = "\
You are an expert code reviewer embedded in a pull request workflow. \
Your job is to help developers ship better code faster by providing \
actionable, concise, and accurate review feedback, like a senior \
engineer on the team.

## Principles
1. **Accuracy over volume**: only flag issues you are confident about. \
Never hallucinate issues that don't exist in the code.
2. **Be constructive**: explain why something is a problem and suggest a fix.
3. **Respect intent**: understand what the developer is trying to do before \
critiquing how they did it.
4. **Prioritize impact**: focus on bugs, security issues, and logic errors \
over stylistic preferences.
5. **Skip the obvious**: don't comment on formatting, naming conventions \
(unless truly confusing), or trivial style issues that linters handle.
";

pub const LOGGING_SYSTEM_PROMPT: &str = "\
You are an observability-focused code reviewer. You propose log statements \
for newly added code paths that would otherwise be invisible in production: \
error branches, external calls, retries, and state transitions. You never \
propose logs for trivial code, and you match the logging idioms of the \
language being reviewed.
";

pub fn summary_prompt(
    title: &str,
    description: &str,
    author: &str,
    files_changed: usize,
    additions: u64,
    deletions: u64,
    diff: &str,
) -> String {
    format!(
        "Analyze the following pull request and produce a structured summary.\n\
         \n\
         ## PR Metadata\n\
         - **Title:** {title}\n\
         - **Description:** {description}\n\
         - **Author:** {author}\n\
         - **Files changed:** {files_changed}\n\
         - **Additions:** +{additions} / **Deletions:** -{deletions}\n\
         \n\
         ## Diff\n\
         ```\n\
         {diff}\n\
         ```\n\
         \n\
         ## Instructions\n\
         Respond with a JSON object matching this exact schema (no markdown fences):\n\
         {{\n\
           \"purpose\": \"<1-2 sentence summary of what this PR does and why>\",\n\
           \"changes\": [\"<concise description of each logical change>\"],\n\
           \"key_files\": [\"<most important files changed>\"],\n\
           \"risk_areas\": [\"<areas that need careful human review, if any>\"],\n\
           \"test_coverage_note\": \"<brief note on test changes, or 'No test changes' if none>\"\n\
         }}\n\
         \n\
         Be concise. Each change description should be one sentence max.\n"
    )
}

pub fn review_prompt(
    title: &str,
    purpose: &str,
    filename: &str,
    language: &str,
    patch: &str,
    max_comments: usize,
) -> String {
    format!(
        "Review the following code changes from a pull request and identify real issues.\n\
         \n\
         ## PR Context\n\
         - **Title:** {title}\n\
         - **Purpose:** {purpose}\n\
         - **File:** `{filename}` ({language})\n\
         \n\
         ## Diff (unified format)\n\
         ```{language}\n\
         {patch}\n\
         ```\n\
         \n\
         ## Instructions\n\
         Analyze ONLY the added/modified lines (lines starting with `+`). For each \
         genuine issue found, produce a JSON object. Respond with a JSON array \
         (no markdown fences):\n\
         \n\
         [\n\
           {{\n\
             \"line\": <line number in the new file where the issue exists>,\n\
             \"severity\": \"critical|warning|suggestion|nitpick\",\n\
             \"category\": \"bug_risk|security|performance|maintainability|error_handling|best_practice|logic|concurrency|resource_management\",\n\
             \"body\": \"<markdown comment explaining the issue and suggesting a fix>\"\n\
           }}\n\
         ]\n\
         \n\
         ## Rules\n\
         - Return `[]` if there are no real issues. Empty is better than false positives.\n\
         - Flag at most {max_comments} issues; pick the ones with the highest impact.\n\
         - `line` must reference a line that was added or modified (a `+` line).\n\
         - For `critical` and `warning`: explain the concrete impact (e.g. possible \
         null pointer, data race, SQL injection).\n\
         - For `suggestion`: explain the benefit of the change.\n\
         - Keep comments under 4 sentences. Include a code suggestion if helpful.\n\
         - Do NOT flag: formatting, import order, minor naming, TODOs, missing \
         comments, or issues in deleted code.\n"
    )
}

/// Trimmed prompt for small changes: no PR context, saves tokens on the
/// lightweight tier.
pub fn lightweight_review_prompt(filename: &str, language: &str, patch: &str) -> String {
    format!(
        "Quickly scan the following diff for any obvious bugs, security issues, or \
         critical errors. Only flag clear, high-confidence problems.\n\
         \n\
         File: `{filename}` ({language})\n\
         \n\
         ```{language}\n\
         {patch}\n\
         ```\n\
         \n\
         Respond with a JSON array of issues (or `[]` if none):\n\
         [{{\"line\": <int>, \"severity\": \"critical|warning\", \"category\": \"<category>\", \"body\": \"<explanation>\"}}]\n"
    )
}

pub fn logging_prompt(filename: &str, language: &str, patch: &str) -> String {
    format!(
        "Suggest log statements for the added code in this diff, if any are genuinely \
         useful for production debugging.\n\
         \n\
         File: `{filename}` ({language})\n\
         \n\
         ```{language}\n\
         {patch}\n\
         ```\n\
         \n\
         Respond with a JSON array (or `[]` if nothing is worth logging):\n\
         [\n\
           {{\n\
             \"line\": <line number in the new file where the log belongs>,\n\
             \"level\": \"error|warn|info|debug\",\n\
             \"log_statement\": \"<the exact log statement to add, in {language}>\",\n\
             \"reason\": \"<one sentence on why this log helps>\"\n\
           }}\n\
         ]\n\
         \n\
         Rules:\n\
         - Only suggest logs on `+` lines.\n\
         - Prefer error branches, external calls, and state transitions.\n\
         - At most 3 suggestions per file.\n"
    )
}
