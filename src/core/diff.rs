use glob::Pattern;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Mapping from new-file line number to the raw added diff line
/// (including its leading `+`). Only added lines are keys: these are
/// the only positions a review comment may anchor to.
pub type LineMap = BTreeMap<u64, String>;

static HUNK_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,\d+)? @@").unwrap());

/// Parse a unified diff patch into a line map for added lines.
///
/// New-file line numbering advances on context and added lines; pure
/// deletions do not exist in the new file and never advance the counter.
pub fn parse_patch_line_map(patch: &str) -> LineMap {
    let mut line_map = LineMap::new();
    let mut current_line: u64 = 0;

    for raw_line in patch.lines() {
        if let Some(caps) = HUNK_HEADER_RE.captures(raw_line) {
            current_line = caps[1].parse().unwrap_or(0);
            continue;
        }

        if raw_line.starts_with('+') && !raw_line.starts_with("+++") {
            line_map.insert(current_line, raw_line.to_string());
            current_line += 1;
        } else if raw_line.starts_with('-') && !raw_line.starts_with("---") {
            // Deleted lines don't advance the new-file counter
        } else {
            current_line += 1;
        }
    }

    line_map
}

/// Source content of an added line, without the `+` diff marker.
pub fn extract_line_content(line: u64, line_map: &LineMap) -> Option<&str> {
    let raw = line_map.get(&line)?;
    Some(raw.strip_prefix('+').unwrap_or(raw))
}

/// Find the closest valid diff line within 3 lines of the target.
///
/// Models frequently report line numbers that are off by one or two;
/// checking +1, -1, +2, -2, +3, -3 in order recovers those findings
/// instead of discarding them.
pub fn find_closest_line(target: u64, line_map: &LineMap) -> Option<u64> {
    if line_map.is_empty() {
        return None;
    }
    if line_map.contains_key(&target) {
        return Some(target);
    }
    for offset in 1..=3 {
        if line_map.contains_key(&(target + offset)) {
            return Some(target + offset);
        }
        if let Some(below) = target.checked_sub(offset) {
            if line_map.contains_key(&below) {
                return Some(below);
            }
        }
    }
    None
}

// ── Language detection ──────────────────────────────────────────────────

const EXT_TO_LANG: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("jsx", "javascript"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("go", "go"),
    ("rs", "rust"),
    ("rb", "ruby"),
    ("scala", "scala"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("h", "c"),
    ("hpp", "cpp"),
    ("cs", "csharp"),
    ("swift", "swift"),
    ("sh", "bash"),
    ("sql", "sql"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("json", "json"),
    ("toml", "toml"),
    ("xml", "xml"),
    ("html", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("tf", "hcl"),
    ("proto", "protobuf"),
    ("dart", "dart"),
    ("lua", "lua"),
    ("php", "php"),
    ("r", "r"),
    ("ex", "elixir"),
    ("exs", "elixir"),
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "bmp", "woff", "woff2", "ttf", "eot",
    "otf", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "pdf", "doc", "docx", "xls", "xlsx",
    "pptx", "pyc", "class", "o", "so", "dll", "exe", "dylib", "db", "sqlite", "sqlite3",
];

pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "*.lock",
    "*.min.js",
    "*.min.css",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "go.sum",
    "Cargo.lock",
    "*.pb.go",
    "*.generated.*",
    "*.snap",
    "__snapshots__/*",
    "*.map",
];

fn extension(filename: &str) -> &str {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[idx + 1..],
        _ => "",
    }
}

/// Language tag for a file path, or "" if the extension is unknown.
pub fn detect_language(filename: &str) -> &'static str {
    let ext = extension(filename).to_lowercase();
    EXT_TO_LANG
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
        .unwrap_or("")
}

pub fn is_binary(filename: &str) -> bool {
    let ext = extension(filename).to_lowercase();
    BINARY_EXTENSIONS.contains(&ext.as_str())
}

/// True if the file matches any ignore glob, checked against both the
/// bare filename and the full path.
pub fn should_skip_file(filename: &str, ignore_patterns: &[String]) -> bool {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    ignore_patterns.iter().any(|pattern| {
        Pattern::new(pattern)
            .map(|p| p.matches(name) || p.matches(filename))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn detect_language_known_extensions() {
        assert_eq!(detect_language("src/main.py"), "python");
        assert_eq!(detect_language("components/App.tsx"), "typescript");
        assert_eq!(detect_language("cmd/server/main.go"), "go");
        assert_eq!(detect_language("a/b/c/d.java"), "java");
    }

    #[test]
    fn detect_language_unknown_extension_is_empty() {
        assert_eq!(detect_language("Makefile"), "");
    }

    #[test]
    fn is_binary_by_extension() {
        assert!(is_binary("logo.png"));
        assert!(is_binary("font.woff2"));
        assert!(is_binary("data.sqlite3"));
        assert!(!is_binary("main.py"));
    }

    #[test]
    fn should_skip_exact_and_glob() {
        assert!(should_skip_file(
            "package-lock.json",
            &patterns(&["package-lock.json"])
        ));
        assert!(should_skip_file("styles.min.css", &patterns(&["*.min.css"])));
        assert!(!should_skip_file(
            "main.py",
            &patterns(&["*.lock", "*.min.js"])
        ));
    }

    #[test]
    fn should_skip_matches_bare_filename_in_nested_path() {
        assert!(should_skip_file("vendor/go.sum", &patterns(&["go.sum"])));
    }

    #[test]
    fn line_map_simple_addition() {
        let patch = "@@ -1,3 +1,4 @@\n line1\n+added_line\n line2\n line3\n";
        let map = parse_patch_line_map(patch);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&2).map(String::as_str), Some("+added_line"));
    }

    #[test]
    fn line_map_multiple_hunks() {
        let patch = "@@ -1,3 +1,4 @@\n ctx\n+a\n ctx\n@@ -10,3 +11,4 @@\n ctx\n+b\n ctx\n";
        let map = parse_patch_line_map(patch);
        assert_eq!(map.get(&2).map(String::as_str), Some("+a"));
        assert_eq!(map.get(&12).map(String::as_str), Some("+b"));
    }

    #[test]
    fn line_map_deletions_only_is_empty() {
        let patch = "@@ -1,3 +1,2 @@\n context\n-removed_line\n context\n";
        assert!(parse_patch_line_map(patch).is_empty());
    }

    #[test]
    fn line_map_mixed_changes() {
        let patch = "@@ -1,4 +1,5 @@\n ctx\n-old\n+new\n+extra\n ctx\n";
        let map = parse_patch_line_map(patch);
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(&2));
        assert!(map.contains_key(&3));
    }

    #[test]
    fn line_map_never_duplicates_keys() {
        let patch = "@@ -1,2 +1,4 @@\n ctx\n+one\n+two\n+three\n";
        let map = parse_patch_line_map(patch);
        assert_eq!(map.len(), 3);
        let keys: Vec<u64> = map.keys().copied().collect();
        assert_eq!(keys, vec![2, 3, 4]);
    }

    #[test]
    fn closest_line_exact_match() {
        let mut map = LineMap::new();
        for n in 10..=12 {
            map.insert(n, "+code".into());
        }
        assert_eq!(find_closest_line(11, &map), Some(11));
    }

    #[test]
    fn closest_line_prefers_positive_offset_first() {
        let mut map = LineMap::new();
        map.insert(10, "+code".into());
        map.insert(12, "+code".into());
        assert_eq!(find_closest_line(11, &map), Some(12));
    }

    #[test]
    fn closest_line_boundary_offset_three_hits_four_misses() {
        let mut map = LineMap::new();
        map.insert(10, "+code".into());
        assert_eq!(find_closest_line(13, &map), Some(10));
        assert_eq!(find_closest_line(14, &map), None);
    }

    #[test]
    fn closest_line_empty_map() {
        assert_eq!(find_closest_line(10, &LineMap::new()), None);
    }

    #[test]
    fn closest_line_near_zero_does_not_underflow() {
        let mut map = LineMap::new();
        map.insert(4, "+code".into());
        assert_eq!(find_closest_line(1, &map), Some(4));
    }

    #[test]
    fn extract_content_strips_plus() {
        let mut map = LineMap::new();
        map.insert(5, "+    int x = 10;".into());
        assert_eq!(extract_line_content(5, &map), Some("    int x = 10;"));
        assert_eq!(extract_line_content(99, &map), None);
    }

    #[test]
    fn extract_content_empty_added_line() {
        let mut map = LineMap::new();
        map.insert(3, "+".into());
        assert_eq!(extract_line_content(3, &map), Some(""));
    }
}
