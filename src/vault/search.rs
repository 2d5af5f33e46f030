//! Full-text search and tag search across vault notes.

use std::fs;

use regex::Regex;
use serde::Serialize;
use serde_yaml::Value;

use super::{frontmatter, Vault, MAX_SCAN_DEPTH};

/// Matching lines are capped per note to keep result payloads bounded.
const MAX_MATCHES_PER_NOTE: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    /// 1-based line number of the match.
    pub line_number: usize,
    pub line: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteMatches {
    /// Path relative to vault root.
    pub path: String,
    pub matches: Vec<SearchMatch>,
}

/// Case-insensitive substring search over note content.
///
/// At most `MAX_MATCHES_PER_NOTE` lines are reported per note, and the scan
/// stops after `max_results` notes have matched. Unreadable notes are
/// skipped.
pub fn search_notes(
    vault: &Vault,
    query: &str,
    folder: &str,
    max_results: usize,
) -> Vec<NoteMatches> {
    let query_lower = query.to_lowercase();
    let mut results = Vec::new();

    for note in vault.iter_notes(folder, true, MAX_SCAN_DEPTH) {
        let Ok(content) = fs::read_to_string(&note) else {
            continue;
        };

        let matches: Vec<SearchMatch> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| line.to_lowercase().contains(&query_lower))
            .take(MAX_MATCHES_PER_NOTE)
            .map(|(i, line)| SearchMatch {
                line_number: i + 1,
                line: line.trim().to_string(),
            })
            .collect();

        if !matches.is_empty() {
            results.push(NoteMatches {
                path: vault.relative(&note),
                matches,
            });
        }

        if results.len() >= max_results {
            break;
        }
    }

    results
}

/// Find notes carrying a tag, either in the frontmatter `tags` property or
/// inline as `#tag`. The leading `#` on the query is optional; nested tags
/// like `project/active` work.
pub fn search_by_tag(vault: &Vault, tag: &str) -> Vec<String> {
    let tag = tag.trim_start_matches('#');
    let tag_lower = tag.to_lowercase();

    // Inline form: the tag bounded by non-word characters. (The regex crate
    // has no lookaround, so the boundaries are matched explicitly.)
    let inline_pattern = Regex::new(&format!(
        r"(?i)(?:^|[^\w])#{}(?:[^\w]|$)",
        regex::escape(tag)
    ))
    .expect("escaped tag pattern is always valid");

    let mut results = Vec::new();
    for note in vault.iter_notes("", true, MAX_SCAN_DEPTH) {
        let Ok(content) = fs::read_to_string(&note) else {
            continue;
        };

        let (meta, _body) = frontmatter::parse(&content);
        let mut found = meta
            .as_ref()
            .and_then(|m| m.get(&Value::String("tags".into())))
            .map(|tags| frontmatter_tag_matches(tags, &tag_lower))
            .unwrap_or(false);

        if !found && inline_pattern.is_match(&content) {
            found = true;
        }

        if found {
            results.push(vault.relative(&note));
        }
    }

    results
}

/// `tags` may be a single string or a sequence of strings.
fn frontmatter_tag_matches(tags: &Value, tag_lower: &str) -> bool {
    match tags {
        Value::String(s) => s.to_lowercase() == tag_lower,
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str())
            .any(|s| s.to_lowercase() == tag_lower),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{sample_vault, write_note};
    use super::*;

    #[test]
    fn search_finds_substring_case_insensitive() {
        let (_dir, vault) = sample_vault();
        let results = search_notes(&vault, "A PROJECT SPEC", "", 20);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "Projects/spec.md");
        assert_eq!(results[0].matches[0].line, "This is a project spec.");
    }

    #[test]
    fn search_reports_line_numbers() {
        let (dir, vault) = sample_vault();
        write_note(dir.path(), "numbered.md", "one\ntwo\nneedle\n");
        let results = search_notes(&vault, "needle", "", 20);
        assert_eq!(results[0].matches[0].line_number, 3);
    }

    #[test]
    fn search_caps_matches_per_note() {
        let (dir, vault) = sample_vault();
        write_note(dir.path(), "many.md", "hit\nhit\nhit\nhit\nhit\n");
        let results = search_notes(&vault, "hit", "", 20);
        assert_eq!(results[0].matches.len(), 3);
    }

    #[test]
    fn search_respects_max_results() {
        let (dir, vault) = sample_vault();
        for i in 0..5 {
            write_note(dir.path(), &format!("common-{i}.md"), "shared term\n");
        }
        let results = search_notes(&vault, "shared term", "", 2);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn search_scoped_to_folder() {
        let (_dir, vault) = sample_vault();
        let results = search_notes(&vault, "archived", "Archive", 20);
        assert_eq!(results.len(), 1);
        assert!(results[0].path.starts_with("Archive/"));
        assert!(search_notes(&vault, "archived", "Projects", 20).is_empty());
    }

    #[test]
    fn search_no_results() {
        let (_dir, vault) = sample_vault();
        assert!(search_notes(&vault, "xyzzy-absent", "", 20).is_empty());
    }

    #[test]
    fn tag_from_frontmatter() {
        let (_dir, vault) = sample_vault();
        let results = search_by_tag(&vault, "project");
        assert_eq!(results, vec!["Projects/spec.md"]);
    }

    #[test]
    fn tag_inline() {
        let (_dir, vault) = sample_vault();
        let results = search_by_tag(&vault, "legacy");
        assert_eq!(results, vec!["Archive/old-stuff.md"]);
    }

    #[test]
    fn tag_leading_hash_stripped() {
        let (_dir, vault) = sample_vault();
        assert_eq!(search_by_tag(&vault, "#legacy"), vec!["Archive/old-stuff.md"]);
    }

    #[test]
    fn tag_case_insensitive() {
        let (_dir, vault) = sample_vault();
        assert_eq!(search_by_tag(&vault, "LEGACY"), vec!["Archive/old-stuff.md"]);
    }

    #[test]
    fn tag_nested() {
        let (dir, vault) = sample_vault();
        write_note(dir.path(), "nested.md", "Work on #project/active today.\n");
        let results = search_by_tag(&vault, "project/active");
        assert_eq!(results, vec!["nested.md"]);
    }

    #[test]
    fn tag_no_partial_word_match() {
        let (dir, vault) = sample_vault();
        write_note(dir.path(), "partial.md", "This mentions #legacycode only.\n");
        let results = search_by_tag(&vault, "legacy");
        // #legacycode must not count as #legacy.
        assert!(!results.contains(&"partial.md".to_string()));
    }

    #[test]
    fn tag_string_frontmatter_value() {
        let (dir, vault) = sample_vault();
        write_note(dir.path(), "single.md", "---\ntags: solo\n---\nbody\n");
        assert_eq!(search_by_tag(&vault, "solo"), vec!["single.md"]);
    }

    #[test]
    fn tag_none_found() {
        let (_dir, vault) = sample_vault();
        assert!(search_by_tag(&vault, "nonexistent-tag").is_empty());
    }
}
