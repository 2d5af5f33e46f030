//! Wikilink extraction, resolution, and backlink indexing.
//!
//! No link index is persisted; every query re-scans the tree through the
//! vault's traversal primitives.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use super::{Vault, VaultError, MAX_SCAN_DEPTH};

// Matches [[Note]], [[Note|Alias]], [[Note#Heading]], [[Note#^block]], ![[Embed]]
static WIKILINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!?)\[\[([^\]|#^]+)(?:#[^\]|]*)?(?:\|[^\]]+)?\]\]").unwrap()
});

/// A single wikilink occurrence: the bare target (alias, heading, and block
/// qualifiers stripped) and whether it was an embed (`![[...]]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wikilink {
    pub target: String,
    pub embed: bool,
}

/// Extract all wikilinks from note content, in order of appearance,
/// duplicates included.
pub fn extract_wikilinks(content: &str) -> Vec<Wikilink> {
    WIKILINK_RE
        .captures_iter(content)
        .map(|caps| Wikilink {
            target: caps[2].to_string(),
            embed: !caps[1].is_empty(),
        })
        .collect()
}

/// An outgoing link from a note: the target as written, plus the
/// vault-relative path it resolves to (`None` for a broken link).
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingLink {
    pub target: String,
    pub resolved: Option<String>,
}

/// Resolve every wikilink target in a note, deduplicated case-insensitively
/// with first-seen order preserved.
///
/// Returns the source note's vault-relative path and its links. Fails with
/// `NotFound` only when the source itself does not resolve.
pub fn outgoing_links(
    vault: &Vault,
    reference: &str,
) -> Result<(String, Vec<OutgoingLink>), VaultError> {
    let resolved = vault
        .resolve(reference)
        .ok_or_else(|| VaultError::NotFound(reference.to_string()))?;

    let content = fs::read_to_string(&resolved)?;
    let mut seen: Vec<String> = Vec::new();
    let mut links = Vec::new();
    for link in extract_wikilinks(&content) {
        let lower = link.target.to_lowercase();
        if seen.contains(&lower) {
            continue;
        }
        seen.push(lower);
        let resolved_target = vault.resolve(&link.target).map(|p| vault.relative(&p));
        links.push(OutgoingLink {
            target: link.target,
            resolved: resolved_target,
        });
    }

    Ok((vault.relative(&resolved), links))
}

/// A note referencing the query target, with one line of surrounding
/// context when a containing line could be located.
#[derive(Debug, Clone, Serialize)]
pub struct Backlink {
    pub path: String,
    pub context: Option<String>,
}

/// Find every note whose wikilinks reference the given note.
///
/// Matching is by base name, case-insensitive, tolerating folder-qualified
/// references (`[[Projects/ideas]]` matches a target named `ideas`).
/// Unreadable notes are skipped. Returns the resolved target's
/// vault-relative path and the matches.
pub fn backlinks(
    vault: &Vault,
    reference: &str,
) -> Result<(String, Vec<Backlink>), VaultError> {
    let resolved = vault
        .resolve(reference)
        .ok_or_else(|| VaultError::NotFound(reference.to_string()))?;

    let target_name = resolved
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let qualified_suffix = format!("/{target_name}");

    let mut results = Vec::new();
    for note in vault.iter_notes("", true, MAX_SCAN_DEPTH) {
        if note == resolved {
            continue;
        }
        let Ok(content) = fs::read_to_string(&note) else {
            continue;
        };

        for link in extract_wikilinks(&content) {
            let lower = link.target.to_lowercase();
            if lower != target_name && !lower.ends_with(&qualified_suffix) {
                continue;
            }
            let needle = format!("[[{}", link.target);
            let context = content
                .lines()
                .find(|line| line.contains(&needle))
                .map(|line| line.trim().to_string());
            results.push(Backlink {
                path: vault.relative(&note),
                context,
            });
            break;
        }
    }

    Ok((vault.relative(&resolved), results))
}

/// Rewrite every wikilink referencing `old_name` to point at `new_name`,
/// preserving aliases, headings, and block refs after the target.
///
/// Only files whose content actually changes are written back. Per-file
/// read or write failures skip that file rather than aborting the sweep.
/// Returns the number of files modified. `skip` exempts one path (the
/// freshly moved note during rename propagation).
pub fn update_wikilinks(
    vault: &Vault,
    old_name: &str,
    new_name: &str,
    skip: Option<&Path>,
) -> usize {
    let pattern = Regex::new(&format!(
        r"(?i)\[\[{}(\]\]|\||#)",
        regex::escape(old_name)
    ))
    .expect("escaped link pattern is always valid");

    let mut updated = 0;
    for note in vault.iter_notes("", true, MAX_SCAN_DEPTH) {
        if skip.is_some_and(|s| note == s) {
            continue;
        }
        let Ok(content) = fs::read_to_string(&note) else {
            continue;
        };

        let new_content =
            pattern.replace_all(&content, |caps: &regex::Captures| {
                format!("[[{}{}", new_name, &caps[1])
            });
        if new_content != content {
            if let Err(e) = fs::write(&note, new_content.as_bytes()) {
                warn!(path = %note.display(), error = %e, "skipping link rewrite");
                continue;
            }
            updated += 1;
        }
    }

    updated
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::super::testutil::{sample_vault, write_note};
    use super::*;

    fn targets(content: &str) -> Vec<String> {
        extract_wikilinks(content).into_iter().map(|l| l.target).collect()
    }

    #[test]
    fn extract_basic() {
        assert_eq!(targets("See [[My Note]] here."), vec!["My Note"]);
    }

    #[test]
    fn extract_aliased() {
        assert_eq!(targets("See [[My Note|display text]] here."), vec!["My Note"]);
    }

    #[test]
    fn extract_heading() {
        assert_eq!(targets("See [[My Note#Section]] here."), vec!["My Note"]);
    }

    #[test]
    fn extract_block_ref() {
        assert_eq!(targets("See [[My Note#^block-id]] here."), vec!["My Note"]);
    }

    #[test]
    fn extract_embed_flag() {
        let links = extract_wikilinks("![[Image]] and [[Plain]]");
        assert_eq!(links[0], Wikilink { target: "Image".into(), embed: true });
        assert_eq!(links[1], Wikilink { target: "Plain".into(), embed: false });
    }

    #[test]
    fn extract_ordered_with_qualifiers() {
        let content = "Link to [[A]] and [[B|alias]] and [[C#heading]].";
        assert_eq!(targets(content), vec!["A", "B", "C"]);
    }

    #[test]
    fn extract_duplicates_kept() {
        assert_eq!(targets("[[A]] then [[A]] again"), vec!["A", "A"]);
    }

    #[test]
    fn extract_none() {
        assert!(targets("No links here.").is_empty());
    }

    #[test]
    fn outgoing_resolved_and_broken() {
        let (dir, vault) = sample_vault();
        write_note(
            dir.path(),
            "links.md",
            "[[ideas]] and [[missing-note]] and [[IDEAS|dup alias]]\n",
        );
        let (source, links) = outgoing_links(&vault, "links").unwrap();
        assert_eq!(source, "links.md");
        // Case-insensitive dedup keeps the first spelling only.
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, "ideas");
        assert_eq!(links[0].resolved.as_deref(), Some("Projects/ideas.md"));
        assert_eq!(links[1].target, "missing-note");
        assert!(links[1].resolved.is_none());
    }

    #[test]
    fn outgoing_source_not_found() {
        let (_dir, vault) = sample_vault();
        let err = outgoing_links(&vault, "nonexistent").unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[test]
    fn outgoing_spec_scenario() {
        let (_dir, vault) = sample_vault();
        // Bare note name resolves to Projects/spec.md before link extraction.
        let (source, links) = outgoing_links(&vault, "spec").unwrap();
        assert_eq!(source, "Projects/spec.md");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "ideas");
        assert_eq!(links[0].resolved.as_deref(), Some("Projects/ideas.md"));
    }

    #[test]
    fn backlinks_with_context() {
        let (_dir, vault) = sample_vault();
        let (target, results) = backlinks(&vault, "Projects/ideas").unwrap();
        assert_eq!(target, "Projects/ideas.md");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "Projects/spec.md");
        assert_eq!(results[0].context.as_deref(), Some("See also [[ideas]]."));
    }

    #[test]
    fn backlinks_folder_qualified_reference() {
        let (_dir, vault) = sample_vault();
        // ideas.md links to [[Archive/old-stuff]]
        let (_, results) = backlinks(&vault, "old-stuff").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "Projects/ideas.md");
    }

    #[test]
    fn backlinks_none() {
        let (_dir, vault) = sample_vault();
        let (_, results) = backlinks(&vault, "README").unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn backlinks_symmetry_with_outgoing() {
        let (_dir, vault) = sample_vault();
        let (_, back) = backlinks(&vault, "ideas").unwrap();
        for b in &back {
            let (_, out) = outgoing_links(&vault, &b.path).unwrap();
            assert!(
                out.iter()
                    .any(|l| l.resolved.as_deref() == Some("Projects/ideas.md")),
                "{} should link back to ideas",
                b.path
            );
        }
        assert!(!back.is_empty());
    }

    #[test]
    fn backlinks_skip_unreadable_files() {
        let (dir, vault) = sample_vault();
        fs::write(dir.path().join("garbage.md"), [0xff, 0xfe, 0x00, 0xff]).unwrap();
        // Scan still succeeds and reports the valid backlink.
        let (_, results) = backlinks(&vault, "ideas").unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn update_rewrites_plain_alias_and_heading() {
        let (dir, vault) = sample_vault();
        write_note(
            dir.path(),
            "refs.md",
            "[[ideas]] and [[ideas|the list]] and [[ideas#Top]] and [[ideation]]\n",
        );
        let count = update_wikilinks(&vault, "ideas", "brainstorm", None);
        assert_eq!(count, 2); // refs.md and Projects/spec.md

        let content = fs::read_to_string(dir.path().join("refs.md")).unwrap();
        assert_eq!(
            content,
            "[[brainstorm]] and [[brainstorm|the list]] and [[brainstorm#Top]] and [[ideation]]\n"
        );
        let spec = fs::read_to_string(dir.path().join("Projects/spec.md")).unwrap();
        assert!(spec.contains("[[brainstorm]]"));
        assert!(!spec.contains("[[ideas]]"));
    }

    #[test]
    fn update_is_case_insensitive() {
        let (dir, vault) = sample_vault();
        write_note(dir.path(), "shouty.md", "See [[IDEAS]].\n");
        update_wikilinks(&vault, "ideas", "brainstorm", None);
        let content = fs::read_to_string(dir.path().join("shouty.md")).unwrap();
        assert_eq!(content, "See [[brainstorm]].\n");
    }

    #[test]
    fn update_skips_exempt_path() {
        let (dir, vault) = sample_vault();
        let spec = vault.resolve("Projects/spec").unwrap();
        let count = update_wikilinks(&vault, "ideas", "brainstorm", Some(&spec));
        assert_eq!(count, 0);
        let content = fs::read_to_string(dir.path().join("Projects/spec.md")).unwrap();
        assert!(content.contains("[[ideas]]"));
    }

    #[test]
    fn update_touches_nothing_without_matches() {
        let (_dir, vault) = sample_vault();
        assert_eq!(update_wikilinks(&vault, "no-such-note", "other", None), 0);
    }
}
