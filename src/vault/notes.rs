//! Note read/write/edit operations.

use std::fs;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_yaml::Mapping;

use super::{frontmatter, links, Vault, VaultError};

/// Bodies larger than this are truncated on read.
const MAX_READ_BYTES: usize = 1_000_000;

/// Result of reading a note. Files that are not UTF-8 text (or carry a
/// non-text MIME type) are reported opaquely instead of failing.
#[derive(Debug, Clone)]
pub enum NoteContent {
    Text {
        /// Vault-relative path of the resolved note.
        path: String,
        body: String,
        frontmatter: Option<Mapping>,
        truncated: bool,
    },
    Binary {
        name: String,
        mime: Option<String>,
        size: u64,
    },
}

/// A single text replacement for `edit_note`. Field names match the wire
/// format callers send.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditOp {
    /// The exact text to find (first occurrence is replaced)
    pub old_text: String,
    /// The replacement text
    pub new_text: String,
}

#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub path: String,
    /// Unified diff of the applied (or previewed) edits; empty when the
    /// edits were a no-op.
    pub diff: String,
    pub applied: bool,
}

#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    /// Moved into `.trash/` at this vault-relative location.
    Trashed(String),
    /// Removed permanently (no `.trash/` directory in the vault).
    Deleted(String),
}

#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub from: String,
    pub to: String,
    /// Notes whose wikilinks were rewritten to the new name.
    pub links_updated: usize,
}

/// Read a note, splitting out frontmatter when requested.
pub fn read_note(
    vault: &Vault,
    reference: &str,
    include_frontmatter: bool,
) -> Result<NoteContent, VaultError> {
    let resolved = vault
        .resolve(reference)
        .ok_or_else(|| VaultError::NotFound(reference.to_string()))?;

    let name = resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Non-markdown files with a non-text MIME type are opaque payloads.
    let mime = mime_guess::from_path(&resolved).first();
    let is_md = resolved.extension().and_then(|e| e.to_str()) == Some(super::NOTE_EXTENSION);
    if let Some(ref mime) = mime {
        if mime.type_() != mime_guess::mime::TEXT && !is_md {
            let size = fs::metadata(&resolved)?.len();
            return Ok(NoteContent::Binary {
                name,
                mime: Some(mime.to_string()),
                size,
            });
        }
    }

    let bytes = fs::read(&resolved)?;
    let Ok(mut content) = String::from_utf8(bytes) else {
        let size = fs::metadata(&resolved)?.len();
        return Ok(NoteContent::Binary { name, mime: None, size });
    };

    let mut truncated = false;
    if content.len() > MAX_READ_BYTES {
        let mut end = MAX_READ_BYTES;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        content.truncate(end);
        truncated = true;
    }

    let path = vault.relative(&resolved);
    if include_frontmatter {
        let (meta, body) = frontmatter::parse(&content);
        if meta.is_some() {
            return Ok(NoteContent::Text {
                path,
                body,
                frontmatter: meta,
                truncated,
            });
        }
    }

    Ok(NoteContent::Text {
        path,
        body: content,
        frontmatter: None,
        truncated,
    })
}

/// Create or overwrite a note. Returns the vault-relative path written.
pub fn write_note(vault: &Vault, reference: &str, content: &str) -> Result<String, VaultError> {
    let full = vault.ensure_path(reference)?;
    fs::write(&full, content)?;
    Ok(vault.relative(&full))
}

/// Apply ordered text replacements to a note, first occurrence each.
///
/// Returns a unified diff of the change. With `dry_run` the diff is
/// produced but nothing is written.
pub fn edit_note(
    vault: &Vault,
    reference: &str,
    edits: &[EditOp],
    dry_run: bool,
) -> Result<EditOutcome, VaultError> {
    let resolved = vault
        .resolve(reference)
        .ok_or_else(|| VaultError::NotFound(reference.to_string()))?;

    let original = fs::read_to_string(&resolved)?;
    let mut modified = original.clone();

    for edit in edits {
        if !modified.contains(&edit.old_text) {
            let snippet: String = edit.old_text.chars().take(80).collect();
            return Err(VaultError::EditTextNotFound(snippet));
        }
        modified = modified.replacen(&edit.old_text, &edit.new_text, 1);
    }

    let path = vault.relative(&resolved);
    let diff = similar::TextDiff::from_lines(&original, &modified)
        .unified_diff()
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string();

    let applied = !dry_run && !diff.is_empty();
    if applied {
        fs::write(&resolved, &modified)?;
    }

    Ok(EditOutcome { path, diff, applied })
}

/// Append content to a note, optionally under a heading.
///
/// With a heading, the content is inserted at the end of that heading's
/// section; a missing heading is created at the end of the note. Returns
/// the vault-relative path touched.
pub fn append_to_note(
    vault: &Vault,
    reference: &str,
    content: &str,
    heading: Option<&str>,
    create_if_missing: bool,
) -> Result<String, VaultError> {
    let resolved = match vault.resolve(reference) {
        Some(p) => p,
        None => {
            if !create_if_missing {
                return Err(VaultError::NotFound(reference.to_string()));
            }
            let p = vault.ensure_path(reference)?;
            fs::write(&p, "")?;
            p
        }
    };

    let existing = fs::read_to_string(&resolved)?;

    let Some(heading) = heading else {
        let mut combined = existing;
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(content);
        if !combined.ends_with('\n') {
            combined.push('\n');
        }
        fs::write(&resolved, combined)?;
        return Ok(vault.relative(&resolved));
    };

    let new_content = insert_under_heading(&existing, heading, content);
    fs::write(&resolved, new_content)?;
    Ok(vault.relative(&resolved))
}

/// Insert `content` at the end of `heading`'s section, appending the
/// heading itself at the end of the note when it is not present.
fn insert_under_heading(existing: &str, heading: &str, content: &str) -> String {
    let lines: Vec<&str> = existing.split_inclusive('\n').collect();
    let heading_pattern = heading.trim();

    let mut insert_idx: Option<usize> = None;
    for (i, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        if stripped == heading_pattern
            || stripped == format!("# {heading}")
            || stripped == format!("## {heading}")
            || stripped == format!("### {heading}")
        {
            let level = stripped.chars().take_while(|&c| c == '#').count();
            // Walk forward to the end of this heading's section.
            let mut idx = i + 1;
            for (j, later) in lines.iter().enumerate().skip(i + 1) {
                let sj = later.trim();
                if sj.starts_with('#') {
                    let jlevel = sj.chars().take_while(|&c| c == '#').count();
                    if jlevel <= level {
                        idx = j;
                        break;
                    }
                }
                idx = j + 1;
            }
            insert_idx = Some(idx);
            break;
        }
    }

    match insert_idx {
        None => {
            let mut base = existing.to_string();
            if !base.is_empty() && !base.ends_with('\n') {
                base.push('\n');
            }
            let heading_line = if heading.starts_with('#') {
                heading.to_string()
            } else {
                format!("## {heading}")
            };
            format!("{base}\n{heading_line}\n\n{content}\n")
        }
        Some(idx) => {
            let mut append_text = content.to_string();
            if !append_text.ends_with('\n') {
                append_text.push('\n');
            }
            if idx > 0 && !lines[idx - 1].trim().is_empty() {
                append_text.insert(0, '\n');
            }
            let mut out = String::new();
            for line in &lines[..idx] {
                out.push_str(line);
            }
            out.push_str(&append_text);
            for line in &lines[idx..] {
                out.push_str(line);
            }
            out
        }
    }
}

/// Read a note's frontmatter mapping, if any.
pub fn get_frontmatter(vault: &Vault, reference: &str) -> Result<Option<Mapping>, VaultError> {
    let resolved = vault
        .resolve(reference)
        .ok_or_else(|| VaultError::NotFound(reference.to_string()))?;
    let content = fs::read_to_string(&resolved)?;
    Ok(frontmatter::parse(&content).0)
}

/// Merge properties into a note's frontmatter, creating the block when
/// absent, then drop `remove_keys`. Returns the vault-relative path.
pub fn update_frontmatter(
    vault: &Vault,
    reference: &str,
    properties: &serde_json::Map<String, serde_json::Value>,
    remove_keys: &[String],
) -> Result<String, VaultError> {
    let resolved = vault
        .resolve(reference)
        .ok_or_else(|| VaultError::NotFound(reference.to_string()))?;
    let content = fs::read_to_string(&resolved)?;
    let (meta, body) = frontmatter::parse(&content);
    let mut meta = meta.unwrap_or_default();

    for (key, value) in properties {
        let yaml = serde_yaml::to_value(value).unwrap_or(serde_yaml::Value::Null);
        meta.insert(serde_yaml::Value::String(key.clone()), yaml);
    }
    for key in remove_keys {
        meta.remove(&serde_yaml::Value::String(key.clone()));
    }

    let new_content = frontmatter::dump(&meta, &body);
    fs::write(&resolved, new_content)?;
    Ok(vault.relative(&resolved))
}

/// Delete a note, preferring the vault's `.trash/` folder when it exists.
pub fn delete_note(vault: &Vault, reference: &str) -> Result<DeleteOutcome, VaultError> {
    let resolved = vault
        .resolve(reference)
        .ok_or_else(|| VaultError::NotFound(reference.to_string()))?;
    let rel = vault.relative(&resolved);

    let trash = vault.root().join(".trash");
    if trash.is_dir() {
        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = resolved
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = resolved
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut dest = trash.join(&name);
        let mut counter = 1;
        while dest.exists() {
            dest = trash.join(format!("{stem}_{counter}{ext}"));
            counter += 1;
        }
        fs::rename(&resolved, &dest)?;
        Ok(DeleteOutcome::Trashed(rel))
    } else {
        fs::remove_file(&resolved)?;
        Ok(DeleteOutcome::Deleted(rel))
    }
}

/// Move or rename a note, then rewrite wikilinks across the vault when the
/// base name changed.
pub fn move_note(
    vault: &Vault,
    source: &str,
    destination: &str,
) -> Result<MoveOutcome, VaultError> {
    let resolved_src = vault
        .resolve(source)
        .ok_or_else(|| VaultError::NotFound(source.to_string()))?;
    let resolved_dst = vault.ensure_path(destination)?;

    if resolved_dst.exists() {
        return Err(VaultError::DestinationExists(destination.to_string()));
    }

    let old_name = resolved_src
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let new_name = resolved_dst
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let from = vault.relative(&resolved_src);
    fs::rename(&resolved_src, &resolved_dst)?;

    let links_updated = if old_name != new_name {
        links::update_wikilinks(vault, &old_name, &new_name, Some(&resolved_dst))
    } else {
        0
    };

    Ok(MoveOutcome {
        from,
        to: vault.relative(&resolved_dst),
        links_updated,
    })
}
