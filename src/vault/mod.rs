pub mod daily;
pub mod frontmatter;
pub mod links;
pub mod notes;
pub mod search;
pub mod templates;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use thiserror::Error;

/// Extension (without dot) that identifies a note file.
pub const NOTE_EXTENSION: &str = "md";

/// Directory names invisible to all traversal and resolution operations.
pub const EXCLUDED_DIRS: &[&str] = &[".obsidian", ".trash", ".git", ".venv", "node_modules"];

/// Depth ceiling for full-tree scans (backlinks, counts, rename propagation).
pub const MAX_SCAN_DEPTH: usize = 100;

/// Error kinds surfaced by vault operations.
///
/// Resolution failure is not an error (`Vault::resolve` returns `Option`);
/// these variants cover the failures callers must distinguish.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("note not found: {0}")]
    NotFound(String),
    #[error("path escapes vault: {0}")]
    PathEscape(String),
    #[error("destination already exists: {0}")]
    DestinationExists(String),
    #[error("text not found in note: {0:?}")]
    EditTextNotFound(String),
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Daily notes settings read from `.obsidian/daily-notes.json`.
#[derive(Debug, Clone)]
pub struct DailyNotesConfig {
    pub folder: String,
    pub format: String,
    pub template: String,
}

/// Templates settings read from `.obsidian/templates.json`.
#[derive(Debug, Clone)]
pub struct TemplatesConfig {
    pub folder: String,
}

/// An Obsidian vault on disk: a canonicalized root directory plus the
/// resolution and traversal primitives everything else is built on.
///
/// No state besides the root is held; every listing and resolution is a
/// fresh filesystem walk.
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    /// Open a vault at the given directory. The path must exist.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let root = path
            .canonicalize()
            .with_context(|| format!("vault path does not exist: {}", path.display()))?;
        anyhow::ensure!(
            root.is_dir(),
            "vault path is not a directory: {}",
            root.display()
        );
        Ok(Self { root })
    }

    /// The canonical vault root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert an absolute path back to a vault-relative string.
    pub fn relative(&self, abs: &Path) -> String {
        abs.strip_prefix(&self.root)
            .unwrap_or(abs)
            .to_string_lossy()
            .into_owned()
    }

    // -- resolution ---------------------------------------------------------

    /// Resolve a vault-relative path or bare note name to an absolute path.
    ///
    /// Resolution order (mirrors Obsidian):
    /// 1. Exact path match
    /// 2. Exact path match with the note extension appended
    /// 3. Basename match anywhere in the tree (lexicographically smallest
    ///    path wins when several files share the name)
    /// 4. Case-insensitive basename match, first in traversal order
    ///
    /// Every candidate is canonicalized and must remain inside the root;
    /// candidates escaping via `..` or symlinks are treated as non-matches.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let reference = reference.trim_matches('/');

        // 1. Exact match
        let candidate = self.root.join(reference);
        if candidate.is_file() {
            if let Some(resolved) = self.contained(&candidate) {
                return Some(resolved);
            }
        }

        // 2. With the note extension appended
        if !has_note_extension(reference) {
            let candidate = self.root.join(format!("{reference}.{NOTE_EXTENSION}"));
            if candidate.is_file() {
                if let Some(resolved) = self.contained(&candidate) {
                    return Some(resolved);
                }
            }
        }

        // 3 + 4. Basename search across the whole tree. The walk is sorted,
        // so the first exact match is also the lexicographically smallest.
        let mut basename = Path::new(reference)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !has_note_extension(&basename) {
            basename.push('.');
            basename.push_str(NOTE_EXTENSION);
        }
        let basename_lower = basename.to_lowercase();

        let mut case_insensitive_hit: Option<PathBuf> = None;
        for entry in self.build_walker(&self.root, None) {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name == basename {
                if let Some(resolved) = self.contained(entry.path()) {
                    return Some(resolved);
                }
            }
            if case_insensitive_hit.is_none() && name.to_lowercase() == basename_lower {
                if let Some(resolved) = self.contained(entry.path()) {
                    case_insensitive_hit = Some(resolved);
                }
            }
        }

        case_insensitive_hit
    }

    /// Derive the absolute write path for a vault-relative reference,
    /// creating missing parent directories.
    ///
    /// Appends the note extension if absent. Does not check whether the
    /// file itself exists. Fails with `PathEscape` when the derived path
    /// would leave the vault.
    pub fn ensure_path(&self, reference: &str) -> Result<PathBuf, VaultError> {
        let trimmed = reference.trim_matches('/');
        let mut rel = trimmed.to_string();
        if !has_note_extension(&rel) {
            rel.push('.');
            rel.push_str(NOTE_EXTENSION);
        }
        let full = self.root.join(&rel);

        if !self.would_stay_within(&full) {
            return Err(VaultError::PathEscape(reference.to_string()));
        }

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(full)
    }

    /// Canonicalize an existing candidate and verify it lies inside the root.
    fn contained(&self, candidate: &Path) -> Option<PathBuf> {
        let resolved = candidate.canonicalize().ok()?;
        resolved.starts_with(&self.root).then_some(resolved)
    }

    /// Containment check for paths that may not exist yet: canonicalize the
    /// deepest existing ancestor, re-append the missing components, and
    /// verify the result stays under the root.
    fn would_stay_within(&self, path: &Path) -> bool {
        let mut existing = path.to_path_buf();
        let mut remainder: Vec<std::ffi::OsString> = Vec::new();
        while !existing.exists() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    remainder.push(name.to_os_string());
                    existing = parent.to_path_buf();
                }
                // Ran out of parents, or hit a `..`/`.` component that
                // cannot be split off; reject rather than guess.
                _ => return false,
            }
        }
        let Ok(mut resolved) = existing.canonicalize() else {
            return false;
        };
        for part in remainder.iter().rev() {
            resolved.push(part);
        }
        resolved.starts_with(&self.root)
    }

    // -- traversal ----------------------------------------------------------

    /// Note files (`.md`) in a folder, sorted. Shallow unless `recursive`,
    /// in which case the walk is bounded by `max_depth` path segments below
    /// the folder. A missing folder yields an empty list.
    pub fn iter_notes(&self, folder: &str, recursive: bool, max_depth: usize) -> Vec<PathBuf> {
        self.iter_filtered(folder, recursive, max_depth, true)
    }

    /// All files and directories in a folder, same traversal rules as
    /// `iter_notes`.
    pub fn iter_entries(&self, folder: &str, recursive: bool, max_depth: usize) -> Vec<PathBuf> {
        self.iter_filtered(folder, recursive, max_depth, false)
    }

    fn iter_filtered(
        &self,
        folder: &str,
        recursive: bool,
        max_depth: usize,
        notes_only: bool,
    ) -> Vec<PathBuf> {
        let base = if folder.is_empty() {
            self.root.clone()
        } else {
            self.root.join(folder.trim_matches('/'))
        };
        if !base.is_dir() {
            return Vec::new();
        }
        // The listing base itself must be inside the vault and not inside
        // an excluded subtree.
        let Some(base) = self.contained(&base) else {
            return Vec::new();
        };
        let base_rel = self.relative(&base);
        if base_rel
            .split('/')
            .any(|part| EXCLUDED_DIRS.contains(&part))
        {
            return Vec::new();
        }

        let mut results = Vec::new();
        if recursive {
            for entry in self.build_walker(&base, Some(max_depth)) {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => continue,
                };
                let path = entry.path();
                if path == base {
                    continue;
                }
                let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
                if notes_only && !(is_file && is_note(path)) {
                    continue;
                }
                results.push(path.to_path_buf());
            }
        } else {
            let Ok(read_dir) = fs::read_dir(&base) else {
                return Vec::new();
            };
            for entry in read_dir.flatten() {
                let path = entry.path();
                let name = entry.file_name();
                if let Some(name) = name.to_str() {
                    if EXCLUDED_DIRS.contains(&name) {
                        continue;
                    }
                }
                if notes_only && !(path.is_file() && is_note(&path)) {
                    continue;
                }
                results.push(path);
            }
            results.sort();
        }
        results
    }

    fn build_walker(&self, base: &Path, max_depth: Option<usize>) -> ignore::Walk {
        let mut builder = ignore::WalkBuilder::new(base);
        builder.hidden(false);
        builder.git_ignore(false);
        builder.git_global(false);
        builder.git_exclude(false);
        builder.follow_links(false);
        builder.max_depth(max_depth);
        builder.sort_by_file_path(|a, b| a.cmp(b));
        builder.filter_entry(|entry| {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    if EXCLUDED_DIRS.contains(&name) {
                        return false;
                    }
                }
            }
            true
        });
        builder.build()
    }

    // -- config -------------------------------------------------------------

    /// Read a JSON config file from `.obsidian/`. Missing or malformed
    /// files degrade to an empty object.
    pub fn read_config(&self, filename: &str) -> serde_json::Map<String, serde_json::Value> {
        let path = self.root.join(".obsidian").join(filename);
        let Ok(text) = fs::read_to_string(&path) else {
            return serde_json::Map::new();
        };
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    pub fn daily_notes_config(&self) -> DailyNotesConfig {
        let config = self.read_config("daily-notes.json");
        let get = |key: &str, default: &str| {
            config
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or(default)
                .to_string()
        };
        DailyNotesConfig {
            folder: get("folder", ""),
            format: get("format", "YYYY-MM-DD"),
            template: get("template", ""),
        }
    }

    pub fn templates_config(&self) -> TemplatesConfig {
        let config = self.read_config("templates.json");
        TemplatesConfig {
            folder: config
                .get("folder")
                .and_then(|v| v.as_str())
                .unwrap_or("Templates")
                .to_string(),
        }
    }

    // -- stats --------------------------------------------------------------

    /// Count all note files in the vault.
    pub fn note_count(&self) -> usize {
        self.iter_notes("", true, MAX_SCAN_DEPTH).len()
    }

    /// Count all folders in the vault, excluded subtrees omitted.
    pub fn folder_count(&self) -> usize {
        self.build_walker(&self.root, None)
            .flatten()
            .filter(|e| e.path() != self.root)
            .filter(|e| e.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
            .count()
    }

    /// The `count` most recently modified notes, newest first.
    pub fn recent_notes(&self, count: usize) -> Vec<(String, SystemTime)> {
        let mut notes: Vec<(String, SystemTime)> = self
            .iter_notes("", true, MAX_SCAN_DEPTH)
            .into_iter()
            .filter_map(|p| {
                let mtime = fs::metadata(&p).ok()?.modified().ok()?;
                Some((self.relative(&p), mtime))
            })
            .collect();
        notes.sort_by(|a, b| b.1.cmp(&a.1));
        notes.truncate(count);
        notes
    }
}

fn has_note_extension(reference: &str) -> bool {
    reference.ends_with(&format!(".{NOTE_EXTENSION}"))
}

fn is_note(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(NOTE_EXTENSION)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use super::Vault;

    /// Build a small vault on disk with the layout the integration-style
    /// tests expect: config in `.obsidian/`, a few folders, cross-linked
    /// notes, a template, and a `.trash` directory.
    pub fn sample_vault() -> (TempDir, Vault) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(
            root.join(".obsidian/daily-notes.json"),
            r#"{"folder": "Daily Notes", "format": "YYYY-MM-DD", "template": "Templates/Daily Note"}"#,
        )
        .unwrap();
        fs::write(
            root.join(".obsidian/templates.json"),
            r#"{"folder": "Templates"}"#,
        )
        .unwrap();

        for folder in ["Projects", "Archive", "Daily Notes", "Templates", ".trash"] {
            fs::create_dir_all(root.join(folder)).unwrap();
        }

        write_note(
            root,
            "Projects/spec.md",
            "---\ntitle: Project Spec\ntags:\n  - project\n  - active\n---\n# Spec\n\nThis is a project spec.\n\nSee also [[ideas]].\n",
        );
        write_note(
            root,
            "Projects/ideas.md",
            "# Ideas\n\nSome ideas for the project.\n\n- [[spec]] is the main doc\n- Check [[Archive/old-stuff]] too\n",
        );
        write_note(
            root,
            "Archive/old-stuff.md",
            "---\ntags:\n  - archived\n---\n# Old Stuff\n\nThis is archived. #legacy\n",
        );
        write_note(root, "README.md", "# My Vault\n\nWelcome to my vault.\n");
        write_note(
            root,
            "Templates/Daily Note.md",
            "---\ndate: '{{date}}'\n---\n# {{title}}\n\n## Notes\n\n## Tasks\n",
        );

        let vault = Vault::open(root).unwrap();
        (dir, vault)
    }

    pub fn write_note(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}
