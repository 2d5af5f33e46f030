use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

use crate::cli::vault_summary;
use crate::vault::notes::{DeleteOutcome, EditOp, NoteContent};
use crate::vault::{daily, links, notes, search, templates, Vault, VaultError};

// ---------------------------------------------------------------------------
// Parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadNoteParams {
    /// Vault-relative path or note name (e.g. "Projects/spec" or just "spec")
    path: String,
    /// Return frontmatter as structured data separately from the body (default: true)
    include_frontmatter: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteNoteParams {
    /// Vault-relative path (e.g. "Projects/new-idea.md")
    path: String,
    /// Full markdown content (including frontmatter if desired)
    content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EditNoteParams {
    /// Vault-relative path or note name
    path: String,
    /// Ordered list of replacements; each replaces the first occurrence of oldText
    edits: Vec<EditOp>,
    /// Show the diff without applying changes (default: false)
    dry_run: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AppendToNoteParams {
    /// Vault-relative path or note name
    path: String,
    /// Markdown content to append
    content: String,
    /// Append under this heading (e.g. "## Notes") instead of at the end
    heading: Option<String>,
    /// Create the note if it doesn't exist (default: false)
    create_if_missing: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DeleteNoteParams {
    /// Vault-relative path or note name
    path: String,
    /// Must be true to proceed with deletion
    confirm: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MoveNoteParams {
    /// Current vault-relative path
    source: String,
    /// New vault-relative path
    destination: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListNotesParams {
    /// Vault-relative folder path (empty = vault root)
    folder: Option<String>,
    /// Include entries in subfolders (default: false)
    recursive: Option<bool>,
    /// Maximum folder depth when recursive (default: 2)
    max_depth: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchNotesParams {
    /// Text to search for (case-insensitive)
    query: String,
    /// Limit search to a specific folder
    folder: Option<String>,
    /// Maximum number of matching notes (default: 20)
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchByTagParams {
    /// Tag to search for, with or without '#' (nested tags like "project/active" work)
    tag: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NotePathParams {
    /// Vault-relative path or note name
    path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetDailyNoteParams {
    /// Day offset (0=today, -1=yesterday, 1=tomorrow)
    offset: Option<i64>,
    /// Specific date in YYYY-MM-DD format (overrides offset)
    date: Option<String>,
    /// Create from template if the note doesn't exist (default: true)
    create_if_missing: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AppendToDailyNoteParams {
    /// Text to append
    content: String,
    /// Optional heading to append under (e.g. "## Notes")
    heading: Option<String>,
    /// Day offset (0=today)
    offset: Option<i64>,
    /// Create the daily note if it doesn't exist (default: true)
    create_if_missing: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SetFrontmatterParams {
    /// Vault-relative path or note name
    path: String,
    /// Key-value pairs to set (merged with existing frontmatter)
    properties: serde_json::Map<String, serde_json::Value>,
    /// Keys to remove from the frontmatter
    remove_keys: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateFromTemplateParams {
    /// Template name (filename without .md)
    template: String,
    /// Where to create the new note
    path: String,
    /// Custom variable substitutions ({{key}} becomes the value)
    variables: Option<HashMap<String, serde_json::Value>>,
}

// ---------------------------------------------------------------------------
// MCP server struct
// ---------------------------------------------------------------------------

/// The notevault MCP server. Holds the shared vault and routes tool calls.
#[derive(Clone)]
pub struct VaultServer {
    vault: Arc<Vault>,
    tool_router: ToolRouter<Self>,
}

/// Map core vault errors onto MCP error payloads: caller mistakes surface
/// as invalid requests, I/O failures as internal errors.
fn vault_error(e: VaultError) -> McpError {
    match e {
        VaultError::Io(_) => McpError::internal_error(e.to_string(), None),
        _ => McpError::invalid_request(e.to_string(), None),
    }
}

fn json_text(value: &serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(serde_json::to_string(value).unwrap())])
}

#[tool_router]
impl VaultServer {
    pub fn new(vault: Arc<Vault>) -> Self {
        Self {
            vault,
            tool_router: Self::tool_router(),
        }
    }

    // -----------------------------------------------------------------------
    // Vault info
    // -----------------------------------------------------------------------

    /// Get vault metadata: note/folder counts, daily-note and template
    /// configuration, and the most recently modified notes.
    #[tool]
    async fn vault_info(&self) -> Result<CallToolResult, McpError> {
        info!(tool = "vault_info", "tool call");
        Ok(CallToolResult::success(vec![Content::text(vault_summary(
            &self.vault,
        ))]))
    }

    // -----------------------------------------------------------------------
    // Note operations
    // -----------------------------------------------------------------------

    /// Read a note's content, optionally with parsed frontmatter separated out.
    /// The path may be a vault-relative path or a bare note name.
    #[tool]
    async fn read_note(
        &self,
        Parameters(params): Parameters<ReadNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "read_note", path = %params.path, "tool call");

        let include_frontmatter = params.include_frontmatter.unwrap_or(true);
        let content = notes::read_note(&self.vault, &params.path, include_frontmatter)
            .map_err(|e| match e {
                VaultError::NotFound(_) => McpError::invalid_request(
                    format!(
                        "Note not found: '{}'. Use list_notes to browse the vault, or \
                         search_notes to find notes by content.",
                        params.path
                    ),
                    None,
                ),
                other => vault_error(other),
            })?;

        let payload = match content {
            NoteContent::Text { path, body, frontmatter, truncated } => {
                let frontmatter = frontmatter
                    .map(|m| serde_json::to_value(&m).unwrap_or(serde_json::Value::Null))
                    .unwrap_or(serde_json::Value::Null);
                serde_json::json!({
                    "path": path,
                    "content": body,
                    "frontmatter": frontmatter,
                    "truncated": truncated,
                })
            }
            NoteContent::Binary { name, mime, size } => serde_json::json!({
                "binary": true,
                "name": name,
                "mime": mime,
                "size_bytes": size,
            }),
        };

        Ok(json_text(&payload))
    }

    /// Create a new note or overwrite an existing one. Parent folders are
    /// created as needed.
    #[tool]
    async fn write_note(
        &self,
        Parameters(params): Parameters<WriteNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "write_note", path = %params.path, "tool call");

        let written =
            notes::write_note(&self.vault, &params.path, &params.content).map_err(vault_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Wrote {written}"
        ))]))
    }

    /// Make targeted edits to an existing note using text replacement.
    /// Returns a unified diff of the changes.
    #[tool]
    async fn edit_note(
        &self,
        Parameters(params): Parameters<EditNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "edit_note", path = %params.path, edits = params.edits.len(), "tool call");

        let dry_run = params.dry_run.unwrap_or(false);
        let outcome = notes::edit_note(&self.vault, &params.path, &params.edits, dry_run)
            .map_err(vault_error)?;

        let text = if outcome.diff.is_empty() {
            "No changes.".to_string()
        } else if dry_run {
            format!("[DRY RUN] {}", outcome.diff)
        } else {
            outcome.diff
        };

        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Append content to a note, optionally under a specific heading.
    #[tool]
    async fn append_to_note(
        &self,
        Parameters(params): Parameters<AppendToNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "append_to_note", path = %params.path, "tool call");

        let rel = notes::append_to_note(
            &self.vault,
            &params.path,
            &params.content,
            params.heading.as_deref(),
            params.create_if_missing.unwrap_or(false),
        )
        .map_err(vault_error)?;

        let message = match params.heading {
            Some(heading) => format!("Appended under '{heading}' in {rel}"),
            None => format!("Appended to {rel}"),
        };
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    /// Delete a note. Moves it to .trash/ when the vault has one, otherwise
    /// removes it permanently.
    #[tool]
    async fn delete_note(
        &self,
        Parameters(params): Parameters<DeleteNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "delete_note", path = %params.path, "tool call");

        if !params.confirm.unwrap_or(false) {
            return Err(McpError::invalid_params(
                "confirm must be true to delete a note".to_string(),
                None,
            ));
        }

        let message = match notes::delete_note(&self.vault, &params.path).map_err(vault_error)? {
            DeleteOutcome::Trashed(rel) => format!("Moved {rel} to .trash/"),
            DeleteOutcome::Deleted(rel) => format!("Deleted {rel}"),
        };
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    /// Move or rename a note, rewriting wikilinks across the vault when the
    /// note's name changes.
    #[tool]
    async fn move_note(
        &self,
        Parameters(params): Parameters<MoveNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            tool = "move_note",
            source = %params.source,
            destination = %params.destination,
            "tool call"
        );

        let outcome = notes::move_note(&self.vault, &params.source, &params.destination)
            .map_err(vault_error)?;

        Ok(json_text(&serde_json::json!({
            "moved": true,
            "from": outcome.from,
            "to": outcome.to,
            "links_updated": outcome.links_updated,
        })))
    }

    // -----------------------------------------------------------------------
    // Navigation & search
    // -----------------------------------------------------------------------

    /// List notes and folders in the vault, optionally scoped to a folder.
    #[tool]
    async fn list_notes(
        &self,
        Parameters(params): Parameters<ListNotesParams>,
    ) -> Result<CallToolResult, McpError> {
        let folder = params.folder.unwrap_or_default();
        let recursive = params.recursive.unwrap_or(false);
        let max_depth = params.max_depth.unwrap_or(2);
        info!(tool = "list_notes", folder = %folder, recursive, "tool call");

        let entries: Vec<serde_json::Value> = self
            .vault
            .iter_entries(&folder, recursive, max_depth)
            .iter()
            .map(|path| {
                let is_dir = path.is_dir();
                let size = if is_dir {
                    None
                } else {
                    std::fs::metadata(path).ok().map(|m| m.len())
                };
                serde_json::json!({
                    "path": self.vault.relative(path),
                    "is_dir": is_dir,
                    "size": size,
                })
            })
            .collect();

        Ok(json_text(&serde_json::json!({
            "folder": if folder.is_empty() { "/".to_string() } else { folder },
            "recursive": recursive,
            "count": entries.len(),
            "entries": entries,
        })))
    }

    /// Full-text search across note content (case-insensitive).
    #[tool]
    async fn search_notes(
        &self,
        Parameters(params): Parameters<SearchNotesParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "search_notes", query = %params.query, "tool call");

        if params.query.is_empty() {
            return Err(McpError::invalid_params(
                "query must not be empty".to_string(),
                None,
            ));
        }

        let folder = params.folder.unwrap_or_default();
        let max_results = params.max_results.unwrap_or(20);
        let results = search::search_notes(&self.vault, &params.query, &folder, max_results);

        Ok(json_text(&serde_json::json!({
            "query": params.query,
            "result_count": results.len(),
            "results": results,
        })))
    }

    /// Find all notes carrying a specific tag (inline or frontmatter).
    #[tool]
    async fn search_by_tag(
        &self,
        Parameters(params): Parameters<SearchByTagParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "search_by_tag", tag = %params.tag, "tool call");

        let tag = params.tag.trim_start_matches('#').to_string();
        if tag.is_empty() {
            return Err(McpError::invalid_params(
                "tag must not be empty".to_string(),
                None,
            ));
        }

        let results = search::search_by_tag(&self.vault, &tag);
        Ok(json_text(&serde_json::json!({
            "tag": tag,
            "count": results.len(),
            "notes": results,
        })))
    }

    /// Find all notes that link to a given note, with one line of context
    /// per referencing note.
    #[tool]
    async fn get_backlinks(
        &self,
        Parameters(params): Parameters<NotePathParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "get_backlinks", path = %params.path, "tool call");

        let (target, results) =
            links::backlinks(&self.vault, &params.path).map_err(vault_error)?;

        Ok(json_text(&serde_json::json!({
            "target": target,
            "count": results.len(),
            "backlinks": results,
        })))
    }

    /// List all wikilinks from a given note with resolution status; broken
    /// links resolve to null.
    #[tool]
    async fn get_outgoing_links(
        &self,
        Parameters(params): Parameters<NotePathParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "get_outgoing_links", path = %params.path, "tool call");

        let (source, links) =
            links::outgoing_links(&self.vault, &params.path).map_err(vault_error)?;

        Ok(json_text(&serde_json::json!({
            "source": source,
            "count": links.len(),
            "links": links,
        })))
    }

    // -----------------------------------------------------------------------
    // Daily notes
    // -----------------------------------------------------------------------

    /// Get today's daily note (or another day's), creating it from the
    /// configured template when missing.
    #[tool]
    async fn get_daily_note(
        &self,
        Parameters(params): Parameters<GetDailyNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "get_daily_note", offset = ?params.offset, date = ?params.date, "tool call");

        let note = daily::get_daily_note(
            &self.vault,
            params.offset.unwrap_or(0),
            params.date.as_deref(),
            params.create_if_missing.unwrap_or(true),
        )
        .map_err(vault_error)?;

        Ok(json_text(&serde_json::json!({
            "path": note.path,
            "content": note.content,
            "created": note.created,
        })))
    }

    /// Quick-append to today's daily note (or another day's).
    #[tool]
    async fn append_to_daily_note(
        &self,
        Parameters(params): Parameters<AppendToDailyNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "append_to_daily_note", offset = ?params.offset, "tool call");

        let rel = daily::append_to_daily_note(
            &self.vault,
            &params.content,
            params.heading.as_deref(),
            params.offset.unwrap_or(0),
            params.create_if_missing.unwrap_or(true),
        )
        .map_err(vault_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Appended to {rel}"
        ))]))
    }

    // -----------------------------------------------------------------------
    // Frontmatter
    // -----------------------------------------------------------------------

    /// Read a note's YAML frontmatter as structured data.
    #[tool]
    async fn get_frontmatter(
        &self,
        Parameters(params): Parameters<NotePathParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "get_frontmatter", path = %params.path, "tool call");

        let meta = notes::get_frontmatter(&self.vault, &params.path).map_err(vault_error)?;
        let frontmatter = meta
            .map(|m| serde_json::to_value(&m).unwrap_or(serde_json::Value::Null))
            .unwrap_or(serde_json::Value::Null);

        Ok(json_text(&serde_json::json!({
            "path": params.path,
            "frontmatter": frontmatter,
        })))
    }

    /// Set or update frontmatter properties on a note, creating the block
    /// if absent. Existing keys are merged; remove_keys are dropped.
    #[tool]
    async fn set_frontmatter(
        &self,
        Parameters(params): Parameters<SetFrontmatterParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = "set_frontmatter", path = %params.path, "tool call");

        let rel = notes::update_frontmatter(
            &self.vault,
            &params.path,
            &params.properties,
            params.remove_keys.as_deref().unwrap_or(&[]),
        )
        .map_err(vault_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Updated frontmatter on {rel}"
        ))]))
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    /// List available templates in the configured template folder.
    #[tool]
    async fn list_templates(&self) -> Result<CallToolResult, McpError> {
        info!(tool = "list_templates", "tool call");

        let (folder, names) = templates::list_templates(&self.vault);
        Ok(json_text(&serde_json::json!({
            "folder": folder,
            "count": names.len(),
            "templates": names,
        })))
    }

    /// Create a new note from a template with variable substitution.
    #[tool]
    async fn create_from_template(
        &self,
        Parameters(params): Parameters<CreateFromTemplateParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            tool = "create_from_template",
            template = %params.template,
            path = %params.path,
            "tool call"
        );

        let variables = params.variables.unwrap_or_default();
        let rel =
            templates::create_from_template(&self.vault, &params.template, &params.path, &variables)
                .map_err(vault_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Created {rel} from template '{}'",
            params.template
        ))]))
    }
}

#[tool_handler]
impl ServerHandler for VaultServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "notevault: Obsidian vault MCP server (18 tools). The vault is a directory of \
                 markdown notes; every tool addresses notes by vault-relative path or bare name.\n\
                 \n\
                 == TOOL GROUPS ==\n\
                 \n\
                 NOTES: read_note, write_note, edit_note, append_to_note, delete_note (confirm=true \
                 required), move_note\n\
                 \n\
                 NAVIGATION & SEARCH: vault_info, list_notes, search_notes, search_by_tag\n\
                 \n\
                 LINKS: get_backlinks, get_outgoing_links\n\
                 \n\
                 DAILY NOTES: get_daily_note, append_to_daily_note\n\
                 \n\
                 FRONTMATTER: get_frontmatter, set_frontmatter\n\
                 \n\
                 TEMPLATES: list_templates, create_from_template\n\
                 \n\
                 == PATH RESOLUTION ==\n\
                 \n\
                 Note references resolve like Obsidian links: an exact vault-relative path first \
                 (with or without .md), then a filename match anywhere in the vault, then a \
                 case-insensitive filename match. \"spec\", \"spec.md\", and \"Projects/spec.md\" \
                 can all reach the same note. When several folders contain the same filename, the \
                 lexicographically smallest path wins, so prefer full paths in large vaults.\n\
                 \n\
                 == WORKFLOW TIPS ==\n\
                 \n\
                 - Paths are always vault-relative; absolute paths and ../ escapes are rejected.\n\
                 - move_note rewrites [[wikilinks]] across the vault when the note's name changes; \
                 aliases ([[note|label]]) and heading refs ([[note#section]]) are preserved.\n\
                 - edit_note replaces the first occurrence of each oldText and returns a unified \
                 diff; use dry_run=true to preview.\n\
                 - delete_note moves notes to .trash/ when the vault has one; pass confirm=true.\n\
                 - Configuration folders (.obsidian, .trash, .git, .venv, node_modules) are \
                 invisible to listing, search, and link scans."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_note_params_full() {
        let params: ReadNoteParams = serde_json::from_value(json!({
            "path": "Projects/spec",
            "include_frontmatter": false,
        }))
        .unwrap();
        assert_eq!(params.path, "Projects/spec");
        assert_eq!(params.include_frontmatter, Some(false));
    }

    #[test]
    fn read_note_params_minimal() {
        let params: ReadNoteParams = serde_json::from_value(json!({"path": "spec"})).unwrap();
        assert_eq!(params.path, "spec");
        assert!(params.include_frontmatter.is_none());
    }

    #[test]
    fn read_note_params_missing_path() {
        let result = serde_json::from_value::<ReadNoteParams>(json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn edit_note_params_camel_case_edits() {
        let params: EditNoteParams = serde_json::from_value(json!({
            "path": "spec",
            "edits": [{"oldText": "before", "newText": "after"}],
            "dry_run": true,
        }))
        .unwrap();
        assert_eq!(params.edits.len(), 1);
        assert_eq!(params.edits[0].old_text, "before");
        assert_eq!(params.edits[0].new_text, "after");
        assert_eq!(params.dry_run, Some(true));
    }

    #[test]
    fn list_notes_params_defaults() {
        let params: ListNotesParams = serde_json::from_value(json!({})).unwrap();
        assert!(params.folder.is_none());
        assert!(params.recursive.is_none());
        assert!(params.max_depth.is_none());
    }

    #[test]
    fn search_notes_params_full() {
        let params: SearchNotesParams = serde_json::from_value(json!({
            "query": "needle",
            "folder": "Projects",
            "max_results": 5,
        }))
        .unwrap();
        assert_eq!(params.query, "needle");
        assert_eq!(params.folder.as_deref(), Some("Projects"));
        assert_eq!(params.max_results, Some(5));
    }

    #[test]
    fn daily_note_params_negative_offset() {
        let params: GetDailyNoteParams =
            serde_json::from_value(json!({"offset": -1})).unwrap();
        assert_eq!(params.offset, Some(-1));
    }

    #[test]
    fn set_frontmatter_params_mixed_values() {
        let params: SetFrontmatterParams = serde_json::from_value(json!({
            "path": "spec",
            "properties": {"status": "draft", "priority": 2},
            "remove_keys": ["stale"],
        }))
        .unwrap();
        assert_eq!(params.properties.len(), 2);
        assert_eq!(params.remove_keys.as_deref(), Some(&["stale".to_string()][..]));
    }

    #[test]
    fn create_from_template_params_variables() {
        let params: CreateFromTemplateParams = serde_json::from_value(json!({
            "template": "Meeting",
            "path": "Projects/kickoff.md",
            "variables": {"attendee": "Sam"},
        }))
        .unwrap();
        assert_eq!(params.template, "Meeting");
        assert_eq!(
            params.variables.unwrap().get("attendee"),
            Some(&json!("Sam"))
        );
    }

    #[test]
    fn move_note_params() {
        let params: MoveNoteParams = serde_json::from_value(json!({
            "source": "Projects/ideas",
            "destination": "Archive/ideas",
        }))
        .unwrap();
        assert_eq!(params.source, "Projects/ideas");
        assert_eq!(params.destination, "Archive/ideas");
    }
}
