//! CLI-only subcommand implementations: `check` and `info`.
//!
//! These commands do not start the MCP server. They are useful for
//! validating a config and inspecting a vault before running `serve`.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::config::Config;
use crate::vault::Vault;

/// Load config from an explicit path, or fall back to defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(p) => Config::load(&p),
        None => Ok(Config::default()),
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

struct Check {
    label: &'static str,
    ok: bool,
    detail: String,
    fix: Option<String>,
}

impl Check {
    fn pass(label: &'static str, detail: impl Into<String>) -> Self {
        Self { label, ok: true, detail: detail.into(), fix: None }
    }

    fn fail(label: &'static str, detail: impl Into<String>, fix: impl Into<String>) -> Self {
        Self { label, ok: false, detail: detail.into(), fix: Some(fix.into()) }
    }
}

/// Run `notevault check`. Returns `Ok(())` if all checks pass.
pub fn run_check(config: &Config) -> Result<()> {
    println!("Checking vault...\n");

    let path = config.vault_path();
    let mut checks: Vec<Check> = Vec::new();

    checks.push(if path.is_dir() {
        Check::pass("vault path", path.display().to_string())
    } else {
        Check::fail(
            "vault path",
            format!("{} is not a directory", path.display()),
            "set [vault] path in config.toml or export NOTEVAULT_VAULT_PATH",
        )
    });

    if path.is_dir() {
        let vault = Vault::open(&path)?;

        checks.push(if vault.root().join(".obsidian").is_dir() {
            Check::pass(".obsidian config", "present")
        } else {
            Check::fail(
                ".obsidian config",
                "missing (daily notes and templates fall back to defaults)",
                "open the vault in Obsidian once, or create .obsidian/ manually",
            )
        });

        let notes = vault.note_count();
        checks.push(if notes > 0 {
            Check::pass("notes", format!("{notes} found"))
        } else {
            Check::fail(
                "notes",
                "no .md files found",
                "verify the path points at the vault root, not a parent folder",
            )
        });
    }

    let all_pass = checks.iter().all(|c| c.ok);

    for c in &checks {
        let icon = if c.ok { "\u{2713}" } else { "\u{2717}" };
        println!("  {} {} ({})", icon, c.label, c.detail);
        if !c.ok {
            if let Some(fix) = &c.fix {
                println!("    Fix: {}", fix);
            }
        }
    }

    println!();
    if all_pass {
        println!("All checks passed. Run: notevault serve");
        Ok(())
    } else {
        let failed = checks.iter().filter(|c| !c.ok).count();
        anyhow::bail!("{} check(s) failed", failed)
    }
}

// ---------------------------------------------------------------------------
// info
// ---------------------------------------------------------------------------

/// Render the vault summary used by both `notevault info` and the
/// `vault_info` MCP tool.
pub fn vault_summary(vault: &Vault) -> String {
    let dn = vault.daily_notes_config();
    let tmpl = vault.templates_config();

    let mut lines = vec![
        format!("Vault: {}", vault.root().display()),
        format!("Notes: {}", vault.note_count()),
        format!("Folders: {}", vault.folder_count()),
        String::new(),
        "Daily notes config:".to_string(),
        format!(
            "  folder: {}",
            if dn.folder.is_empty() { "(root)" } else { &dn.folder }
        ),
        format!("  format: {}", dn.format),
        format!(
            "  template: {}",
            if dn.template.is_empty() { "(none)" } else { &dn.template }
        ),
        String::new(),
        format!("Templates folder: {}", tmpl.folder),
        String::new(),
        "Recent notes:".to_string(),
    ];

    for (path, mtime) in vault.recent_notes(10) {
        let dt: DateTime<Local> = mtime.into();
        lines.push(format!("  {} ({})", path, dt.format("%Y-%m-%d %H:%M")));
    }

    lines.join("\n")
}

/// Run `notevault info`: print the vault summary and exit.
pub fn run_info(config: &Config) -> Result<()> {
    let vault = Vault::open(&config.vault_path())?;
    println!("{}", vault_summary(&vault));
    Ok(())
}
