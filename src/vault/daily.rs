//! Daily note operations, driven by `.obsidian/daily-notes.json`.
//!
//! Obsidian stores its daily-note filename pattern in Moment.js tokens;
//! those are translated to chrono's strftime dialect before formatting.

use std::fs;

use chrono::{Duration, Local, NaiveDate};

use super::{notes, Vault, VaultError};

// Moment.js -> strftime mapping (most common tokens).
const MOMENT_TO_STRFTIME: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("DD", "%d"),
    ("Do", "{ordinal}"), // special handling in format_date
    ("D", "%-d"),
    ("dddd", "%A"),
    ("ddd", "%a"),
    ("dd", "%a"),
    ("d", "%w"),
    ("HH", "%H"),
    ("H", "%-H"),
    ("hh", "%I"),
    ("h", "%-I"),
    ("mm", "%M"),
    ("m", "%-M"),
    ("ss", "%S"),
    ("s", "%-S"),
    ("A", "%p"),
    ("a", "%p"),
];

/// Ordinal rendering for `Do` (1st, 2nd, 3rd, 11th, ...).
fn ordinal(n: u32) -> String {
    if (11..=13).contains(&(n % 100)) {
        return format!("{n}th");
    }
    let suffix = match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Convert a Moment.js format string to a strftime format string.
///
/// Longer tokens are replaced first, through placeholders, so `YYYY` is
/// never half-eaten by `YY`. Each token substitutes once, matching the
/// source behavior this mirrors.
pub fn moment_to_strftime(fmt: &str) -> String {
    let mut tokens: Vec<&(&str, &str)> = MOMENT_TO_STRFTIME.iter().collect();
    tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut result = fmt.to_string();
    let mut placeholders: Vec<(String, &str)> = Vec::new();
    for (i, (token, strftime)) in tokens.iter().enumerate() {
        if result.contains(token) {
            let placeholder = format!("\u{0}{i}\u{0}");
            result = result.replacen(token, &placeholder, 1);
            placeholders.push((placeholder, strftime));
        }
    }
    for (placeholder, strftime) in placeholders {
        result = result.replace(&placeholder, strftime);
    }
    result
}

/// Format a date using a Moment.js format string.
pub fn format_date(fmt: &str, date: NaiveDate) -> String {
    let mut strftime_fmt = moment_to_strftime(fmt);
    if strftime_fmt.contains("{ordinal}") {
        strftime_fmt = strftime_fmt.replace("{ordinal}", &ordinal(chrono::Datelike::day(&date)));
    }
    date.format(&strftime_fmt).to_string()
}

#[derive(Debug, Clone)]
pub struct DailyNote {
    pub path: String,
    pub content: String,
    pub created: bool,
}

fn resolve_date(offset: i64, date: Option<&str>) -> Result<NaiveDate, VaultError> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| VaultError::InvalidDate(s.to_string())),
        None => Ok(Local::now().date_naive() + Duration::days(offset)),
    }
}

fn daily_note_path(vault: &Vault, d: NaiveDate) -> String {
    let config = vault.daily_notes_config();
    let filename = format_date(&config.format, d);
    if config.folder.is_empty() {
        format!("{filename}.md")
    } else {
        format!("{}/{filename}.md", config.folder)
    }
}

/// Get a daily note, creating it from the configured template when missing
/// and `create_if_missing` is set.
pub fn get_daily_note(
    vault: &Vault,
    offset: i64,
    date: Option<&str>,
    create_if_missing: bool,
) -> Result<DailyNote, VaultError> {
    let d = resolve_date(offset, date)?;
    let vault_path = daily_note_path(vault, d);

    if let Some(resolved) = vault.resolve(&vault_path) {
        let content = fs::read_to_string(&resolved)?;
        return Ok(DailyNote {
            path: vault.relative(&resolved),
            content,
            created: false,
        });
    }

    if !create_if_missing {
        return Err(VaultError::NotFound(vault_path));
    }

    // Instantiate the configured template, if any.
    let config = vault.daily_notes_config();
    let mut content = String::new();
    if !config.template.is_empty() {
        if let Some(template) = vault.resolve(&config.template) {
            content = fs::read_to_string(&template)?;
            let filename = format_date(&config.format, d);
            content = content.replace("{{date}}", &d.to_string());
            content = content.replace("{{title}}", &filename);
            content = content.replace("{{time}}", "");
        }
    }

    let written = notes::write_note(vault, &vault_path, &content)?;
    Ok(DailyNote {
        path: written,
        content,
        created: true,
    })
}

/// Quick-append to a daily note, creating it first when needed.
pub fn append_to_daily_note(
    vault: &Vault,
    content: &str,
    heading: Option<&str>,
    offset: i64,
    create_if_missing: bool,
) -> Result<String, VaultError> {
    let d = resolve_date(offset, None)?;
    let vault_path = daily_note_path(vault, d);

    if vault.resolve(&vault_path).is_none() && create_if_missing {
        get_daily_note(vault, offset, None, true)?;
    }

    notes::append_to_note(vault, &vault_path, content, heading, create_if_missing)
}
