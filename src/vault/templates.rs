//! Template listing and instantiation.

use std::collections::HashMap;
use std::fs;

use chrono::Local;

use super::{notes, Vault, VaultError};

/// List template names (file stems) in the configured template folder.
pub fn list_templates(vault: &Vault) -> (String, Vec<String>) {
    let folder = vault.templates_config().folder;
    let names = vault
        .iter_notes(&folder, false, 2)
        .iter()
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    (folder, names)
}

/// Create a new note from a template, substituting `{{date}}`, `{{title}}`,
/// `{{time}}`, and any caller-supplied `{{key}}` variables.
///
/// Returns the vault-relative path written.
pub fn create_from_template(
    vault: &Vault,
    template: &str,
    path: &str,
    variables: &HashMap<String, serde_json::Value>,
) -> Result<String, VaultError> {
    let folder = vault.templates_config().folder;
    let template_path = format!("{folder}/{template}");
    let resolved = vault
        .resolve(&template_path)
        .ok_or_else(|| VaultError::TemplateNotFound(template.to_string()))?;

    let mut content = fs::read_to_string(&resolved)?;

    let now = Local::now();
    let dest_name = path
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".md");

    content = content.replace("{{date}}", &now.date_naive().to_string());
    content = content.replace("{{title}}", dest_name);
    content = content.replace("{{time}}", &now.format("%H:%M").to_string());

    for (key, value) in variables {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        content = content.replace(&format!("{{{{{key}}}}}"), &rendered);
    }

    notes::write_note(vault, path, &content)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{sample_vault, write_note};
    use super::*;

    #[test]
    fn list_finds_templates() {
        let (_dir, vault) = sample_vault();
        let (folder, names) = list_templates(&vault);
        assert_eq!(folder, "Templates");
        assert_eq!(names, vec!["Daily Note"]);
    }

    #[test]
    fn list_empty_folder() {
        let (dir, vault) = sample_vault();
        std::fs::remove_file(dir.path().join("Templates/Daily Note.md")).unwrap();
        let (_, names) = list_templates(&vault);
        assert!(names.is_empty());
    }

    #[test]
    fn create_substitutes_builtins_and_custom() {
        let (dir, vault) = sample_vault();
        write_note(
            dir.path(),
            "Templates/Meeting.md",
            "# {{title}}\n\nDate: {{date}}\nWith: {{attendee}}\n",
        );
        let mut vars = HashMap::new();
        vars.insert(
            "attendee".to_string(),
            serde_json::Value::String("Sam".to_string()),
        );
        let rel =
            create_from_template(&vault, "Meeting", "Projects/kickoff.md", &vars).unwrap();
        assert_eq!(rel, "Projects/kickoff.md");

        let content = std::fs::read_to_string(dir.path().join("Projects/kickoff.md")).unwrap();
        assert!(content.starts_with("# kickoff\n"));
        assert!(content.contains("With: Sam"));
        assert!(!content.contains("{{date}}"));
    }

    #[test]
    fn create_missing_template_is_typed_error() {
        let (_dir, vault) = sample_vault();
        let err = create_from_template(
            &vault,
            "No Such Template",
            "out.md",
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::TemplateNotFound(_)));
    }
}
