//! YAML frontmatter parsing and reconstruction.
//!
//! A frontmatter block is a `---` fence on the first line, YAML until the
//! next `---` fence, then the body. Anything that fails to parse as a YAML
//! mapping is treated as "no frontmatter" rather than an error.

use serde_yaml::{Mapping, Value};

/// Split note content into an optional frontmatter mapping and the body.
pub fn parse(content: &str) -> (Option<Mapping>, String) {
    if !content.starts_with("---") {
        return (None, content.to_string());
    }

    let Some(end) = content[3..].find("\n---").map(|i| i + 3) else {
        return (None, content.to_string());
    };

    let yaml_text = if end > 4 { &content[4..end] } else { "" };
    let mut body = &content[end + 4..];
    if let Some(stripped) = body.strip_prefix('\n') {
        body = stripped;
    }

    match serde_yaml::from_str::<Value>(yaml_text) {
        Ok(Value::Mapping(map)) => (Some(map), body.to_string()),
        Ok(Value::Null) => (None, body.to_string()),
        // Scalar or sequence frontmatter is not a property block.
        Ok(_) => (None, content.to_string()),
        Err(_) => (None, content.to_string()),
    }
}

/// Reconstruct note content from a frontmatter mapping and body.
///
/// An empty mapping produces just the body, with no fence block.
pub fn dump(metadata: &Mapping, body: &str) -> String {
    if metadata.is_empty() {
        return body.to_string();
    }
    let yaml = serde_yaml::to_string(&Value::Mapping(metadata.clone())).unwrap_or_default();
    let yaml = yaml.trim_end_matches('\n');
    format!("---\n{yaml}\n---\n{body}")
}
