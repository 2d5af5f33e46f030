use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured vault path.
pub const VAULT_PATH_ENV: &str = "NOTEVAULT_VAULT_PATH";

/// Top-level configuration for the notevault server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vault: VaultConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Vault root directory. `~` is expanded.
    pub path: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: "~/Documents/Obsidian".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.vault.path.trim().is_empty(),
            "vault.path must not be empty"
        );
        Ok(())
    }

    /// The effective vault path: the env override when set, otherwise the
    /// configured path, tilde-expanded either way.
    pub fn vault_path(&self) -> PathBuf {
        let raw = std::env::var(VAULT_PATH_ENV).unwrap_or_else(|_| self.vault.path.clone());
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.vault.path, "~/Documents/Obsidian");
    }

    #[test]
    fn load_from_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[vault]\npath = \"/srv/notes\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.vault.path, "/srv/notes");
    }

    #[test]
    fn load_rejects_empty_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[vault]\npath = \"\"\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.vault.path, "~/Documents/Obsidian");
    }

    #[test]
    fn tilde_expansion() {
        let config = Config {
            vault: VaultConfig {
                path: "~/notes".into(),
            },
        };
        let expanded = config.vault_path();
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}
