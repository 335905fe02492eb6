//! Installation config: `<root>/config.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Root configuration of a local installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DirectoryConfig {
    /// Overrides the host arch as the default install arch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_arch: Option<String>,

    /// Configured remotes by name
    #[serde(default)]
    pub remote: BTreeMap<String, RemoteConfig>,
}

/// One configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteConfig {
    /// `file://` URL or plain path of the remote root
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Branch used when a ref names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,

    /// blake3 fingerprint of the key content from this remote is signed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_fingerprint: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            default_branch: None,
            key_fingerprint: None,
        }
    }
}

impl DirectoryConfig {
    /// Name of the remote configured with `url`, if any.
    pub fn remote_for_url(&self, url: &str) -> Option<&str> {
        self.remote
            .iter()
            .find(|(_, remote)| remote.url == url)
            .map(|(name, _)| name.as_str())
    }

    /// `base`, or `base-N` for the first N that is not taken.
    pub fn unique_remote_name(&self, base: &str) -> String {
        if !self.remote.contains_key(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}-{n}"))
            .find(|name| !self.remote.contains_key(name))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Loads and saves `config.toml`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(root: &Path) -> Self {
        Self {
            config_path: root.join("config.toml"),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> anyhow::Result<DirectoryConfig> {
        if !self.config_path.exists() {
            return Ok(DirectoryConfig::default());
        }
        let content = std::fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;
        toml::from_str(&content).with_context(|| {
            format!("Failed to parse config file: {}", self.config_path.display())
        })
    }

    pub fn save(&self, config: &DirectoryConfig) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config to TOML")?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_config_loads_empty() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = ConfigStore::new(temp.path());
        assert_eq!(store.load().expect("Failed to load config"), DirectoryConfig::default());
    }

    #[test]
    fn save_then_load_keeps_remotes() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = ConfigStore::new(&temp.path().join("root"));
        let mut config = DirectoryConfig::default();
        let mut remote = RemoteConfig::new("file:///srv/repo");
        remote.default_branch = Some("stable".to_string());
        config.remote.insert("origin".to_string(), remote);

        store.save(&config).expect("Failed to save config");
        let loaded = store.load().expect("Failed to load config");

        assert_eq!(loaded, config);
        let raw = std::fs::read_to_string(store.config_path()).expect("Failed to read config");
        assert!(raw.contains("default-branch = \"stable\""));
    }

    #[test]
    fn unique_remote_name_appends_counter() {
        let mut config = DirectoryConfig::default();
        assert_eq!(config.unique_remote_name("org.foo.Bar-origin"), "org.foo.Bar-origin");
        config
            .remote
            .insert("org.foo.Bar-origin".to_string(), RemoteConfig::new("/a"));
        config
            .remote
            .insert("org.foo.Bar-origin-1".to_string(), RemoteConfig::new("/b"));
        assert_eq!(
            config.unique_remote_name("org.foo.Bar-origin"),
            "org.foo.Bar-origin-2"
        );
        assert_eq!(config.remote_for_url("/b"), Some("org.foo.Bar-origin-1"));
    }
}
