//! Remote descriptor files (`install --from`).
//!
//! ```toml
//! [ref]
//! name = "org.example.App"
//! branch = "stable"
//! url = "file:///srv/parcel/example"
//! title = "Example Apps"
//! is-runtime = false
//! ```

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::local::config::RemoteConfig;
use crate::reference::{RefKind, Reference};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Descriptor {
    #[serde(rename = "ref")]
    pub entry: DescriptorEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DescriptorEntry {
    pub name: String,
    pub branch: String,
    #[serde(default)]
    pub arch: Option<String>,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_runtime: bool,
    #[serde(default)]
    pub key_fingerprint: Option<String>,
}

impl Descriptor {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|err| Error::malformed("descriptor", err.to_string()))?;
        toml::from_str(text).map_err(|err| Error::malformed("descriptor", err.to_string()))
    }

    /// The reference this descriptor points at. `default_arch` applies when
    /// the descriptor names no arch.
    pub fn reference(&self, default_arch: &str) -> Result<Reference> {
        let kind = if self.entry.is_runtime {
            RefKind::Runtime
        } else {
            RefKind::App
        };
        let arch = self.entry.arch.as_deref().unwrap_or(default_arch);
        Reference::new(kind, &self.entry.name, arch, &self.entry.branch)
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            url: self.entry.url.clone(),
            title: self.entry.title.clone(),
            default_branch: Some(self.entry.branch.clone()),
            key_fingerprint: self.entry.key_fingerprint.clone(),
        }
    }

    /// Preferred name for the remote: `<id>-origin`.
    pub fn suggested_remote_name(&self) -> String {
        format!("{}-origin", self.entry.name)
    }
}
