//! Remote metadata: `summary.toml` at the root of a remote.
//!
//! ```toml
//! default-branch = "stable"
//! signed-by = "<blake3 key fingerprint>"
//!
//! [[ref]]
//! ref = "app/org.example.App/x86_64/stable"
//! related = [
//!     { ref = "runtime/org.example.App.Locale/x86_64/stable", subpaths = ["/de"] },
//!     { ref = "runtime/org.example.App.Debug/x86_64/stable", download = false },
//! ]
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::reference::Reference;
use crate::related::RelatedRef;

pub const SUMMARY_FILE: &str = "summary.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,

    /// Fingerprint of the key the remote content is signed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,

    #[serde(default, rename = "ref")]
    pub refs: Vec<RefEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefEntry {
    #[serde(rename = "ref")]
    pub reference: Reference,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntry {
    #[serde(rename = "ref")]
    pub reference: Reference,

    #[serde(default)]
    pub subpaths: Vec<String>,

    #[serde(default = "default_download")]
    pub download: bool,
}

fn default_download() -> bool {
    true
}

impl RemoteSummary {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse remote summary")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read remote summary: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid summary: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize summary")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write summary: {}", path.display()))
    }

    pub fn references(&self) -> Vec<Reference> {
        self.refs.iter().map(|entry| entry.reference.clone()).collect()
    }

    pub fn find(&self, reference: &Reference) -> Option<&RefEntry> {
        self.refs.iter().find(|entry| &entry.reference == reference)
    }

    /// Related refs of `reference`, attributed to `remote`. `None` if the
    /// summary does not list `reference` at all.
    pub fn related(&self, reference: &Reference, remote: &str) -> Option<Vec<RelatedRef>> {
        self.find(reference).map(|entry| {
            entry
                .related
                .iter()
                .map(|rel| {
                    RelatedRef::new(rel.reference.clone(), remote)
                        .with_subpaths(rel.subpaths.iter().cloned())
                        .with_download(rel.download)
                })
                .collect()
        })
    }
}
