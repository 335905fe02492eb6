//! The installation directory collaborator.
//!
//! Everything that touches the network, the content store or deployed files
//! lives behind [`Directory`]. The orchestration code only sequences calls on
//! it and decides which failures are fatal.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::options::InstallOptions;
use crate::reference::Reference;
use crate::related::RelatedRef;

/// Result of an install-or-update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateOutcome {
    /// Was not installed before and is now.
    Installed,
    /// Was installed at an older state and has been updated.
    Updated,
    /// Already installed at the current state. Nothing changed.
    UpToDate,
    /// Pulled into the local cache only (`no_deploy`).
    Downloaded,
}

impl UpdateOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Updated => "updated",
            Self::UpToDate => "up-to-date",
            Self::Downloaded => "downloaded",
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured local installation plus its remotes.
///
/// Every potentially slow call takes a cancellation token and must return
/// [`Error::Cancelled`] once it is triggered.
pub trait Directory: fmt::Debug {
    /// Arch used when the user does not name one.
    fn default_arch(&self) -> &str;

    fn list_remotes(&self) -> Result<Vec<String>>;

    /// Default branch configured for `remote`, if any.
    fn remote_default_branch(&self, remote: &str) -> Result<Option<String>>;

    /// All references the remote advertises.
    fn list_remote_refs(&self, remote: &str, cancel: &CancellationToken)
    -> Result<Vec<Reference>>;

    /// Pull and deploy `reference`. Fails if it is already installed.
    fn install(
        &self,
        options: &InstallOptions,
        reference: &Reference,
        remote: &str,
        subpaths: &[String],
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Install `reference`, or bring an existing installation up to date.
    /// Installed at the current state is a successful no-op.
    fn install_or_update(
        &self,
        options: &InstallOptions,
        reference: &Reference,
        remote: &str,
        subpaths: &[String],
        cancel: &CancellationToken,
    ) -> Result<UpdateOutcome>;

    /// Install a bundle file. `key_material` replaces the keys embedded in
    /// the bundle when present.
    fn install_bundle(
        &self,
        path: &Path,
        key_material: Option<&[u8]>,
        cancel: &CancellationToken,
    ) -> Result<Reference>;

    /// Related references known from cached metadata only.
    fn find_local_related(
        &self,
        reference: &Reference,
        remote: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RelatedRef>>;

    /// Related references as currently advertised by the remote.
    fn find_remote_related(
        &self,
        reference: &Reference,
        remote: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RelatedRef>>;

    /// Register the remote described by a descriptor file. Returns the remote
    /// name and the reference the descriptor points at.
    ///
    /// The configuration may be written by another process, so the current
    /// handle is not guaranteed to observe it. Use [`Directory::reopen`].
    fn create_remote_for_ref_file(&self, data: &[u8]) -> Result<(String, Reference)>;

    /// A fresh handle that re-reads all configuration from storage.
    fn reopen(&self) -> Result<Box<dyn Directory>>;

    /// Make sure the backing store exists and is usable.
    fn ensure_repo(&self, cancel: &CancellationToken) -> Result<()>;
}

/// Fail with [`Error::Cancelled`] once `cancel` has been triggered.
pub fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels_match_json_names() {
        for outcome in [
            UpdateOutcome::Installed,
            UpdateOutcome::Updated,
            UpdateOutcome::UpToDate,
            UpdateOutcome::Downloaded,
        ] {
            let json = serde_json::to_string(&outcome).expect("Failed to serialize");
            assert_eq!(json, format!("\"{outcome}\""));
        }
        assert_eq!(UpdateOutcome::UpToDate.to_string(), "up-to-date");
    }
}
