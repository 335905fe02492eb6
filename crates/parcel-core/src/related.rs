//! Related references: content installed alongside a primary reference.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::directory::Directory;
use crate::error::Result;
use crate::reference::Reference;

/// A reference that tracks a primary installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedRef {
    pub reference: Reference,
    pub remote: String,
    pub subpaths: Vec<String>,
    /// `false` marks a tracked reference that is never installed.
    pub download: bool,
}

impl RelatedRef {
    pub fn new(reference: Reference, remote: impl Into<String>) -> Self {
        Self {
            reference,
            remote: remote.into(),
            subpaths: Vec::new(),
            download: true,
        }
    }

    pub fn with_subpaths<I, S>(mut self, subpaths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subpaths = subpaths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }
}

/// Discover the related references of `primary`.
///
/// With `local_only` only cached metadata is consulted, which is what an
/// install without pulling must do. Errors are returned to the caller, which
/// is expected to downgrade them to a warning.
pub fn expand_related(
    dir: &dyn Directory,
    primary: &Reference,
    remote: &str,
    local_only: bool,
    cancel: &CancellationToken,
) -> Result<Vec<RelatedRef>> {
    let related = if local_only {
        dir.find_local_related(primary, remote, cancel)?
    } else {
        dir.find_remote_related(primary, remote, cancel)?
    };
    tracing::debug!(
        reference = %primary,
        remote,
        local_only,
        count = related.len(),
        "Expanded related references"
    );
    Ok(related)
}
