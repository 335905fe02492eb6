//! Per-invocation install options.

use serde::Serialize;

/// Options shared by every install call of one command invocation.
///
/// Built once at the entry point and passed by reference; nothing downstream
/// mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallOptions {
    /// Install only from the local cache
    pub no_pull: bool,
    /// Download into the local cache without deploying
    pub no_deploy: bool,
    /// Skip related references
    pub no_related: bool,
    /// Restrict the primary reference to these subpaths
    pub subpaths: Vec<String>,
}

impl InstallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_no_pull(mut self, no_pull: bool) -> Self {
        self.no_pull = no_pull;
        self
    }

    pub fn with_no_deploy(mut self, no_deploy: bool) -> Self {
        self.no_deploy = no_deploy;
        self
    }

    pub fn with_no_related(mut self, no_related: bool) -> Self {
        self.no_related = no_related;
        self
    }

    pub fn with_subpaths<I, S>(mut self, subpaths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subpaths = subpaths.into_iter().map(Into::into).collect();
        self
    }
}
