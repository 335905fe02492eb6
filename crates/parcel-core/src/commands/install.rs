//! Install command entry point.
//!
//! Picks one of the three install flows from the request mode:
//! - [`InstallMode::Remote`]: resolve `REMOTE REF...` and install each ref
//! - [`InstallMode::Bundle`]: install a local bundle file
//! - [`InstallMode::From`]: register a remote from a descriptor and install

use std::io::Read;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::commands::bundle::install_bundle;
use crate::commands::from_file::install_from;
use crate::directory::Directory;
use crate::error::Result;
use crate::keyring::KeySource;
use crate::options::InstallOptions;
use crate::orchestrator::{InstallObserver, InstallOrchestrator, InstallReport, SilentObserver};
use crate::reference::KindMask;
use crate::resolver::{RefResolver, RemoteArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallMode {
    /// `REMOTE REF...`
    #[default]
    Remote,
    /// `--bundle FILE`
    Bundle,
    /// `--from FILE`
    From,
}

/// Everything one `install` invocation asked for.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub mode: InstallMode,
    /// Positional arguments, interpreted according to `mode`
    pub args: Vec<String>,
    /// Kinds to look for (`--app`/`--runtime`)
    pub kinds: KindMask,
    /// Arch to install for, instead of the directory default
    pub arch: Option<String>,
    /// Key material overriding a bundle's embedded keys
    pub key_sources: Vec<KeySource>,
    pub options: InstallOptions,
}

impl InstallRequest {
    pub fn remote<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: InstallMode::Remote,
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn bundle<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: InstallMode::Bundle,
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_file<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: InstallMode::From,
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_kinds(mut self, kinds: KindMask) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }

    pub fn with_key_source(mut self, source: KeySource) -> Self {
        self.key_sources.push(source);
        self
    }

    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }
}

/// Install command bound to one directory and one cancellation token.
pub struct InstallCommand<'a> {
    dir: &'a dyn Directory,
    cancel: &'a CancellationToken,
    observer: &'a dyn InstallObserver,
}

impl std::fmt::Debug for InstallCommand<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallCommand")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl<'a> InstallCommand<'a> {
    pub fn new(dir: &'a dyn Directory, cancel: &'a CancellationToken) -> Self {
        Self {
            dir,
            cancel,
            observer: &SilentObserver,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn InstallObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Run the request, reading `-` key material from the process stdin.
    pub fn execute(&self, request: &InstallRequest) -> Result<Vec<InstallReport>> {
        let stdin = std::io::stdin();
        let mut lock = stdin.lock();
        self.execute_with_stdin(request, &mut lock)
    }

    /// Run the request with an explicit reader standing in for stdin.
    pub fn execute_with_stdin(
        &self,
        request: &InstallRequest,
        stdin: &mut dyn Read,
    ) -> Result<Vec<InstallReport>> {
        match request.mode {
            InstallMode::Bundle => install_bundle(
                self.dir,
                &request.args,
                &request.key_sources,
                stdin,
                self.cancel,
                self.observer,
            )
            .map(|report| vec![report]),
            InstallMode::From => install_from(
                self.dir,
                &request.args,
                &request.options,
                self.cancel,
                self.observer,
            )
            .map(|report| vec![report]),
            InstallMode::Remote => self.install_remote(request),
        }
    }

    /// Resolve every ref first, then install them in order.
    fn install_remote(&self, request: &InstallRequest) -> Result<Vec<InstallReport>> {
        let args = RemoteArgs::parse(&request.args)?;
        let refs = RefResolver::new(self.dir, self.cancel).resolve_all(
            &args,
            request.kinds,
            request.arch.as_deref(),
        )?;

        InstallOrchestrator::new(self.dir, &request.options, self.cancel)
            .with_observer(self.observer)
            .install_all(&refs, &args.remote)
    }
}
