//! Install from a remote descriptor file (`install --from FILE`).

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::options::InstallOptions;
use crate::orchestrator::{InstallObserver, InstallOrchestrator, InstallReport};

/// Check that exactly one descriptor path was given. Runs before any I/O.
pub fn descriptor_path(args: &[String]) -> Result<&Path> {
    match args {
        [] => Err(Error::usage("Filename must be specified")),
        [path] => Ok(Path::new(path)),
        _ => Err(Error::usage("Too many arguments")),
    }
}

/// Register the remote a descriptor describes and install its reference.
///
/// The remote may be registered out of process, so installation runs on a
/// handle obtained from [`Directory::reopen`] after registration, never on
/// `dir` itself.
pub fn install_from(
    dir: &dyn Directory,
    args: &[String],
    options: &InstallOptions,
    cancel: &CancellationToken,
    observer: &dyn InstallObserver,
) -> Result<InstallReport> {
    let path = descriptor_path(args)?;
    let data = std::fs::read(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::not_found(format!("Descriptor file not found: {}", path.display()))
        } else {
            Error::io(path, err)
        }
    })?;

    let (remote, reference) = dir.create_remote_for_ref_file(&data)?;
    tracing::debug!(remote = %remote, reference = %reference, "Registered remote from descriptor");

    let fresh = dir.reopen()?;
    fresh.ensure_repo(cancel)?;

    InstallOrchestrator::new(fresh.as_ref(), options, cancel)
        .with_observer(observer)
        .install(&reference, &remote)
}
