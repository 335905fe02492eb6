//! Install from a local bundle file.

use std::io::Read;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::keyring::{KeySource, read_key_material};
use crate::orchestrator::{InstallObserver, InstallReport};

/// Check that exactly one bundle path was given. Runs before any I/O.
pub fn bundle_path(args: &[String]) -> Result<&Path> {
    match args {
        [] => Err(Error::usage("Bundle filename must be specified")),
        [path] => Ok(Path::new(path)),
        _ => Err(Error::usage("Too many arguments")),
    }
}

/// Install the bundle named by the single positional argument.
///
/// When `key_sources` is non-empty their concatenated contents replace the
/// keys embedded in the bundle. The reference comes from the bundle itself.
pub fn install_bundle(
    dir: &dyn Directory,
    args: &[String],
    key_sources: &[KeySource],
    stdin: &mut dyn Read,
    cancel: &CancellationToken,
    observer: &dyn InstallObserver,
) -> Result<InstallReport> {
    let path = bundle_path(args)?;
    let key_material = read_key_material(key_sources, stdin)?;
    if key_material.is_some() {
        tracing::debug!(bundle = %path.display(), "Overriding embedded bundle keys");
    }

    observer.installing_bundle(path);
    let reference = dir.install_bundle(path, key_material.as_deref(), cancel)?;
    tracing::info!(reference = %reference, bundle = %path.display(), "Installed bundle");

    Ok(InstallReport::new(reference, None))
}
