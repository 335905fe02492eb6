//! Filesystem-backed installation directory.
//!
//! Layout under the root:
//! - `config.toml`: default arch and configured remotes
//! - `repo/<remote>/summary.toml`: cached remote metadata
//! - `repo/<remote>/<kind>/<id>/<arch>/<branch>/{files,commit}`: pulled content
//! - `deploy/<kind>/<id>/<arch>/<branch>/{files,deploy.toml}`: deployments
//!
//! Remotes are `file://` URLs or plain paths whose root holds `summary.toml`
//! and `content/<kind>/<id>/<arch>/<branch>/`.

pub mod bundle;
pub mod config;
pub mod descriptor;
pub mod summary;
pub mod tree;

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::directory::{Directory, UpdateOutcome, check_cancelled};
use crate::error::{Error, Result};
use crate::options::InstallOptions;
use crate::reference::{Reference, host_arch};
use crate::related::RelatedRef;

use self::bundle::Bundle;
use self::config::{ConfigStore, DirectoryConfig, RemoteConfig};
use self::descriptor::Descriptor;
use self::summary::{RemoteSummary, SUMMARY_FILE};
use self::tree::{commit_id, copy_tree};

/// Remote name recorded for bundles that carry no origin.
pub const BUNDLE_REMOTE: &str = "_bundles";

const DEPLOY_FILE: &str = "deploy.toml";
const COMMIT_FILE: &str = "commit";

/// Record of one deployed reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Deployment {
    pub remote: String,
    pub commit: String,
    #[serde(default)]
    pub subpaths: Vec<String>,
    pub installed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct LocalDirectory {
    root: PathBuf,
    store: ConfigStore,
    config: DirectoryConfig,
    default_arch: String,
}

impl LocalDirectory {
    /// Open the installation at `root`, reading its configuration once.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let store = ConfigStore::new(&root);
        let config = store.load().map_err(|err| {
            Error::storage(
                format!("Failed to load {}", store.config_path().display()),
                err,
            )
        })?;
        let default_arch = config
            .default_arch
            .clone()
            .unwrap_or_else(|| host_arch().to_string());
        tracing::debug!(root = %root.display(), arch = %default_arch, "Opened directory");

        Ok(Self {
            root,
            store,
            config,
            default_arch,
        })
    }

    /// Open the installation under the platform data directory.
    pub fn with_defaults() -> Result<Self> {
        let base = dirs::data_local_dir()
            .ok_or_else(|| Error::not_found("Could not determine data directory"))?;
        Self::open(base.join("parcel"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Add or replace a remote in the stored configuration. This handle keeps
    /// its loaded configuration; reopen to observe the change.
    pub fn add_remote(&self, name: &str, remote: RemoteConfig) -> Result<()> {
        let mut config = self.load_stored_config()?;
        config.remote.insert(name.to_string(), remote);
        self.save_config(&config)
    }

    /// Deployment record of `reference`, if it is deployed.
    pub fn deployment(&self, reference: &Reference) -> Result<Option<Deployment>> {
        let path = self.deploy_dir(reference).join(DEPLOY_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|err| Error::io(&path, err))?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|err| {
                Error::malformed(format!("deployment {}", path.display()), err.to_string())
            })
    }

    /// Directory holding the deployed files of `reference`.
    pub fn deployed_files(&self, reference: &Reference) -> PathBuf {
        self.deploy_dir(reference).join("files")
    }

    fn load_stored_config(&self) -> Result<DirectoryConfig> {
        self.store.load().map_err(|err| {
            Error::storage(
                format!("Failed to load {}", self.store.config_path().display()),
                err,
            )
        })
    }

    fn save_config(&self, config: &DirectoryConfig) -> Result<()> {
        self.store.save(config).map_err(|err| {
            Error::storage(
                format!("Failed to save {}", self.store.config_path().display()),
                err,
            )
        })
    }

    fn remote(&self, name: &str) -> Result<&RemoteConfig> {
        self.config
            .remote
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Remote '{name}' not found")))
    }

    fn remote_root(&self, name: &str) -> Result<PathBuf> {
        let remote = self.remote(name)?;
        match url::Url::parse(&remote.url) {
            Ok(parsed) if parsed.scheme() == "file" => parsed.to_file_path().map_err(|()| {
                Error::malformed(format!("remote {name}"), format!("bad file URL {}", remote.url))
            }),
            Ok(parsed) => Err(Error::malformed(
                format!("remote {name}"),
                format!("unsupported URL scheme '{}'", parsed.scheme()),
            )),
            Err(_) => Ok(PathBuf::from(&remote.url)),
        }
    }

    fn repo_dir(&self, remote: &str) -> PathBuf {
        self.root.join("repo").join(remote)
    }

    fn repo_ref_dir(&self, remote: &str, reference: &Reference) -> PathBuf {
        let mut dir = self.repo_dir(remote);
        dir.extend(reference.path_components());
        dir
    }

    fn deploy_dir(&self, reference: &Reference) -> PathBuf {
        let mut dir = self.root.join("deploy");
        dir.extend(reference.path_components());
        dir
    }

    /// Read the remote's summary and cache it for offline use.
    fn fetch_summary(&self, remote: &str, cancel: &CancellationToken) -> Result<RemoteSummary> {
        check_cancelled(cancel)?;
        let path = self.remote_root(remote)?.join(SUMMARY_FILE);
        if !path.exists() {
            return Err(Error::not_found(format!(
                "Remote {remote} has no summary at {}",
                path.display()
            )));
        }
        let summary = RemoteSummary::load(&path).map_err(|err| {
            Error::malformed(format!("summary of remote {remote}"), format!("{err:#}"))
        })?;

        if let Some(expected) = &self.remote(remote)?.key_fingerprint
            && summary.signed_by.as_ref() != Some(expected)
        {
            return Err(Error::malformed(
                format!("summary of remote {remote}"),
                "not signed by the configured key",
            ));
        }

        let cached = self.repo_dir(remote).join(SUMMARY_FILE);
        summary.save(&cached).map_err(|err| {
            Error::storage(format!("Failed to cache summary of remote {remote}"), err)
        })?;
        Ok(summary)
    }

    fn cached_summary(&self, remote: &str) -> Result<RemoteSummary> {
        let path = self.repo_dir(remote).join(SUMMARY_FILE);
        if !path.exists() {
            return Err(Error::not_found(format!(
                "No cached metadata for remote {remote}"
            )));
        }
        RemoteSummary::load(&path).map_err(|err| {
            Error::malformed(format!("cached summary of remote {remote}"), format!("{err:#}"))
        })
    }

    fn cached_commit(&self, remote: &str, reference: &Reference) -> Option<String> {
        let path = self.repo_ref_dir(remote, reference).join(COMMIT_FILE);
        std::fs::read_to_string(path)
            .ok()
            .map(|commit| commit.trim().to_string())
    }

    /// Copy the remote content of `reference` into the local repo and return
    /// its commit id.
    fn pull(
        &self,
        remote: &str,
        reference: &Reference,
        cancel: &CancellationToken,
    ) -> Result<String> {
        check_cancelled(cancel)?;
        let mut content = self.remote_root(remote)?.join("content");
        content.extend(reference.path_components());
        if !content.is_dir() {
            return Err(Error::not_found(format!(
                "{reference} not found in remote {remote}"
            )));
        }

        let ref_dir = self.repo_ref_dir(remote, reference);
        let pulled = copy_tree(&content, &ref_dir.join("files"), &[])
            .and_then(|()| record_commit(&ref_dir))
            .map_err(|err| Error::install(reference, err))?;

        tracing::debug!(reference = %reference, remote, commit = %pulled, "Pulled");
        Ok(pulled)
    }

    /// Commit to deploy: freshly pulled, or from the cache with `no_pull`.
    fn obtain(
        &self,
        options: &InstallOptions,
        remote: &str,
        reference: &Reference,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if options.no_pull {
            self.cached_commit(remote, reference).ok_or_else(|| {
                Error::install(
                    reference,
                    anyhow::anyhow!("not in the local cache, can't install without pulling"),
                )
            })
        } else {
            self.pull(remote, reference, cancel)
        }
    }

    fn deploy(
        &self,
        remote: &str,
        reference: &Reference,
        subpaths: &[String],
        commit: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_cancelled(cancel)?;
        let source = self.repo_ref_dir(remote, reference).join("files");
        let deploy_dir = self.deploy_dir(reference);

        let record = Deployment {
            remote: remote.to_string(),
            commit: commit.to_string(),
            subpaths: subpaths.to_vec(),
            installed_at: chrono::Utc::now(),
        };
        copy_tree(&source, &deploy_dir.join("files"), subpaths)
            .and_then(|()| write_deployment(&deploy_dir, &record))
            .map_err(|err| Error::install(reference, err))?;

        tracing::debug!(reference = %reference, commit, "Deployed");
        Ok(())
    }

    /// Register the origin of a bundle, reusing a remote with the same URL.
    fn ensure_origin_remote(&self, reference: &Reference, url: &str) -> Result<String> {
        let mut config = self.load_stored_config()?;
        if let Some(existing) = config.remote_for_url(url) {
            return Ok(existing.to_string());
        }
        let name = config.unique_remote_name(&format!("{}-origin", reference.id()));
        let mut remote = RemoteConfig::new(url);
        remote.default_branch = Some(reference.branch().to_string());
        config.remote.insert(name.clone(), remote);
        self.save_config(&config)?;
        Ok(name)
    }

    fn ensure_not_deployed(&self, reference: &Reference) -> Result<()> {
        if let Some(existing) = self.deployment(reference)? {
            return Err(Error::install(
                reference,
                anyhow::anyhow!("already installed from remote {}", existing.remote),
            ));
        }
        Ok(())
    }
}

impl Directory for LocalDirectory {
    fn default_arch(&self) -> &str {
        &self.default_arch
    }

    fn list_remotes(&self) -> Result<Vec<String>> {
        Ok(self.config.remote.keys().cloned().collect())
    }

    fn remote_default_branch(&self, remote: &str) -> Result<Option<String>> {
        if let Some(branch) = &self.remote(remote)?.default_branch {
            return Ok(Some(branch.clone()));
        }
        match self.cached_summary(remote) {
            Ok(summary) => Ok(summary.default_branch),
            Err(Error::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn list_remote_refs(
        &self,
        remote: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reference>> {
        Ok(self.fetch_summary(remote, cancel)?.references())
    }

    fn install(
        &self,
        options: &InstallOptions,
        reference: &Reference,
        remote: &str,
        subpaths: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_cancelled(cancel)?;
        self.remote(remote)?;
        self.ensure_not_deployed(reference)?;

        let commit = self.obtain(options, remote, reference, cancel)?;
        if options.no_deploy {
            return Ok(());
        }
        self.deploy(remote, reference, subpaths, &commit, cancel)
    }

    fn install_or_update(
        &self,
        options: &InstallOptions,
        reference: &Reference,
        remote: &str,
        subpaths: &[String],
        cancel: &CancellationToken,
    ) -> Result<UpdateOutcome> {
        check_cancelled(cancel)?;
        self.remote(remote)?;
        let existing = self.deployment(reference)?;
        let commit = self.obtain(options, remote, reference, cancel)?;

        let current = existing
            .as_ref()
            .is_some_and(|d| d.commit == commit && d.subpaths == subpaths);
        if options.no_deploy {
            return Ok(if current {
                UpdateOutcome::UpToDate
            } else {
                UpdateOutcome::Downloaded
            });
        }
        if current {
            return Ok(UpdateOutcome::UpToDate);
        }

        self.deploy(remote, reference, subpaths, &commit, cancel)?;
        Ok(if existing.is_some() {
            UpdateOutcome::Updated
        } else {
            UpdateOutcome::Installed
        })
    }

    fn install_bundle(
        &self,
        path: &Path,
        key_material: Option<&[u8]>,
        cancel: &CancellationToken,
    ) -> Result<Reference> {
        check_cancelled(cancel)?;
        let mut bundle = Bundle::open(path)?;
        let reference = bundle.reference().clone();
        bundle
            .verify(key_material)
            .map_err(|err| Error::install(&reference, err))?;
        self.ensure_not_deployed(&reference)?;

        let remote = match bundle.meta().origin.clone() {
            Some(url) => self.ensure_origin_remote(&reference, &url)?,
            None => BUNDLE_REMOTE.to_string(),
        };

        let ref_dir = self.repo_ref_dir(&remote, &reference);
        let commit = extract_bundle(&mut bundle, &ref_dir)
            .and_then(|()| record_commit(&ref_dir))
            .map_err(|err| Error::install(&reference, err))?;

        self.deploy(&remote, &reference, &[], &commit, cancel)?;
        Ok(reference)
    }

    fn find_local_related(
        &self,
        reference: &Reference,
        remote: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<RelatedRef>> {
        self.cached_summary(remote)?
            .related(reference, remote)
            .ok_or_else(|| {
                Error::not_found(format!("{reference} not in cached metadata of {remote}"))
            })
    }

    fn find_remote_related(
        &self,
        reference: &Reference,
        remote: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RelatedRef>> {
        self.fetch_summary(remote, cancel)?
            .related(reference, remote)
            .ok_or_else(|| Error::not_found(format!("{reference} not found in remote {remote}")))
    }

    fn create_remote_for_ref_file(&self, data: &[u8]) -> Result<(String, Reference)> {
        let descriptor = Descriptor::parse(data)?;
        let reference = descriptor.reference(&self.default_arch)?;
        let remote = descriptor.remote_config();

        let mut config = self.load_stored_config()?;
        if let Some(existing) = config.remote_for_url(&remote.url) {
            return Ok((existing.to_string(), reference));
        }

        let name = config.unique_remote_name(&descriptor.suggested_remote_name());
        config.remote.insert(name.clone(), remote);
        self.save_config(&config)?;
        tracing::info!(remote = %name, "Added remote");
        Ok((name, reference))
    }

    fn reopen(&self) -> Result<Box<dyn Directory>> {
        Ok(Box::new(Self::open(self.root.clone())?))
    }

    fn ensure_repo(&self, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        for dir in [self.root.join("repo"), self.root.join("deploy")] {
            std::fs::create_dir_all(&dir).map_err(|err| Error::io(&dir, err))?;
        }
        Ok(())
    }
}

/// Hash `<ref_dir>/files` and store the result as the cached commit.
fn record_commit(ref_dir: &Path) -> anyhow::Result<String> {
    let commit = commit_id(&ref_dir.join("files"))?;
    std::fs::write(ref_dir.join(COMMIT_FILE), &commit)
        .with_context(|| format!("Failed to record commit in {}", ref_dir.display()))?;
    Ok(commit)
}

fn write_deployment(deploy_dir: &Path, record: &Deployment) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(record).context("Failed to serialize deployment")?;
    std::fs::write(deploy_dir.join(DEPLOY_FILE), content).with_context(|| {
        format!("Failed to write deployment record in {}", deploy_dir.display())
    })
}

fn extract_bundle(bundle: &mut Bundle, ref_dir: &Path) -> anyhow::Result<()> {
    let files = ref_dir.join("files");
    if files.exists() {
        std::fs::remove_dir_all(&files)
            .with_context(|| format!("Failed to remove {}", files.display()))?;
    }
    bundle.extract_files(&files)
}
