//! Turns user-supplied partial references into fully qualified ones.

use tokio_util::sync::CancellationToken;

use crate::directory::{Directory, check_cancelled};
use crate::error::{Error, Result};
use crate::reference::{KindMask, PartialRef, Reference, looks_like_branch};

/// Positional arguments of the default install form, `REMOTE REF...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArgs {
    pub remote: String,
    pub prefs: Vec<String>,
    /// Set by the legacy `REMOTE ID BRANCH` form.
    pub default_branch: Option<String>,
}

impl RemoteArgs {
    /// Split positionals into remote and refs.
    ///
    /// With exactly two refs, a second argument that [`looks_like_branch`] is
    /// taken as the branch of the first, for compatibility with the old
    /// `REMOTE ID BRANCH` form. The heuristic is fuzzy: a dot-free word meant
    /// as a second ref is read as a branch.
    pub fn parse(args: &[String]) -> Result<Self> {
        let [remote, prefs @ ..] = args else {
            return Err(Error::usage("REMOTE and REF must be specified"));
        };
        if prefs.is_empty() {
            return Err(Error::usage("REMOTE and REF must be specified"));
        }

        if let [id, branch] = prefs
            && looks_like_branch(branch)
        {
            tracing::debug!(id = %id, branch = %branch, "Using legacy REMOTE ID BRANCH form");
            return Ok(Self {
                remote: remote.clone(),
                prefs: vec![id.clone()],
                default_branch: Some(branch.clone()),
            });
        }

        Ok(Self {
            remote: remote.clone(),
            prefs: prefs.to_vec(),
            default_branch: None,
        })
    }
}

/// Resolves partial references against a remote's metadata.
#[derive(Debug)]
pub struct RefResolver<'a> {
    dir: &'a dyn Directory,
    cancel: &'a CancellationToken,
}

impl<'a> RefResolver<'a> {
    pub fn new(dir: &'a dyn Directory, cancel: &'a CancellationToken) -> Self {
        Self { dir, cancel }
    }

    /// Resolve `input` (`[kind/]id[/arch[/branch]]`) to one reference in
    /// `remote`.
    ///
    /// Embedded arch and branch win over `explicit_arch` and `default_branch`.
    /// A missing branch falls back to the remote's default branch and a
    /// missing arch to the directory's default arch.
    pub fn resolve(
        &self,
        input: &str,
        remote: &str,
        mask: KindMask,
        explicit_arch: Option<&str>,
        default_branch: Option<&str>,
    ) -> Result<Reference> {
        check_cancelled(self.cancel)?;

        let mut pref = PartialRef::parse(input, mask, explicit_arch, default_branch)?;
        let refs = self.dir.list_remote_refs(remote, self.cancel)?;
        if pref.branch.is_none() {
            pref.branch = self.dir.remote_default_branch(remote)?;
        }
        if pref.arch.is_none() {
            pref.arch = Some(self.dir.default_arch().to_string());
        }

        let mut candidates: Vec<Reference> = refs.into_iter().filter(|r| pref.matches(r)).collect();
        candidates.sort();
        candidates.dedup();

        match candidates.len() {
            0 => Err(Error::not_found(format!(
                "Can't find ref {pref} in remote {remote}"
            ))),
            1 => {
                let reference = candidates.remove(0);
                tracing::debug!(input, remote, reference = %reference, "Resolved reference");
                Ok(reference)
            }
            _ => Err(Error::AmbiguousRef {
                id: pref.id,
                matches: candidates.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Resolve every ref of a `REMOTE REF...` invocation. The first failure
    /// aborts, before anything is installed.
    pub fn resolve_all(
        &self,
        args: &RemoteArgs,
        mask: KindMask,
        explicit_arch: Option<&str>,
    ) -> Result<Vec<Reference>> {
        args.prefs
            .iter()
            .map(|pref| {
                self.resolve(
                    pref,
                    &args.remote,
                    mask,
                    explicit_arch,
                    args.default_branch.as_deref(),
                )
            })
            .collect()
    }
}
