//! Core install orchestration: a primary reference and its related refs.
//!
//! Installing the primary reference is a hard step; any failure aborts and
//! propagates unchanged. Related references are soft steps: each failure is
//! recorded as a warning and the next related reference is still attempted.

use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::directory::{Directory, UpdateOutcome};
use crate::error::{Error, Result};
use crate::options::InstallOptions;
use crate::reference::Reference;
use crate::related::{RelatedRef, expand_related};

/// Receives progress as it happens, in install order.
pub trait InstallObserver {
    fn installing(&self, _reference: &Reference) {}

    fn installing_related(&self, _reference: &Reference) {}

    fn installing_bundle(&self, _path: &Path) {}

    fn warning(&self, _message: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl InstallObserver for SilentObserver {}

/// What happened to one related reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RelatedStatus {
    Installed { outcome: UpdateOutcome },
    /// Tracked but marked as not to be downloaded.
    Skipped,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedReport {
    pub reference: Reference,
    #[serde(flatten)]
    pub status: RelatedStatus,
}

/// Report for one primary reference.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub reference: Reference,
    pub remote: Option<String>,
    /// Related references in discovery order.
    pub related: Vec<RelatedReport>,
    pub warnings: Vec<String>,
}

impl InstallReport {
    pub fn new(reference: Reference, remote: Option<String>) -> Self {
        Self {
            reference,
            remote,
            related: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn failed_related(&self) -> impl Iterator<Item = &RelatedReport> {
        self.related
            .iter()
            .filter(|r| matches!(r.status, RelatedStatus::Failed { .. }))
    }
}

pub struct InstallOrchestrator<'a> {
    dir: &'a dyn Directory,
    options: &'a InstallOptions,
    cancel: &'a CancellationToken,
    observer: &'a dyn InstallObserver,
}

impl std::fmt::Debug for InstallOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallOrchestrator")
            .field("dir", &self.dir)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> InstallOrchestrator<'a> {
    pub fn new(
        dir: &'a dyn Directory,
        options: &'a InstallOptions,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            dir,
            options,
            cancel,
            observer: &SilentObserver,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn InstallObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Install each reference in turn. The first failing primary aborts the
    /// remaining ones.
    pub fn install_all(&self, refs: &[Reference], remote: &str) -> Result<Vec<InstallReport>> {
        refs.iter()
            .map(|reference| self.install(reference, remote))
            .collect()
    }

    /// Install `reference` from `remote`, then its related references.
    pub fn install(&self, reference: &Reference, remote: &str) -> Result<InstallReport> {
        self.observer.installing(reference);
        self.dir.install(
            self.options,
            reference,
            remote,
            &self.options.subpaths,
            self.cancel,
        )?;
        tracing::info!(reference = %reference, remote, "Installed");

        let mut report = InstallReport::new(reference.clone(), Some(remote.to_string()));
        if self.options.no_related {
            return Ok(report);
        }

        let related =
            match expand_related(self.dir, reference, remote, self.options.no_pull, self.cancel) {
                Ok(related) => related,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    let message = format!("Problem looking for related refs: {err}");
                    tracing::warn!(reference = %reference, error = %err, "Related lookup failed");
                    self.observer.warning(&message);
                    report.warnings.push(message);
                    Vec::new()
                }
            };

        for item in &related {
            let entry = self.install_related(item)?;
            if let RelatedStatus::Failed { message } = &entry.status {
                report.warnings.push(message.clone());
            }
            report.related.push(entry);
        }

        Ok(report)
    }

    /// Only cancellation escapes; every other failure becomes a
    /// [`RelatedStatus::Failed`] entry.
    fn install_related(&self, item: &RelatedRef) -> Result<RelatedReport> {
        let reference = item.reference.clone();
        if !item.download {
            tracing::debug!(reference = %reference, "Skipping related ref marked no-download");
            return Ok(RelatedReport {
                reference,
                status: RelatedStatus::Skipped,
            });
        }

        self.observer.installing_related(&reference);
        let status = match self.dir.install_or_update(
            self.options,
            &reference,
            &item.remote,
            &item.subpaths,
            self.cancel,
        ) {
            Ok(outcome) => RelatedStatus::Installed { outcome },
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) => {
                let message = format!("Failed to install related ref {reference}: {err}");
                tracing::warn!(reference = %reference, error = %err, "Related install failed");
                self.observer.warning(&message);
                RelatedStatus::Failed { message }
            }
        };

        Ok(RelatedReport { reference, status })
    }
}
