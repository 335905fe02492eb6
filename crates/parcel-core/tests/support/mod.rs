//! Recording in-memory [`Directory`] for orchestration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use parcel_core::directory::{Directory, UpdateOutcome};
use parcel_core::error::{Error, Result};
use parcel_core::options::InstallOptions;
use parcel_core::reference::Reference;
use parcel_core::related::RelatedRef;
use tokio_util::sync::CancellationToken;

pub fn reference(s: &str) -> Reference {
    s.parse().expect("valid reference")
}

pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone)]
pub struct FakeDirectory {
    arch: String,
    remotes: Vec<String>,
    refs: Vec<Reference>,
    default_branch: Option<String>,
    related: BTreeMap<String, Vec<RelatedRef>>,
    failing_installs: HashSet<String>,
    failing_updates: HashSet<String>,
    cancel_on_update: HashSet<String>,
    failing_lookup: bool,
    descriptor_target: Option<(String, Reference)>,
    generation: u32,
    calls: Rc<RefCell<Vec<String>>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self {
            arch: "x86_64".to_string(),
            remotes: vec!["origin".to_string()],
            refs: Vec::new(),
            default_branch: None,
            related: BTreeMap::new(),
            failing_installs: HashSet::new(),
            failing_updates: HashSet::new(),
            cancel_on_update: HashSet::new(),
            failing_lookup: false,
            descriptor_target: None,
            generation: 0,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn with_refs(mut self, refs: &[&str]) -> Self {
        self.refs.extend(refs.iter().map(|r| reference(r)));
        self
    }

    pub fn with_remote(mut self, remote: &str) -> Self {
        self.remotes.push(remote.to_string());
        self
    }

    pub fn with_default_branch(mut self, branch: &str) -> Self {
        self.default_branch = Some(branch.to_string());
        self
    }

    pub fn with_related(mut self, primary: &str, related: Vec<RelatedRef>) -> Self {
        self.related.insert(primary.to_string(), related);
        self
    }

    pub fn failing_install(mut self, reference: &str) -> Self {
        self.failing_installs.insert(reference.to_string());
        self
    }

    pub fn failing_update(mut self, reference: &str) -> Self {
        self.failing_updates.insert(reference.to_string());
        self
    }

    pub fn cancelled_on_update(mut self, reference: &str) -> Self {
        self.cancel_on_update.insert(reference.to_string());
        self
    }

    pub fn failing_related_lookup(mut self) -> Self {
        self.failing_lookup = true;
        self
    }

    pub fn with_descriptor_target(mut self, remote: &str, reference: &str) -> Self {
        self.descriptor_target = Some((remote.to_string(), self::reference(reference)));
        self
    }

    /// Every collaborator call so far, shared with reopened handles.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls starting with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    fn record(&self, call: String) {
        let call = if self.generation > 0 {
            format!("{call} [reopened]")
        } else {
            call
        };
        self.calls.borrow_mut().push(call);
    }

    fn related_of(&self, reference: &Reference) -> Result<Vec<RelatedRef>> {
        if self.failing_lookup {
            return Err(Error::not_found("metadata unavailable"));
        }
        Ok(self
            .related
            .get(&reference.to_string())
            .cloned()
            .unwrap_or_default())
    }
}

impl Directory for FakeDirectory {
    fn default_arch(&self) -> &str {
        &self.arch
    }

    fn list_remotes(&self) -> Result<Vec<String>> {
        Ok(self.remotes.clone())
    }

    fn remote_default_branch(&self, _remote: &str) -> Result<Option<String>> {
        Ok(self.default_branch.clone())
    }

    fn list_remote_refs(&self, remote: &str, _cancel: &CancellationToken) -> Result<Vec<Reference>> {
        self.record(format!("list_remote_refs {remote}"));
        Ok(self.refs.clone())
    }

    fn install(
        &self,
        options: &InstallOptions,
        reference: &Reference,
        remote: &str,
        subpaths: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        parcel_core::directory::check_cancelled(cancel)?;
        let mut call = format!("install {reference} from {remote}");
        if options.no_pull {
            call.push_str(" no-pull");
        }
        if !subpaths.is_empty() {
            call.push_str(&format!(" subpaths={}", subpaths.join(",")));
        }
        self.record(call);
        if self.failing_installs.contains(&reference.to_string()) {
            return Err(Error::install(reference, anyhow::anyhow!("pull failed")));
        }
        Ok(())
    }

    fn install_or_update(
        &self,
        _options: &InstallOptions,
        reference: &Reference,
        remote: &str,
        subpaths: &[String],
        _cancel: &CancellationToken,
    ) -> Result<UpdateOutcome> {
        let mut call = format!("install_or_update {reference} from {remote}");
        if !subpaths.is_empty() {
            call.push_str(&format!(" subpaths={}", subpaths.join(",")));
        }
        self.record(call);
        let key = reference.to_string();
        if self.cancel_on_update.contains(&key) {
            return Err(Error::Cancelled);
        }
        if self.failing_updates.contains(&key) {
            return Err(Error::install(reference, anyhow::anyhow!("deploy failed")));
        }
        Ok(UpdateOutcome::Installed)
    }

    fn install_bundle(
        &self,
        path: &Path,
        key_material: Option<&[u8]>,
        _cancel: &CancellationToken,
    ) -> Result<Reference> {
        let keys = key_material
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_else(|| "embedded".to_string());
        self.record(format!("install_bundle {} keys={keys}", path.display()));
        Ok(reference("app/org.example.Bundled/x86_64/stable"))
    }

    fn find_local_related(
        &self,
        reference: &Reference,
        remote: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<RelatedRef>> {
        self.record(format!("find_local_related {reference} in {remote}"));
        self.related_of(reference)
    }

    fn find_remote_related(
        &self,
        reference: &Reference,
        remote: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<RelatedRef>> {
        self.record(format!("find_remote_related {reference} in {remote}"));
        self.related_of(reference)
    }

    fn create_remote_for_ref_file(&self, data: &[u8]) -> Result<(String, Reference)> {
        self.record(format!("create_remote ({} bytes)", data.len()));
        self.descriptor_target
            .clone()
            .ok_or_else(|| Error::malformed("descriptor", "no target configured"))
    }

    fn reopen(&self) -> Result<Box<dyn Directory>> {
        self.record("reopen".to_string());
        let mut fresh = self.clone();
        fresh.generation += 1;
        Ok(Box::new(fresh))
    }

    fn ensure_repo(&self, _cancel: &CancellationToken) -> Result<()> {
        self.record("ensure_repo".to_string());
        Ok(())
    }
}
