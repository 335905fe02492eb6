//! Orchestration of a primary install and its related references.

mod support;

use std::cell::RefCell;

use parcel_core::error::Error;
use parcel_core::options::InstallOptions;
use parcel_core::orchestrator::{InstallObserver, InstallOrchestrator, RelatedStatus};
use parcel_core::reference::Reference;
use parcel_core::related::RelatedRef;
use tokio_util::sync::CancellationToken;

use support::{FakeDirectory, reference};

const APP: &str = "app/org.example.App/x86_64/stable";
const LOCALE: &str = "runtime/org.example.App.Locale/x86_64/stable";
const DEBUG: &str = "runtime/org.example.App.Debug/x86_64/stable";
const PLUGIN: &str = "runtime/org.example.App.Plugin/x86_64/stable";

fn three_related() -> Vec<RelatedRef> {
    vec![
        RelatedRef::new(reference(LOCALE), "origin").with_subpaths(["/de"]),
        RelatedRef::new(reference(DEBUG), "origin"),
        RelatedRef::new(reference(PLUGIN), "origin"),
    ]
}

#[derive(Default)]
struct RecordingObserver {
    events: RefCell<Vec<String>>,
}

impl InstallObserver for RecordingObserver {
    fn installing(&self, reference: &Reference) {
        self.events
            .borrow_mut()
            .push(format!("installing {}", reference.short_name()));
    }

    fn installing_related(&self, reference: &Reference) {
        self.events
            .borrow_mut()
            .push(format!("related {}", reference.short_name()));
    }

    fn warning(&self, message: &str) {
        self.events.borrow_mut().push(format!("warning {message}"));
    }
}

// =========================================================================
// Primary install
// =========================================================================

#[test]
fn primary_failure_attempts_no_related() {
    let dir = FakeDirectory::new()
        .with_related(APP, three_related())
        .failing_install(APP);
    let options = InstallOptions::new();
    let cancel = CancellationToken::new();

    let err = InstallOrchestrator::new(&dir, &options, &cancel)
        .install(&reference(APP), "origin")
        .expect_err("install should fail");

    assert!(matches!(err, Error::Install { .. }));
    assert!(dir.calls_to("find_").is_empty());
    assert!(dir.calls_to("install_or_update").is_empty());
}

#[test]
fn primary_gets_global_subpaths() {
    let dir = FakeDirectory::new();
    let options = InstallOptions::new().with_subpaths(["/share/icons"]);
    let cancel = CancellationToken::new();

    InstallOrchestrator::new(&dir, &options, &cancel)
        .install(&reference(APP), "origin")
        .expect("Failed to install");

    assert_eq!(
        dir.calls_to("install "),
        vec![format!("install {APP} from origin subpaths=/share/icons")]
    );
}

#[test]
fn no_related_skips_expansion() {
    let dir = FakeDirectory::new().with_related(APP, three_related());
    let options = InstallOptions::new().with_no_related(true);
    let cancel = CancellationToken::new();

    let report = InstallOrchestrator::new(&dir, &options, &cancel)
        .install(&reference(APP), "origin")
        .expect("Failed to install");

    assert!(report.related.is_empty());
    assert!(dir.calls_to("find_").is_empty());
}

// =========================================================================
// Related refs
// =========================================================================

#[test]
fn related_failure_is_a_warning_and_later_items_still_run() {
    let dir = FakeDirectory::new()
        .with_related(APP, three_related())
        .failing_update(DEBUG);
    let options = InstallOptions::new();
    let cancel = CancellationToken::new();

    let report = InstallOrchestrator::new(&dir, &options, &cancel)
        .install(&reference(APP), "origin")
        .expect("related failures must not fail the install");

    assert_eq!(
        dir.calls_to("install_or_update"),
        vec![
            format!("install_or_update {LOCALE} from origin subpaths=/de"),
            format!("install_or_update {DEBUG} from origin"),
            format!("install_or_update {PLUGIN} from origin"),
        ]
    );

    assert_eq!(report.related.len(), 3);
    assert!(matches!(report.related[0].status, RelatedStatus::Installed { .. }));
    assert!(matches!(report.related[1].status, RelatedStatus::Failed { .. }));
    assert!(matches!(report.related[2].status, RelatedStatus::Installed { .. }));

    let failed: Vec<_> = report.failed_related().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].reference, reference(DEBUG));
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains(DEBUG));
}

#[test]
fn no_download_related_is_never_installed() {
    let related = vec![
        RelatedRef::new(reference(LOCALE), "origin"),
        RelatedRef::new(reference(DEBUG), "origin").with_download(false),
    ];
    let dir = FakeDirectory::new().with_related(APP, related);
    let options = InstallOptions::new();
    let cancel = CancellationToken::new();

    let report = InstallOrchestrator::new(&dir, &options, &cancel)
        .install(&reference(APP), "origin")
        .expect("Failed to install");

    assert_eq!(
        dir.calls_to("install_or_update"),
        vec![format!("install_or_update {LOCALE} from origin")]
    );
    assert_eq!(report.related[1].status, RelatedStatus::Skipped);
}

#[test]
fn no_pull_uses_local_metadata() {
    let dir = FakeDirectory::new().with_related(APP, three_related());
    let options = InstallOptions::new().with_no_pull(true);
    let cancel = CancellationToken::new();

    InstallOrchestrator::new(&dir, &options, &cancel)
        .install(&reference(APP), "origin")
        .expect("Failed to install");

    assert_eq!(dir.calls_to("find_remote_related").len(), 0);
    assert_eq!(
        dir.calls_to("find_local_related"),
        vec![format!("find_local_related {APP} in origin")]
    );
}

#[test]
fn related_lookup_failure_is_a_warning() {
    let dir = FakeDirectory::new().failing_related_lookup();
    let options = InstallOptions::new();
    let cancel = CancellationToken::new();
    let observer = RecordingObserver::default();

    let report = InstallOrchestrator::new(&dir, &options, &cancel)
        .with_observer(&observer)
        .install(&reference(APP), "origin")
        .expect("Failed to install");

    assert!(report.related.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("Problem looking for related refs"));
    assert!(
        observer
            .events
            .borrow()
            .iter()
            .any(|e| e.starts_with("warning Problem looking for related refs"))
    );
}

#[test]
fn cancellation_during_related_install_aborts() {
    let dir = FakeDirectory::new()
        .with_related(APP, three_related())
        .cancelled_on_update(DEBUG);
    let options = InstallOptions::new();
    let cancel = CancellationToken::new();

    let err = InstallOrchestrator::new(&dir, &options, &cancel)
        .install(&reference(APP), "origin")
        .expect_err("install should fail");

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(dir.calls_to("install_or_update").len(), 2);
}

#[test]
fn observer_sees_progress_in_order() {
    let dir = FakeDirectory::new()
        .with_related(APP, three_related())
        .failing_update(LOCALE);
    let options = InstallOptions::new();
    let cancel = CancellationToken::new();
    let observer = RecordingObserver::default();

    InstallOrchestrator::new(&dir, &options, &cancel)
        .with_observer(&observer)
        .install(&reference(APP), "origin")
        .expect("Failed to install");

    let events = observer.events.borrow();
    assert_eq!(events[0], "installing org.example.App/x86_64/stable");
    assert_eq!(events[1], "related org.example.App.Locale/x86_64/stable");
    assert!(events[2].starts_with("warning Failed to install related ref"));
    assert_eq!(events[3], "related org.example.App.Debug/x86_64/stable");
    assert_eq!(events[4], "related org.example.App.Plugin/x86_64/stable");
}

// =========================================================================
// Several primaries
// =========================================================================

#[test]
fn install_all_stops_at_first_failing_primary() {
    let other = "app/org.example.Other/x86_64/stable";
    let third = "app/org.example.Third/x86_64/stable";
    let dir = FakeDirectory::new().failing_install(other);
    let options = InstallOptions::new().with_no_related(true);
    let cancel = CancellationToken::new();

    let result = InstallOrchestrator::new(&dir, &options, &cancel).install_all(
        &[reference(APP), reference(other), reference(third)],
        "origin",
    );

    assert!(result.is_err());
    assert_eq!(dir.calls_to("install ").len(), 2);
}

#[test]
fn cancelled_token_stops_before_primary_install() {
    let dir = FakeDirectory::new();
    let options = InstallOptions::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = InstallOrchestrator::new(&dir, &options, &cancel)
        .install(&reference(APP), "origin")
        .expect_err("install should fail");

    assert!(matches!(err, Error::Cancelled));
    assert!(dir.calls().is_empty());
}
