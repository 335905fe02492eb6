//! Console progress output for install flows.

use std::path::Path;

use console::style;
use parcel_core::orchestrator::InstallObserver;
use parcel_core::reference::Reference;

/// Prints progress as it happens. Progress goes to stdout unless `quiet`;
/// warnings always go to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleObserver {
    quiet: bool,
}

impl ConsoleObserver {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl InstallObserver for ConsoleObserver {
    fn installing(&self, reference: &Reference) {
        if !self.quiet {
            println!("Installing: {}", style(reference.short_name()).bold());
        }
    }

    fn installing_related(&self, reference: &Reference) {
        if !self.quiet {
            println!("Installing related: {}", style(reference.short_name()).dim());
        }
    }

    fn installing_bundle(&self, path: &Path) {
        if !self.quiet {
            println!("Installing bundle: {}", style(path.display()).bold());
        }
    }

    fn warning(&self, message: &str) {
        eprintln!("{} {}", style("Warning:").yellow().bold(), message);
    }
}
