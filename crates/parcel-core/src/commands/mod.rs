//! High-level commands.
//!
//! This module provides the public API frontends call into. The install
//! command dispatches to one of three flows; completion is read-only.

pub mod bundle;
pub mod complete;
pub mod from_file;
pub mod install;

pub use bundle::install_bundle;
pub use complete::{GLOBAL_FLAGS, INSTALL_FLAGS, complete_install, complete_partial_ref};
pub use from_file::install_from;
pub use install::{InstallCommand, InstallMode, InstallRequest};
