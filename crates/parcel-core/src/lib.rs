//! Parcel Core Library
//!
//! Installs application and runtime references from configured remotes,
//! bundle files and remote descriptor files, together with their related
//! references (locales, debug info, extensions).

pub mod commands;
pub mod directory;
pub mod error;
pub mod keyring;
pub mod local;
pub mod options;
pub mod orchestrator;
pub mod reference;
pub mod related;
pub mod resolver;

pub use error::{Error, Result};

/// Re-exports of commonly used types
pub mod prelude {
    // Commands
    pub use crate::commands::{
        InstallCommand, InstallMode, InstallRequest, complete_install, complete_partial_ref,
    };

    // Directory
    pub use crate::directory::{Directory, UpdateOutcome};
    pub use crate::local::LocalDirectory;

    // References
    pub use crate::reference::{KindMask, PartialRef, RefKind, Reference};
    pub use crate::related::RelatedRef;

    // Install flow
    pub use crate::keyring::KeySource;
    pub use crate::options::InstallOptions;
    pub use crate::orchestrator::{
        InstallObserver, InstallReport, RelatedReport, RelatedStatus, SilentObserver,
    };

    pub use crate::error::{Error, Result};
}
