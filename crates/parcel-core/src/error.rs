//! Error types for install operations.
//!
//! Every hard failure of an install flow is one of these variants. Related
//! reference failures never become an [`Error`] at the command boundary; they
//! are recorded as warnings in the install report instead.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or insufficient command-line arguments.
    #[error("{0}")]
    Usage(String),

    /// A reference, remote, bundle or descriptor could not be found.
    #[error("{0}")]
    NotFound(String),

    /// More than one installable kind matched a partial reference.
    #[error("Ambiguous reference '{id}': matches {}", matches.join(", "))]
    AmbiguousRef { id: String, matches: Vec<String> },

    /// A key-material source could not be opened or read.
    #[error("Failed to read key material from {source_name}")]
    KeyMaterial {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// A reference or one of its parts fails syntax validation.
    #[error("Invalid reference '{input}': {reason}")]
    InvalidRef { input: String, reason: String },

    /// A bundle, descriptor or metadata file could not be parsed.
    #[error("Malformed {what}: {message}")]
    Malformed { what: String, message: String },

    /// The pull or deploy collaborator failed for a reference.
    #[error("Failed to install {reference}")]
    Install {
        reference: String,
        #[source]
        source: anyhow::Error,
    },

    /// Reading or writing the local installation's own state failed.
    #[error("{context}")]
    Storage {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation was cancelled")]
    Cancelled,
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_ref(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRef {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn install(reference: impl ToString, source: anyhow::Error) -> Self {
        Self::Install {
            reference: reference.to_string(),
            source,
        }
    }

    pub fn storage(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was raised because the user supplied bad arguments.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_lists_all_matches() {
        let err = Error::AmbiguousRef {
            id: "org.foo.Bar".to_string(),
            matches: vec![
                "app/org.foo.Bar/x86_64/stable".to_string(),
                "runtime/org.foo.Bar/x86_64/stable".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("app/org.foo.Bar/x86_64/stable"));
        assert!(msg.contains("runtime/org.foo.Bar/x86_64/stable"));
    }

    #[test]
    fn install_error_keeps_cause() {
        let err = Error::install("app/org.foo.Bar/x86_64/stable", anyhow::anyhow!("disk full"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("disk full"));
    }

    #[test]
    fn usage_is_detected() {
        assert!(Error::usage("Too many arguments").is_usage());
        assert!(!Error::not_found("missing").is_usage());
    }
}
