//! Error types for resource declaration and realization.
//!
//! Configuration and conflict errors describe a declaration that can never
//! succeed as written, so nothing retries them. Execution and transient
//! errors come from the OS commands a provider ran.

use crate::report::ScopeReport;
use std::path::PathBuf;
use thiserror::Error;

/// Categories of engine errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid declaration or engine setup
    Configuration,
    /// Host state contradicts the declaration (e.g. a directory where a file is wanted)
    Conflict,
    /// An OS command failed
    Execution,
    /// An OS command timed out
    Transient,
    /// Filesystem errors
    Io,
}

impl ErrorCategory {
    /// Whether retrying the same declaration could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::Execution)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Invalid resource declaration",
            Self::Conflict => "Host state conflicts with declaration",
            Self::Execution => "Command failed",
            Self::Transient => "Command timed out",
            Self::Io => "Filesystem error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Configuration => "Fix the resource attributes and try again",
            Self::Conflict => "Remove or move the conflicting path, then re-apply",
            Self::Execution => "Check the command output above for details",
            Self::Transient => "Increase the timeout or retry later",
            Self::Io => "Check paths and permissions",
        }
    }
}

/// Errors that can occur while declaring or realizing resources.
#[derive(Debug, Error)]
pub enum Error {
    /// Attribute not in the kind's schema
    #[error("{kind}[{name}]: unknown attribute '{attribute}'")]
    UnknownAttribute {
        kind: String,
        name: String,
        attribute: String,
    },

    /// Required attribute not supplied
    #[error("{kind}[{name}]: missing required attribute '{attribute}'")]
    MissingAttribute {
        kind: String,
        name: String,
        attribute: String,
    },

    /// Attribute value of the wrong shape, or otherwise unusable
    #[error("{kind}[{name}]: invalid attribute '{attribute}': {message}")]
    InvalidAttribute {
        kind: String,
        name: String,
        attribute: String,
        message: String,
    },

    /// Action not supported by the kind
    #[error("{kind}[{name}]: unsupported action '{action}'")]
    UnsupportedAction {
        kind: String,
        name: String,
        action: String,
    },

    /// No provider registered for the kind on this platform
    #[error("no {kind} provider for platform family '{family}'")]
    UnsupportedPlatform { kind: String, family: String },

    /// Host state contradicts the declaration
    #[error("{}: {message}", path.display())]
    Conflict { path: PathBuf, message: String },

    /// Parent directory missing and `create_parents` not set
    #[error("parent directory of {} does not exist", path.display())]
    ParentMissing { path: PathBuf },

    /// Owner or group name that does not resolve on this host
    #[error("unknown {what} '{name}'")]
    UnknownPrincipal { what: &'static str, name: String },

    /// Text cannot be represented in the requested encoding
    #[error("cannot {operation} {} as {encoding}: {message}", path.display())]
    Encoding {
        path: PathBuf,
        encoding: String,
        operation: &'static str,
        message: String,
    },

    /// Declaration outside of any scope
    #[error("no active scope; call enter() first")]
    NoScope,

    /// A resource failed and the remaining resources of its scope were skipped
    #[error("{resource} failed: {source}")]
    Aborted {
        resource: String,
        #[source]
        source: Box<Error>,
        report: Box<ScopeReport>,
    },

    /// OS command failure (nonzero exit, spawn failure, timeout)
    #[error(transparent)]
    Shell(#[from] shellkit::Error),

    /// Package manager failure
    #[error(transparent)]
    Package(#[from] pkgkit::Error),

    /// Filesystem error on a specific path
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownAttribute { .. }
            | Self::MissingAttribute { .. }
            | Self::InvalidAttribute { .. }
            | Self::UnsupportedAction { .. }
            | Self::UnsupportedPlatform { .. }
            | Self::UnknownPrincipal { .. }
            | Self::Encoding { .. }
            | Self::NoScope => ErrorCategory::Configuration,
            Self::Conflict { .. } | Self::ParentMissing { .. } => ErrorCategory::Conflict,
            Self::Aborted { source, .. } => source.category(),
            Self::Shell(shellkit::Error::Timeout { .. }) => ErrorCategory::Transient,
            Self::Shell(shellkit::Error::Io(_)) | Self::Io { .. } => ErrorCategory::Io,
            Self::Shell(_) => ErrorCategory::Execution,
            Self::Package(e) => match e.category() {
                pkgkit::ErrorCategory::UnsupportedPlatform => ErrorCategory::Configuration,
                pkgkit::ErrorCategory::Io => ErrorCategory::Io,
                _ if matches!(e, pkgkit::Error::Shell(shellkit::Error::Timeout { .. })) => {
                    ErrorCategory::Transient
                }
                _ => ErrorCategory::Execution,
            },
        }
    }

    /// Exit code of the failed command, if one ran.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Shell(e) => e.exit_code(),
            Self::Package(e) => e.exit_code(),
            Self::Aborted { source, .. } => source.exit_code(),
            _ => None,
        }
    }

    /// Scope report attached to an aborted scope.
    pub fn report(&self) -> Option<&ScopeReport> {
        match self {
            Self::Aborted { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
