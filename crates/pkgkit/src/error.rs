//! Error types for package operations.

use thiserror::Error;

/// Categories of package errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The package manager command ran and failed
    Execution,
    /// The package manager could not be started or timed out
    Spawn,
    /// The installed-package database could not be read
    Query,
    /// No package manager for this platform
    UnsupportedPlatform,
    /// Other IO failures
    Io,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Execution => "Package manager command failed",
            Self::Spawn => "Package manager could not be run",
            Self::Query => "Package database query failed",
            Self::UnsupportedPlatform => "Unsupported platform",
            Self::Io => "IO error",
        }
    }
}

/// Errors that can occur during package operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Command execution failure (nonzero exit, spawn failure, timeout)
    #[error(transparent)]
    Shell(#[from] shellkit::Error),

    /// The installed-package database could not be queried
    #[error("package query failed for {name}: {message}")]
    Query {
        /// Package being queried
        name: String,
        /// What went wrong
        message: String,
    },

    /// No package manager is known for the platform family
    #[error("no package manager for platform family '{0}'")]
    UnsupportedPlatform(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Shell(shellkit::Error::ExecutionFailed { .. }) => ErrorCategory::Execution,
            Error::Shell(shellkit::Error::Io(_)) | Error::Io(_) => ErrorCategory::Io,
            Error::Shell(_) => ErrorCategory::Spawn,
            Error::Query { .. } => ErrorCategory::Query,
            Error::UnsupportedPlatform(_) => ErrorCategory::UnsupportedPlatform,
        }
    }

    /// Exit code of the failed package manager command, if it ran.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::Shell(e) => e.exit_code(),
            _ => None,
        }
    }
}

/// Result type for package operations.
pub type Result<T> = std::result::Result<T, Error>;
