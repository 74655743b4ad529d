//! Error types for command execution.
//!
//! A command that ran and exited nonzero (`ExecutionFailed`) is kept apart
//! from one that never started (`Spawn`) or was killed on its deadline
//! (`Timeout`).

use crate::command::ShellResult;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while executing a command.
#[derive(Debug, Error)]
pub enum Error {
    /// The process ran and returned a nonzero exit code
    #[error("Execution of '{command}' returned {}. {}", .result.exit_code, .result.combined().trim())]
    ExecutionFailed {
        /// The command as it would be typed in a shell
        command: String,
        /// What the process produced
        result: ShellResult,
    },

    /// The process could not be started (binary missing, permission denied)
    #[error("failed to execute '{command}': {source}")]
    Spawn {
        /// The command as it would be typed in a shell
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The process exceeded its timeout and was killed with its process group
    #[error("'{command}' was killed after {}s timeout", .timeout.as_secs_f64())]
    Timeout {
        /// The command as it would be typed in a shell
        command: String,
        /// The configured limit
        timeout: Duration,
    },

    /// IO error while waiting on the process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit code of the failed process, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::ExecutionFailed { result, .. } => Some(result.exit_code),
            _ => None,
        }
    }

    /// Captured output of the failed process, if it ran to completion.
    pub fn result(&self) -> Option<&ShellResult> {
        match self {
            Error::ExecutionFailed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Whether the process never started.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Error::Spawn { .. })
    }
}

/// Result type for command execution.
pub type Result<T> = std::result::Result<T, Error>;
