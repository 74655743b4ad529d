//! Transient failure classification.
//!
//! Package managers report lock contention and repository outages only as
//! text. This module is the one place that knows those texts: every manager
//! supplies a [`FailurePatterns`] and the retry layer only ever sees the
//! resulting [`FailureKind`].

use regex::Regex;
use serde::Serialize;
use std::fmt;

/// A known, retry-worthy failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Another process holds the package manager lock
    Locked,
    /// A repository could not be reached
    RepoUnavailable,
}

impl FailureKind {
    /// Get a user-friendly description of this failure kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Locked => "package manager is locked by another process",
            Self::RepoUnavailable => "repository is temporarily unavailable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Output fragments shared by every manager that talks to remote repositories.
pub const REPO_UNAVAILABLE_COMMON: &str = r"(?i)failure when receiving data from the peer|could not resolve host|temporary failure (in name resolution|resolving)|connection (timed out|refused)|cannot retrieve repository metadata|failed to download metadata|failed to fetch|problem retrieving the repository index|valid metadata file could not be found";

/// Compiled patterns for one package manager.
#[derive(Debug, Clone)]
pub struct FailurePatterns {
    locked: Regex,
    repo_unavailable: Regex,
}

impl FailurePatterns {
    /// Compile a pattern pair.
    pub fn new(locked: &str, repo_unavailable: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            locked: Regex::new(locked)?,
            repo_unavailable: Regex::new(repo_unavailable)?,
        })
    }

    /// Whether `output` reports lock contention.
    pub fn is_locked(&self, output: &str) -> bool {
        self.locked.is_match(output)
    }

    /// Whether `output` reports an unreachable repository.
    pub fn is_repo_unavailable(&self, output: &str) -> bool {
        self.repo_unavailable.is_match(output)
    }
}

/// Classify a failed command's captured output.
///
/// Lock contention wins when both patterns match. `None` means the failure
/// is not a known transient condition.
pub fn classify_failure(output: &str, patterns: &FailurePatterns) -> Option<FailureKind> {
    if patterns.is_locked(output) {
        Some(FailureKind::Locked)
    } else if patterns.is_repo_unavailable(output) {
        Some(FailureKind::RepoUnavailable)
    } else {
        None
    }
}
