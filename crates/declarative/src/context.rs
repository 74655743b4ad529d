//! Apply context and callback traits
//!
//! Providers hold no state of their own. Everything they need from the
//! outside (the command runner, engine settings, the scope's base directory)
//! arrives through [`ApplyContext`].

use crate::report::ResourceOutcome;
use crate::resource::Resource;
use pkgkit::{PlatformFamily, RetryCallback, RetryPolicy};
use shellkit::ShellRunner;
use std::path::{Path, PathBuf};

/// Engine-wide settings shared by every scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Where file backups go; `None` puts them next to the file
    pub backup_dir: Option<PathBuf>,
    /// Retry defaults for Package resources
    pub retry: RetryPolicy,
    /// dpkg status database read by the apt provider
    pub dpkg_status: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            backup_dir: None,
            retry: RetryPolicy::default(),
            dpkg_status: PathBuf::from(pkgkit::manager::apt::DPKG_STATUS),
        }
    }
}

/// Progress callback for realization
///
/// Implement this trait to receive progress updates while a scope runs.
pub trait ProgressCallback {
    /// Called before a resource's guards are evaluated
    fn on_resource_start(&mut self, resource: &Resource);

    /// Called once the resource has an outcome
    fn on_resource_complete(&mut self, outcome: &ResourceOutcome);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_resource_start(&mut self, _resource: &Resource) {}
    fn on_resource_complete(&mut self, _outcome: &ResourceOutcome) {}
}

/// Context passed to provider apply operations
pub struct ApplyContext<'a> {
    /// Runs every OS command
    pub shell: &'a dyn ShellRunner,
    /// Engine settings
    pub settings: &'a EngineSettings,
    /// Relative paths (e.g. `source`) resolve against this
    pub base_dir: &'a Path,
    /// Platform the registry resolved providers for
    pub family: PlatformFamily,
    /// Report what would change without changing it
    pub dry_run: bool,
    /// Notified on package retries
    pub retry_callback: Option<&'a dyn RetryCallback>,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(
        shell: &'a dyn ShellRunner,
        settings: &'a EngineSettings,
        base_dir: &'a Path,
        family: PlatformFamily,
    ) -> Self {
        Self {
            shell,
            settings,
            base_dir,
            family,
            dry_run: false,
            retry_callback: None,
        }
    }

    /// Resolve `path` against the base directory unless it is absolute
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
