//! Package manager abstraction.
//!
//! The [`PackageManager`] trait defines what the engine needs from a native
//! package manager. Variants differ in command lines, in how they read the
//! installed-package database, and in the texts they print when locked. The
//! mutating operations share [`checked_call_with_retries`].

pub mod apt;
pub mod yum;
pub mod zypper;

use crate::classify::FailurePatterns;
use crate::error::Result;
use crate::platform::PlatformFamily;
use crate::retry::{RetryCallback, RetryPolicy, checked_call_with_retries};
use shellkit::{CallOptions, ShellCommand, ShellResult, ShellRunner, call};
use std::path::Path;

pub use apt::AptManager;
pub use yum::YumManager;
pub use zypper::ZypperManager;

/// Options for install and upgrade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Pin to this version
    pub version: Option<String>,
    /// Only use these repositories
    pub use_repos: Vec<String>,
    /// Never use these repositories
    pub skip_repos: Vec<String>,
    /// Stream package manager output to the log
    pub logoutput: bool,
}

/// Options for removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Remove without resolving reverse dependencies
    pub ignore_dependencies: bool,
    /// Stream package manager output to the log
    pub logoutput: bool,
}

/// Backend trait for native package managers.
///
/// This trait abstracts the platform's package manager, enabling:
/// - One implementation per platform family
/// - A single retry wrapper shared by every family
/// - Scripted shells for testing
pub trait PackageManager {
    /// Short name used in messages ("yum", "apt", "zypper").
    fn name(&self) -> &'static str;

    /// Family this manager serves.
    fn family(&self) -> PlatformFamily;

    /// Lock and repository-outage texts for this manager.
    fn patterns(&self) -> &FailurePatterns;

    /// Command installing `name`.
    fn install_command(&self, name: &str, opts: &InstallOptions) -> ShellCommand;

    /// Command upgrading `name`.
    fn upgrade_command(&self, name: &str, opts: &InstallOptions) -> ShellCommand;

    /// Command removing `name`.
    fn remove_command(&self, name: &str, opts: &RemoveOptions) -> ShellCommand;

    /// Command refreshing repository metadata.
    fn refresh_command(&self) -> ShellCommand;

    /// Installed version of `name`, or `None` when not installed.
    ///
    /// `name` may contain `*` wildcards.
    fn installed_version(&self, shell: &dyn ShellRunner, name: &str) -> Result<Option<String>>;

    /// Whether `name` is installed.
    fn is_installed(&self, shell: &dyn ShellRunner, name: &str) -> Result<bool> {
        Ok(self.installed_version(shell, name)?.is_some())
    }

    /// Options every package manager command runs with.
    fn call_options(&self, logoutput: bool) -> CallOptions {
        CallOptions::new().with_logoutput(logoutput)
    }

    /// Install a package, retrying transient failures.
    fn install_package(
        &self,
        shell: &dyn ShellRunner,
        name: &str,
        opts: &InstallOptions,
        policy: &RetryPolicy,
        callback: Option<&dyn RetryCallback>,
    ) -> Result<ShellResult> {
        let cmd = self.install_command(name, opts);
        log::info!("Installing package {name} ('{cmd}')");
        checked_call_with_retries(self, shell, &cmd, &self.call_options(opts.logoutput), policy, callback)
    }

    /// Upgrade a package, retrying transient failures.
    fn upgrade_package(
        &self,
        shell: &dyn ShellRunner,
        name: &str,
        opts: &InstallOptions,
        policy: &RetryPolicy,
        callback: Option<&dyn RetryCallback>,
    ) -> Result<ShellResult> {
        let cmd = self.upgrade_command(name, opts);
        log::info!("Upgrading package {name} ('{cmd}')");
        checked_call_with_retries(self, shell, &cmd, &self.call_options(opts.logoutput), policy, callback)
    }

    /// Remove a package, retrying transient failures.
    fn remove_package(
        &self,
        shell: &dyn ShellRunner,
        name: &str,
        opts: &RemoveOptions,
        policy: &RetryPolicy,
        callback: Option<&dyn RetryCallback>,
    ) -> Result<ShellResult> {
        let cmd = self.remove_command(name, opts);
        log::info!("Removing package {name} ('{cmd}')");
        checked_call_with_retries(self, shell, &cmd, &self.call_options(opts.logoutput), policy, callback)
    }

    /// Refresh repository metadata. Never fails on a nonzero exit code.
    fn refresh_metadata(&self, shell: &dyn ShellRunner) -> Result<ShellResult> {
        let cmd = self.refresh_command();
        log::debug!("Refreshing {} metadata ('{cmd}')", self.name());
        Ok(call(shell, &cmd, &self.call_options(false))?)
    }
}

/// The package manager for a platform family, if there is one.
///
/// `dpkg_status` is the dpkg status database the apt backend reads.
pub fn for_family(family: PlatformFamily, dpkg_status: &Path) -> Option<Box<dyn PackageManager>> {
    match family {
        PlatformFamily::Redhat => Some(Box::new(YumManager)),
        PlatformFamily::Debian => Some(Box::new(AptManager::new(dpkg_status))),
        PlatformFamily::Suse => Some(Box::new(ZypperManager)),
        PlatformFamily::Unknown => None,
    }
}

/// Match `name` against a pattern where `*` matches any run of characters.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let Some((head, rest)) = pattern.split_once('*') else {
        return pattern == name;
    };
    let Some(mut remaining) = name.strip_prefix(head) else {
        return false;
    };

    let mut parts: Vec<&str> = rest.split('*').collect();
    let tail = parts.pop().unwrap_or_default();
    for part in parts {
        match remaining.find(part) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }
    remaining.len() >= tail.len() && remaining.ends_with(tail)
}

/// Parse `rpm -qa --queryformat '%{NAME} %{VERSION}-%{RELEASE}\n'` output.
pub(crate) fn rpm_query(shell: &dyn ShellRunner, name: &str) -> Result<Option<String>> {
    let cmd = ShellCommand::argv([
        "/usr/bin/rpm",
        "-qa",
        "--queryformat",
        "%{NAME} %{VERSION}-%{RELEASE}\\n",
        name,
    ]);
    let result = call(shell, &cmd, &CallOptions::new())?;
    if !result.is_success() {
        return Err(crate::error::Error::Query {
            name: name.to_string(),
            message: result.combined().trim().to_string(),
        });
    }
    Ok(result
        .output
        .lines()
        .filter_map(|line| line.split_once(' '))
        .find(|(pkg, _)| wildcard_match(name, pkg))
        .map(|(_, version)| version.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellkit::ScriptedShell;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("httpd", "httpd"));
        assert!(!wildcard_match("httpd", "httpd-tools"));
        assert!(wildcard_match("hadoop_2_2_*", "hadoop_2_2_0_1_885"));
        assert!(wildcard_match("hadoop_*-libhdfs", "hadoop_2_2-libhdfs"));
        assert!(!wildcard_match("hadoop_*-libhdfs", "hadoop_2_2-client"));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("a*b*c", "aXbYc"));
        assert!(!wildcard_match("ab*ba", "aba"));
    }

    #[test]
    fn test_for_family() {
        let status = Path::new(apt::DPKG_STATUS);
        assert_eq!(for_family(PlatformFamily::Redhat, status).unwrap().name(), "yum");
        assert_eq!(for_family(PlatformFamily::Debian, status).unwrap().name(), "apt");
        assert_eq!(for_family(PlatformFamily::Suse, status).unwrap().name(), "zypper");
        assert!(for_family(PlatformFamily::Unknown, status).is_none());
    }

    #[test]
    fn test_for_family_passes_dpkg_status() {
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status");
        std::fs::write(&status, "Package: curl\nStatus: install ok installed\nVersion: 7.68.0\n").unwrap();

        let apt = for_family(PlatformFamily::Debian, &status).unwrap();
        let shell = ScriptedShell::new();
        assert!(apt.is_installed(&shell, "curl").unwrap());
        assert!(shell.calls().is_empty());
    }

    #[test]
    fn test_rpm_query_parses_version() {
        let shell = ScriptedShell::new().on(
            "rpm -qa",
            [ShellResult::ok("httpd-tools 2.4.6-97.el7\nhttpd 2.4.6-97.el7")],
        );
        let version = rpm_query(&shell, "httpd").unwrap();
        assert_eq!(version.as_deref(), Some("2.4.6-97.el7"));
    }

    #[test]
    fn test_rpm_query_not_installed() {
        let shell = ScriptedShell::new().on("rpm -qa", [ShellResult::ok("")]);
        assert_eq!(rpm_query(&shell, "httpd").unwrap(), None);
    }

    #[test]
    fn test_rpm_query_failure_is_error() {
        let shell = ScriptedShell::new().on("rpm -qa", [ShellResult::failed(1, "rpmdb open failed")]);
        assert!(rpm_query(&shell, "httpd").is_err());
    }
}
