//! yum/rpm backend (Redhat family).

use super::{InstallOptions, PackageManager, RemoveOptions, rpm_query};
use crate::classify::{FailurePatterns, REPO_UNAVAILABLE_COMMON};
use crate::error::Result;
use crate::platform::PlatformFamily;
use shellkit::{ShellCommand, ShellRunner};
use std::sync::LazyLock;

const YUM: &str = "/usr/bin/yum";
const RPM: &str = "/usr/bin/rpm";

const LOCKED: &str = r"(?i)existing lock |another app is currently holding the yum lock|waiting for process with pid \d+ to finish";

static PATTERNS: LazyLock<FailurePatterns> = LazyLock::new(|| {
    FailurePatterns::new(LOCKED, REPO_UNAVAILABLE_COMMON).expect("Invalid yum failure patterns")
});

/// yum package manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct YumManager;

impl YumManager {
    fn base() -> Vec<String> {
        [YUM, "-d", "0", "-e", "0", "-y"].map(String::from).to_vec()
    }

    fn repo_args(opts: &InstallOptions) -> Vec<String> {
        let mut args = Vec::new();
        if !opts.use_repos.is_empty() {
            args.push("--disablerepo=*".to_string());
            args.push(format!("--enablerepo={}", opts.use_repos.join(",")));
        }
        if !opts.skip_repos.is_empty() {
            args.push(format!("--disablerepo={}", opts.skip_repos.join(",")));
        }
        args
    }

    fn target(name: &str, opts: &InstallOptions) -> String {
        match &opts.version {
            Some(version) => format!("{name}-{version}"),
            None => name.to_string(),
        }
    }
}

impl PackageManager for YumManager {
    fn name(&self) -> &'static str {
        "yum"
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::Redhat
    }

    fn patterns(&self) -> &FailurePatterns {
        &PATTERNS
    }

    fn install_command(&self, name: &str, opts: &InstallOptions) -> ShellCommand {
        let mut args = Self::base();
        args.push("install".to_string());
        args.extend(Self::repo_args(opts));
        args.push(Self::target(name, opts));
        ShellCommand::Argv(args)
    }

    fn upgrade_command(&self, name: &str, opts: &InstallOptions) -> ShellCommand {
        let mut args = Self::base();
        args.push("update".to_string());
        args.extend(Self::repo_args(opts));
        args.push(Self::target(name, opts));
        ShellCommand::Argv(args)
    }

    fn remove_command(&self, name: &str, opts: &RemoveOptions) -> ShellCommand {
        if opts.ignore_dependencies {
            ShellCommand::argv([RPM, "-e", "--nodeps", name])
        } else {
            let mut args = Self::base();
            args.push("erase".to_string());
            args.push(name.to_string());
            ShellCommand::Argv(args)
        }
    }

    fn refresh_command(&self) -> ShellCommand {
        ShellCommand::argv([YUM, "clean", "metadata"])
    }

    fn installed_version(&self, shell: &dyn ShellRunner, name: &str) -> Result<Option<String>> {
        rpm_query(shell, name)
    }
}
