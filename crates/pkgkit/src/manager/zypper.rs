//! zypper/rpm backend (Suse family).

use super::{InstallOptions, PackageManager, RemoveOptions, rpm_query};
use crate::classify::{FailurePatterns, REPO_UNAVAILABLE_COMMON};
use crate::error::Result;
use crate::platform::PlatformFamily;
use shellkit::{ShellCommand, ShellRunner};
use std::sync::LazyLock;

const ZYPPER: &str = "/usr/bin/zypper";
const RPM: &str = "/usr/bin/rpm";

const LOCKED: &str = r"(?i)system management is locked|zypp is locked";

static PATTERNS: LazyLock<FailurePatterns> = LazyLock::new(|| {
    FailurePatterns::new(LOCKED, REPO_UNAVAILABLE_COMMON).expect("Invalid zypper failure patterns")
});

/// zypper package manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZypperManager;

impl ZypperManager {
    fn install_args(verb: &str, name: &str, opts: &InstallOptions) -> Vec<String> {
        let mut args: Vec<String> = [
            ZYPPER,
            "--quiet",
            verb,
            "--auto-agree-with-licenses",
            "--no-confirm",
        ]
        .map(String::from)
        .to_vec();
        for repo in &opts.use_repos {
            args.push("--repo".to_string());
            args.push(repo.clone());
        }
        args.push(match &opts.version {
            Some(version) => format!("{name}-{version}"),
            None => name.to_string(),
        });
        args
    }
}

impl PackageManager for ZypperManager {
    fn name(&self) -> &'static str {
        "zypper"
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::Suse
    }

    fn patterns(&self) -> &FailurePatterns {
        &PATTERNS
    }

    fn install_command(&self, name: &str, opts: &InstallOptions) -> ShellCommand {
        if !opts.skip_repos.is_empty() {
            log::debug!("zypper has no per-command repo exclusion, ignoring skip_repos for {name}");
        }
        ShellCommand::Argv(Self::install_args("install", name, opts))
    }

    fn upgrade_command(&self, name: &str, opts: &InstallOptions) -> ShellCommand {
        ShellCommand::Argv(Self::install_args("update", name, opts))
    }

    fn remove_command(&self, name: &str, opts: &RemoveOptions) -> ShellCommand {
        if opts.ignore_dependencies {
            ShellCommand::argv([RPM, "-e", "--nodeps", name])
        } else {
            ShellCommand::argv([ZYPPER, "--quiet", "remove", "--no-confirm", name])
        }
    }

    fn refresh_command(&self) -> ShellCommand {
        ShellCommand::argv([ZYPPER, "clean"])
    }

    fn installed_version(&self, shell: &dyn ShellRunner, name: &str) -> Result<Option<String>> {
        rpm_query(shell, name)
    }
}
