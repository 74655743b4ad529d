//! Package provider
//!
//! Wraps a [`PackageManager`]. The installed-state query decides whether
//! anything runs; mutating commands go through the retry layer with a
//! policy built from the resource's attributes.

use super::Provider;
use crate::context::ApplyContext;
use crate::error::Result;
use crate::resource::{Action, Resource};
use crate::types::ApplyResult;
use pkgkit::{InstallOptions, PackageManager, RemoveOptions, RetryPolicy};
use std::time::Duration;

/// Manages packages through one native package manager
pub struct PackageProvider {
    manager: Box<dyn PackageManager>,
}

impl PackageProvider {
    pub fn new(manager: Box<dyn PackageManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &dyn PackageManager {
        self.manager.as_ref()
    }
}

/// Retry policy from Package attributes, falling back to `defaults`
pub fn retry_policy(resource: &Resource, defaults: &RetryPolicy) -> RetryPolicy {
    RetryPolicy {
        retry_count: resource
            .u64_attr("retry_count")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(defaults.retry_count),
        retry_sleep: resource
            .u64_attr("retry_sleep")
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_sleep),
        retry_on_locked: resource.bool_attr("retry_on_locked", defaults.retry_on_locked),
        retry_on_repo_unavailability: resource
            .bool_attr("retry_on_repo_unavailability", defaults.retry_on_repo_unavailability),
    }
}

fn install_options(resource: &Resource) -> InstallOptions {
    InstallOptions {
        version: resource.str_attr("version").map(str::to_string),
        use_repos: resource.list_attr("use_repos"),
        skip_repos: resource.list_attr("skip_repos"),
        logoutput: resource.bool_attr("logoutput", false),
    }
}

fn version_matches(installed: &str, wanted: Option<&str>) -> bool {
    wanted.is_none_or(|w| installed == w || installed.starts_with(&format!("{w}-")) || installed.starts_with(&format!("{w}.")))
}

impl Provider for PackageProvider {
    fn name(&self) -> &'static str {
        self.manager.name()
    }

    fn apply(&self, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        let name = resource.name();
        let pm = self.manager.as_ref();
        let policy = retry_policy(resource, &ctx.settings.retry);
        let installed = pm.installed_version(ctx.shell, name)?;

        match resource.action() {
            Action::Install => {
                let opts = install_options(resource);
                if let Some(version) = &installed
                    && version_matches(version, opts.version.as_deref())
                {
                    log::debug!("Skipping installation of existing package {name} ({version})");
                    return Ok(ApplyResult::NoChange);
                }
                if ctx.dry_run {
                    return Ok(ApplyResult::dry_run(format!("install package {name}")));
                }
                pm.install_package(ctx.shell, name, &opts, &policy, ctx.retry_callback)?;
                Ok(if installed.is_some() {
                    ApplyResult::Modified
                } else {
                    ApplyResult::Created
                })
            }
            Action::Upgrade => {
                let opts = install_options(resource);
                if ctx.dry_run {
                    return Ok(ApplyResult::dry_run(format!("upgrade package {name}")));
                }
                let Some(before) = installed else {
                    pm.install_package(ctx.shell, name, &opts, &policy, ctx.retry_callback)?;
                    return Ok(ApplyResult::Created);
                };
                pm.upgrade_package(ctx.shell, name, &opts, &policy, ctx.retry_callback)?;
                let after = pm.installed_version(ctx.shell, name)?;
                Ok(if after.as_deref() == Some(before.as_str()) {
                    ApplyResult::NoChange
                } else {
                    ApplyResult::Modified
                })
            }
            Action::Remove => {
                if installed.is_none() {
                    log::debug!("Skipping removal of non-existing package {name}");
                    return Ok(ApplyResult::NoChange);
                }
                if ctx.dry_run {
                    return Ok(ApplyResult::dry_run(format!("remove package {name}")));
                }
                let opts = RemoveOptions {
                    ignore_dependencies: resource.bool_attr("ignore_dependencies", false),
                    logoutput: resource.bool_attr("logoutput", false),
                };
                pm.remove_package(ctx.shell, name, &opts, &policy, ctx.retry_callback)?;
                Ok(ApplyResult::Removed)
            }
            _ => Ok(ApplyResult::NoChange),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::context::EngineSettings;
    use crate::resource::ResourceKind;
    use crate::value::Attributes;
    use pkgkit::PlatformFamily;
    use pkgkit::manager::YumManager;
    use shellkit::{ScriptedShell, ShellResult};
    use std::path::Path;

    fn apply(shell: &ScriptedShell, attributes: Attributes) -> Result<ApplyResult> {
        let settings = EngineSettings::default();
        let ctx = ApplyContext::new(shell, &settings, Path::new("/"), PlatformFamily::Redhat);
        let resource = Resource::declare(ResourceKind::Package, "httpd", attributes)?;
        PackageProvider::new(Box::new(YumManager)).apply(&resource, &ctx)
    }

    #[test]
    fn test_already_installed_is_no_change() {
        let shell = ScriptedShell::new().on("rpm -qa", [ShellResult::ok("httpd 2.4.6-97.el7\n")]);
        assert_eq!(apply(&shell, attrs! {}).unwrap(), ApplyResult::NoChange);
        assert_eq!(shell.count_matching("yum"), 0);
    }

    #[test]
    fn test_install_missing() {
        let shell = ScriptedShell::new().on("rpm -qa", [ShellResult::ok("")]);
        assert_eq!(apply(&shell, attrs! {}).unwrap(), ApplyResult::Created);
        assert_eq!(shell.count_matching("yum -d 0 -e 0 -y install httpd"), 1);
    }

    #[test]
    fn test_version_mismatch_installs() {
        let shell = ScriptedShell::new().on("rpm -qa", [ShellResult::ok("httpd 2.4.6-97.el7\n")]);
        let result = apply(&shell, attrs! { "version" => "2.4.37" }).unwrap();
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(shell.count_matching("install httpd-2.4.37"), 1);
    }

    #[test]
    fn test_remove() {
        let shell = ScriptedShell::new().on("rpm -qa", [ShellResult::ok("httpd 2.4.6-97.el7\n")]);
        let result = apply(&shell, attrs! { "action" => "remove", "ignore_dependencies" => true }).unwrap();
        assert_eq!(result, ApplyResult::Removed);
        assert_eq!(shell.count_matching("rpm -e --nodeps httpd"), 1);
    }

    #[test]
    fn test_remove_absent_is_no_change() {
        let shell = ScriptedShell::new().on("rpm -qa", [ShellResult::ok("")]);
        let result = apply(&shell, attrs! { "action" => "remove" }).unwrap();
        assert_eq!(result, ApplyResult::NoChange);
        assert_eq!(shell.count_matching("erase"), 0);
    }

    #[test]
    fn test_upgrade_changes_version() {
        let shell = ScriptedShell::new().on(
            "rpm -qa",
            [
                ShellResult::ok("httpd 2.4.6-90.el7\n"),
                ShellResult::ok("httpd 2.4.6-97.el7\n"),
            ],
        );
        let result = apply(&shell, attrs! { "action" => "upgrade" }).unwrap();
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(shell.count_matching("-y update httpd"), 1);
    }

    #[test]
    fn test_install_failure_propagates() {
        let shell = ScriptedShell::new()
            .on("rpm -qa", [ShellResult::ok("")])
            .on("install", [ShellResult::failed(1, "No package httpd available.")]);
        let err = apply(&shell, attrs! { "retry_sleep" => 0 }).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_retry_policy_from_attributes() {
        let resource = Resource::declare(
            ResourceKind::Package,
            "httpd",
            attrs! { "retry_count" => 7, "retry_sleep" => "2", "retry_on_locked" => false },
        )
        .unwrap();
        let policy = retry_policy(&resource, &RetryPolicy::default());
        assert_eq!(policy.retry_count, 7);
        assert_eq!(policy.retry_sleep, Duration::from_secs(2));
        assert!(!policy.retry_on_locked);
        assert!(policy.retry_on_repo_unavailability);
    }

    #[test]
    fn test_version_matches() {
        assert!(version_matches("2.4.6-97.el7", None));
        assert!(version_matches("2.4.6-97.el7", Some("2.4.6")));
        assert!(version_matches("2.4.6-97.el7", Some("2.4.6-97.el7")));
        assert!(!version_matches("2.4.60-1", Some("2.4.6")));
    }
}
