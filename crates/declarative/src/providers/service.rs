//! systemd service provider

use super::Provider;
use crate::context::ApplyContext;
use crate::error::Result;
use crate::resource::{Action, Resource};
use crate::types::ApplyResult;
use shellkit::{CallOptions, ShellCommand, call, checked_call};

const SYSTEMCTL: &str = "/usr/bin/systemctl";

/// Manages services through systemctl
#[derive(Debug, Default)]
pub struct SystemdServiceProvider;

impl SystemdServiceProvider {
    fn is_running(resource: &Resource, ctx: &ApplyContext<'_>) -> Result<bool> {
        let cmd = resource.command_attr("status_command").unwrap_or_else(|| {
            ShellCommand::argv([SYSTEMCTL, "is-active", "--quiet", resource.name()])
        });
        Ok(call(ctx.shell, &cmd, &CallOptions::new())?.is_success())
    }

    fn systemctl(verb: &str, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        let name = resource.name();
        if ctx.dry_run {
            return Ok(ApplyResult::dry_run(format!("{verb} service {name}")));
        }
        log::info!("Running systemctl {verb} {name}");
        let cmd = ShellCommand::argv([SYSTEMCTL, verb, name]);
        checked_call(ctx.shell, &cmd, &CallOptions::new())?;
        Ok(ApplyResult::Modified)
    }
}

impl Provider for SystemdServiceProvider {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn apply(&self, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        match resource.action() {
            Action::Start => {
                if Self::is_running(resource, ctx)? {
                    return Ok(ApplyResult::NoChange);
                }
                Self::systemctl("start", resource, ctx)
            }
            Action::Stop => {
                if !Self::is_running(resource, ctx)? {
                    return Ok(ApplyResult::NoChange);
                }
                Self::systemctl("stop", resource, ctx)
            }
            Action::Restart => Self::systemctl("restart", resource, ctx),
            Action::Reload => {
                if Self::is_running(resource, ctx)? {
                    Self::systemctl("reload", resource, ctx)
                } else {
                    Self::systemctl("start", resource, ctx)
                }
            }
            _ => Ok(ApplyResult::NoChange),
        }
    }
}
