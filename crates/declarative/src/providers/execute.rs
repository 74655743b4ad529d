//! Execute provider
//!
//! Runs a command with `checked_call`. `creates` makes the command
//! idempotent: when the path exists the command is not run at all.

use super::Provider;
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::resource::{Action, Resource};
use crate::types::ApplyResult;
use shellkit::{CallOptions, checked_call};
use std::thread;
use std::time::Duration;

/// Runs commands
#[derive(Debug, Default)]
pub struct ExecuteProvider;

impl ExecuteProvider {
    pub(crate) fn call_options(resource: &Resource, ctx: &ApplyContext<'_>) -> CallOptions {
        let mut opts = CallOptions::new()
            .with_logoutput(resource.bool_attr("logoutput", false))
            .with_sudo(resource.bool_attr("sudo", false));
        if let Some(user) = resource.str_attr("user") {
            opts = opts.with_user(user);
        }
        if let Some(cwd) = resource.str_attr("cwd") {
            opts = opts.with_cwd(ctx.resolve(cwd));
        }
        if let Some(secs) = resource.u64_attr("timeout") {
            opts = opts.with_timeout(Duration::from_secs(secs));
        }
        for (key, value) in resource.map_attr("environment") {
            opts = opts.with_env(key, value);
        }
        opts
    }
}

impl Provider for ExecuteProvider {
    fn name(&self) -> &'static str {
        "execute"
    }

    fn apply(&self, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        if resource.action() != Action::Run {
            return Ok(ApplyResult::NoChange);
        }

        if let Some(creates) = resource.str_attr("creates") {
            let creates = ctx.resolve(creates);
            if creates.exists() {
                log::debug!(
                    "Skipping {resource}: {} already exists",
                    creates.display()
                );
                return Ok(ApplyResult::NoChange);
            }
        }

        let Some(command) = resource.command_attr("command") else {
            return Err(Error::MissingAttribute {
                kind: resource.kind().to_string(),
                name: resource.name().to_string(),
                attribute: "command".to_string(),
            });
        };
        if ctx.dry_run {
            return Ok(ApplyResult::dry_run(format!("run '{command}'")));
        }

        let opts = Self::call_options(resource, ctx);
        let tries = resource.u64_attr("tries").unwrap_or(1).max(1);
        let try_sleep = Duration::from_secs(resource.u64_attr("try_sleep").unwrap_or(0));

        let mut attempt = 0;
        loop {
            attempt += 1;
            match checked_call(ctx.shell, &command, &opts) {
                Ok(_) => return Ok(ApplyResult::Modified),
                Err(e) if attempt < tries => {
                    log::info!(
                        "Retrying after {}s. Reason: {e} ({attempt}/{tries})",
                        try_sleep.as_secs()
                    );
                    thread::sleep(try_sleep);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
