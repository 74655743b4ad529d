//! `converge exec`

use anyhow::{Context as AnyhowContext, Result};
use declarative::{ApplyResult, Attributes, ResourceKind, ScopeOptions, Value};
use shellkit::{ShellRunner, SystemShell};

use super::environment;
use crate::Context;
use crate::cli::ExecArgs;
use crate::progress::ConsoleRetry;
use crate::ui;

pub fn run(ctx: &Context, args: &ExecArgs) -> Result<i32> {
    run_with(ctx, &SystemShell, args)
}

fn attributes(args: &ExecArgs, logoutput: bool) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    attrs.insert("command".into(), Value::from(args.command.as_str()));
    attrs.insert("logoutput".into(), Value::Bool(logoutput));
    attrs.insert("sudo".into(), Value::Bool(args.sudo));
    if let Some(user) = &args.user {
        attrs.insert("user".into(), Value::from(user.as_str()));
    }
    if let Some(cwd) = &args.cwd {
        let cwd = crate::config::expand_path(cwd)?;
        attrs.insert("cwd".into(), Value::from(cwd.to_string_lossy().into_owned()));
    }
    if let Some(creates) = &args.creates {
        let creates = crate::config::expand_path(creates)?;
        attrs.insert("creates".into(), Value::from(creates.to_string_lossy().into_owned()));
    }
    if let Some(secs) = args.timeout {
        let secs = i64::try_from(secs).context("Timeout out of range")?;
        attrs.insert("timeout".into(), Value::Int(secs));
    }
    Ok(attrs)
}

fn run_with(ctx: &Context, shell: &dyn ShellRunner, args: &ExecArgs) -> Result<i32> {
    let attrs = attributes(args, !ctx.quiet)?;
    let retry = ConsoleRetry;
    let mut env = environment(ctx, shell, &retry)?;

    match env.with_scope(ScopeOptions::new(), |env| {
        env.declare(ResourceKind::Execute, args.command.as_str(), attrs)
    }) {
        Ok((_, report)) => {
            if let Some(outcome) = report.outcomes.first() {
                match outcome.result {
                    ApplyResult::NoChange => ui::dim("Nothing to do"),
                    _ if ctx.verbose > 0 => ui::success(&outcome.label()),
                    _ => {}
                }
            }
            Ok(0)
        }
        Err(err) => {
            ui::error(&err.to_string());
            Ok(err.exit_code().filter(|c| *c != 0).unwrap_or(1))
        }
    }
}
