//! `only_if` / `not_if` guard predicates.
//!
//! A guard is a command run as its own subprocess before the main action.
//! Its exit code decides whether the action runs at all.

use crate::command::{CallOptions, ShellCommand};
use crate::error::Result;
use crate::runner::ShellRunner;

/// A precondition evaluated before the main command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Run the action only if this command succeeds
    OnlyIf(ShellCommand),
    /// Skip the action if this command succeeds
    NotIf(ShellCommand),
}

impl Guard {
    /// Evaluate the guard; `Some(reason)` means the action must be skipped.
    pub fn skip_reason(&self, runner: &dyn ShellRunner, opts: &CallOptions) -> Result<Option<String>> {
        let quiet = opts.clone().with_logoutput(false);
        match self {
            Guard::OnlyIf(cmd) => {
                let result = runner.run(cmd, &quiet)?;
                Ok((!result.is_success()).then(|| format!("only_if condition '{cmd}' failed")))
            }
            Guard::NotIf(cmd) => {
                let result = runner.run(cmd, &quiet)?;
                Ok(result
                    .is_success()
                    .then(|| format!("not_if condition '{cmd}' succeeded")))
            }
        }
    }
}

/// Evaluate guards in order, stopping at the first one that vetoes the action.
pub fn evaluate_guards(
    runner: &dyn ShellRunner,
    guards: &[Guard],
    opts: &CallOptions,
) -> Result<Option<String>> {
    for guard in guards {
        if let Some(reason) = guard.skip_reason(runner, opts)? {
            log::debug!("Skipping: {reason}");
            return Ok(Some(reason));
        }
    }
    Ok(None)
}
