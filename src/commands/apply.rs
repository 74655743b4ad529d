//! `converge apply`
//!
//! Preview with a dry run, confirm, then realize for real.

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{ApplyResult, Error, ExecuteSummary, ScopeReport};
use shellkit::{ShellRunner, SystemShell};
use std::path::Path;

use super::environment;
use crate::Context;
use crate::manifest::{self, Manifest, ScopePlan};
use crate::progress::{ConsoleProgress, ConsoleRetry};
use crate::ui;

pub fn run(ctx: &Context, manifest: &Path, dry_run: bool, yes: bool, json: bool) -> Result<i32> {
    let plan = Manifest::load(manifest)?
        .plan()
        .with_context(|| format!("Invalid manifest {}", manifest.display()))?;
    if plan.is_empty() {
        ui::info("Nothing declared");
        return Ok(0);
    }
    apply_plan(ctx, &SystemShell, &plan, dry_run, yes, json)
}

fn apply_plan(
    ctx: &Context,
    shell: &dyn ShellRunner,
    plan: &ScopePlan,
    dry_run: bool,
    yes: bool,
    json: bool,
) -> Result<i32> {
    let retry = ConsoleRetry;

    // 1. Preview what would change
    let mut preview_env = environment(ctx, shell, &retry)?.with_dry_run(true);
    let preview = report_of(manifest::realize(&mut preview_env, plan))?;
    let pending = preview.outcomes.iter().filter(|o| would_change(&o.result)).count();

    if !json {
        ui::header(&format!("{} resources on {}", plan.len(), ctx.family));
        for outcome in &preview.outcomes {
            println!("{}", ui::outcome_line(outcome));
        }
    }

    if dry_run || pending == 0 {
        if json {
            print_json(&preview)?;
        } else if dry_run {
            println!();
            println!("  {} Dry run - no changes made", "ℹ".blue());
        } else {
            println!();
            println!("  {} Already converged", "✓".green());
        }
        return Ok(0);
    }

    // 2. Confirm (unless --yes)
    if !yes && !json && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(0);
    }

    // 3. Realize
    if !json {
        println!();
        println!("  {} Applying {} resources...", "→".cyan(), plan.len());
    }
    let mut env = environment(ctx, shell, &retry)?;
    if !json {
        env = env.with_progress(ConsoleProgress::new(ctx.quiet));
    }
    let result = manifest::realize(&mut env, plan);
    drop(env);

    let (report, failure) = match result {
        Ok(report) => (report, None),
        Err(err) => match err.report().cloned() {
            Some(report) => (report, Some(err)),
            None => return Err(err.into()),
        },
    };

    if json {
        print_json(&report)?;
    } else {
        print_summary(&report.summary);
    }

    match failure {
        Some(err) => {
            ui::error(&err.to_string());
            ui::dim(err.category().advice());
            Ok(err.exit_code().filter(|c| *c != 0).unwrap_or(1))
        }
        None if report.is_success() => Ok(0),
        None => Ok(1),
    }
}

fn would_change(result: &ApplyResult) -> bool {
    matches!(result, ApplyResult::Skipped { reason } if reason.starts_with("dry run"))
}

// An aborted scope still carries the outcomes realized before the failure.
fn report_of(result: declarative::Result<ScopeReport>) -> Result<ScopeReport> {
    match result {
        Ok(report) => Ok(report),
        Err(Error::Aborted { report, .. }) => Ok(*report),
        Err(err) => Err(err.into()),
    }
}

fn print_json(report: &ScopeReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Host converged", "✓".green().bold());
    } else {
        println!("  {} Converged with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} resources removed", summary.removed);
    }
    if summary.no_change > 0 {
        println!("    • {} resources unchanged", summary.no_change);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use pkgkit::PlatformFamily;
    use shellkit::{ScriptedShell, ShellResult};

    fn context() -> Context {
        Context {
            verbose: 0,
            quiet: true,
            family: PlatformFamily::Redhat,
            settings: Settings::default(),
        }
    }

    fn plan(toml: &str) -> ScopePlan {
        Manifest::parse(toml).unwrap().plan().unwrap()
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("motd");
        let plan = plan(&format!(
            "[[resource]]\ntype = \"file\"\nname = \"{}\"\ncontent = \"hi\\n\"\n",
            target.display()
        ));

        let shell = ScriptedShell::new();
        let code = apply_plan(&context(), &shell, &plan, true, false, true).unwrap();
        assert_eq!(code, 0);
        assert!(!target.exists());
    }

    #[test]
    fn test_apply_with_yes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("motd");
        let plan = plan(&format!(
            "[[resource]]\ntype = \"file\"\nname = \"{}\"\ncontent = \"hi\\n\"\n",
            target.display()
        ));

        let shell = ScriptedShell::new();
        let code = apply_plan(&context(), &shell, &plan, false, true, true).unwrap();
        assert_eq!(code, 0);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hi\n");
    }

    #[test]
    fn test_failed_command_sets_exit_code() {
        let plan = plan("[[resource]]\ntype = \"execute\"\nname = \"migrate\"\ncommand = \"app migrate\"\n");
        let shell = ScriptedShell::new().on("app migrate", [ShellResult::failed(4, "schema locked")]);
        let code = apply_plan(&context(), &shell, &plan, false, true, true).unwrap();
        assert_eq!(code, 4);
        assert_eq!(shell.count_matching("app migrate"), 1);
    }

    #[test]
    fn test_guard_skip_is_not_pending() {
        assert!(would_change(&ApplyResult::dry_run("install")));
        assert!(!would_change(&ApplyResult::Skipped {
            reason: "not_if guard met".into()
        }));
    }

    #[test]
    fn test_converged_host_skips_realization() {
        let shell = ScriptedShell::new().on("rpm -qa", [ShellResult::ok("httpd 2.4.6-97.el7\n")]);
        let plan = plan("[[resource]]\ntype = \"package\"\nname = \"httpd\"\n");
        let code = apply_plan(&context(), &shell, &plan, false, false, true).unwrap();
        assert_eq!(code, 0);
        assert_eq!(shell.count_matching("rpm -qa"), 1);
        assert_eq!(shell.count_matching("install"), 0);
    }
}
