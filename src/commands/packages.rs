//! `converge install`, `remove` and `info`

use anyhow::{Context as AnyhowContext, Result};
use declarative::{Attributes, BatchResult, Value};
use shellkit::{ShellRunner, SystemShell};

use super::environment;
use crate::Context;
use crate::cli::{InfoArgs, PackageArgs, RemoveArgs};
use crate::progress::ConsoleRetry;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Remove,
}

pub fn install(ctx: &Context, args: &PackageArgs) -> Result<i32> {
    run(ctx, &SystemShell, Operation::Install, args, attributes(args, false))
}

pub fn remove(ctx: &Context, args: &RemoveArgs) -> Result<i32> {
    let attrs = attributes(&args.packages, args.ignore_dependencies);
    run(ctx, &SystemShell, Operation::Remove, &args.packages, attrs)
}

pub fn info(ctx: &Context, args: &InfoArgs) -> Result<i32> {
    let retry = ConsoleRetry;
    let env = environment(ctx, &SystemShell, &retry)?;
    let result = if args.strict {
        declarative::checked_package_info(&env, &args.names)?
    } else {
        declarative::package_info(&env, &args.names)
    };
    print(&result, args.json)
}

fn attributes(args: &PackageArgs, ignore_dependencies: bool) -> Attributes {
    let mut attrs = Attributes::new();
    if let Some(count) = args.retry_count {
        attrs.insert("retry_count".into(), Value::Int(i64::from(count)));
    }
    if !args.use_repos.is_empty() {
        attrs.insert("use_repos".into(), Value::from(args.use_repos.clone()));
    }
    if !args.skip_repos.is_empty() {
        attrs.insert("skip_repos".into(), Value::from(args.skip_repos.clone()));
    }
    if ignore_dependencies {
        attrs.insert("ignore_dependencies".into(), Value::Bool(true));
    }
    attrs
}

fn run(
    ctx: &Context,
    shell: &dyn ShellRunner,
    op: Operation,
    args: &PackageArgs,
    attrs: Attributes,
) -> Result<i32> {
    let retry = ConsoleRetry;
    let mut env = environment(ctx, shell, &retry)?;
    let result = match (op, args.strict) {
        (Operation::Install, false) => declarative::install_packages(&mut env, &args.names, &attrs),
        (Operation::Remove, false) => declarative::remove_packages(&mut env, &args.names, &attrs),
        (Operation::Install, true) => declarative::checked_install_packages(&mut env, &args.names, &attrs)
            .context("Install failed")?,
        (Operation::Remove, true) => declarative::checked_remove_packages(&mut env, &args.names, &attrs)
            .context("Remove failed")?,
    };
    print(&result, args.json)
}

fn print(result: &BatchResult, json: bool) -> Result<i32> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(result.exit_code);
    }

    for line in result.output.lines() {
        if line.ends_with(": failed") {
            ui::error(line);
        } else {
            ui::success(line);
        }
    }
    for line in result.error.lines() {
        ui::dim(line);
    }
    Ok(result.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetrySettings, Settings};
    use pkgkit::PlatformFamily;
    use shellkit::{ScriptedShell, ShellResult};

    fn context() -> Context {
        let settings = Settings {
            retry: RetrySettings {
                retry_sleep: 0,
                ..RetrySettings::default()
            },
            ..Settings::default()
        };
        Context {
            verbose: 0,
            quiet: true,
            family: PlatformFamily::Redhat,
            settings,
        }
    }

    fn args(names: &[&str], strict: bool) -> PackageArgs {
        PackageArgs {
            names: names.iter().map(|s| s.to_string()).collect(),
            strict,
            json: true,
            retry_count: Some(1),
            use_repos: Vec::new(),
            skip_repos: Vec::new(),
        }
    }

    #[test]
    fn test_attributes_from_flags() {
        let args = PackageArgs {
            skip_repos: vec!["epel".into()],
            ..args(&["httpd"], false)
        };
        let attrs = attributes(&args, true);
        assert_eq!(attrs.get("retry_count"), Some(&Value::Int(1)));
        assert_eq!(attrs.get("skip_repos"), Some(&Value::List(vec!["epel".into()])));
        assert_eq!(attrs.get("ignore_dependencies"), Some(&Value::Bool(true)));
        assert!(!attrs.contains_key("use_repos"));
    }

    #[test]
    fn test_install_exit_code_is_last_failure() {
        let shell = ScriptedShell::new()
            .on("rpm -qa", [ShellResult::ok("")])
            .on("install nosuch", [ShellResult::failed(1, "No package nosuch available.")]);
        let args = args(&["nosuch", "httpd"], false);
        let attrs = attributes(&args, false);
        let code = run(&context(), &shell, Operation::Install, &args, attrs).unwrap();
        assert_eq!(code, 1);
        assert_eq!(shell.count_matching("install httpd"), 1);
    }

    #[test]
    fn test_strict_install_is_an_error() {
        let shell = ScriptedShell::new()
            .on("rpm -qa", [ShellResult::ok("")])
            .on("install nosuch", [ShellResult::failed(1, "No package nosuch available.")]);
        let args = args(&["nosuch", "httpd"], true);
        let attrs = attributes(&args, false);
        assert!(run(&context(), &shell, Operation::Install, &args, attrs).is_err());
        assert_eq!(shell.count_matching("install httpd"), 0);
    }
}
