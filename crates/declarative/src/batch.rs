//! Batch package operations
//!
//! Install, remove or query N named packages and fold the per-target
//! outcomes into one [`BatchResult`]. The plain functions never return an
//! error: each failure is logged with its target and folded into the result.
//! The `checked_*` variants propagate the first failure instead.

use crate::environment::{Environment, ScopeOptions};
use crate::error::{Error, Result};
use crate::registry::package_manager;
use crate::resource::{Resource, ResourceKind};
use crate::types::ApplyResult;
use crate::value::{Attributes, Value};
use serde::Serialize;

/// Aggregate outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// 0 when every target succeeded, else the most recent failure's code
    pub exit_code: i32,
    /// One line per target
    pub output: String,
    /// One line per failed target
    pub error: String,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    fn succeeded(&mut self, line: String) {
        push_line(&mut self.output, &line);
    }

    fn failed(&mut self, verb: &str, target: &str, err: &Error) {
        let code = err.exit_code().unwrap_or(1);
        log::error!("Failed to {verb} {target}: {err}");
        push_line(&mut self.output, &format!("{target}: failed"));
        push_line(&mut self.error, &format!("{verb} {target}: {err}"));
        self.exit_code = if code == 0 { 1 } else { code };
    }
}

fn push_line(buf: &mut String, line: &str) {
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
}

/// Install every package in `names`; `attributes` apply to each one
pub fn install_packages(env: &mut Environment<'_>, names: &[String], attributes: &Attributes) -> BatchResult {
    fold(run_packages(env, "install", names, attributes, false))
}

/// Like [`install_packages`], but the first failure is returned as an error
pub fn checked_install_packages(
    env: &mut Environment<'_>,
    names: &[String],
    attributes: &Attributes,
) -> Result<BatchResult> {
    run_packages(env, "install", names, attributes, true)
}

/// Remove every package in `names`
pub fn remove_packages(env: &mut Environment<'_>, names: &[String], attributes: &Attributes) -> BatchResult {
    fold(run_packages(env, "remove", names, attributes, false))
}

/// Like [`remove_packages`], but the first failure is returned as an error
pub fn checked_remove_packages(
    env: &mut Environment<'_>,
    names: &[String],
    attributes: &Attributes,
) -> Result<BatchResult> {
    run_packages(env, "remove", names, attributes, true)
}

/// Report the installed version of every package in `names`
///
/// A package that is not installed is not a failure.
pub fn package_info(env: &Environment<'_>, names: &[String]) -> BatchResult {
    fold(run_info(env, names, false))
}

/// Like [`package_info`], but the first failed query is returned as an error
pub fn checked_package_info(env: &Environment<'_>, names: &[String]) -> Result<BatchResult> {
    run_info(env, names, true)
}

// Non-strict runs only fail before any target is attempted.
fn fold(result: Result<BatchResult>) -> BatchResult {
    result.unwrap_or_else(|e| {
        let mut batch = BatchResult::default();
        batch.failed("prepare", "batch", &e);
        batch
    })
}

fn run_packages(
    env: &mut Environment<'_>,
    verb: &str,
    names: &[String],
    attributes: &Attributes,
    strict: bool,
) -> Result<BatchResult> {
    let (batch, _report) = env.with_scope(ScopeOptions::new(), |env| {
        let mut batch = BatchResult::default();
        for name in names {
            match realize_package(env, verb, name, attributes) {
                Ok(result) => batch.succeeded(format!("{name}: {}", result.label())),
                Err(e) if strict => return Err(e),
                Err(e) => batch.failed(verb, name, &e),
            }
        }
        Ok(batch)
    })?;
    Ok(batch)
}

fn realize_package(env: &mut Environment<'_>, verb: &str, name: &str, attributes: &Attributes) -> Result<ApplyResult> {
    let mut attributes = attributes.clone();
    // Failures are folded per target here, not ignored.
    attributes.remove("ignore_failures");
    attributes.insert("action".to_string(), Value::from(verb));
    let resource = Resource::declare(ResourceKind::Package, name, attributes)?;
    env.realize(&resource)
}

fn run_info(env: &Environment<'_>, names: &[String], strict: bool) -> Result<BatchResult> {
    let manager = package_manager(env.family(), env.settings()).ok_or_else(|| Error::UnsupportedPlatform {
        kind: ResourceKind::Package.to_string(),
        family: env.family().to_string(),
    })?;

    let mut batch = BatchResult::default();
    for name in names {
        match manager.installed_version(env.shell(), name) {
            Ok(Some(version)) => batch.succeeded(format!("{name} {version}")),
            Ok(None) => batch.succeeded(format!("{name} not installed")),
            Err(e) if strict => return Err(e.into()),
            Err(e) => batch.failed("query", name, &Error::from(e)),
        }
    }
    Ok(batch)
}
