//! Retry logic for package manager commands.
//!
//! Attempts are tagged ([`Attempt`]) and the loop matches on the tag:
//!
//! 1. At least two attempts are always made (`max(2, retry_count)`).
//! 2. The first failure that is not a lock message triggers a metadata
//!    refresh before the next attempt.
//! 3. Later failures continue only when classified and tolerated by the
//!    policy; anything else stops the loop immediately.

use crate::classify::{FailureKind, FailurePatterns, classify_failure};
use crate::error::{Error, Result};
use crate::manager::PackageManager;
use shellkit::{CallOptions, ShellCommand, ShellResult, ShellRunner, call};
use std::thread;
use std::time::Duration;

/// Retry behavior for one package resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Configured attempt count (effective minimum is 2)
    pub retry_count: u32,
    /// Pause between attempts
    pub retry_sleep: Duration,
    /// Retry when the package manager is locked
    pub retry_on_locked: bool,
    /// Retry when a repository is unreachable
    pub retry_on_repo_unavailability: bool,
}

impl RetryPolicy {
    /// Create a policy tolerating both transient kinds.
    pub fn new(retry_count: u32, retry_sleep: Duration) -> Self {
        Self {
            retry_count,
            retry_sleep,
            ..Self::default()
        }
    }

    /// Number of attempts actually made.
    ///
    /// The first failure may be spent on a metadata refresh, so there is
    /// always room for one more attempt.
    pub fn try_count(&self) -> u32 {
        self.retry_count.max(2)
    }

    /// Whether this policy retries `kind`.
    pub fn tolerates(&self, kind: FailureKind) -> bool {
        match kind {
            FailureKind::Locked => self.retry_on_locked,
            FailureKind::RepoUnavailable => self.retry_on_repo_unavailability,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 4,
            retry_sleep: Duration::from_secs(30),
            retry_on_locked: true,
            retry_on_repo_unavailability: true,
        }
    }
}

/// Outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Exit code zero
    Success,
    /// Failed with a recognized transient condition
    Transient(FailureKind),
    /// Failed for any other reason
    Hard,
}

impl Attempt {
    /// Tag a command result.
    pub fn classify(result: &ShellResult, patterns: &FailurePatterns) -> Self {
        if result.is_success() {
            return Self::Success;
        }
        match classify_failure(&result.combined(), patterns) {
            Some(kind) => Self::Transient(kind),
            None => Self::Hard,
        }
    }
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of a tolerated retry.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Effective attempt budget
    /// * `kind` - Why the attempt failed
    /// * `delay` - Pause before the next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, kind: FailureKind, delay: Duration);

    /// Called after the first-failure metadata refresh ran.
    fn on_refresh(&self, _result: &ShellResult) {}
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _kind: FailureKind, _delay: Duration) {}
}

/// Run `command`, retrying transient failures, and return the final result.
///
/// Never fails on a nonzero exit code; spawn failures and timeouts propagate
/// immediately without retry.
pub fn call_with_retries<M: PackageManager + ?Sized>(
    manager: &M,
    shell: &dyn ShellRunner,
    command: &ShellCommand,
    opts: &CallOptions,
    policy: &RetryPolicy,
    callback: Option<&dyn RetryCallback>,
) -> Result<ShellResult> {
    let try_count = policy.try_count();
    let patterns = manager.patterns();

    let mut attempt = 0;
    loop {
        attempt += 1;
        let is_first = attempt == 1;
        let is_last = attempt == try_count;

        let result = call(shell, command, opts)?;
        let outcome = Attempt::classify(&result, patterns);

        match outcome {
            Attempt::Success => return Ok(result),
            _ if is_last => {
                log::debug!("'{command}' failed on final attempt {attempt}/{try_count}");
                return Ok(result);
            }
            Attempt::Hard | Attempt::Transient(FailureKind::RepoUnavailable) if is_first => {
                log::info!(
                    "Execution of '{command}' failed (exit code {}). Refreshing {} metadata before retrying",
                    result.exit_code,
                    manager.name()
                );
                refresh_after_bad_try(manager, shell, callback);
            }
            Attempt::Transient(kind) if policy.tolerates(kind) => {
                log::info!(
                    "Execution of '{command}' failed: {kind}. Retrying in {}s ({attempt}/{try_count})",
                    policy.retry_sleep.as_secs()
                );
                if let Some(cb) = callback {
                    cb.on_retry(attempt, try_count, kind, policy.retry_sleep);
                }
            }
            Attempt::Transient(_) | Attempt::Hard => return Ok(result),
        }

        thread::sleep(policy.retry_sleep);
    }
}

/// Like [`call_with_retries`], failing once retries are exhausted.
pub fn checked_call_with_retries<M: PackageManager + ?Sized>(
    manager: &M,
    shell: &dyn ShellRunner,
    command: &ShellCommand,
    opts: &CallOptions,
    policy: &RetryPolicy,
    callback: Option<&dyn RetryCallback>,
) -> Result<ShellResult> {
    let result = call_with_retries(manager, shell, command, opts, policy, callback)?;
    if result.is_success() {
        Ok(result)
    } else {
        Err(Error::Shell(shellkit::Error::ExecutionFailed {
            command: command.to_string(),
            result,
        }))
    }
}

fn refresh_after_bad_try<M: PackageManager + ?Sized>(
    manager: &M,
    shell: &dyn ShellRunner,
    callback: Option<&dyn RetryCallback>,
) {
    match manager.refresh_metadata(shell) {
        Ok(result) => {
            if !result.is_success() {
                log::warn!(
                    "Metadata refresh returned {}: {}",
                    result.exit_code,
                    result.combined().trim()
                );
            }
            if let Some(cb) = callback {
                cb.on_refresh(&result);
            }
        }
        Err(e) => log::warn!("Metadata refresh could not run: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::yum::YumManager;
    use shellkit::ScriptedShell;
    use std::cell::RefCell;

    const LOCKED: &str = "Existing lock /var/run/yum.pid: another copy is running as pid 311.";
    const REPO_DOWN: &str = "Cannot retrieve repository metadata (repomd.xml) for repository: HDP";

    #[derive(Default)]
    struct Recorder {
        retries: RefCell<Vec<(u32, u32, FailureKind)>>,
        refreshes: RefCell<u32>,
    }

    impl RetryCallback for Recorder {
        fn on_retry(&self, attempt: u32, max_attempts: u32, kind: FailureKind, _delay: Duration) {
            self.retries.borrow_mut().push((attempt, max_attempts, kind));
        }

        fn on_refresh(&self, _result: &ShellResult) {
            *self.refreshes.borrow_mut() += 1;
        }
    }

    fn install_cmd() -> ShellCommand {
        ShellCommand::argv(["/usr/bin/yum", "-d", "0", "-e", "0", "-y", "install", "httpd"])
    }

    fn policy(retry_count: u32) -> RetryPolicy {
        RetryPolicy::new(retry_count, Duration::ZERO)
    }

    #[test]
    fn test_try_count_minimum_two() {
        assert_eq!(policy(0).try_count(), 2);
        assert_eq!(policy(1).try_count(), 2);
        assert_eq!(policy(5).try_count(), 5);
    }

    #[test]
    fn test_success_first_try() {
        let shell = ScriptedShell::new().on("install", [ShellResult::ok("Complete!")]);
        let result =
            call_with_retries(&YumManager, &shell, &install_cmd(), &CallOptions::new(), &policy(3), None)
                .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(shell.count_matching("install"), 1);
        assert_eq!(shell.count_matching("clean metadata"), 0);
    }

    #[test]
    fn test_always_locked_respects_budget() {
        let shell = ScriptedShell::new().on("install", [ShellResult::failed(1, LOCKED)]);
        let recorder = Recorder::default();

        let result = call_with_retries(
            &YumManager,
            &shell,
            &install_cmd(),
            &CallOptions::new(),
            &policy(3),
            Some(&recorder),
        )
        .unwrap();

        assert_eq!(result.exit_code, 1);
        assert_eq!(shell.count_matching("install"), 3);
        // Retry notices precede each sleep; none after the last attempt
        assert_eq!(
            *recorder.retries.borrow(),
            vec![(1, 3, FailureKind::Locked), (2, 3, FailureKind::Locked)]
        );
        // Lock failures never trigger the metadata refresh
        assert_eq!(shell.count_matching("clean metadata"), 0);
    }

    #[test]
    fn test_first_unlocked_failure_refreshes_once() {
        let shell = ScriptedShell::new().on(
            "install",
            [
                ShellResult::failed(1, "Error: Nothing to do"),
                ShellResult::ok("Complete!"),
            ],
        );
        let recorder = Recorder::default();

        let result = call_with_retries(
            &YumManager,
            &shell,
            &install_cmd(),
            &CallOptions::new(),
            &policy(1),
            Some(&recorder),
        )
        .unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(shell.count_matching("install"), 2);
        assert_eq!(shell.count_matching("clean metadata"), 1);
        assert_eq!(*recorder.refreshes.borrow(), 1);
        assert_eq!(
            shell.calls(),
            vec![
                install_cmd().to_string(),
                "/usr/bin/yum clean metadata".to_string(),
                install_cmd().to_string(),
            ]
        );
    }

    #[test]
    fn test_unclassified_second_failure_stops() {
        let shell = ScriptedShell::new().on("install", [ShellResult::failed(1, "No package httpd available.")]);

        let result =
            call_with_retries(&YumManager, &shell, &install_cmd(), &CallOptions::new(), &policy(5), None)
                .unwrap();

        // Attempt 1 fails and refreshes, attempt 2 fails unclassified and stops
        assert_eq!(result.exit_code, 1);
        assert_eq!(shell.count_matching("install"), 2);
        assert_eq!(shell.count_matching("clean metadata"), 1);
    }

    #[test]
    fn test_repo_unavailable_retried_when_tolerated() {
        let shell = ScriptedShell::new().on(
            "install",
            [
                ShellResult::failed(1, REPO_DOWN),
                ShellResult::failed(1, REPO_DOWN),
                ShellResult::ok("Complete!"),
            ],
        );
        let recorder = Recorder::default();

        let result = call_with_retries(
            &YumManager,
            &shell,
            &install_cmd(),
            &CallOptions::new(),
            &policy(4),
            Some(&recorder),
        )
        .unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(shell.count_matching("install"), 3);
        // First failure is spent on the refresh, second is a tolerated retry
        assert_eq!(shell.count_matching("clean metadata"), 1);
        assert_eq!(
            *recorder.retries.borrow(),
            vec![(2, 4, FailureKind::RepoUnavailable)]
        );
    }

    #[test]
    fn test_untolerated_lock_stops() {
        let shell = ScriptedShell::new().on("install", [ShellResult::failed(1, LOCKED)]);
        let policy = RetryPolicy {
            retry_on_locked: false,
            ..policy(5)
        };

        let result =
            call_with_retries(&YumManager, &shell, &install_cmd(), &CallOptions::new(), &policy, None)
                .unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(shell.count_matching("install"), 1);
    }

    #[test]
    fn test_checked_raises_after_exhaustion() {
        let shell = ScriptedShell::new().on("install", [ShellResult::failed(1, LOCKED)]);
        let err = checked_call_with_retries(
            &YumManager,
            &shell,
            &install_cmd(),
            &CallOptions::new(),
            &policy(2),
            None,
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(shell.count_matching("install"), 2);
    }

    #[test]
    fn test_attempt_classification() {
        let patterns = YumManager.patterns();
        assert_eq!(Attempt::classify(&ShellResult::ok(""), patterns), Attempt::Success);
        assert_eq!(
            Attempt::classify(&ShellResult::failed(1, LOCKED), patterns),
            Attempt::Transient(FailureKind::Locked)
        );
        assert_eq!(
            Attempt::classify(&ShellResult::new(1, "", REPO_DOWN), patterns),
            Attempt::Transient(FailureKind::RepoUnavailable)
        );
        assert_eq!(
            Attempt::classify(&ShellResult::failed(1, "boom"), patterns),
            Attempt::Hard
        );
    }
}
