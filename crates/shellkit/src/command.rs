//! Command, option and result types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Interpreter used for shell-string commands and impersonated commands.
pub const SHELL: &str = "/bin/sh";

/// A command to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShellCommand {
    /// Interpreted by `/bin/sh -c`
    Shell(String),
    /// Executed directly, no shell interpretation
    Argv(Vec<String>),
}

impl ShellCommand {
    /// Create a shell-string command.
    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell(command.into())
    }

    /// Create an argv command.
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Argv(args.into_iter().map(Into::into).collect())
    }

    /// Whether the command has nothing to run.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Shell(s) => s.trim().is_empty(),
            Self::Argv(args) => args.is_empty(),
        }
    }

    /// Render as one string suitable for `sh -c`, quoting argv tokens.
    pub fn to_shell_string(&self) -> String {
        match self {
            Self::Shell(s) => s.clone(),
            Self::Argv(args) => shell_words::join(args),
        }
    }

    /// Program and arguments after applying user impersonation and sudo.
    ///
    /// Impersonation wraps the command as `su <user> -s /bin/sh -c '<cmd>'`;
    /// sudo prefixes the result with `sudo -H -E`.
    pub fn to_argv(&self, opts: &CallOptions) -> Vec<String> {
        let mut argv = match (&opts.user, self) {
            (Some(user), _) => vec![
                "su".to_string(),
                user.clone(),
                "-s".to_string(),
                SHELL.to_string(),
                "-c".to_string(),
                self.to_shell_string(),
            ],
            (None, Self::Shell(s)) => vec![SHELL.to_string(), "-c".to_string(), s.clone()],
            (None, Self::Argv(args)) => args.clone(),
        };

        if opts.sudo {
            let mut wrapped = vec!["sudo".to_string(), "-H".to_string(), "-E".to_string()];
            wrapped.append(&mut argv);
            argv = wrapped;
        }

        argv
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

impl From<&str> for ShellCommand {
    fn from(s: &str) -> Self {
        Self::Shell(s.to_string())
    }
}

impl From<String> for ShellCommand {
    fn from(s: String) -> Self {
        Self::Shell(s)
    }
}

impl From<Vec<String>> for ShellCommand {
    fn from(args: Vec<String>) -> Self {
        Self::Argv(args)
    }
}

/// Options recognized by every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Run as this OS user
    pub user: Option<String>,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Maximum wall-clock time before the process group is killed
    pub timeout: Option<Duration>,
    /// Forward output lines to the log as they arrive
    pub logoutput: bool,
    /// Prepend the privilege-escalation wrapper
    pub sudo: bool,
}

impl CallOptions {
    /// Default options: current user, inherited environment, no timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run as `user`.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable live output logging.
    pub fn with_logoutput(mut self, logoutput: bool) -> Self {
        self.logoutput = logoutput;
        self
    }

    /// Enable or disable the sudo wrapper.
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }
}

/// Outcome of one OS-level execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellResult {
    /// Process exit code (`128 + signal` when killed by a signal)
    pub exit_code: i32,
    /// Captured stdout
    pub output: String,
    /// Captured stderr
    pub error: String,
}

impl ShellResult {
    /// Build a result from its parts.
    pub fn new(exit_code: i32, output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
            error: error.into(),
        }
    }

    /// A zero-exit result with the given stdout.
    pub fn ok(output: impl Into<String>) -> Self {
        Self::new(0, output, "")
    }

    /// A failing result with the given exit code and stdout.
    pub fn failed(exit_code: i32, output: impl Into<String>) -> Self {
        Self::new(exit_code, output, "")
    }

    /// Whether the exit code is zero.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, for pattern matching and messages.
    pub fn combined(&self) -> String {
        match (self.output.is_empty(), self.error.is_empty()) {
            (_, true) => self.output.clone(),
            (true, false) => self.error.clone(),
            (false, false) => format!("{}\n{}", self.output, self.error),
        }
    }
}
