//! # shellkit
//!
//! Runs OS commands and returns their exit code, stdout and stderr as a
//! [`ShellResult`].
//!
//! Commands are either a shell string (interpreted by `/bin/sh -c`) or an
//! argv list executed directly. [`CallOptions`] adds impersonation, a sudo
//! wrapper, extra environment, a working directory, a wall-clock timeout and
//! live output logging.
//!
//! ## Example
//!
//! ```no_run
//! use shellkit::{CallOptions, ShellCommand, SystemShell, call, checked_call};
//! use std::time::Duration;
//!
//! let shell = SystemShell;
//!
//! // Never fails on a nonzero exit code
//! let result = call(&shell, &ShellCommand::shell("test -d /etc"), &CallOptions::new()).unwrap();
//! println!("exit code: {}", result.exit_code);
//!
//! // Fails with Error::ExecutionFailed on a nonzero exit code
//! let opts = CallOptions::new().with_timeout(Duration::from_secs(30));
//! checked_call(&shell, &ShellCommand::argv(["mkdir", "-p", "/tmp/x"]), &opts).unwrap();
//! ```
//!
//! ## Runner Trait
//!
//! Everything goes through [`ShellRunner`], so callers can substitute a
//! [`ScriptedShell`] in tests or another transport in production.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod guard;
pub mod mock;
pub mod runner;

pub use command::{CallOptions, SHELL, ShellCommand, ShellResult};
pub use error::{Error, Result};
pub use guard::{Guard, evaluate_guards};
pub use mock::ScriptedShell;
pub use runner::{ShellRunner, SystemShell, call, checked_call};
