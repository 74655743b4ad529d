//! # pkgkit
//!
//! Drives the host's native package manager (yum, apt, zypper) and tolerates
//! the two failures that are routinely transient on real fleets: another
//! process holding the package manager lock, and a repository that is
//! temporarily unreachable.
//!
//! ## Example
//!
//! ```no_run
//! use pkgkit::{InstallOptions, PlatformFamily, RetryPolicy, manager};
//! use shellkit::SystemShell;
//! use std::path::Path;
//!
//! let family = PlatformFamily::detect();
//! let pm = manager::for_family(family, Path::new(manager::apt::DPKG_STATUS)).expect("no package manager for this host");
//!
//! if !pm.is_installed(&SystemShell, "httpd").unwrap() {
//!     pm.install_package(
//!         &SystemShell,
//!         "httpd",
//!         &InstallOptions::default(),
//!         &RetryPolicy::default(),
//!         None,
//!     )
//!     .unwrap();
//! }
//! ```
//!
//! ## Retry Logic
//!
//! Every mutating package command goes through
//! [`retry::checked_call_with_retries`]. The first failure that is not a lock
//! message triggers a repository metadata refresh; later failures are retried
//! only when [`classify::classify_failure`] recognizes them and the
//! [`RetryPolicy`] tolerates that kind.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod error;
pub mod manager;
pub mod platform;
pub mod retry;

pub use classify::{FailureKind, FailurePatterns, classify_failure};
pub use error::{Error, ErrorCategory, Result};
pub use manager::{InstallOptions, PackageManager, RemoveOptions};
pub use platform::PlatformFamily;
pub use retry::{
    Attempt, NoCallback, RetryCallback, RetryPolicy, call_with_retries, checked_call_with_retries,
};
