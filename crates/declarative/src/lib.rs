//! # Declarative
//!
//! A framework for declarative resource management.
//!
//! Callers open a scope on an [`Environment`], declare resources (files,
//! directories, links, packages, services, commands, properties files), and
//! the engine realizes each declaration idempotently through the provider
//! registered for the resource kind and the host's platform family.
//!
//! ## Core Concepts
//!
//! - **Resource**: A validated declaration (kind, name, action, attributes)
//! - **Provider**: Inspects current state and performs the minimal OS action
//! - **ProviderRegistry**: Static `(kind, platform family)` dispatch table
//! - **Environment**: Scope stack with declaration-order realization and
//!   scope-local deduplication
//! - **ScopeReport**: Tagged outcome of every realized resource
//!
//! ## Example
//!
//! ```no_run
//! use declarative::{Environment, ResourceKind, ScopeOptions, attrs};
//! use pkgkit::PlatformFamily;
//! use shellkit::SystemShell;
//!
//! let mut env = Environment::new(&SystemShell, PlatformFamily::detect());
//! let (_, report) = env.with_scope(ScopeOptions::new().with_base_dir("/etc/myapp"), |env| {
//!     env.declare(ResourceKind::Package, "httpd", attrs! {})?;
//!     env.declare(
//!         ResourceKind::File,
//!         "myapp.conf",
//!         attrs! { "content" => "listen = 8080\n", "mode" => "0644" },
//!     )?;
//!     env.declare(ResourceKind::Service, "httpd", attrs! { "action" => "restart" })
//! })?;
//!
//! println!("{} change(s)", report.summary.total_changes());
//! # Ok::<(), declarative::Error>(())
//! ```
//!
//! ## Failure Policy
//!
//! The first failing resource aborts the rest of its scope; the remaining
//! resources are reported as skipped and [`Error::Aborted`] carries the
//! scope's report. Resources declared with `ignore_failures = true` are
//! recorded as failed and realization continues.

pub mod batch;
pub mod context;
pub mod environment;
pub mod error;
pub mod providers;
pub mod registry;
pub mod report;
pub mod resource;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use batch::{
    BatchResult, checked_install_packages, checked_package_info, checked_remove_packages,
    install_packages, package_info, remove_packages,
};
pub use context::{ApplyContext, EngineSettings, NoProgress, ProgressCallback};
pub use environment::{Environment, ScopeOptions};
pub use error::{Error, ErrorCategory, Result};
pub use providers::Provider;
pub use registry::ProviderRegistry;
pub use report::{ResourceOutcome, ScopeReport};
pub use resource::{Action, AttrSpec, Resource, ResourceKind};
pub use types::{ApplyResult, ExecuteSummary};
pub use value::{Attributes, Value, ValueType};
