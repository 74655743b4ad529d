//! Providers realize resources on the host
//!
//! A provider is stateless: it receives the validated [`Resource`] and an
//! [`ApplyContext`], inspects current state, and performs the minimal OS
//! action needed to reach the declared state.

pub mod directory;
pub mod encoding;
pub mod execute;
pub mod file;
pub mod link;
pub mod metadata;
pub mod package;
pub mod properties_file;
pub mod service;
pub mod xml_config;

use crate::context::ApplyContext;
use crate::error::Result;
use crate::resource::{Resource, ResourceKind};
use crate::types::ApplyResult;
use shellkit::CallOptions;

pub use directory::DirectoryProvider;
pub use execute::ExecuteProvider;
pub use file::FileProvider;
pub use link::LinkProvider;
pub use package::PackageProvider;
pub use properties_file::PropertiesFileProvider;
pub use service::SystemdServiceProvider;
pub use xml_config::XmlConfigProvider;

/// Realizes one kind of resource on one platform family
pub trait Provider {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Bring the host to the state `resource` declares
    ///
    /// This method should:
    /// 1. Inspect current state and return `NoChange` when it already matches
    /// 2. Respect `ctx.dry_run` (return `Skipped` instead of changing anything)
    /// 3. Perform the minimal OS action
    /// 4. Return the appropriate `ApplyResult`
    fn apply(&self, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult>;
}

/// Options guards of `resource` run with
///
/// Execute guards share the command's user, environment and working
/// directory; every other kind runs guards with defaults.
pub fn guard_options(resource: &Resource, ctx: &ApplyContext<'_>) -> CallOptions {
    match resource.kind() {
        ResourceKind::Execute => ExecuteProvider::call_options(resource, ctx),
        _ => CallOptions::new(),
    }
}
