//! Environment scopes
//!
//! An [`Environment`] owns a stack of scopes. Resources declared inside a
//! scope are validated immediately and realized in declaration order when
//! the scope exits (or right away through [`Environment::realize`]).
//!
//! Each scope keeps its own realized set. File-like resources and packages
//! realized once in a scope are not probed again in that scope; Execute and
//! Service resources always run. Parent and sibling scopes never share the
//! set.

use crate::context::{ApplyContext, EngineSettings, ProgressCallback};
use crate::error::{Error, Result};
use crate::providers::guard_options;
use crate::registry::ProviderRegistry;
use crate::report::{ResourceOutcome, ScopeReport};
use crate::resource::{Action, Resource, ResourceKind};
use crate::types::ApplyResult;
use crate::value::Attributes;
use pkgkit::{PlatformFamily, RetryCallback};
use shellkit::{ShellRunner, evaluate_guards};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Options for a new scope
#[derive(Debug, Clone, Default)]
pub struct ScopeOptions {
    /// Base directory; relative paths resolve against the enclosing scope's.
    /// `None` inherits the enclosing scope's base directory.
    pub base_dir: Option<PathBuf>,
}

impl ScopeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }
}

struct Scope {
    base_dir: PathBuf,
    pending: VecDeque<Resource>,
    realized: HashSet<String>,
    report: ScopeReport,
}

impl Scope {
    fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            pending: VecDeque::new(),
            realized: HashSet::new(),
            report: ScopeReport::default(),
        }
    }
}

/// Declaration and realization context for one host
pub struct Environment<'a> {
    shell: &'a dyn ShellRunner,
    registry: ProviderRegistry,
    settings: EngineSettings,
    family: PlatformFamily,
    root_dir: PathBuf,
    dry_run: bool,
    scopes: Vec<Scope>,
    progress: Option<Box<dyn ProgressCallback + 'a>>,
    retry_callback: Option<&'a dyn RetryCallback>,
}

impl<'a> Environment<'a> {
    /// Environment for `family` with the Linux provider table and default settings
    pub fn new(shell: &'a dyn ShellRunner, family: PlatformFamily) -> Self {
        let settings = EngineSettings::default();
        Self {
            shell,
            registry: ProviderRegistry::linux_with(&settings),
            settings,
            family,
            root_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            dry_run: false,
            scopes: Vec::new(),
            progress: None,
            retry_callback: None,
        }
    }

    /// Replace the engine settings and rebuild the Linux provider table for them
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.registry = ProviderRegistry::linux_with(&settings);
        self.settings = settings;
        self
    }

    /// Use a custom provider table
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Base directory of outermost scopes
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = base_dir.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressCallback + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn with_retry_callback(mut self, callback: &'a dyn RetryCallback) -> Self {
        self.retry_callback = Some(callback);
        self
    }

    pub fn shell(&self) -> &'a dyn ShellRunner {
        self.shell
    }

    pub fn family(&self) -> PlatformFamily {
        self.family
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Number of open scopes
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Base directory of the innermost scope
    pub fn base_dir(&self) -> &Path {
        self.scopes.last().map_or(&self.root_dir, |s| &s.base_dir)
    }

    /// Push a new scope
    pub fn enter(&mut self, opts: ScopeOptions) {
        let base_dir = match opts.base_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => self.base_dir().join(dir),
            None => self.base_dir().to_path_buf(),
        };
        log::debug!("Entering scope {} at {}", self.depth() + 1, base_dir.display());
        self.scopes.push(Scope::new(base_dir));
    }

    /// Realize pending resources, then pop the innermost scope
    ///
    /// The scope is popped even when realization fails; the returned
    /// [`Error::Aborted`] carries the scope's report.
    pub fn exit(&mut self) -> Result<ScopeReport> {
        if self.scopes.is_empty() {
            return Err(Error::NoScope);
        }
        let realized = self.realize_pending();
        let scope = self.scopes.pop().ok_or(Error::NoScope)?;
        log::debug!(
            "Leaving scope {}: {} resource(s), {} change(s)",
            self.depth() + 1,
            scope.report.outcomes.len(),
            scope.report.summary.total_changes()
        );
        realized.map(|()| scope.report)
    }

    /// Validate a declaration and queue it in the innermost scope
    pub fn declare(&mut self, kind: ResourceKind, name: impl Into<String>, attributes: Attributes) -> Result<()> {
        let resource = Resource::declare(kind, name, attributes)?;
        self.push(resource)
    }

    /// Queue an already validated resource in the innermost scope
    pub fn push(&mut self, resource: Resource) -> Result<()> {
        let scope = self.scopes.last_mut().ok_or(Error::NoScope)?;
        log::trace!("Declared {resource}");
        scope.pending.push_back(resource);
        Ok(())
    }

    /// Realize `resource` now, in the innermost scope
    ///
    /// A failure is returned unless the resource sets `ignore_failures`, in
    /// which case it is recorded and `Failed` is returned.
    pub fn realize(&mut self, resource: &Resource) -> Result<ApplyResult> {
        if self.scopes.is_empty() {
            return Err(Error::NoScope);
        }
        self.realize_one(resource)
    }

    /// Realize every pending resource of the innermost scope, in declaration order
    ///
    /// The first failure not covered by `ignore_failures` marks the remaining
    /// pending resources as skipped and returns [`Error::Aborted`].
    pub fn realize_pending(&mut self) -> Result<()> {
        loop {
            let scope = self.scopes.last_mut().ok_or(Error::NoScope)?;
            let Some(resource) = scope.pending.pop_front() else {
                return Ok(());
            };
            if let Err(source) = self.realize_one(&resource) {
                return Err(self.abort(&resource, source));
            }
        }
    }

    /// Forget what the innermost scope has realized
    pub fn reset(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.realized.clear();
        }
    }

    /// Run `f` inside a fresh scope
    ///
    /// Pending resources are realized when `f` returns, even if it failed.
    /// Scopes `f` left open are closed first. An error from `f` takes
    /// precedence over a realization error.
    pub fn with_scope<T, F>(&mut self, opts: ScopeOptions, f: F) -> Result<(T, ScopeReport)>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.enter(opts);
        let depth = self.depth();
        let value = f(self);

        while self.depth() > depth {
            log::warn!("Closing scope {} left open", self.depth());
            if let Err(e) = self.exit() {
                log::warn!("{e}");
            }
        }

        let report = self.exit();
        match (value, report) {
            (Ok(value), Ok(report)) => Ok((value, report)),
            (Err(e), Ok(_)) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(realize_err)) => {
                log::warn!("{realize_err}");
                Err(e)
            }
        }
    }

    fn realize_one(&mut self, resource: &Resource) -> Result<ApplyResult> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(Error::NoScope);
        };

        let key = resource.dedup_key();
        if let Some(key) = &key
            && scope.realized.contains(key)
        {
            log::debug!("Skipping {resource}: already realized in this scope");
            return Ok(ApplyResult::NoChange);
        }

        if let Some(progress) = self.progress.as_mut() {
            progress.on_resource_start(resource);
        }

        let ctx = ApplyContext {
            shell: self.shell,
            settings: &self.settings,
            base_dir: &scope.base_dir,
            family: self.family,
            dry_run: self.dry_run,
            retry_callback: self.retry_callback,
        };
        let applied = apply(&self.registry, resource, &ctx);

        let result = match applied {
            Ok(result) => result,
            Err(e) if resource.ignore_failures() => {
                log::warn!("Ignoring failure of {resource}: {e}");
                ApplyResult::Failed { error: e.to_string() }
            }
            Err(e) => {
                log::debug!("{resource} failed: {e}");
                let outcome = ResourceOutcome::new(resource, ApplyResult::Failed { error: e.to_string() });
                self.record(outcome);
                return Err(e);
            }
        };

        if result.is_converged()
            && let Some(key) = key
        {
            scope.realized.insert(key);
        }
        log::debug!("{resource}: {result}");
        self.record(ResourceOutcome::new(resource, result.clone()));
        Ok(result)
    }

    fn record(&mut self, outcome: ResourceOutcome) {
        if let Some(progress) = self.progress.as_mut() {
            progress.on_resource_complete(&outcome);
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.report.record(outcome);
        }
    }

    fn abort(&mut self, failed: &Resource, source: Error) -> Error {
        let remaining: Vec<Resource> = self
            .scopes
            .last_mut()
            .map(|s| s.pending.drain(..).collect())
            .unwrap_or_default();
        for resource in &remaining {
            log::warn!("Skipping {resource}: {failed} failed");
            self.record(ResourceOutcome::new(
                resource,
                ApplyResult::Skipped {
                    reason: format!("{failed} failed"),
                },
            ));
        }
        Error::Aborted {
            resource: failed.to_string(),
            source: Box::new(source),
            report: Box::new(self.scopes.last().map(|s| s.report.clone()).unwrap_or_default()),
        }
    }
}

fn apply(registry: &ProviderRegistry, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
    if !resource.guards().is_empty()
        && let Some(reason) = evaluate_guards(ctx.shell, resource.guards(), &guard_options(resource, ctx))?
    {
        log::info!("Skipping {resource} due to {reason}");
        return Ok(ApplyResult::Skipped { reason });
    }
    if resource.action() == Action::Nothing {
        return Ok(ApplyResult::NoChange);
    }

    let provider = registry.resolve(resource.kind(), ctx.family)?;
    log::debug!("Applying {resource} with {} provider", provider.name());
    provider.apply(resource, ctx)
}
