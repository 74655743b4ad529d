pub mod apply;
pub mod exec;
pub mod packages;
pub mod platform;

use anyhow::Result;
use declarative::Environment;
use pkgkit::RetryCallback;
use shellkit::ShellRunner;

use crate::Context;

/// Environment configured from the loaded settings
pub fn environment<'a>(
    ctx: &Context,
    shell: &'a dyn ShellRunner,
    retry: &'a dyn RetryCallback,
) -> Result<Environment<'a>> {
    let mut env = Environment::new(shell, ctx.family)
        .with_settings(ctx.settings.engine_settings()?)
        .with_retry_callback(retry);
    if let Some(base_dir) = &ctx.settings.base_dir {
        env = env.with_base_dir(crate::config::expand_path(base_dir)?);
    }
    Ok(env)
}
