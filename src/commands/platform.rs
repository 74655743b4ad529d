//! `converge platform`

use anyhow::Result;
use declarative::{ProviderRegistry, ResourceKind};

use crate::Context;
use crate::config;
use crate::ui;

pub fn run(ctx: &Context) -> Result<i32> {
    let engine = ctx.settings.engine_settings()?;
    let registry = ProviderRegistry::linux_with(&engine);

    ui::header("converge");
    ui::kv("platform", ctx.family.as_str());
    ui::kv("config", &config::config_path()?.display().to_string());
    ui::kv(
        "base dir",
        ctx.settings.base_dir.as_deref().unwrap_or("(current directory)"),
    );
    ui::kv(
        "backup dir",
        &engine
            .backup_dir
            .as_ref()
            .map_or_else(|| "(next to file)".to_string(), |p| p.display().to_string()),
    );

    ui::section("Retry");
    ui::kv("retry_count", &engine.retry.retry_count.to_string());
    ui::kv("retry_sleep", &format!("{}s", engine.retry.retry_sleep.as_secs()));
    ui::kv("retry_on_locked", &engine.retry.retry_on_locked.to_string());
    ui::kv(
        "retry_on_repo_unavailability",
        &engine.retry.retry_on_repo_unavailability.to_string(),
    );

    ui::section("Providers");
    for kind in supported_kinds(&registry, ctx) {
        ui::dim(kind.as_str());
    }
    Ok(0)
}

fn supported_kinds(registry: &ProviderRegistry, ctx: &Context) -> Vec<ResourceKind> {
    ResourceKind::ALL
        .into_iter()
        .filter(|kind| registry.supports(*kind, ctx.family))
        .collect()
}
