//! Directory provider

use super::Provider;
use super::metadata::{Ownership, ensure_metadata, ensure_ownership_recursive};
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::resource::{Action, Resource};
use crate::types::ApplyResult;
use std::fs;
use std::path::Path;

/// Manages directories
#[derive(Debug, Default)]
pub struct DirectoryProvider;

impl Provider for DirectoryProvider {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn apply(&self, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        let path = ctx.resolve(resource.name());
        match resource.action() {
            Action::Create => create(&path, resource, ctx),
            Action::Delete => delete(&path, ctx),
            _ => Ok(ApplyResult::NoChange),
        }
    }
}

fn create(path: &Path, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
    let ownership = Ownership::from_resource(resource)?;
    let recursive = resource.bool_attr("recursive_ownership", false);

    let mut result = ApplyResult::NoChange;
    if path.symlink_metadata().is_ok() && !path.is_dir() {
        return Err(Error::Conflict {
            path: path.to_path_buf(),
            message: "exists and is not a directory".to_string(),
        });
    }

    if !path.exists() {
        let parent_missing = path.parent().is_some_and(|p| !p.as_os_str().is_empty() && !p.is_dir());
        if parent_missing && !resource.bool_attr("create_parents", false) {
            return Err(Error::ParentMissing {
                path: path.to_path_buf(),
            });
        }
        if ctx.dry_run {
            return Ok(ApplyResult::dry_run(format!("create directory {}", path.display())));
        }
        log::info!("Creating directory {}", path.display());
        let created = if parent_missing {
            fs::create_dir_all(path)
        } else {
            fs::create_dir(path)
        };
        created.map_err(|e| Error::io(path, e))?;
        result = ApplyResult::Created;
    }

    let mut changed = ensure_metadata(path, &ownership, ctx.dry_run)?;
    if recursive {
        changed |= ensure_ownership_recursive(path, ownership.uid, ownership.gid, ctx.dry_run)? > 0;
    }

    if changed && result == ApplyResult::NoChange {
        if ctx.dry_run {
            return Ok(ApplyResult::dry_run(format!("change metadata of {}", path.display())));
        }
        result = ApplyResult::Modified;
    }
    Ok(result)
}

fn delete(path: &Path, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(ApplyResult::NoChange);
    };
    if !meta.is_dir() {
        return Err(Error::Conflict {
            path: path.to_path_buf(),
            message: "is not a directory, refusing to delete it".to_string(),
        });
    }
    if ctx.dry_run {
        return Ok(ApplyResult::dry_run(format!("delete directory {}", path.display())));
    }
    log::info!("Removing directory {} and all its content", path.display());
    fs::remove_dir_all(path).map_err(|e| Error::io(path, e))?;
    Ok(ApplyResult::Removed)
}
