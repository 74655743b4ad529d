//! Link provider (symbolic and hard links)

use super::Provider;
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::resource::{Action, Resource};
use crate::types::ApplyResult;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Manages symbolic and hard links
#[derive(Debug, Default)]
pub struct LinkProvider;

impl Provider for LinkProvider {
    fn name(&self) -> &'static str {
        "link"
    }

    fn apply(&self, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        let path = ctx.resolve(resource.name());
        let to = PathBuf::from(resource.str_attr("to").unwrap_or_default());
        match resource.action() {
            Action::Create if resource.bool_attr("hard", false) => create_hard(&path, &to, ctx),
            Action::Create => create_symlink(&path, &to, ctx),
            Action::Delete => delete(&path, ctx),
            _ => Ok(ApplyResult::NoChange),
        }
    }
}

fn check_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() && !p.is_dir() => Err(Error::ParentMissing {
            path: path.to_path_buf(),
        }),
        _ => Ok(()),
    }
}

fn create_symlink(path: &Path, to: &Path, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
    let mut result = ApplyResult::Created;
    if let Ok(meta) = path.symlink_metadata() {
        if !meta.file_type().is_symlink() {
            return Err(Error::Conflict {
                path: path.to_path_buf(),
                message: "exists and is not a link".to_string(),
            });
        }
        let current = fs::read_link(path).map_err(|e| Error::io(path, e))?;
        if current == to {
            return Ok(ApplyResult::NoChange);
        }
        if ctx.dry_run {
            return Ok(ApplyResult::dry_run(format!(
                "repoint {} from {} to {}",
                path.display(),
                current.display(),
                to.display()
            )));
        }
        log::info!(
            "{} points to {} instead of {}, replacing it",
            path.display(),
            current.display(),
            to.display()
        );
        fs::remove_file(path).map_err(|e| Error::io(path, e))?;
        result = ApplyResult::Modified;
    } else {
        check_parent(path)?;
        if ctx.dry_run {
            return Ok(ApplyResult::dry_run(format!("link {} to {}", path.display(), to.display())));
        }
    }

    log::info!("Creating symbolic link {} -> {}", path.display(), to.display());
    std::os::unix::fs::symlink(to, path).map_err(|e| Error::io(path, e))?;
    Ok(result)
}

fn create_hard(path: &Path, to: &Path, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
    let target = if to.is_absolute() {
        to.to_path_buf()
    } else {
        path.parent().unwrap_or(Path::new("/")).join(to)
    };
    let target_meta = fs::metadata(&target).map_err(|_| Error::Conflict {
        path: path.to_path_buf(),
        message: format!("hard link target {} does not exist", target.display()),
    })?;
    if target_meta.is_dir() {
        return Err(Error::Conflict {
            path: path.to_path_buf(),
            message: format!("cannot hard link to directory {}", target.display()),
        });
    }

    if let Ok(meta) = path.symlink_metadata() {
        if meta.dev() == target_meta.dev() && meta.ino() == target_meta.ino() {
            return Ok(ApplyResult::NoChange);
        }
        return Err(Error::Conflict {
            path: path.to_path_buf(),
            message: format!("exists and is not a hard link to {}", target.display()),
        });
    }

    check_parent(path)?;
    if ctx.dry_run {
        return Ok(ApplyResult::dry_run(format!(
            "hard link {} to {}",
            path.display(),
            target.display()
        )));
    }
    log::info!("Creating hard link {} -> {}", path.display(), target.display());
    fs::hard_link(&target, path).map_err(|e| Error::io(path, e))?;
    Ok(ApplyResult::Created)
}

fn delete(path: &Path, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(ApplyResult::NoChange);
    };
    if meta.is_dir() {
        return Err(Error::Conflict {
            path: path.to_path_buf(),
            message: "is a directory, not a link".to_string(),
        });
    }
    if ctx.dry_run {
        return Ok(ApplyResult::dry_run(format!("remove link {}", path.display())));
    }
    log::info!("Deleting link {}", path.display());
    fs::remove_file(path).map_err(|e| Error::io(path, e))?;
    Ok(ApplyResult::Removed)
}
