//! File provider
//!
//! Content is compared in decoded form: the existing file is decoded with
//! the declared encoding and compared to the desired text, and only a
//! difference leads to a write. Metadata is ensured after content.

use super::Provider;
use super::encoding::Encoding;
use super::metadata::{Ownership, ensure_metadata};
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::resource::{Action, Resource};
use crate::types::ApplyResult;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// How a managed file is written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSpec {
    pub encoding: Encoding,
    pub backup: bool,
    pub replace: bool,
    pub create_parents: bool,
    pub ownership: Ownership,
}

impl FileSpec {
    /// Read the write options shared by File, PropertiesFile and XmlConfig
    pub fn from_resource(resource: &Resource) -> Result<Self> {
        let encoding = match resource.str_attr("encoding") {
            Some(name) => Encoding::parse(name).ok_or_else(|| Error::InvalidAttribute {
                kind: resource.kind().to_string(),
                name: resource.name().to_string(),
                attribute: "encoding".to_string(),
                message: format!("unsupported encoding '{name}'"),
            })?,
            None => Encoding::default(),
        };
        Ok(Self {
            encoding,
            backup: resource.bool_attr("backup", false),
            replace: resource.bool_attr("replace", true),
            create_parents: resource.bool_attr("create_parents", false),
            ownership: Ownership::from_resource(resource)?,
        })
    }
}

/// Manages regular files
#[derive(Debug, Default)]
pub struct FileProvider;

impl Provider for FileProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn apply(&self, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        let path = ctx.resolve(resource.name());
        match resource.action() {
            Action::Create => {
                let spec = FileSpec::from_resource(resource)?;
                let content = desired_content(resource, ctx)?;
                ensure_file(&path, content.as_deref(), &spec, ctx)
            }
            Action::Delete => delete_file(&path, ctx),
            _ => Ok(ApplyResult::NoChange),
        }
    }
}

fn desired_content(resource: &Resource, ctx: &ApplyContext<'_>) -> Result<Option<String>> {
    if let Some(content) = resource.str_attr("content") {
        return Ok(Some(content.to_string()));
    }
    match resource.str_attr("source") {
        Some(source) => {
            let source = ctx.resolve(source);
            fs::read_to_string(&source)
                .map(Some)
                .map_err(|e| Error::io(source, e))
        }
        None => Ok(None),
    }
}

/// Ensure `path` is a regular file with `content` (when given).
///
/// `None` content manages existence and metadata only.
pub fn ensure_file(
    path: &Path,
    content: Option<&str>,
    spec: &FileSpec,
    ctx: &ApplyContext<'_>,
) -> Result<ApplyResult> {
    if path.is_dir() {
        return Err(Error::Conflict {
            path: path.to_path_buf(),
            message: "is a directory, cannot manage it as a file".to_string(),
        });
    }

    let is_link = fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink());
    if is_link && !path.exists() {
        return Err(Error::Conflict {
            path: path.to_path_buf(),
            message: "is a dangling symlink, refusing to write through it".to_string(),
        });
    }

    let encoded = content
        .map(|text| {
            spec.encoding.encode(text).map_err(|message| Error::Encoding {
                path: path.to_path_buf(),
                encoding: spec.encoding.to_string(),
                operation: "encode",
                message,
            })
        })
        .transpose()?;

    if !path.exists() {
        let parent = path.parent().unwrap_or(Path::new("/"));
        let parent_missing = !parent.as_os_str().is_empty() && !parent.is_dir();
        if parent_missing && !spec.create_parents {
            return Err(Error::ParentMissing {
                path: path.to_path_buf(),
            });
        }
        if ctx.dry_run {
            return Ok(ApplyResult::dry_run(format!("create {}", path.display())));
        }
        if parent_missing {
            log::info!("Creating parent directories of {}", path.display());
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let bytes = encoded.unwrap_or_default();
        log::info!(
            "Writing {} ({} bytes, blake3 {})",
            path.display(),
            bytes.len(),
            short_hash(&bytes)
        );
        fs::write(path, &bytes).map_err(|e| Error::io(path, e))?;
        ensure_metadata(path, &spec.ownership, false)?;
        return Ok(ApplyResult::Created);
    }

    let mut result = ApplyResult::NoChange;
    if let (Some(text), Some(bytes)) = (content, encoded) {
        let old_bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let old_text = spec.encoding.decode(&old_bytes).ok();

        if old_text.as_deref() != Some(text) {
            if !spec.replace {
                log::info!(
                    "Not replacing existing {} (replace=false), content differs",
                    path.display()
                );
            } else if ctx.dry_run {
                log_diff(path, old_text.as_deref().unwrap_or_default(), text);
                return Ok(ApplyResult::dry_run(format!("rewrite {}", path.display())));
            } else {
                if spec.backup {
                    backup_file(path, ctx.settings.backup_dir.as_deref())?;
                }
                log::info!(
                    "Writing {} because contents don't match (blake3 {} -> {})",
                    path.display(),
                    short_hash(&old_bytes),
                    short_hash(&bytes)
                );
                fs::write(path, &bytes).map_err(|e| Error::io(path, e))?;
                result = ApplyResult::Modified;
            }
        }
    }

    if ensure_metadata(path, &spec.ownership, ctx.dry_run)? && result == ApplyResult::NoChange {
        if ctx.dry_run {
            return Ok(ApplyResult::dry_run(format!("change metadata of {}", path.display())));
        }
        result = ApplyResult::Modified;
    }
    Ok(result)
}

/// Remove the file at `path`; a missing file is no change
pub fn delete_file(path: &Path, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
    if path.is_dir() {
        return Err(Error::Conflict {
            path: path.to_path_buf(),
            message: "is a directory, refusing to delete it as a file".to_string(),
        });
    }
    if path.symlink_metadata().is_err() {
        return Ok(ApplyResult::NoChange);
    }
    if ctx.dry_run {
        return Ok(ApplyResult::dry_run(format!("delete {}", path.display())));
    }
    log::info!("Deleting {}", path.display());
    fs::remove_file(path).map_err(|e| Error::io(path, e))?;
    Ok(ApplyResult::Removed)
}

/// Copy `path` to `<backup_dir or parent>/<file name>.<timestamp>.bak`.
///
/// The timestamp has microsecond precision; an existing backup is never
/// overwritten, a counter is appended instead.
pub fn backup_file(path: &Path, backup_dir: Option<&Path>) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = backup_dir
        .map(Path::to_path_buf)
        .or_else(|| path.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%.6f");

    fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
    let mut source = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let permissions = source.metadata().map_err(|e| Error::io(path, e))?.permissions();
    let (target, mut dest) = create_new_file(&dir, &format!("{file_name}.{stamp}"))?;
    io::copy(&mut source, &mut dest).map_err(|e| Error::io(&target, e))?;
    dest.set_permissions(permissions).map_err(|e| Error::io(&target, e))?;
    log::info!("Backed up {} to {}", path.display(), target.display());
    Ok(target)
}

/// Create `<dir>/<base>.bak`, or `<base>.<n>.bak` for the first free `n`
fn create_new_file(dir: &Path, base: &str) -> Result<(PathBuf, fs::File)> {
    let mut n = 0u32;
    loop {
        let name = if n == 0 {
            format!("{base}.bak")
        } else {
            format!("{base}.{n}.bak")
        };
        let target = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => return Ok((target, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(Error::io(&target, e)),
        }
    }
}

fn short_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex()[..12].to_string()
}

fn log_diff(path: &Path, old: &str, new: &str) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let diff = similar::TextDiff::from_lines(old, new);
    let old_header = path.display().to_string();
    let new_header = format!("{} (desired)", path.display());
    log::debug!(
        "{}",
        diff.unified_diff().header(&old_header, &new_header)
    );
}
