//! Owner, group and mode management
//!
//! Only attributes that differ from the current state are touched.

use crate::error::{Error, Result};
use crate::resource::Resource;
use std::ffi::CString;
use std::fs;
use std::mem::MaybeUninit;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use walkdir::WalkDir;

/// Desired ownership and permissions, already resolved to ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub mode: Option<u32>,
}

impl Ownership {
    /// Read `owner`, `group` and `mode` from a resource, resolving names
    pub fn from_resource(resource: &Resource) -> Result<Self> {
        Ok(Self {
            uid: resource.str_attr("owner").map(resolve_user).transpose()?,
            gid: resource.str_attr("group").map(resolve_group).transpose()?,
            mode: resource.mode_attr(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.uid.is_none() && self.gid.is_none() && self.mode.is_none()
    }
}

/// Resolve a user name or numeric uid
pub fn resolve_user(name: &str) -> Result<u32> {
    if let Ok(uid) = name.parse::<u32>() {
        return Ok(uid);
    }
    lookup_uid(name).ok_or_else(|| Error::UnknownPrincipal {
        what: "user",
        name: name.to_string(),
    })
}

/// Resolve a group name or numeric gid
pub fn resolve_group(name: &str) -> Result<u32> {
    if let Ok(gid) = name.parse::<u32>() {
        return Ok(gid);
    }
    lookup_gid(name).ok_or_else(|| Error::UnknownPrincipal {
        what: "group",
        name: name.to_string(),
    })
}

const INITIAL_BUF: usize = 1024;
const MAX_BUF: usize = 1 << 20;

fn lookup_uid(name: &str) -> Option<u32> {
    let c_name = CString::new(name).ok()?;
    let mut buf_len = INITIAL_BUF;
    loop {
        let mut buf: Vec<libc::c_char> = vec![0; buf_len];
        let mut pwd: MaybeUninit<libc::passwd> = MaybeUninit::uninit();
        let mut found: *mut libc::passwd = std::ptr::null_mut();

        // SAFETY: every pointer is valid for the call; `c_name` is NUL-terminated
        // and `buf` outlives the returned `passwd`, whose strings point into it.
        let rc = unsafe {
            libc::getpwnam_r(
                c_name.as_ptr(),
                pwd.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &raw mut found,
            )
        };
        if rc == libc::ERANGE && buf_len < MAX_BUF {
            buf_len *= 2;
            continue;
        }
        if rc != 0 || found.is_null() {
            return None;
        }
        // SAFETY: rc == 0 with a non-null result means `pwd` was filled in.
        return Some(unsafe { pwd.assume_init() }.pw_uid);
    }
}

fn lookup_gid(name: &str) -> Option<u32> {
    let c_name = CString::new(name).ok()?;
    let mut buf_len = INITIAL_BUF;
    loop {
        let mut buf: Vec<libc::c_char> = vec![0; buf_len];
        let mut grp: MaybeUninit<libc::group> = MaybeUninit::uninit();
        let mut found: *mut libc::group = std::ptr::null_mut();

        // SAFETY: every pointer is valid for the call; `c_name` is NUL-terminated
        // and `buf` outlives the returned `group`, whose strings point into it.
        let rc = unsafe {
            libc::getgrnam_r(
                c_name.as_ptr(),
                grp.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &raw mut found,
            )
        };
        if rc == libc::ERANGE && buf_len < MAX_BUF {
            buf_len *= 2;
            continue;
        }
        if rc != 0 || found.is_null() {
            return None;
        }
        // SAFETY: rc == 0 with a non-null result means `grp` was filled in.
        return Some(unsafe { grp.assume_init() }.gr_gid);
    }
}

/// Bring `path` to the desired ownership and mode.
///
/// Returns whether anything differed. With `dry_run` nothing is changed.
pub fn ensure_metadata(path: &Path, want: &Ownership, dry_run: bool) -> Result<bool> {
    if want.is_empty() {
        return Ok(false);
    }
    let meta = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    let mut changed = false;

    let uid = want.uid.filter(|uid| *uid != meta.uid());
    let gid = want.gid.filter(|gid| *gid != meta.gid());
    if uid.is_some() || gid.is_some() {
        log::info!(
            "Changing ownership of {} from {}:{} to {}:{}",
            path.display(),
            meta.uid(),
            meta.gid(),
            uid.unwrap_or(meta.uid()),
            gid.unwrap_or(meta.gid())
        );
        if !dry_run {
            std::os::unix::fs::chown(path, uid, gid).map_err(|e| Error::io(path, e))?;
        }
        changed = true;
    }

    let current_mode = meta.permissions().mode() & 0o7777;
    if let Some(mode) = want.mode.filter(|m| *m != current_mode) {
        log::info!(
            "Changing permission for {} from {current_mode:04o} to {mode:04o}",
            path.display()
        );
        if !dry_run {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
                .map_err(|e| Error::io(path, e))?;
        }
        changed = true;
    }

    Ok(changed)
}

/// Apply owner and group to every entry below `root`, without following links.
///
/// Returns how many entries changed.
pub fn ensure_ownership_recursive(root: &Path, uid: Option<u32>, gid: Option<u32>, dry_run: bool) -> Result<usize> {
    if uid.is_none() && gid.is_none() {
        return Ok(0);
    }
    let mut changed = 0;
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, e.into())
        })?;
        let meta = entry.path().symlink_metadata().map_err(|e| Error::io(entry.path(), e))?;
        let uid = uid.filter(|u| *u != meta.uid());
        let gid = gid.filter(|g| *g != meta.gid());
        if uid.is_none() && gid.is_none() {
            continue;
        }
        if !dry_run {
            std::os::unix::fs::lchown(entry.path(), uid, gid).map_err(|e| Error::io(entry.path(), e))?;
        }
        changed += 1;
    }
    if changed > 0 {
        log::info!("Changed ownership of {changed} entries below {}", root.display());
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids() {
        assert_eq!(resolve_user("0").unwrap(), 0);
        assert_eq!(resolve_group("1234").unwrap(), 1234);
    }

    #[test]
    fn test_root_resolves() {
        assert_eq!(resolve_user("root").unwrap(), 0);
    }

    #[test]
    fn test_lookups_reject_interior_nul() {
        assert_eq!(lookup_uid("ro\0ot"), None);
        assert_eq!(lookup_gid("ro\0ot"), None);
        assert_eq!(lookup_gid("root"), Some(0));
    }

    #[test]
    fn test_unknown_user() {
        let err = resolve_user("no-such-user-xyz").unwrap_err();
        assert!(matches!(err, Error::UnknownPrincipal { what: "user", .. }));
    }

    #[test]
    fn test_mode_change_and_idempotence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let want = Ownership {
            mode: Some(0o640),
            ..Ownership::default()
        };
        assert!(ensure_metadata(&path, &want, false).unwrap());
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o7777, 0o640);
        assert!(!ensure_metadata(&path, &want, false).unwrap());
    }

    #[test]
    fn test_dry_run_reports_without_changing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let want = Ownership {
            mode: Some(0o644),
            ..Ownership::default()
        };
        assert!(ensure_metadata(&path, &want, true).unwrap());
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o7777, 0o600);
    }

    #[test]
    fn test_same_owner_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "x").unwrap();
        let meta = fs::metadata(&path).unwrap();

        let want = Ownership {
            uid: Some(meta.uid()),
            gid: Some(meta.gid()),
            mode: None,
        };
        assert!(!ensure_metadata(&path, &want, false).unwrap());
        assert_eq!(
            ensure_ownership_recursive(dir.path(), want.uid, want.gid, false).unwrap(),
            0
        );
    }
}
