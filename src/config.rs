//! Engine settings file
//!
//! `$CONVERGE_CONFIG` names the file; otherwise `~/.config/converge/config.toml`
//! is read when it exists. A missing file means defaults.

use anyhow::{Context, Result};
use declarative::EngineSettings;
use pkgkit::{PlatformFamily, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "CONVERGE_CONFIG";

/// Settings loaded from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Skip detection and use this platform family
    pub platform: Option<PlatformFamily>,
    /// Base directory for manifests that don't set one
    pub base_dir: Option<String>,
    /// Where file backups go (next to the file when unset)
    pub backup_dir: Option<String>,
    /// dpkg status database read on Debian hosts
    pub dpkg_status: Option<String>,
    pub retry: RetrySettings,
}

/// Package retry defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub retry_count: u32,
    /// Seconds
    pub retry_sleep: u64,
    pub retry_on_locked: bool,
    pub retry_on_repo_unavailability: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            retry_count: policy.retry_count,
            retry_sleep: policy.retry_sleep.as_secs(),
            retry_on_locked: policy.retry_on_locked,
            retry_on_repo_unavailability: policy.retry_on_repo_unavailability,
        }
    }
}

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("converge"))
}

/// Path of the settings file, `$CONVERGE_CONFIG` first
pub fn config_path() -> Result<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(config_dir()?.join("config.toml")),
    }
}

impl Settings {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Engine settings with `~` and `$VAR` expanded in paths
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let defaults = EngineSettings::default();
        Ok(EngineSettings {
            backup_dir: self.backup_dir.as_deref().map(expand_path).transpose()?,
            retry: RetryPolicy {
                retry_count: self.retry.retry_count,
                retry_sleep: Duration::from_secs(self.retry.retry_sleep),
                retry_on_locked: self.retry.retry_on_locked,
                retry_on_repo_unavailability: self.retry.retry_on_repo_unavailability,
            },
            dpkg_status: match &self.dpkg_status {
                Some(path) => expand_path(path)?,
                None => defaults.dpkg_status,
            },
        })
    }

    /// Platform family: the override if set, else detected
    pub fn platform(&self) -> PlatformFamily {
        self.platform.unwrap_or_else(PlatformFamily::detect)
    }
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Could not expand path '{path}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
