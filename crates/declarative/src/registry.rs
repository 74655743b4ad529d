//! Provider registry
//!
//! A static table keyed by `(ResourceKind, PlatformFamily)`, built once when
//! the engine starts. Nothing registers itself on import.

use crate::context::EngineSettings;
use crate::error::{Error, Result};
use crate::providers::{
    DirectoryProvider, ExecuteProvider, FileProvider, LinkProvider, PackageProvider,
    PropertiesFileProvider, Provider, SystemdServiceProvider, XmlConfigProvider,
};
use crate::resource::ResourceKind;
use pkgkit::{PackageManager, PlatformFamily};
use std::collections::HashMap;

/// Native package manager for `family`, configured from `settings`
pub fn package_manager(family: PlatformFamily, settings: &EngineSettings) -> Option<Box<dyn PackageManager>> {
    pkgkit::manager::for_family(family, &settings.dpkg_status)
}

/// Providers by kind and platform family
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<(ResourceKind, PlatformFamily), Box<dyn Provider>>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for Linux hosts with default settings
    pub fn linux() -> Self {
        Self::linux_with(&EngineSettings::default())
    }

    /// Registry for Linux hosts
    ///
    /// The file-backed kinds and Execute work on every family. Package and
    /// Service need a known distribution.
    pub fn linux_with(settings: &EngineSettings) -> Self {
        let mut registry = Self::new();
        for family in PlatformFamily::ALL {
            registry.register(ResourceKind::File, family, FileProvider);
            registry.register(ResourceKind::Directory, family, DirectoryProvider);
            registry.register(ResourceKind::Link, family, LinkProvider);
            registry.register(ResourceKind::Execute, family, ExecuteProvider);
            registry.register(ResourceKind::PropertiesFile, family, PropertiesFileProvider);
            registry.register(ResourceKind::XmlConfig, family, XmlConfigProvider);
        }

        for family in [PlatformFamily::Redhat, PlatformFamily::Debian, PlatformFamily::Suse] {
            if let Some(manager) = package_manager(family, settings) {
                registry.register(ResourceKind::Package, family, PackageProvider::new(manager));
            }
            registry.register(ResourceKind::Service, family, SystemdServiceProvider);
        }
        registry
    }

    /// Register `provider`, replacing any earlier one for the same key
    pub fn register<P: Provider + 'static>(&mut self, kind: ResourceKind, family: PlatformFamily, provider: P) {
        if self.providers.insert((kind, family), Box::new(provider)).is_some() {
            log::debug!("Replaced {kind} provider for {family}");
        }
    }

    /// Provider for `kind` on `family`
    pub fn resolve(&self, kind: ResourceKind, family: PlatformFamily) -> Result<&dyn Provider> {
        self.providers
            .get(&(kind, family))
            .map(|p| p.as_ref())
            .ok_or_else(|| Error::UnsupportedPlatform {
                kind: kind.to_string(),
                family: family.to_string(),
            })
    }

    /// Whether a provider is registered for the combination
    pub fn supports(&self, kind: ResourceKind, family: PlatformFamily) -> bool {
        self.providers.contains_key(&(kind, family))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_package_providers() {
        let registry = ProviderRegistry::linux();
        let name = |family| registry.resolve(ResourceKind::Package, family).unwrap().name();
        assert_eq!(name(PlatformFamily::Redhat), "yum");
        assert_eq!(name(PlatformFamily::Debian), "apt");
        assert_eq!(name(PlatformFamily::Suse), "zypper");
    }

    #[test]
    fn test_unknown_family_has_file_providers_only() {
        let registry = ProviderRegistry::linux();
        assert!(registry.supports(ResourceKind::File, PlatformFamily::Unknown));
        assert!(registry.supports(ResourceKind::Execute, PlatformFamily::Unknown));

        let err = registry
            .resolve(ResourceKind::Package, PlatformFamily::Unknown)
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnsupportedPlatform { .. }));
        assert_eq!(err.to_string(), "no Package provider for platform family 'unknown'");
    }

    #[test]
    fn test_debian_manager_reads_configured_status_file() {
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status");
        std::fs::write(&status, "Package: curl\nStatus: install ok installed\nVersion: 7.68.0\n").unwrap();
        let settings = EngineSettings {
            dpkg_status: status,
            ..EngineSettings::default()
        };

        let pm = package_manager(PlatformFamily::Debian, &settings).unwrap();
        let shell = shellkit::ScriptedShell::new();
        assert_eq!(pm.installed_version(&shell, "curl").unwrap().as_deref(), Some("7.68.0"));
        assert!(shell.calls().is_empty());
        assert!(package_manager(PlatformFamily::Unknown, &settings).is_none());
    }

    #[test]
    fn test_xml_config_on_every_family() {
        let registry = ProviderRegistry::linux();
        for family in PlatformFamily::ALL {
            assert_eq!(registry.resolve(ResourceKind::XmlConfig, family).unwrap().name(), "xml_config");
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.resolve(ResourceKind::File, PlatformFamily::Redhat).is_err());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ProviderRegistry::linux();
        let before = registry.len();
        registry.register(ResourceKind::Service, PlatformFamily::Redhat, SystemdServiceProvider);
        assert_eq!(registry.len(), before);
        assert_eq!(before, 6 * 4 + 3 + 3);
    }
}
