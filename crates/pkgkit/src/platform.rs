//! Platform family detection.
//!
//! A platform family is the set of distributions sharing one package
//! manager. Detection reads `/etc/os-release` (`ID`, then each `ID_LIKE`
//! entry) and happens once at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const OS_RELEASE: &str = "/etc/os-release";

/// Distribution family, keyed by package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    /// RHEL, CentOS, Fedora, Rocky, Alma, Amazon Linux (yum/rpm)
    Redhat,
    /// Debian, Ubuntu (apt/dpkg)
    Debian,
    /// SLES, openSUSE (zypper/rpm)
    Suse,
    /// Anything else
    Unknown,
}

impl PlatformFamily {
    /// Every family, in registry order.
    pub const ALL: [PlatformFamily; 4] = [Self::Redhat, Self::Debian, Self::Suse, Self::Unknown];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redhat => "redhat",
            Self::Debian => "debian",
            Self::Suse => "suse",
            Self::Unknown => "unknown",
        }
    }

    /// Detect the family of the running host.
    ///
    /// Returns `Unknown` when `/etc/os-release` is missing or unrecognized.
    pub fn detect() -> Self {
        Self::detect_from(Path::new(OS_RELEASE))
    }

    /// Detect from an os-release file at `path`.
    pub fn detect_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let family = Self::from_os_release(&content);
                log::debug!("Detected platform family {family} from {}", path.display());
                family
            }
            Err(e) => {
                log::debug!("Cannot read {}: {e}", path.display());
                Self::Unknown
            }
        }
    }

    /// Map os-release content to a family.
    pub fn from_os_release(content: &str) -> Self {
        let field = |key: &str| {
            content.lines().find_map(|line| {
                let (k, v) = line.split_once('=')?;
                (k.trim() == key).then(|| v.trim().trim_matches('"').trim_matches('\'').to_string())
            })
        };

        let mut candidates = Vec::new();
        if let Some(id) = field("ID") {
            candidates.push(id);
        }
        if let Some(like) = field("ID_LIKE") {
            candidates.extend(like.split_whitespace().map(str::to_string));
        }

        candidates
            .iter()
            .map(|id| Self::from_distribution_id(id))
            .find(|f| *f != Self::Unknown)
            .unwrap_or(Self::Unknown)
    }

    fn from_distribution_id(id: &str) -> Self {
        let id = id.to_lowercase();
        match id.as_str() {
            "rhel" | "redhat" | "centos" | "fedora" | "rocky" | "almalinux" | "amzn" | "ol" => {
                Self::Redhat
            }
            "debian" | "ubuntu" => Self::Debian,
            _ if id.contains("suse") || id == "sles" => Self::Suse,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "suse" => Ok(Self::Suse),
            other => match Self::from_distribution_id(other) {
                Self::Unknown => Err(format!("unknown platform family: {s}")),
                family => Ok(family),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_release_id() {
        let content = "NAME=\"CentOS Linux\"\nID=\"centos\"\nID_LIKE=\"rhel fedora\"\n";
        assert_eq!(PlatformFamily::from_os_release(content), PlatformFamily::Redhat);
    }

    #[test]
    fn test_os_release_id_like_fallback() {
        let content = "ID=linuxmint\nID_LIKE=\"ubuntu debian\"\n";
        assert_eq!(PlatformFamily::from_os_release(content), PlatformFamily::Debian);
    }

    #[test]
    fn test_os_release_suse() {
        let content = "ID=\"opensuse-leap\"\nID_LIKE=\"suse opensuse\"\n";
        assert_eq!(PlatformFamily::from_os_release(content), PlatformFamily::Suse);
        assert_eq!(PlatformFamily::from_os_release("ID=sles\n"), PlatformFamily::Suse);
    }

    #[test]
    fn test_os_release_unknown() {
        assert_eq!(PlatformFamily::from_os_release("ID=alpine\n"), PlatformFamily::Unknown);
        assert_eq!(PlatformFamily::from_os_release(""), PlatformFamily::Unknown);
    }

    #[test]
    fn test_detect_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            PlatformFamily::detect_from(&dir.path().join("os-release")),
            PlatformFamily::Unknown
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("ubuntu".parse::<PlatformFamily>(), Ok(PlatformFamily::Debian));
        assert_eq!("RedHat".parse::<PlatformFamily>(), Ok(PlatformFamily::Redhat));
        assert!("plan9".parse::<PlatformFamily>().is_err());
    }
}
