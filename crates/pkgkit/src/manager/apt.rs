//! apt/dpkg backend (Debian family).
//!
//! Installed state comes from the dpkg status database, read directly so a
//! query never contends for the dpkg lock. `dpkg-query` is used only when the
//! database file is missing.
//!
//! apt has no per-command repository switch. Repository selection is done by
//! pointing `Dir::Etc::SourceParts` at a scratch directory that holds links
//! to only the selected `.list` files.

use super::{InstallOptions, PackageManager, RemoveOptions, wildcard_match};
use crate::classify::{FailurePatterns, REPO_UNAVAILABLE_COMMON};
use crate::error::{Error, Result};
use crate::platform::PlatformFamily;
use crate::retry::{RetryCallback, RetryPolicy, checked_call_with_retries};
use shellkit::{CallOptions, ShellCommand, ShellResult, ShellRunner, call};
use std::fs;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const APT_GET: &str = "/usr/bin/apt-get";
const DPKG: &str = "/usr/bin/dpkg";
const DPKG_QUERY: &str = "/usr/bin/dpkg-query";

/// Default location of the dpkg status database.
pub const DPKG_STATUS: &str = "/var/lib/dpkg/status";

/// Default directory of per-repository source lists.
pub const SOURCES_DIR: &str = "/etc/apt/sources.list.d";

/// Repository name standing for the main `sources.list`.
pub const BASE_REPO: &str = "base";

const EMPTY_SOURCE_LIST: &str = "/dev/null";

const LOCKED: &str = r"(?i)could not get lock|unable to lock the administration directory|unable to acquire the dpkg frontend lock";

static PATTERNS: LazyLock<FailurePatterns> = LazyLock::new(|| {
    FailurePatterns::new(LOCKED, REPO_UNAVAILABLE_COMMON).expect("Invalid apt failure patterns")
});

/// apt package manager.
#[derive(Debug, Clone)]
pub struct AptManager {
    status_path: PathBuf,
    sources_dir: PathBuf,
}

/// Scratch `SourceParts` directory, removed on drop
#[derive(Debug)]
struct SourceParts {
    dir: PathBuf,
}

impl Drop for SourceParts {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            log::debug!("Could not remove {}: {e}", self.dir.display());
        }
    }
}

impl AptManager {
    /// Create a manager reading installed state from `status_path`.
    pub fn new(status_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
            sources_dir: PathBuf::from(SOURCES_DIR),
        }
    }

    /// Read per-repository source lists from `dir` instead of [`SOURCES_DIR`].
    #[must_use]
    pub fn with_sources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sources_dir = dir.into();
        self
    }

    /// Path of the dpkg status database.
    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    /// Scratch directory for the repository selection in `opts`, if any.
    ///
    /// The path is stable for one selection within one process, so the
    /// rendered command matches the one that runs.
    fn source_parts_dir(opts: &InstallOptions) -> Option<PathBuf> {
        if opts.use_repos.is_empty() && opts.skip_repos.is_empty() {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        opts.use_repos.hash(&mut hasher);
        opts.skip_repos.hash(&mut hasher);
        let name = format!("converge-apt-sources-{}-{:016x}", std::process::id(), hasher.finish());
        Some(std::env::temp_dir().join(name))
    }

    /// Source lists the selection in `opts` keeps.
    ///
    /// With `use_repos`, only those lists (minus `skip_repos`); otherwise
    /// every list in the sources directory except `skip_repos`.
    pub fn selected_sources(&self, opts: &InstallOptions) -> Result<Vec<PathBuf>> {
        let skipped = |repo: &str| opts.skip_repos.iter().any(|s| s == repo);
        if !opts.use_repos.is_empty() {
            return Ok(opts
                .use_repos
                .iter()
                .filter(|repo| repo.as_str() != BASE_REPO && !skipped(repo.as_str()))
                .map(|repo| self.sources_dir.join(format!("{repo}.list")))
                .collect());
        }

        let mut lists = Vec::new();
        let entries = match fs::read_dir(&self.sources_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(lists),
            Err(e) => return Err(Error::Io(e)),
        };
        for entry in entries {
            let path = entry?.path();
            let is_list = path.extension().is_some_and(|ext| ext == "list");
            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned());
            if is_list && !stem.is_some_and(|s| skipped(&s)) {
                lists.push(path);
            }
        }
        lists.sort();
        Ok(lists)
    }

    /// Build the scratch directory the command for `opts` points at.
    fn prepare_source_parts(&self, opts: &InstallOptions) -> Result<Option<SourceParts>> {
        let Some(dir) = Self::source_parts_dir(opts) else {
            return Ok(None);
        };
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        let parts = SourceParts { dir };

        for list in self.selected_sources(opts)? {
            if !list.exists() {
                log::warn!("Repository list {} does not exist, skipping it", list.display());
                continue;
            }
            let Some(file_name) = list.file_name() else {
                continue;
            };
            std::os::unix::fs::symlink(&list, parts.dir.join(file_name))?;
        }
        log::debug!("apt sources for this command: {}", parts.dir.display());
        Ok(Some(parts))
    }

    fn target(name: &str, opts: &InstallOptions) -> String {
        match &opts.version {
            Some(version) => format!("{name}={version}"),
            None => name.to_string(),
        }
    }

    fn install_args(verb: &str, name: &str, opts: &InstallOptions) -> Vec<String> {
        let mut args: Vec<String> = [
            APT_GET,
            "-q",
            "-o",
            "Dpkg::Options::=--force-confdef",
            "--allow-unauthenticated",
            "--assume-yes",
        ]
        .map(String::from)
        .to_vec();

        if let Some(dir) = Self::source_parts_dir(opts) {
            let keep_base_list = opts.use_repos.is_empty() || opts.use_repos.iter().any(|r| r == BASE_REPO);
            if !keep_base_list {
                args.push("-o".to_string());
                args.push(format!("Dir::Etc::SourceList={EMPTY_SOURCE_LIST}"));
            }
            args.push("-o".to_string());
            args.push(format!("Dir::Etc::SourceParts={}", dir.display()));
        }
        args.push(verb.to_string());
        args.push(Self::target(name, opts));
        args
    }

    fn run_with_sources(
        &self,
        shell: &dyn ShellRunner,
        cmd: &ShellCommand,
        opts: &InstallOptions,
        policy: &RetryPolicy,
        callback: Option<&dyn RetryCallback>,
    ) -> Result<ShellResult> {
        let _parts = self.prepare_source_parts(opts)?;
        checked_call_with_retries(self, shell, cmd, &self.call_options(opts.logoutput), policy, callback)
    }

    fn query_dpkg(&self, shell: &dyn ShellRunner, name: &str) -> Result<Option<String>> {
        let cmd = ShellCommand::argv([
            DPKG_QUERY,
            "-W",
            "-f=${Package} ${Status} ${Version}\\n",
            name,
        ]);
        let result = call(shell, &cmd, &CallOptions::new())?;
        // dpkg-query exits 1 when nothing matches
        if result.exit_code > 1 {
            return Err(Error::Query {
                name: name.to_string(),
                message: result.combined().trim().to_string(),
            });
        }
        Ok(result.output.lines().find_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [pkg, _, _, "installed", version] if wildcard_match(name, pkg) => {
                    Some((*version).to_string())
                }
                _ => None,
            }
        }))
    }
}

impl Default for AptManager {
    fn default() -> Self {
        Self::new(DPKG_STATUS)
    }
}

/// Find the installed version of `name` in dpkg status database content.
///
/// Entries whose status is not `installed` (for example `deinstall ok
/// config-files`) do not count.
pub fn parse_dpkg_status(content: &str, name: &str) -> Option<String> {
    content.split("\n\n").find_map(|paragraph| {
        let mut package = None;
        let mut status = None;
        let mut version = None;
        for line in paragraph.lines() {
            if let Some(v) = line.strip_prefix("Package:") {
                package = Some(v.trim());
            } else if let Some(v) = line.strip_prefix("Status:") {
                status = Some(v.trim());
            } else if let Some(v) = line.strip_prefix("Version:") {
                version = Some(v.trim());
            }
        }

        let installed = status.is_some_and(|s| s.split_whitespace().last() == Some("installed"));
        match (package, version) {
            (Some(pkg), Some(ver)) if installed && wildcard_match(name, pkg) => Some(ver.to_string()),
            _ => None,
        }
    })
}

impl PackageManager for AptManager {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::Debian
    }

    fn patterns(&self) -> &FailurePatterns {
        &PATTERNS
    }

    fn install_command(&self, name: &str, opts: &InstallOptions) -> ShellCommand {
        ShellCommand::Argv(Self::install_args("install", name, opts))
    }

    fn upgrade_command(&self, name: &str, opts: &InstallOptions) -> ShellCommand {
        let mut args = Self::install_args("install", name, opts);
        args.insert(args.len() - 1, "--only-upgrade".to_string());
        ShellCommand::Argv(args)
    }

    fn remove_command(&self, name: &str, opts: &RemoveOptions) -> ShellCommand {
        if opts.ignore_dependencies {
            ShellCommand::argv([DPKG, "--remove", "--force-depends", name])
        } else {
            ShellCommand::argv([APT_GET, "-y", "-q", "remove", name])
        }
    }

    fn refresh_command(&self) -> ShellCommand {
        ShellCommand::argv([APT_GET, "update", "-qq"])
    }

    fn call_options(&self, logoutput: bool) -> CallOptions {
        CallOptions::new()
            .with_logoutput(logoutput)
            .with_env("DEBIAN_FRONTEND", "noninteractive")
    }

    fn install_package(
        &self,
        shell: &dyn ShellRunner,
        name: &str,
        opts: &InstallOptions,
        policy: &RetryPolicy,
        callback: Option<&dyn RetryCallback>,
    ) -> Result<ShellResult> {
        let cmd = self.install_command(name, opts);
        log::info!("Installing package {name} ('{cmd}')");
        self.run_with_sources(shell, &cmd, opts, policy, callback)
    }

    fn upgrade_package(
        &self,
        shell: &dyn ShellRunner,
        name: &str,
        opts: &InstallOptions,
        policy: &RetryPolicy,
        callback: Option<&dyn RetryCallback>,
    ) -> Result<ShellResult> {
        let cmd = self.upgrade_command(name, opts);
        log::info!("Upgrading package {name} ('{cmd}')");
        self.run_with_sources(shell, &cmd, opts, policy, callback)
    }

    fn installed_version(&self, shell: &dyn ShellRunner, name: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.status_path) {
            Ok(content) => Ok(parse_dpkg_status(&content, name)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!(
                    "{} not found, falling back to dpkg-query",
                    self.status_path.display()
                );
                self.query_dpkg(shell, name)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{FailureKind, classify_failure};
    use shellkit::{ScriptedShell, ShellResult};

    const STATUS: &str = "\
Package: curl
Status: install ok installed
Priority: optional
Version: 7.68.0-1ubuntu2.7
Description: command line tool for transferring data with URL syntax

Package: hadoop-2-6-0-3-8-client
Status: install ok installed
Version: 2.7.3.2.6.0.3-8

Package: apache2
Status: deinstall ok config-files
Version: 2.4.41-4ubuntu3
";

    #[test]
    fn test_parse_installed() {
        assert_eq!(
            parse_dpkg_status(STATUS, "curl").as_deref(),
            Some("7.68.0-1ubuntu2.7")
        );
    }

    #[test]
    fn test_parse_wildcard() {
        assert_eq!(
            parse_dpkg_status(STATUS, "hadoop-2-6-*-client").as_deref(),
            Some("2.7.3.2.6.0.3-8")
        );
    }

    #[test]
    fn test_parse_config_files_only_is_not_installed() {
        assert_eq!(parse_dpkg_status(STATUS, "apache2"), None);
        assert_eq!(parse_dpkg_status(STATUS, "nginx"), None);
    }

    #[test]
    fn test_installed_version_reads_status_file() {
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status");
        std::fs::write(&status, STATUS).unwrap();

        let apt = AptManager::new(&status);
        let shell = ScriptedShell::new();
        assert!(apt.is_installed(&shell, "curl").unwrap());
        assert!(!apt.is_installed(&shell, "apache2").unwrap());
        // No subprocess for status lookups
        assert!(shell.calls().is_empty());
    }

    #[test]
    fn test_installed_version_falls_back_to_dpkg_query() {
        let dir = tempfile::tempdir().unwrap();
        let apt = AptManager::new(dir.path().join("missing"));
        let shell = ScriptedShell::new().on(
            "dpkg-query",
            [ShellResult::ok("curl install ok installed 7.68.0\n")],
        );
        assert_eq!(
            apt.installed_version(&shell, "curl").unwrap().as_deref(),
            Some("7.68.0")
        );
        assert_eq!(shell.count_matching("dpkg-query"), 1);
    }

    #[test]
    fn test_commands() {
        let apt = AptManager::default();
        let opts = InstallOptions {
            version: Some("7.68.0".to_string()),
            ..InstallOptions::default()
        };
        assert_eq!(
            apt.install_command("curl", &opts),
            ShellCommand::argv([
                "/usr/bin/apt-get",
                "-q",
                "-o",
                "Dpkg::Options::=--force-confdef",
                "--allow-unauthenticated",
                "--assume-yes",
                "install",
                "curl=7.68.0",
            ])
        );
        assert_eq!(
            apt.remove_command("curl", &RemoveOptions::default()),
            ShellCommand::argv(["/usr/bin/apt-get", "-y", "-q", "remove", "curl"])
        );
        let nodeps = RemoveOptions {
            ignore_dependencies: true,
            ..RemoveOptions::default()
        };
        assert_eq!(
            apt.remove_command("curl", &nodeps),
            ShellCommand::argv(["/usr/bin/dpkg", "--remove", "--force-depends", "curl"])
        );
        assert_eq!(
            apt.refresh_command(),
            ShellCommand::argv(["/usr/bin/apt-get", "update", "-qq"])
        );
        let ShellCommand::Argv(upgrade) = apt.upgrade_command("curl", &InstallOptions::default()) else {
            panic!("expected an argv command");
        };
        assert_eq!(upgrade[upgrade.len() - 3..], ["install", "--only-upgrade", "curl"]);
    }

    fn argv(cmd: ShellCommand) -> Vec<String> {
        match cmd {
            ShellCommand::Argv(args) => args,
            ShellCommand::Shell(s) => panic!("expected an argv command, got '{s}'"),
        }
    }

    #[test]
    fn test_several_use_repos_share_one_source_parts_dir() {
        let opts = InstallOptions {
            use_repos: vec!["HDP".to_string(), "HDP-UTILS".to_string()],
            ..InstallOptions::default()
        };
        let args = argv(AptManager::default().install_command("hadoop", &opts));

        let source_lists: Vec<&String> = args.iter().filter(|a| a.starts_with("Dir::Etc::SourceList=")).collect();
        assert_eq!(source_lists, ["Dir::Etc::SourceList=/dev/null"]);
        let parts: Vec<&String> = args.iter().filter(|a| a.starts_with("Dir::Etc::SourceParts=")).collect();
        assert_eq!(parts.len(), 1);
        assert_ne!(parts[0], "Dir::Etc::SourceParts=-");
        assert_eq!(args.last().map(String::as_str), Some("hadoop"));
    }

    #[test]
    fn test_base_repo_keeps_main_source_list() {
        let opts = InstallOptions {
            use_repos: vec![BASE_REPO.to_string(), "HDP".to_string()],
            ..InstallOptions::default()
        };
        let args = argv(AptManager::default().install_command("hadoop", &opts));
        assert!(!args.iter().any(|a| a.starts_with("Dir::Etc::SourceList=")));
        assert!(args.iter().any(|a| a.starts_with("Dir::Etc::SourceParts=")));
    }

    #[test]
    fn test_selected_sources() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["HDP.list", "HDP-UTILS.list", "epel.list", "README"] {
            std::fs::write(dir.path().join(name), "deb http://repo/ stable main\n").unwrap();
        }
        let apt = AptManager::default().with_sources_dir(dir.path());

        let use_two = InstallOptions {
            use_repos: vec!["HDP".to_string(), "HDP-UTILS".to_string(), BASE_REPO.to_string()],
            skip_repos: vec!["HDP-UTILS".to_string()],
            ..InstallOptions::default()
        };
        assert_eq!(apt.selected_sources(&use_two).unwrap(), vec![dir.path().join("HDP.list")]);

        let skip_epel = InstallOptions {
            skip_repos: vec!["epel".to_string()],
            ..InstallOptions::default()
        };
        assert_eq!(
            apt.selected_sources(&skip_epel).unwrap(),
            vec![dir.path().join("HDP-UTILS.list"), dir.path().join("HDP.list")]
        );
    }

    #[test]
    fn test_source_parts_dir_holds_selected_lists_during_install() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["HDP.list", "HDP-UTILS.list", "epel.list"] {
            std::fs::write(dir.path().join(name), "deb http://repo/ stable main\n").unwrap();
        }
        let status = dir.path().join("status");
        let apt = AptManager::new(&status).with_sources_dir(dir.path());
        let opts = InstallOptions {
            use_repos: vec!["HDP".to_string(), "HDP-UTILS".to_string()],
            ..InstallOptions::default()
        };
        let parts = AptManager::source_parts_dir(&opts).unwrap();

        {
            let guard = apt.prepare_source_parts(&opts).unwrap().unwrap();
            let mut names: Vec<String> = std::fs::read_dir(&guard.dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            assert_eq!(names, ["HDP-UTILS.list", "HDP.list"]);
        }
        assert!(!parts.exists());

        let shell = ScriptedShell::new();
        let policy = RetryPolicy {
            retry_count: 1,
            ..RetryPolicy::default()
        };
        apt.install_package(&shell, "hadoop", &opts, &policy, None).unwrap();
        assert_eq!(shell.count_matching("Dir::Etc::SourceParts="), 1);
        assert!(!parts.exists());
    }

    #[test]
    fn test_noninteractive_env() {
        let opts = AptManager::default().call_options(true);
        assert_eq!(
            opts.env.get("DEBIAN_FRONTEND").map(String::as_str),
            Some("noninteractive")
        );
        assert!(opts.logoutput);
    }

    #[test]
    fn test_lock_messages() {
        let p = AptManager::default().patterns().clone();
        let out = "E: Could not get lock /var/lib/dpkg/lock-frontend - open (11: Resource temporarily unavailable)";
        assert_eq!(classify_failure(out, &p), Some(FailureKind::Locked));
        let out = "E: Unable to lock the administration directory (/var/lib/dpkg/), is another process using it?";
        assert_eq!(classify_failure(out, &p), Some(FailureKind::Locked));
        let out = "E: Failed to fetch http://archive.ubuntu.com/ubuntu/pool/main/c/curl.deb";
        assert_eq!(classify_failure(out, &p), Some(FailureKind::RepoUnavailable));
    }
}
