use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use pkgkit::PlatformFamily;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge a host to declared files, packages, services and commands", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Platform family (redhat, debian, suse) instead of detecting it
    #[arg(long, global = true, env = "CONVERGE_PLATFORM")]
    pub platform: Option<PlatformFamily>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Realize every resource in a manifest
    Apply(ApplyArgs),

    /// Install packages
    Install(PackageArgs),

    /// Remove packages
    Remove(RemoveArgs),

    /// Show installed package versions
    Info(InfoArgs),

    /// Run a command as an Execute resource
    Exec(ExecArgs),

    /// Show the detected platform and effective settings
    Platform,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Manifest file (TOML)
    pub manifest: PathBuf,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct PackageArgs {
    /// Package names
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Stop at the first failure
    #[arg(long)]
    pub strict: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Attempts per package
    #[arg(long)]
    pub retry_count: Option<u32>,

    /// Enable only these repositories (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub use_repos: Vec<String>,

    /// Disable these repositories (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip_repos: Vec<String>,
}

#[derive(Args)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub packages: PackageArgs,

    /// Remove without resolving dependencies
    #[arg(long)]
    pub ignore_dependencies: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Package names
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Fail on the first query error
    #[arg(long)]
    pub strict: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ExecArgs {
    /// Shell command
    pub command: String,

    /// Run as this user
    #[arg(short, long)]
    pub user: Option<String>,

    /// Working directory
    #[arg(long)]
    pub cwd: Option<String>,

    /// Seconds before the command is killed
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Run through sudo
    #[arg(long)]
    pub sudo: bool,

    /// Skip when this path exists
    #[arg(long)]
    pub creates: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["converge", "-vv", "apply", "site.toml", "--dry-run"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.manifest, PathBuf::from("site.toml"));
        assert!(args.dry_run);
        assert!(!args.yes);
    }

    #[test]
    fn test_parse_platform_override() {
        let cli = Cli::try_parse_from(["converge", "info", "httpd", "--platform", "suse"]).unwrap();
        assert_eq!(cli.platform, Some(PlatformFamily::Suse));
        assert!(Cli::try_parse_from(["converge", "--platform", "windows", "platform"]).is_err());
    }

    #[test]
    fn test_parse_remove() {
        let cli = Cli::try_parse_from([
            "converge",
            "remove",
            "httpd",
            "mod_ssl",
            "--ignore-dependencies",
            "--skip-repos",
            "epel,updates",
        ])
        .unwrap();
        let Command::Remove(args) = cli.command else {
            panic!("expected remove");
        };
        assert_eq!(args.packages.names, ["httpd", "mod_ssl"]);
        assert_eq!(args.packages.skip_repos, ["epel", "updates"]);
        assert!(args.ignore_dependencies);
    }

    #[test]
    fn test_install_requires_names() {
        assert!(Cli::try_parse_from(["converge", "install"]).is_err());
    }
}
