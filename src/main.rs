mod cli;
mod commands;
mod config;
mod manifest;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use pkgkit::PlatformFamily;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub family: PlatformFamily,
    pub settings: config::Settings,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "converge", &mut io::stdout());
        return Ok(());
    }

    let settings = config::Settings::load()?;
    let family = cli.platform.unwrap_or_else(|| settings.platform());
    log::debug!("Platform family: {family}");

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        family,
        settings,
    };

    let code = match &cli.command {
        Command::Apply(args) => {
            commands::apply::run(&ctx, &args.manifest, args.dry_run, args.yes, args.json)
        }
        Command::Install(args) => commands::packages::install(&ctx, args),
        Command::Remove(args) => commands::packages::remove(&ctx, args),
        Command::Info(args) => commands::packages::info(&ctx, args),
        Command::Exec(args) => commands::exec::run(&ctx, args),
        Command::Platform => commands::platform::run(&ctx),
        Command::Completions { .. } => Ok(0),
    }?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
