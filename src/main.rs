//! # clearcache
//!
//! A small CLI tool that deletes cached files which have not been accessed
//! within a retention window.
//!
//! The tool keeps a list of cache directories in
//! `~/.config/clearcache/conf.json` (or the platform-specific equivalent).
//! Each run walks every listed directory and removes the files whose last
//! access time is older than the retention window.
//!
//! ## Usage
//!
//! ```bash
//! # Remove files not accessed in the last 30 days
//! clearcache
//!
//! # Use a 7 day window and preview only
//! clearcache run --days 7 --dry-run
//!
//! # Manage the path list
//! clearcache path add '~/.cache/pip'
//! clearcache path ls
//! clearcache path rm '~/.cache/pip'
//! ```

mod cli;

use std::{io, process::exit};

use anyhow::Result;
use clap::Parser;
use clearcache::{
    ClearCacheError,
    commands::{add_path, list_paths, remove_path, run_cleanup},
    config::ConfigStore,
    error::EXIT_FAILURE,
    resolver::Environment,
};
use cli::{Cli, Command, PathCommand};
use colored::Colorize;

/// Entry point for the clearcache application.
///
/// Errors are printed to stderr and mapped to an exit code per error kind.
/// Usage errors never get here: clap exits with status 2 on its own.
fn main() {
    if let Err(err) = inner_main() {
        eprintln!("{} {err}", "Error:".red().bold());

        let code = err
            .downcast_ref::<ClearCacheError>()
            .map_or(EXIT_FAILURE, ClearCacheError::exit_code);
        exit(code);
    }
}

/// Main application logic that can return errors.
///
/// # Errors
///
/// This function can return errors from:
/// - Locating, reading, parsing or locking the configuration file
/// - Reading the current working directory
/// - Writing the report to stdout
fn inner_main() -> Result<()> {
    let args = Cli::parse();
    let store = ConfigStore::open_default()?;
    let mut stdout = io::stdout().lock();

    match args.into_command() {
        Command::Run(run) => {
            let config = store.load()?;
            let options = run.run_options(config.as_ref());
            let env = Environment::from_process()?;

            run_cleanup(config.as_ref(), &options, &env, &mut stdout)?;
        }
        Command::Path { action } => match action {
            PathCommand::Ls => {
                let config = store.load()?;
                let env = Environment::from_process()?;

                list_paths(config.as_ref(), &env, &mut stdout)?;
            }
            PathCommand::Add { path } => add_path(&store, &path)?,
            PathCommand::Rm { path } => {
                remove_path(&store, &path, &mut stdout)?;
            }
        },
    }

    Ok(())
}
