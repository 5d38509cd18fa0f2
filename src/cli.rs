//! Command-line interface definition.
//!
//! Running `clearcache` without a subcommand is the same as `clearcache run`.

use clap::{Args, Parser, Subcommand};

use clearcache::config::{Configuration, DEFAULT_RETENTION_DAYS, RunOptions};

#[derive(Args, Clone, Default)]
pub(crate) struct RunArgs {
    /// Remove files not accessed in the last [DAYS] days [default: 30, or `days` from the config file]
    #[arg(short = 'd', long)]
    days: Option<u32>,

    /// Only report which files would be removed
    #[arg(long)]
    dry_run: bool,

    /// Print a summary after the per-file report
    #[arg(short = 's', long)]
    summary: bool,

    /// Report scanned and ignored paths on stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Subcommand)]
pub(crate) enum PathCommand {
    /// List configured paths
    Ls,

    /// Add a path to clean
    Add {
        /// Path to add; stored as typed, resolved on every run
        path: String,
    },

    /// Remove a configured path
    Rm {
        /// Entry to remove, exactly as it appears in `path ls`
        path: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Begin clearing the cache
    Run(RunArgs),

    /// Show or configure paths
    Path {
        #[command(subcommand)]
        action: PathCommand,
    },
}

#[derive(Parser)]
#[command(name = "clearcache", version)]
#[command(about = "Delete cached files that have not been accessed for a while")]
#[command(args_conflicts_with_subcommands = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Cleanup options when no subcommand is given
    #[command(flatten)]
    run: RunArgs,
}

impl Cli {
    /// The command to execute, with a bare invocation mapped to `run`.
    pub(crate) fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Run(self.run))
    }
}

impl RunArgs {
    /// Build run options, layering CLI arguments over the config file.
    pub(crate) fn run_options(&self, config: Option<&Configuration>) -> RunOptions {
        RunOptions {
            days: self
                .days
                .or_else(|| config.and_then(|c| c.days))
                .unwrap_or(DEFAULT_RETENTION_DAYS),
            dry_run: self.dry_run,
            summary: self.summary,
            verbose: self.verbose,
        }
    }
}
