//! Handlers behind each command line action.
//!
//! Handlers write their report to a caller-supplied writer so the binary can
//! pass stdout and tests can capture the output.

use std::{
    fmt::{self, Display, Formatter},
    fs,
    io::Write,
    path::Path,
};

use chrono::Utc;
use colored::Colorize;

use crate::{
    cleaner::{CleanResult, Cleaner},
    config::{ConfigStore, Configuration, RunOptions},
    error::Result,
    resolver::{self, Environment},
};

/// What a resolved path points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    Folder,
    File,
    Missing,
}

impl PathKind {
    /// Classify `path`, following symlinks.
    #[must_use]
    pub fn of(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => Self::Folder,
            Ok(metadata) if metadata.is_file() => Self::File,
            _ => Self::Missing,
        }
    }
}

impl Display for PathKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Folder => "Folder".bright_green(),
            Self::File => "File".bright_green(),
            Self::Missing => "Not exists".red(),
        };
        write!(f, "{tag}")
    }
}

/// Remove expired files from every configured path, in list order.
///
/// A missing configuration means there is nothing to do. When
/// `options.summary` is set, a summary block follows the per-file report.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn run_cleanup(
    config: Option<&Configuration>,
    options: &RunOptions,
    env: &Environment,
    out: &mut impl Write,
) -> Result<CleanResult> {
    let mut total = CleanResult::default();

    let Some(config) = config else {
        return Ok(total);
    };

    let cleaner = Cleaner::new(options.cutoff(Utc::now()), env)
        .with_dry_run(options.dry_run)
        .with_verbose(options.verbose);

    for path in &config.paths {
        total.merge(cleaner.remove_expired(path, out)?);
    }

    if options.summary {
        Cleaner::print_summary(&total, options.dry_run, out)?;
    }

    Ok(total)
}

/// Print each configured path, its resolved form and what it points at.
///
/// # Output Format
///
/// ```text
/// ~/.cache/pip -> /home/me/.cache/pip (Folder)
/// /tmp/build.log (File)
/// $UNSET/x -> /work/$UNSET/x (Not exists)
/// ```
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn list_paths(
    config: Option<&Configuration>,
    env: &Environment,
    out: &mut impl Write,
) -> Result<()> {
    let paths = config.map(|c| c.paths.as_slice()).unwrap_or_default();

    if paths.is_empty() {
        writeln!(out, "path list is empty.")?;
        return Ok(());
    }

    for raw in paths {
        let resolved = env.resolve(raw);
        let kind = PathKind::of(&resolved);

        if resolver::differs(raw, &resolved) {
            writeln!(out, "{raw} -> {} ({kind})", resolved.display())?;
        } else {
            writeln!(out, "{raw} ({kind})")?;
        }
    }

    Ok(())
}

/// Append a raw path entry, creating the configuration if needed.
///
/// # Errors
///
/// Returns an error if the configuration cannot be locked, read or written.
pub fn add_path(store: &ConfigStore, path: &str) -> Result<()> {
    store.with_lock(|config| {
        config.paths.push(path.to_string());
        Ok(())
    })
}

/// Remove the first entry exactly equal to `path`.
///
/// Prints `Removed.` on success and `No such path found.` otherwise. An
/// absent configuration file is left absent.
///
/// # Errors
///
/// Returns an error if the configuration cannot be locked, read or written,
/// or if writing to `out` fails.
pub fn remove_path(store: &ConfigStore, path: &str, out: &mut impl Write) -> Result<bool> {
    let removed = store.exists() && store.with_lock(|config| Ok(config.remove_first(path)))?;

    if removed {
        writeln!(out, "Removed.")?;
    } else {
        writeln!(out, "No such path found.")?;
    }

    Ok(removed)
}
