//! Options for the cleanup run.
//!
//! This module defines the options that control how a cleanup run behaves,
//! including the retention window and dry-run mode.

use chrono::{DateTime, Duration, Utc};

/// Retention window used when neither the CLI nor the config file sets one.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Configuration for a cleanup run.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Files last accessed more than this many days ago are removed
    pub days: u32,

    /// Report what would be removed without deleting anything
    pub dry_run: bool,

    /// Print a summary block after the per-file report
    pub summary: bool,

    /// Report scanned roots and skipped non-directory roots on stderr
    pub verbose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
            dry_run: false,
            summary: false,
            verbose: false,
        }
    }
}

impl RunOptions {
    /// The instant before which a file counts as expired.
    ///
    /// Saturates at the earliest representable instant, so an enormous
    /// retention window simply expires nothing.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(Duration::days(i64::from(self.days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
