//! Expired file removal.
//!
//! This module walks a configured cache directory, compares each regular
//! file's last-access time against a cutoff and deletes the ones that have not
//! been touched since. Every file produces exactly one report line. Failures
//! on individual files are reported on stderr and do not stop the walk.

use std::{
    fs,
    io::{self, Write},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};
use colored::Colorize;
use humansize::{DECIMAL, format_size};
use walkdir::WalkDir;

use crate::{error::Result, resolver::Environment};

/// Outcome counters of one or more cleanup passes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanResult {
    /// Files deleted (or that would have been, in dry-run mode)
    pub removed: usize,

    /// Files kept because they were accessed after the cutoff
    pub skipped: usize,

    /// Files or entries that could not be inspected or deleted
    pub failed: usize,

    /// Bytes reclaimed by the removed files
    pub freed: u64,

    /// Human-readable description of each failure
    pub errors: Vec<String>,
}

impl CleanResult {
    /// Fold the counters of `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.freed += other.freed;
        self.errors.extend(other.errors);
    }

    fn record_failure(&mut self, message: String) {
        eprintln!("{} {}", "Failed".red(), message);
        self.failed += 1;
        self.errors.push(message);
    }
}

/// Deletes files whose last access is older than a cutoff.
pub struct Cleaner<'a> {
    cutoff: DateTime<Utc>,
    env: &'a Environment,
    dry_run: bool,
    verbose: bool,
}

impl<'a> Cleaner<'a> {
    /// Create a cleaner that removes files last accessed strictly before `cutoff`.
    ///
    /// # Arguments
    ///
    /// * `cutoff` - Files with an access time before this instant are expired
    /// * `env` - Environment used to resolve configured roots
    #[must_use]
    pub fn new(cutoff: DateTime<Utc>, env: &'a Environment) -> Self {
        Self {
            cutoff,
            env,
            dry_run: false,
            verbose: false,
        }
    }

    /// Report expired files without deleting them.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Report scanned and ignored roots on stderr.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Remove every expired file below a configured root.
    ///
    /// The raw `root` entry is resolved first. A root that does not resolve
    /// to an existing directory is silently ignored. Otherwise the whole tree
    /// is walked without a depth limit and without following symlinks; only
    /// regular files are considered, directories are never deleted.
    ///
    /// Each file yields one line on `out`:
    /// - `Removed <path>` when its access time is before the cutoff,
    /// - `Would remove <path>` instead in dry-run mode,
    /// - `Skipped <path>` otherwise.
    ///
    /// # Errors
    ///
    /// Only failures to write to `out` are returned. Unreadable entries and
    /// failed deletions are reported on stderr and counted in the result.
    pub fn remove_expired(&self, root: &str, out: &mut impl Write) -> Result<CleanResult> {
        let resolved = self.env.resolve(root);
        let mut result = CleanResult::default();

        if !resolved.is_dir() {
            if self.verbose {
                eprintln!(
                    "{} {} (not a directory)",
                    "Ignoring".dimmed(),
                    resolved.display()
                );
            }
            return Ok(result);
        }

        if self.verbose {
            eprintln!("{} {}", "Scanning".cyan(), resolved.display());
        }

        for entry in WalkDir::new(&resolved).min_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(resolved.as_path()).display().to_string();
                    result.record_failure(format!("{path}: {e}"));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    result.record_failure(format!("{}: {e}", path.display()));
                    continue;
                }
            };
            let accessed = match metadata.accessed() {
                Ok(accessed) => accessed,
                Err(e) => {
                    result.record_failure(format!("{}: {e}", path.display()));
                    continue;
                }
            };
            let Some(accessed) = to_datetime(accessed) else {
                result.record_failure(format!("{}: access time out of range", path.display()));
                continue;
            };

            if !self.is_expired(accessed) {
                writeln!(out, "{} {}", "Skipped".cyan(), path.display())?;
                result.skipped += 1;
                continue;
            }

            if self.dry_run {
                writeln!(out, "{} {}", "Would remove".yellow(), path.display())?;
            } else {
                if let Err(e) = remove_file(path) {
                    result.record_failure(format!("{}: {e}", path.display()));
                    continue;
                }
                writeln!(out, "{} {}", "Removed".yellow(), path.display())?;
            }

            result.removed += 1;
            result.freed += metadata.len();
        }

        Ok(result)
    }

    /// Whether a file last accessed at `accessed` should be removed.
    #[must_use]
    pub fn is_expired(&self, accessed: DateTime<Utc>) -> bool {
        self.cutoff > accessed
    }

    /// Print a summary of one or more cleanup passes.
    ///
    /// # Output Format
    ///
    /// ```text
    /// Cleanup Summary:
    ///   Removed: 12 files
    ///   Skipped: 40 files
    ///   Failed: 1 files
    ///   Space freed: 3.2 MB
    ///
    /// Some errors occurred during cleanup:
    ///   /cache/locked/a.bin: Permission denied (os error 13)
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn print_summary(result: &CleanResult, dry_run: bool, out: &mut impl Write) -> Result<()> {
        let (removed_label, freed_label) = if dry_run {
            ("Would remove", "Space that would be freed")
        } else {
            ("Removed", "Space freed")
        };

        writeln!(out, "\n{}", "Cleanup Summary:".bold())?;
        writeln!(
            out,
            "  {removed_label}: {} files",
            result.removed.to_string().green()
        )?;
        writeln!(out, "  Skipped: {} files", result.skipped.to_string().cyan())?;

        if result.failed > 0 {
            writeln!(out, "  Failed: {} files", result.failed.to_string().red())?;
        }

        writeln!(
            out,
            "  {freed_label}: {}",
            format_size(result.freed, DECIMAL).bright_green().bold()
        )?;

        if !result.errors.is_empty() {
            writeln!(out, "\n{}", "Some errors occurred during cleanup:".yellow())?;
            for error in &result.errors {
                writeln!(out, "  {}", error.red())?;
            }
        }

        Ok(())
    }
}

/// Convert a filesystem timestamp, failing instead of panicking when it lies
/// outside the range `chrono` can represent.
fn to_datetime(time: SystemTime) -> Option<DateTime<Utc>> {
    let (secs, nanos) = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => (i64::try_from(after.as_secs()).ok()?, after.subsec_nanos()),
        Err(e) => {
            let before = e.duration();
            let secs = i64::try_from(before.as_secs()).ok()?.checked_neg()?;
            match before.subsec_nanos() {
                0 => (secs, 0),
                nanos => (secs.checked_sub(1)?, 1_000_000_000 - nanos),
            }
        }
    };

    DateTime::from_timestamp(secs, nanos)
}

/// Delete a single file, treating a concurrent removal as success.
fn remove_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::time::Duration;
    use tempfile::TempDir;

    const DAY: u64 = 86_400;

    fn write_with_atime(path: &Path, atime: SystemTime) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "cached").unwrap();
        filetime::set_file_times(
            path,
            FileTime::from_system_time(atime),
            FileTime::from_system_time(atime),
        )
        .unwrap();
    }

    fn days_ago(days: u64) -> SystemTime {
        SystemTime::now() - Duration::from_secs(days * DAY)
    }

    fn cutoff_days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - chrono::Duration::days(days)
    }

    fn report(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_is_expired_is_strict() {
        let env = Environment::new("/");
        let cutoff = DateTime::from_timestamp(1_000, 0).unwrap();
        let cleaner = Cleaner::new(cutoff, &env);

        assert!(cleaner.is_expired(DateTime::from_timestamp(999, 0).unwrap()));
        assert!(!cleaner.is_expired(cutoff));
        assert!(!cleaner.is_expired(DateTime::from_timestamp(1_001, 0).unwrap()));
    }

    #[test]
    fn test_missing_root_is_noop() {
        let dir = TempDir::new().unwrap();
        let env = Environment::new(dir.path());
        let cleaner = Cleaner::new(cutoff_days_ago(30), &env);
        let mut out = Vec::new();

        let result = cleaner.remove_expired("does-not-exist", &mut out).unwrap();

        assert_eq!(result, CleanResult::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_file_root_is_noop() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        write_with_atime(&file, days_ago(100));

        let env = Environment::new(dir.path());
        let cleaner = Cleaner::new(cutoff_days_ago(30), &env);
        let mut out = Vec::new();

        let result = cleaner.remove_expired("plain.txt", &mut out).unwrap();

        assert_eq!(result.removed, 0);
        assert!(out.is_empty());
        assert!(file.exists());
    }

    #[test]
    fn test_removes_expired_and_keeps_recent() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("cache").join("old.bin");
        let new = dir.path().join("cache").join("new.bin");
        write_with_atime(&old, days_ago(40));
        write_with_atime(&new, days_ago(5));

        let env = Environment::new(dir.path());
        let cleaner = Cleaner::new(cutoff_days_ago(30), &env);
        let mut out = Vec::new();

        let result = cleaner.remove_expired("cache", &mut out).unwrap();
        let output = report(out);

        assert!(!old.exists());
        assert!(new.exists());
        assert_eq!(result.removed, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.freed, "cached".len() as u64);
        assert_eq!(output.lines().count(), 2);
        assert!(
            output
                .lines()
                .any(|l| l.contains("Removed") && l.contains("old.bin"))
        );
        assert!(
            output
                .lines()
                .any(|l| l.contains("Skipped") && l.contains("new.bin"))
        );
    }

    #[test]
    fn test_access_time_equal_to_cutoff_is_kept() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("cache").join("edge.bin");
        let secs = 1_600_000_000;
        write_with_atime(&file, SystemTime::UNIX_EPOCH + Duration::from_secs(secs));

        let env = Environment::new(dir.path());
        let cutoff = DateTime::from_timestamp(i64::try_from(secs).unwrap(), 0).unwrap();
        let cleaner = Cleaner::new(cutoff, &env);
        let mut out = Vec::new();

        let result = cleaner.remove_expired("cache", &mut out).unwrap();

        assert!(file.exists());
        assert_eq!(result.skipped, 1);
        assert_eq!(result.removed, 0);
    }

    #[test]
    fn test_deep_tree_keeps_directories() {
        let dir = TempDir::new().unwrap();
        let mut deep = dir.path().join("cache");
        for level in 0..64 {
            deep = deep.join(format!("d{level}"));
        }
        let file = deep.join("leaf.bin");
        write_with_atime(&file, days_ago(90));

        let env = Environment::new(dir.path());
        let cleaner = Cleaner::new(cutoff_days_ago(30), &env);
        let mut out = Vec::new();

        let result = cleaner.remove_expired("cache", &mut out).unwrap();

        assert_eq!(result.removed, 1);
        assert!(!file.exists());
        assert!(deep.is_dir());
    }

    #[test]
    fn test_dry_run_keeps_files() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("cache").join("old.bin");
        write_with_atime(&old, days_ago(40));

        let env = Environment::new(dir.path());
        let cleaner = Cleaner::new(cutoff_days_ago(30), &env).with_dry_run(true);
        let mut out = Vec::new();

        let result = cleaner.remove_expired("cache", &mut out).unwrap();
        let output = report(out);

        assert!(old.exists());
        assert_eq!(result.removed, 1);
        assert!(output.contains("Would remove"));
        assert!(output.contains("old.bin"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_not_followed() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("outside.bin");
        write_with_atime(&target, days_ago(90));
        fs::create_dir_all(dir.path().join("cache")).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("cache").join("link")).unwrap();

        let env = Environment::new(dir.path());
        let cleaner = Cleaner::new(cutoff_days_ago(30), &env);
        let mut out = Vec::new();

        let result = cleaner.remove_expired("cache", &mut out).unwrap();

        assert!(target.exists());
        assert_eq!(result.removed, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_merge_results() {
        let mut total = CleanResult {
            removed: 1,
            skipped: 2,
            failed: 0,
            freed: 10,
            errors: vec![],
        };
        total.merge(CleanResult {
            removed: 3,
            skipped: 0,
            failed: 1,
            freed: 5,
            errors: vec!["boom".to_string()],
        });

        assert_eq!(total.removed, 4);
        assert_eq!(total.skipped, 2);
        assert_eq!(total.failed, 1);
        assert_eq!(total.freed, 15);
        assert_eq!(total.errors, vec!["boom"]);
    }

    #[test]
    fn test_print_summary() {
        let result = CleanResult {
            removed: 2,
            skipped: 1,
            failed: 1,
            freed: 2_000,
            errors: vec!["/cache/locked/a.bin: Permission denied".to_string()],
        };
        let mut out = Vec::new();

        Cleaner::print_summary(&result, false, &mut out).unwrap();
        let output = report(out);

        assert!(output.contains("Cleanup Summary:"));
        assert!(output.contains("Removed:"));
        assert!(output.contains("Failed:"));
        assert!(output.contains("2 kB"));
        assert!(output.contains("Some errors occurred during cleanup:"));
        assert!(output.contains("/cache/locked/a.bin: Permission denied"));
    }

    #[test]
    fn test_print_summary_without_errors() {
        let mut out = Vec::new();

        Cleaner::print_summary(&CleanResult::default(), true, &mut out).unwrap();
        let output = report(out);

        assert!(output.contains("Would remove:"));
        assert!(!output.contains("Failed:"));
        assert!(!output.contains("Some errors occurred"));
    }

    #[cfg(unix)]
    #[test]
    fn test_to_datetime_range() {
        let far_future = UNIX_EPOCH + Duration::from_secs(9_000_000_000_000);
        assert_eq!(to_datetime(far_future), None);

        let before_epoch = UNIX_EPOCH - Duration::from_millis(1_500);
        assert_eq!(
            to_datetime(before_epoch).map(|t| t.timestamp_millis()),
            Some(-1_500)
        );

        let after_epoch = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        assert_eq!(
            to_datetime(after_epoch).map(|t| t.timestamp()),
            Some(1_600_000_000)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_out_of_range_access_time_does_not_abort_walk() {
        let dir = TempDir::new().unwrap();
        let weird = dir.path().join("cache").join("weird.bin");
        let old = dir.path().join("cache").join("old.bin");
        write_with_atime(&old, days_ago(40));
        fs::write(&weird, "cached").unwrap();
        if filetime::set_file_times(
            &weird,
            FileTime::from_unix_time(9_000_000_000_000, 0),
            FileTime::from_system_time(days_ago(1)),
        )
        .is_err()
        {
            return;
        }
        // Some filesystems clamp timestamps they cannot store.
        let stored = fs::metadata(&weird).unwrap().accessed().unwrap();
        let stored_out_of_range = to_datetime(stored).is_none();

        let env = Environment::new(dir.path());
        let cleaner = Cleaner::new(cutoff_days_ago(30), &env);
        let mut out = Vec::new();

        let result = cleaner.remove_expired("cache", &mut out).unwrap();

        assert!(!old.exists());
        assert_eq!(result.removed, 1);
        assert!(weird.exists());
        if stored_out_of_range {
            assert_eq!(result.failed, 1);
            assert!(result.errors[0].contains("weird.bin"));
        } else {
            assert_eq!(result.skipped, 1);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_unremovable_file_is_counted_and_walk_continues() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked_dir = dir.path().join("cache").join("locked");
        let locked = locked_dir.join("stuck.bin");
        let free = dir.path().join("cache").join("free").join("old.bin");
        write_with_atime(&locked, days_ago(40));
        write_with_atime(&free, days_ago(40));

        fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o555)).unwrap();
        // Privileged users ignore directory permissions.
        if fs::write(locked_dir.join("root-check"), "").is_ok() {
            fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let env = Environment::new(dir.path());
        let cleaner = Cleaner::new(cutoff_days_ago(30), &env);
        let mut out = Vec::new();

        let result = cleaner.remove_expired("cache", &mut out);
        fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o755)).unwrap();
        let result = result.unwrap();
        let output = report(out);

        assert_eq!(result.failed, 1);
        assert_eq!(result.removed, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("stuck.bin"));
        assert!(locked.exists());
        assert!(!free.exists());
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("old.bin"));
    }

    #[test]
    fn test_remove_file_tolerates_vanished_file() {
        let dir = TempDir::new().unwrap();

        assert!(remove_file(&dir.path().join("gone")).is_ok());
    }
}
