//! Persistent path list stored as JSON.
//!
//! The configuration lives at `<config_dir>/clearcache/conf.json`, where
//! `<config_dir>` is the platform-specific configuration directory
//! (e.g., `~/.config` on Linux, `%APPDATA%` on Windows).
//!
//! # Example config
//!
//! ```json
//! {
//!   "paths": [
//!     "~/.cache/pip",
//!     "$XDG_CACHE_HOME/thumbnails"
//!   ],
//!   "days": 14
//! }
//! ```
//!
//! `days` is optional and only provides the default retention window for
//! `run`; the precedence order is **CLI argument > config file > hardcoded
//! default**.
//!
//! # Locking
//!
//! Mutations go through [`ConfigStore::with_lock`], which holds an exclusive
//! advisory lock on the file for the whole read-modify-write cycle. Plain
//! [`ConfigStore::load`] calls do not lock and may observe a stale file.

use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{ClearCacheError, Result};

/// Directory created under the platform config directory.
const APP_DIR: &str = "clearcache";

/// Name of the configuration file.
const FILE_NAME: &str = "conf.json";

/// The persisted configuration.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Raw, unresolved path entries in insertion order. Duplicates are allowed.
    #[serde(default)]
    pub paths: Vec<String>,

    /// Default retention window in days for `run`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

impl Configuration {
    /// Remove the first entry equal to `path`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove_first(&mut self, path: &str) -> bool {
        match self.paths.iter().position(|p| p == path) {
            Some(index) => {
                self.paths.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Handle on the configuration file.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store backed by an explicit file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path where the configuration file is expected.
    ///
    /// # Returns
    ///
    /// `Some(PathBuf)` with the config file path, or `None` if the config
    /// directory cannot be determined.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(FILE_NAME))
    }

    /// Create a store at the default per-user location.
    ///
    /// # Errors
    ///
    /// Returns [`ClearCacheError::ConfigDirUnavailable`] if the platform
    /// configuration directory cannot be determined.
    pub fn open_default() -> Result<Self> {
        Self::config_path()
            .map(Self::new)
            .ok_or(ClearCacheError::ConfigDirUnavailable)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file currently exists as a regular file.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the configuration without locking.
    ///
    /// An absent or empty file yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, or if it
    /// contains invalid JSON.
    pub fn load(&self) -> Result<Option<Configuration>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ClearCacheError::config_io(&self.path, e)),
        };

        self.parse(&content)
    }

    /// Replace the file contents with `config`, holding the lock while writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be created,
    /// the lock cannot be acquired, or the write fails.
    pub fn save(&self, config: &Configuration) -> Result<()> {
        let mut file = self.open_locked()?;
        self.write(&mut file, config)
    }

    /// Run `mutate` against the current configuration under an exclusive lock.
    ///
    /// The parent directory and the file are created if missing, and an
    /// absent or empty file starts out as an empty configuration. The result
    /// is persisted only if `mutate` returns `Ok`. The lock is released when
    /// this function returns, whichever path it takes.
    ///
    /// # Errors
    ///
    /// Returns any error from opening, locking, parsing or writing the file,
    /// or the error returned by `mutate` itself (in which case nothing is
    /// written).
    pub fn with_lock<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Configuration) -> Result<T>,
    {
        let mut file = self.open_locked()?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| ClearCacheError::config_io(&self.path, e))?;

        let mut config = self.parse(&content)?.unwrap_or_default();
        let value = mutate(&mut config)?;

        self.write(&mut file, &config)?;

        Ok(value)
    }

    /// Open (creating if needed) the file and block until the exclusive lock is held.
    ///
    /// The lock is tied to the returned handle and released when it is dropped.
    fn open_locked(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ClearCacheError::config_io(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| ClearCacheError::config_io(&self.path, e))?;

        file.lock().map_err(|source| ClearCacheError::ConfigLock {
            path: self.path.clone(),
            source,
        })?;

        Ok(file)
    }

    fn parse(&self, content: &str) -> Result<Option<Configuration>> {
        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(content)
            .map(Some)
            .map_err(|source| ClearCacheError::ConfigParse {
                path: self.path.clone(),
                source,
            })
    }

    fn write(&self, file: &mut File, config: &Configuration) -> Result<()> {
        let mut json =
            serde_json::to_string_pretty(config).map_err(ClearCacheError::ConfigSerialize)?;
        json.push('\n');

        let io = |e: std::io::Error| ClearCacheError::config_io(&self.path, e);

        file.set_len(0).map_err(io)?;
        file.seek(SeekFrom::Start(0)).map_err(io)?;
        file.write_all(json.as_bytes()).map_err(io)?;
        file.sync_all().map_err(io)?;

        Ok(())
    }
}
