//! Turning user-entered path entries into absolute paths.
//!
//! A configured entry is resolved in three steps:
//! 1. environment variable references are expanded (`$NAME`, `${NAME}`, and
//!    `%NAME%` on Windows); unknown variables are left as written,
//! 2. a leading `~` is replaced with the home directory,
//! 3. the result is made absolute against the working directory and `.`/`..`
//!    components are folded away lexically.
//!
//! Resolution never touches the filesystem. All inputs come from an
//! [`Environment`], so the same entry resolves identically as long as the
//! environment does.

use std::{
    collections::HashMap,
    env,
    ffi::OsStr,
    path::{Component, Path, PathBuf, is_separator},
};

use crate::error::{ClearCacheError, Result};

/// Everything path resolution depends on.
#[derive(Clone, Debug)]
pub struct Environment {
    home: Option<PathBuf>,
    cwd: PathBuf,
    vars: HashMap<String, String>,
}

impl Environment {
    /// An environment with the given working directory, no home directory
    /// and no variables.
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            home: None,
            cwd: cwd.into(),
            vars: HashMap::new(),
        }
    }

    /// Capture the environment of the running process.
    ///
    /// Variables whose name or value is not valid UTF-8 are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ClearCacheError::WorkingDir`] if the current directory
    /// cannot be read.
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().map_err(ClearCacheError::WorkingDir)?;
        let vars = env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();

        Ok(Self {
            home: dirs::home_dir(),
            cwd,
            vars,
        })
    }

    /// Use `home` for the leading `~` shorthand.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Define a variable for `$NAME` expansion, replacing any previous value.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Resolve a raw configured entry into an absolute path.
    ///
    /// # Examples
    ///
    /// ```
    /// # use clearcache::resolver::Environment;
    /// # use std::path::PathBuf;
    /// let env = Environment::new("/work").with_home("/home/me");
    /// assert_eq!(env.resolve("~/cache/../tmp"), PathBuf::from("/home/me/tmp"));
    /// assert_eq!(env.resolve("build"), PathBuf::from("/work/build"));
    /// ```
    #[must_use]
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let expanded = expand_vars(raw, |name| self.var(name));
        let expanded = self.expand_home(&expanded);
        normalize(&self.cwd.join(expanded))
    }

    fn expand_home(&self, path: &str) -> PathBuf {
        let Some(rest) = path.strip_prefix('~') else {
            return PathBuf::from(path);
        };
        let Some(home) = &self.home else {
            return PathBuf::from(path);
        };

        if rest.is_empty() {
            return home.clone();
        }

        match rest.chars().next() {
            Some(c) if is_separator(c) => home.join(rest.trim_start_matches(is_separator)),
            _ => PathBuf::from(path),
        }
    }
}

/// Whether a resolved path is visibly different from what the user typed.
#[must_use]
pub fn differs(raw: &str, resolved: &Path) -> bool {
    resolved.as_os_str() != OsStr::new(raw)
}

/// Expand `$NAME` and `${NAME}` references, plus `%NAME%` on Windows.
///
/// References whose variable is not known to `lookup` are kept verbatim.
pub fn expand_vars<'a, F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    if !input.contains('$') && !(cfg!(windows) && input.contains('%')) {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(|c: char| c == '$' || (cfg!(windows) && c == '%')) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        let (reference, name) = if let Some(braced) = tail.strip_prefix("${") {
            match braced.find('}') {
                Some(end) => (&tail[..end + 3], &braced[..end]),
                None => (tail, ""),
            }
        } else if let Some(bare) = tail.strip_prefix('$') {
            let len = bare
                .find(|c: char| !is_name_char(c))
                .unwrap_or(bare.len());
            (&tail[..=len], &bare[..len])
        } else {
            let percent = &tail[1..];
            match percent.find('%') {
                Some(end) if percent[..end].chars().all(is_name_char) => {
                    (&tail[..end + 2], &percent[..end])
                }
                _ => (&tail[..1], ""),
            }
        };

        match lookup(name) {
            Some(value) if !name.is_empty() => out.push_str(value),
            _ => out.push_str(reference),
        }
        rest = &tail[reference.len()..];
    }

    out.push_str(rest);
    out
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Fold `.` and `..` components without consulting the filesystem.
///
/// `..` never climbs above the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
        }
    }

    out
}
