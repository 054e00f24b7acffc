use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

/// Outcome of a search-path lookup.
///
/// A miss is an ordinary answer, not an error: it is what sends the resolver
/// down the bootstrap path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(PathBuf),
    Missing,
}

/// Finds an executable by its bare name.
pub trait PathLookup {
    fn lookup(&self, name: &str) -> Lookup;
}

/// Looks tools up in an executable search path (`PATH`), first match wins.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    paths: Option<OsString>,
}

impl SearchPath {
    /// Uses an explicit search path, e.g. one built with [`std::env::join_paths`].
    pub fn new<S: Into<OsString>>(paths: S) -> Self {
        Self { paths: Some(paths.into()) }
    }

    /// Captures the `PATH` of the current process.
    pub fn from_env() -> Self {
        Self { paths: std::env::var_os("PATH") }
    }
}

impl PathLookup for SearchPath {
    fn lookup(&self, name: &str) -> Lookup {
        if name.is_empty() {
            return Lookup::Missing;
        }
        let Some(paths) = &self.paths else {
            debug!(tool = name, "no search path set");
            return Lookup::Missing;
        };
        let cwd = match std::env::current_dir() {
            Ok(cwd) => cwd,
            Err(e) => {
                debug!(tool = name, error = %e, "current directory unavailable");
                return Lookup::Missing;
            }
        };
        match which::which_in(name, Some(paths), &cwd) {
            Ok(path) if path.is_absolute() => Lookup::Found(path),
            Ok(path) => Lookup::Found(cwd.join(path)),
            Err(e) => {
                debug!(tool = name, reason = %e, "not found on search path");
                Lookup::Missing
            }
        }
    }
}
