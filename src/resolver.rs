use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::cancel::CancelToken;
use crate::error::{InstallError, ResolveError};
use crate::global::utils::cache_root_for;
use crate::installer::Installer;
use crate::lookup::{Lookup, PathLookup};
use crate::tool::ToolSpec;

/// Where a resolved executable came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolvedFrom {
    SearchPath,
    Bootstrapped,
}

/// A runnable executable for a [`ToolSpec`]. Built fresh by every resolve call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub executable_path: PathBuf,
    pub from: ResolvedFrom,
}

/// Makes sure a tool can be run: search path first, installer second.
///
/// A tool found on the search path is used as-is, whatever its version. Only when it
/// is missing is the installer asked, exactly once, to place a pinned build under
/// `<base_dir>/<cache_root_name>`. Nothing is retried.
///
/// # Example
///
/// ```no_run
/// use bootbin::{builtin, BootstrapResolver, CancelToken, ReleaseInstaller, SearchPath};
///
/// let resolver = BootstrapResolver::new(SearchPath::from_env(), ReleaseInstaller::new(), "/home/me");
/// let helm = builtin("helm").unwrap();
/// let resolution = resolver.resolve(&helm, &CancelToken::new()).unwrap();
/// println!("{}", resolution.executable_path.display());
/// ```
#[derive(Debug)]
pub struct BootstrapResolver<L, I> {
    lookup: L,
    installer: I,
    base_dir: PathBuf,
}

impl<L: PathLookup, I: Installer> BootstrapResolver<L, I> {
    pub fn new<P: Into<PathBuf>>(lookup: L, installer: I, base_dir: P) -> Self {
        Self {
            lookup,
            installer,
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The directory a bootstrapped copy of `spec` is installed under.
    pub fn cache_root(&self, spec: &ToolSpec) -> PathBuf {
        cache_root_for(&self.base_dir, spec)
    }

    /// Resolves `spec` to an executable path.
    ///
    /// # Errors
    /// [`ResolveError::BootstrapFailed`] if the tool is missing and the installer failed,
    /// [`ResolveError::Cancelled`] if `cancel` fired while installing.
    pub fn resolve(&self, spec: &ToolSpec, cancel: &CancelToken) -> Result<Resolution, ResolveError> {
        debug!(tool = spec.name(), "searching");
        if let Lookup::Found(path) = self.lookup.lookup(spec.name()) {
            info!(tool = spec.name(), path = %path.display(), "resolved from search path");
            return Ok(Resolution {
                executable_path: path,
                from: ResolvedFrom::SearchPath,
            });
        }

        let cache_root = self.cache_root(spec);
        info!(
            tool = spec.name(),
            version = spec.version(),
            cache_root = %cache_root.display(),
            "not on search path, bootstrapping"
        );
        match self.installer.install(spec, &cache_root, cancel) {
            Ok(path) => {
                info!(tool = spec.name(), path = %path.display(), "resolved by bootstrap");
                Ok(Resolution {
                    executable_path: path,
                    from: ResolvedFrom::Bootstrapped,
                })
            }
            Err(InstallError::Cancelled) => {
                warn!(tool = spec.name(), "bootstrap cancelled");
                Err(ResolveError::Cancelled {
                    tool: spec.name().to_string(),
                    cache_root,
                })
            }
            Err(InstallError::Failed(source)) if cancel.is_cancelled() => {
                warn!(tool = spec.name(), error = %source, "bootstrap cancelled");
                Err(ResolveError::Cancelled {
                    tool: spec.name().to_string(),
                    cache_root,
                })
            }
            Err(InstallError::Failed(source)) => {
                warn!(tool = spec.name(), error = %source, "bootstrap failed");
                Err(ResolveError::BootstrapFailed {
                    tool: spec.name().to_string(),
                    cache_root,
                    source,
                })
            }
        }
    }
}
