use std::path::PathBuf;
use thiserror::Error;

/// Why a tool could not be made available.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The tool is not on the search path and installing it failed.
    #[error("{tool} was not found on the search path and installing it into {} failed", .cache_root.display())]
    BootstrapFailed {
        tool: String,
        cache_root: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    /// The caller aborted the install, or its deadline passed.
    #[error("installing {tool} into {} was cancelled", .cache_root.display())]
    Cancelled {
        tool: String,
        cache_root: PathBuf,
    },
}

impl ResolveError {
    pub fn tool(&self) -> &str {
        match self {
            ResolveError::BootstrapFailed { tool, .. } | ResolveError::Cancelled { tool, .. } => tool,
        }
    }

    pub fn cache_root(&self) -> &PathBuf {
        match self {
            ResolveError::BootstrapFailed { cache_root, .. }
            | ResolveError::Cancelled { cache_root, .. } => cache_root,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResolveError::Cancelled { .. })
    }
}

/// Failure reported by an [`crate::Installer`].
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("installation was cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<std::io::Error> for InstallError {
    fn from(e: std::io::Error) -> Self {
        InstallError::Failed(e.into())
    }
}
