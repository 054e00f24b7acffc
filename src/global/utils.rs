use std::path::{Path, PathBuf};
use anyhow::{anyhow, Result};
use directories::BaseDirs;
use crate::tool::ToolSpec;

/// The user-scoped directory cache roots are placed under (the home directory).
pub fn get_user_base_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new()
        .ok_or_else(|| anyhow!("Could not determine the home directory"))?;
    Ok(base_dirs.home_dir().to_path_buf())
}

/// `<base_dir>/<cache_root_name>`: the single install location of a tool family.
pub fn cache_root_for(base_dir: &Path, spec: &ToolSpec) -> PathBuf {
    base_dir.join(spec.cache_root_name())
}

/// Where an installed copy of `spec` lives inside its cache root.
pub fn installed_binary_path(cache_root: &Path, spec: &ToolSpec) -> PathBuf {
    cache_root.join("bin").join(crate::util::exe_file_name(spec.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_root_for_joins_base_and_name() {
        let spec = ToolSpec::new("tool", "1.0.0", ".tool-v1").unwrap();
        let base = Path::new("/home/user");
        assert_eq!(cache_root_for(base, &spec), base.join(".tool-v1"));
    }

    #[test]
    fn test_installed_binary_path() {
        let spec = ToolSpec::new("tool", "1.0.0", ".tool-v1").unwrap();
        let root = Path::new("/home/user/.tool-v1");
        let path = installed_binary_path(root, &spec);
        assert!(path.starts_with(root.join("bin")));
        assert_eq!(path.file_stem().unwrap(), "tool");
    }
}
