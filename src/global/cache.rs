use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use tracing::{debug, info};
use crate::util::url_file_name;

/// Directory holding downloaded release artifacts of a cache root.
pub fn downloads_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("downloads")
}

pub fn get_cached_archive(cache_root: &Path, url: &str) -> Result<Option<PathBuf>> {
    let archive_path = downloads_dir(cache_root).join(url_file_name(url)?);
    if archive_path.is_file() {
        Ok(Some(archive_path))
    }
    else {
        Ok(None)
    }
}

pub fn cache_archive(cache_root: &Path, url: &str, bytes: &[u8]) -> Result<PathBuf> {
    let cache_dir = downloads_dir(cache_root);
    if !cache_dir.exists() {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Could not create cache dir {:?}", cache_dir))?;
        debug!(dir = %cache_dir.display(), "cache directory created");
    }
    let path = cache_dir.join(url_file_name(url)?);
    // Write next to the target and rename, so a concurrent reader never sees a torn file.
    let mut staged = tempfile::NamedTempFile::new_in(&cache_dir)
        .with_context(|| format!("Could not create cache file in {:?}", cache_dir))?;
    std::io::Write::write_all(&mut staged, bytes)?;
    staged.persist(&path)
        .with_context(|| format!("Could not write cache file {:?}", path))?;
    Ok(path)
}

pub fn remove_cached_archive(cache_root: &Path, url: &str) -> Result<()> {
    if let Some(path) = get_cached_archive(cache_root, url)? {
        std::fs::remove_file(&path)
            .with_context(|| format!("Could not remove {:?}", path))?;
        debug!(path = %path.display(), "evicted cached archive");
    }
    Ok(())
}

/// Removes every downloaded artifact below the cache root. Installed binaries stay.
pub fn clean_cache(cache_root: &Path) -> Result<()> {
    let cache_dir = downloads_dir(cache_root);
    if cache_dir.exists() {
        std::fs::remove_dir_all(&cache_dir)
            .with_context(|| format!("Could not remove {:?}", cache_dir))?;
        info!(dir = %cache_dir.display(), "download cache cleaned");
    }
    Ok(())
}
