use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use anyhow::{anyhow, bail, Context};
use reqwest::blocking::Client;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;
use crate::cancel::{CancelToken, POLL_INTERVAL};
use crate::error::InstallError;
use crate::global::cache::{cache_archive, get_cached_archive, remove_cached_archive};
use crate::global::utils::installed_binary_path;
use crate::tool::{ReleaseAsset, ToolSpec};
use crate::util::{expand_template, extract_archive, find_binary, is_executable, make_executable, parse_checksum, reports_version, url_file_name, verify_sha256, Platform};

const CHUNK_SIZE: usize = 64 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches a pinned build of a tool and installs it below a cache root.
///
/// Implementations must leave the cache root usable when they fail, and writing the
/// same binary to the same place twice must be harmless.
pub trait Installer {
    /// Installs `spec` under `cache_root` and returns the absolute path of the executable.
    fn install(&self, spec: &ToolSpec, cache_root: &Path, cancel: &CancelToken) -> Result<PathBuf, InstallError>;
}

impl<T: Installer + ?Sized> Installer for Box<T> {
    fn install(&self, spec: &ToolSpec, cache_root: &Path, cancel: &CancelToken) -> Result<PathBuf, InstallError> {
        (**self).install(spec, cache_root, cancel)
    }
}

/// Downloads the release described by [`ToolSpec::release`] over HTTP.
///
/// Installs to `<cache_root>/bin/<name>`. Archives are kept in
/// `<cache_root>/downloads` so a failed extraction does not download again.
/// Network reads run on a worker thread, so cancelling the token returns
/// [`InstallError::Cancelled`] within [`POLL_INTERVAL`] even while a request is stalled.
#[derive(Debug, Clone)]
pub struct ReleaseInstaller {
    platform: Option<Platform>,
    timeout: Duration,
    version_check_timeout: Duration,
}

impl Default for ReleaseInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseInstaller {
    pub fn new() -> Self {
        Self {
            platform: None,
            timeout: DEFAULT_TIMEOUT,
            version_check_timeout: VERSION_CHECK_TIMEOUT,
        }
    }

    /// Installs builds for `platform` instead of the host.
    pub fn for_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Upper bound for a single HTTP request. A cancel deadline can shorten it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long an installed copy may take to print its version before it counts as stale.
    pub fn with_version_check_timeout(mut self, timeout: Duration) -> Self {
        self.version_check_timeout = timeout;
        self
    }

    fn platform(&self) -> anyhow::Result<Platform> {
        match &self.platform {
            Some(platform) => Ok(platform.clone()),
            None => Platform::current(),
        }
    }

    /// Client for one request, bounded by whatever is left of the cancel deadline.
    fn client(&self, cancel: &CancelToken) -> anyhow::Result<Client> {
        let timeout = match cancel.remaining() {
            Some(remaining) => remaining.min(self.timeout),
            None => self.timeout,
        };
        Client::builder()
            .user_agent(concat!("bootbin/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Could not create HTTP client")
    }

    /// Downloads `url` on a worker thread and waits for it while watching the token.
    fn download(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, InstallError> {
        cancel.check()?;
        info!(%url, "downloading");
        let client = self.client(cancel)?;
        let worker_url = url.to_string();
        let worker_cancel = cancel.clone();
        let bytes = cancel
            .run_cancellable(move || fetch(&client, &worker_url, &worker_cancel))?
            .map_err(|e| cancelled_or(cancel, e))?;
        debug!(%url, size = bytes.len(), "download finished");
        Ok(bytes)
    }

    fn expected_sha256(
        &self,
        release: &ReleaseAsset,
        spec: &ToolSpec,
        platform: &Platform,
        file_name: &str,
        cancel: &CancelToken,
    ) -> Result<Option<String>, InstallError> {
        if let Some(hash) = &release.sha256 {
            return Ok(Some(hash.clone()));
        }
        let Some(template) = &release.checksum_url else {
            return Ok(None);
        };
        let url = expand_template(template, spec, platform);
        let content = self.download(&url, cancel)?;
        let content = String::from_utf8(content)
            .with_context(|| format!("Checksum file {} is not text", url))?;
        let hash = parse_checksum(&content, file_name)
            .ok_or_else(|| anyhow!("No checksum found in {}", url))?;
        Ok(Some(hash))
    }

    /// Extracts a verified artifact and places the executable at its install path.
    pub fn install_artifact(
        &self,
        spec: &ToolSpec,
        cache_root: &Path,
        file_name: &str,
        bytes: &[u8],
        cancel: &CancelToken,
    ) -> Result<PathBuf, InstallError> {
        let platform = self.platform()?;
        let target = installed_binary_path(cache_root, spec);
        let bin_dir = target.parent().ok_or_else(|| anyhow!("Invalid install path {}", target.display()))?;
        std::fs::create_dir_all(bin_dir)
            .with_context(|| format!("Could not create {}", bin_dir.display()))?;

        // Staging lives inside the cache root so the final rename stays on one filesystem.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(cache_root)
            .with_context(|| format!("Could not create staging directory in {}", cache_root.display()))?;
        extract_archive(bytes, file_name, spec.name(), staging.path())?;
        cancel.check()?;

        let member = spec.release()
            .and_then(|release| release.binary.as_deref())
            .map(|member| expand_template(member, spec, &platform));
        let found = find_binary(staging.path(), spec.name(), member.as_deref())?;

        let staged_target = staging.path().join(".install");
        std::fs::copy(&found, &staged_target)
            .with_context(|| format!("Could not copy {}", found.display()))?;
        make_executable(&staged_target)?;
        if target.exists() {
            std::fs::remove_file(&target)
                .with_context(|| format!("Could not replace {}", target.display()))?;
        }
        std::fs::rename(&staged_target, &target)
            .with_context(|| format!("Could not install {}", target.display()))?;
        info!(tool = spec.name(), version = spec.version(), path = %target.display(), "installed");
        Ok(target)
    }
}

impl Installer for ReleaseInstaller {
    fn install(&self, spec: &ToolSpec, cache_root: &Path, cancel: &CancelToken) -> Result<PathBuf, InstallError> {
        cancel.check()?;

        let target = installed_binary_path(cache_root, spec);
        if is_executable(&target) && installed_version_matches(&target, spec, self.version_check_timeout, cancel)? {
            debug!(tool = spec.name(), path = %target.display(), "reusing installed copy");
            return Ok(target);
        }

        let release = spec.release()
            .ok_or_else(|| anyhow!("No release source configured for {}", spec.name()))?;
        let platform = self.platform()?;
        let url = expand_template(&release.url, spec, &platform);
        let file_name = url_file_name(&url)?;

        let (bytes, downloaded) = match get_cached_archive(cache_root, &url)? {
            Some(path) => {
                debug!(path = %path.display(), "using cached archive");
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("Could not read {}", path.display()))?;
                (bytes, false)
            }
            None => (self.download(&url, cancel)?, true),
        };
        cancel.check()?;

        match self.expected_sha256(release, spec, &platform, &file_name, cancel)? {
            Some(expected) => {
                if let Err(e) = verify_sha256(&bytes, &expected) {
                    remove_cached_archive(cache_root, &url)?;
                    return Err(e.context(format!("Integrity check of {} failed", file_name)).into());
                }
            }
            None => warn!(tool = spec.name(), %url, "no checksum configured, artifact is not verified"),
        }
        if downloaded {
            cache_archive(cache_root, &url, &bytes)?;
        }

        self.install_artifact(spec, cache_root, &file_name, &bytes, cancel)
    }
}

/// Body of [`ReleaseInstaller::download`], run on the worker thread.
fn fetch(client: &Client, url: &str, cancel: &CancelToken) -> anyhow::Result<Vec<u8>> {
    let mut response = client.get(url).send()
        .with_context(|| format!("Failed to download {}", url))?;
    if !response.status().is_success() {
        bail!("Failed to download {} (HTTP {})", url, response.status());
    }
    let mut bytes = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            bail!("Download of {} was cancelled", url);
        }
        let read = response.read(&mut chunk)
            .with_context(|| format!("Failed to read {}", url))?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
    }
    Ok(bytes)
}

/// Whether a previously installed copy reports the pinned version.
///
/// Without `version_args` the copy is trusted as-is. A copy that does not exit
/// within `timeout` is killed and treated as stale.
fn installed_version_matches(
    path: &Path,
    spec: &ToolSpec,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<bool, InstallError> {
    if spec.version_args().is_empty() {
        return Ok(true);
    }
    let mut child = match Command::new(path)
        .args(spec.version_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            debug!(tool = spec.name(), error = %e, "could not run installed copy");
            return Ok(false);
        }
    };

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.wait_timeout(POLL_INTERVAL)? {
            break status;
        }
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(InstallError::Cancelled);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            debug!(tool = spec.name(), ?timeout, "version check timed out");
            return Ok(false);
        }
    };
    if !status.success() {
        debug!(tool = spec.name(), %status, "version check failed");
        return Ok(false);
    }

    let mut stdout = Vec::new();
    if let Some(mut pipe) = child.stdout.take() {
        pipe.read_to_end(&mut stdout)?;
    }
    let stdout = String::from_utf8_lossy(&stdout);
    let matches = reports_version(&stdout, spec.version());
    if !matches {
        debug!(tool = spec.name(), found = %stdout.trim(), wanted = spec.version(), "installed copy has another version");
    }
    Ok(matches)
}

fn cancelled_or(cancel: &CancelToken, error: anyhow::Error) -> InstallError {
    if cancel.is_cancelled() {
        InstallError::Cancelled
    } else {
        InstallError::Failed(error)
    }
}

/// Refuses every install. Backs `bootbin ensure --offline`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInstall;

impl Installer for NoInstall {
    fn install(&self, spec: &ToolSpec, _cache_root: &Path, _cancel: &CancelToken) -> Result<PathBuf, InstallError> {
        Err(anyhow!("Installing {} is disabled", spec.name()).into())
    }
}
