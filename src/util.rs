use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use regex::Regex;
use semver::Version;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;
use crate::tool::ToolSpec;

#[cfg(windows)]
pub const EXEC_EXT: &str = "exe";
#[cfg(not(windows))]
pub const EXEC_EXT: &str = "";

/// Strips the `sha256:` prefix from a hash if present and lowercases it.
pub fn format_hash(hash: &str) -> String {
    let hash = hash.trim();
    hash.strip_prefix("sha256:").unwrap_or(hash).to_ascii_lowercase()
}

/// Returns the current target triple (e.g. `x86_64-unknown-linux-gnu`)
/// based on the host system's architecture and operating system.
pub fn current_target_triple() -> String {
    let arch = std::env::consts::ARCH;
    let os = std::env::consts::OS;

    match (arch, os) {
        ("x86_64", "linux") => "x86_64-unknown-linux-gnu".to_string(),
        ("x86", "windows") => "i686-pc-windows-msvc".to_string(),
        ("x86_64", "windows") => "x86_64-pc-windows-msvc".to_string(),
        ("aarch64", "linux") => "aarch64-unknown-linux-gnu".to_string(),
        ("aarch64", "macos") => "aarch64-apple-darwin".to_string(),
        ("x86_64", "macos") => "x86_64-apple-darwin".to_string(),
        _ => format!("{}-unknown-{}", arch, os),
    }
}

/// OS and architecture spelled the way release pages name them (`linux`, `amd64`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
}

impl Platform {
    /// Maps `std::env::consts` values to release naming.
    ///
    /// # Errors
    /// Returns an error for operating systems or architectures without release builds.
    pub fn from_consts(os: &str, arch: &str) -> Result<Platform> {
        let os = match os {
            "linux" => "linux",
            "macos" => "darwin",
            "windows" => "windows",
            other => bail!("Unsupported operating system: {}", other),
        };
        let arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            "arm" => "arm",
            other => bail!("Unsupported architecture: {}", other),
        };
        Ok(Platform { os, arch })
    }

    pub fn current() -> Result<Platform> {
        Platform::from_consts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Archive extension release pages use for this platform.
    pub fn archive_ext(&self) -> &'static str {
        if self.os == "windows" { "zip" } else { "tar.gz" }
    }
}

/// Expands `{name}`, `{version}`, `{os}`, `{arch}`, `{triple}` and `{ext}` in a release template.
pub fn expand_template(template: &str, spec: &ToolSpec, platform: &Platform) -> String {
    template
        .replace("{name}", spec.name())
        .replace("{version}", spec.version())
        .replace("{os}", platform.os)
        .replace("{arch}", platform.arch)
        .replace("{triple}", &current_target_triple())
        .replace("{ext}", platform.archive_ext())
}

/// File name of a tool's executable on this platform (`helm` or `helm.exe`).
pub fn exe_file_name(name: &str) -> String {
    if EXEC_EXT.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", name, EXEC_EXT)
    }
}

/// Validates whether a version string is a valid SemVer version.
/// Ignores build metadata and target suffixes.
/// Fails unless `member` names a path that stays inside the directory it is joined to.
pub fn ensure_relative_member(member: &str) -> Result<()> {
    if member.is_empty() {
        bail!("Archive member path must not be empty");
    }
    let escapes = Path::new(member)
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes {
        bail!("Archive member path must stay inside the archive: {:?}", member);
    }
    Ok(())
}

/// Whether `output` of a version command names exactly `wanted`.
///
/// Words are compared as semver versions, so `1.0.10` does not count as `1.0.1`.
/// A leading `v` is ignored.
pub fn reports_version(output: &str, wanted: &str) -> bool {
    let Ok(wanted) = Version::parse(wanted) else {
        return false;
    };
    output
        .split(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+')))
        .filter_map(|word| {
            let word = word.strip_prefix('v').unwrap_or(word);
            let word = word.trim_end_matches('.');
            Version::parse(word).ok()
        })
        .any(|found| found == wanted)
}

pub fn is_valid_version(version: &str) -> bool {
    let version = version.split('-').next().unwrap_or_default();
    Version::parse(version).is_ok()
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Pulls the digest out of a checksum file (`<hex>` or `<hex>  <file>` lines).
///
/// When several lines are present the one naming `file_name` wins.
pub fn parse_checksum(content: &str, file_name: &str) -> Option<String> {
    let mut first = None;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let Some(hash) = parts.next() else { continue };
        let named = parts.next().map(|f| f.trim_start_matches('*'));
        if named == Some(file_name) {
            return Some(format_hash(hash));
        }
        if first.is_none() {
            first = Some(format_hash(hash));
        }
    }
    first
}

/// Compares the SHA-256 of `bytes` against `expected`.
///
/// # Errors
/// Returns an error naming both digests on mismatch.
pub fn verify_sha256(bytes: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(bytes);
    let expected = format_hash(expected);
    if actual != expected {
        bail!("Checksum mismatch: expected {}, got {}", expected, actual);
    }
    Ok(())
}

/// Unpacks a downloaded artifact into `dest`.
///
/// `.tar.gz`/`.tgz` and `.zip` archives are extracted; anything else is treated as
/// the raw executable and written as `dest/<exe name>`.
pub fn extract_archive(bytes: &[u8], file_name: &str, tool_name: &str, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Could not create {}", dest.display()))?;
    if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
        let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
        archive.unpack(dest)
            .with_context(|| format!("Could not extract {}", file_name))?;
    } else if file_name.ends_with(".zip") {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .with_context(|| format!("Could not open {}", file_name))?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let Some(relative) = file.enclosed_name() else { continue };
            let out_path = dest.join(relative);
            if file.is_dir() {
                std::fs::create_dir_all(&out_path)?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut content = Vec::new();
            file.read_to_end(&mut content)?;
            std::fs::write(&out_path, &content)?;
            #[cfg(unix)]
            if let Some(mode) = file.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))?;
            }
        }
    } else {
        let out_path = dest.join(exe_file_name(tool_name));
        std::fs::write(&out_path, bytes)?;
        make_executable(&out_path)?;
    }
    Ok(())
}

/// Searches an extracted release for the tool's executable.
///
/// With an explicit `member` path that file is used. Otherwise the executables
/// below `dir` are ranked, preferring ones whose file stem matches the tool name.
pub fn find_binary(dir: &Path, name: &str, member: Option<&str>) -> Result<PathBuf> {
    if let Some(member) = member {
        ensure_relative_member(member)?;
        let path = dir.join(member);
        if path.is_file() {
            return Ok(path);
        }
        if let Some(file_name) = path.file_name() {
            let with_ext = path.with_file_name(exe_file_name(&file_name.to_string_lossy()));
            if with_ext.is_file() {
                return Ok(with_ext);
            }
        }
        bail!("'{}' not found in the downloaded release", member);
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && is_executable(path) {
            candidates.push(path.to_path_buf());
        }
    }
    if candidates.is_empty() {
        bail!("No executable found in '{}'", dir.display());
    }

    let re = Regex::new(&format!(r"(?i)^{}$", regex::escape(name)))?;
    let loose = Regex::new(&format!(r"(?i)\b{}.*", regex::escape(name)))?;
    candidates.sort_by_key(|p| {
        let fname = p.file_stem().unwrap_or_default().to_string_lossy().to_lowercase();
        if re.is_match(&fname) {
            0
        } else if loose.is_match(&fname) {
            5
        } else {
            10
        }
    });
    Ok(candidates.remove(0))
}

/// Checks if a given path is an executable file on Unix.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
/// Checks if a given path has a Windows executable extension (.exe, .bat, .cmd).
#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        let ext = ext.to_ascii_lowercase();
        path.is_file() && matches!(ext.as_str(), "exe" | "bat" | "cmd")
    } else {
        false
    }
}

/// Sets mode 0755 on Unix. No-op elsewhere.
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Could not mark {} executable", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Last path segment of a URL, without query string.
pub fn url_file_name(url: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Could not determine archive name from {}", url))
}
