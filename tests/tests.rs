use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use bootbin::*;
use bootbin::global::cache::cache_archive;
use bootbin::util::{exe_file_name, sha256_hex, Platform};

const URL: &str = "https://example.invalid/tool-{version}-{os}-{arch}";

fn write_executable(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let path = dir.join(exe_file_name(name));
    std::fs::write(&path, body).unwrap();
    bootbin::util::make_executable(&path).unwrap();
    path
}

fn tool_spec(body: &[u8]) -> ToolSpec {
    ToolSpec::new("tool", "1.0.0", ".tool-v1").unwrap()
        .with_release(ReleaseAsset {
            url: URL.to_string(),
            checksum_url: None,
            sha256: Some(sha256_hex(body)),
            binary: None,
        })
}

/// Seeds the download cache so installs never touch the network.
fn seed_download(base: &Path, spec: &ToolSpec, body: &[u8]) {
    let platform = Platform::current().unwrap();
    let url = bootbin::util::expand_template(URL, spec, &platform);
    cache_archive(&base.join(spec.cache_root_name()), &url, body).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_on_search_path_is_returned_as_is() {
        let path_dir = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        let expected = write_executable(path_dir.path(), "tool", b"#!/bin/sh\n");
        let resolver = BootstrapResolver::new(
            SearchPath::new(path_dir.path().as_os_str()),
            NoInstall,
            base.path(),
        );
        let resolution = resolver.resolve(&tool_spec(b"unused"), &CancelToken::new()).unwrap();
        assert_eq!(resolution.executable_path, expected);
        assert_eq!(resolution.from, ResolvedFrom::SearchPath);
        assert!(!base.path().join(".tool-v1").exists());
    }

    #[test]
    fn test_missing_tool_is_installed_into_cache_root() {
        let empty_path = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        let body = b"#!/bin/sh\necho tool 1.0.0\n";
        let spec = tool_spec(body);
        seed_download(base.path(), &spec, body);

        let resolver = BootstrapResolver::new(
            SearchPath::new(empty_path.path().as_os_str()),
            ReleaseInstaller::new(),
            base.path(),
        );
        let resolution = resolver.resolve(&spec, &CancelToken::new()).unwrap();
        let cache_root = base.path().join(".tool-v1");
        assert_eq!(resolution.executable_path, installed_binary_path(&cache_root, &spec));
        assert_eq!(resolution.from, ResolvedFrom::Bootstrapped);
        assert_eq!(std::fs::read(&resolution.executable_path).unwrap(), body);

        // A second run finds the installed copy and does the same again.
        let again = resolver.resolve(&spec, &CancelToken::new()).unwrap();
        assert_eq!(again, resolution);
    }

    #[test]
    fn test_offline_miss_is_bootstrap_failure_naming_the_tool() {
        let empty_path = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        let resolver = BootstrapResolver::new(
            SearchPath::new(empty_path.path().as_os_str()),
            NoInstall,
            base.path(),
        );
        let err = resolver.resolve(&tool_spec(b"x"), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ResolveError::BootstrapFailed { .. }));
        assert!(err.to_string().contains("tool"));
        assert_eq!(err.cache_root(), &base.path().join(".tool-v1"));
    }

    #[test]
    fn test_cancelled_before_install_is_reported_as_cancelled() {
        let empty_path = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        let resolver = BootstrapResolver::new(
            SearchPath::new(empty_path.path().as_os_str()),
            ReleaseInstaller::new(),
            base.path(),
        );
        let token = CancelToken::new();
        token.cancel();
        let err = resolver.resolve(&tool_spec(b"x"), &token).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_cancel_does_not_matter_when_tool_is_on_search_path() {
        let path_dir = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        write_executable(path_dir.path(), "tool", b"#!/bin/sh\n");
        let resolver = BootstrapResolver::new(
            SearchPath::new(path_dir.path().as_os_str()),
            ReleaseInstaller::new(),
            base.path(),
        );
        let token = CancelToken::new();
        token.cancel();
        assert!(resolver.resolve(&tool_spec(b"x"), &token).is_ok());
    }

    #[test]
    fn test_cancel_during_stalled_download_is_reported_promptly() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                held.push(stream);
            }
        });
        let spec = ToolSpec::new("tool", "1.0.0", ".tool-v1").unwrap()
            .with_release(ReleaseAsset {
                url: format!("http://{addr}/tool-{{version}}"),
                checksum_url: None,
                sha256: None,
                binary: None,
            });

        let empty_path = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        let resolver = BootstrapResolver::new(
            SearchPath::new(empty_path.path().as_os_str()),
            ReleaseInstaller::new(),
            base.path(),
        );
        let token = CancelToken::new();
        let canceller = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            canceller.cancel();
        });

        let started = Instant::now();
        let err = resolver.resolve(&spec, &token).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.cache_root(), &base.path().join(".tool-v1"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
