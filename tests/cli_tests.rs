use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use bootbin::{ReleaseAsset, ToolSpec};
use bootbin::global::cache::cache_archive;
use bootbin::util::{exe_file_name, expand_template, make_executable, sha256_hex, Platform};

const URL: &str = "https://example.invalid/tool-{version}-{os}-{arch}";
const BODY: &[u8] = b"#!/bin/sh\necho tool\n";

fn write_descriptor(dir: &Path) -> (PathBuf, ToolSpec) {
    let spec = ToolSpec::new("tool", "1.0.0", ".tool-v1").unwrap()
        .with_release(ReleaseAsset {
            url: URL.to_string(),
            checksum_url: None,
            sha256: Some(sha256_hex(BODY)),
            binary: None,
        });
    let path = dir.join("tool.toml");
    spec.save(&path).unwrap();
    (path, spec)
}

fn write_executable(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(exe_file_name(name));
    std::fs::write(&path, BODY).unwrap();
    make_executable(&path).unwrap();
    path
}

fn bootbin(path_env: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bootbin").unwrap();
    cmd.env("PATH", path_env).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_which_finds_tool_on_path() {
    let dir = tempdir().unwrap();
    let expected = write_executable(dir.path(), "tool");

    let output = bootbin(dir.path())
        .args(["which", "tool"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8_lossy(&output).trim(), expected.display().to_string());
}

#[test]
fn test_which_missing_tool_fails() {
    let dir = tempdir().unwrap();
    bootbin(dir.path())
        .args(["which", "tool"])
        .assert()
        .failure();
}

#[test]
fn test_tools_lists_builtins() {
    let dir = tempdir().unwrap();
    let output = bootbin(dir.path())
        .arg("tools")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("helm"));
}

#[cfg(test)]
mod cli_integration_tests {
    use super::*;

    #[test]
    fn test_ensure_prefers_search_path() {
        let path_dir = tempdir().unwrap();
        let base = tempdir().unwrap();
        let expected = write_executable(path_dir.path(), "tool");
        let (descriptor, _) = write_descriptor(base.path());

        let output = bootbin(path_dir.path())
            .arg("ensure")
            .arg("--file").arg(&descriptor)
            .arg("--base-dir").arg(base.path())
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["name"], "tool");
        assert_eq!(json["from"], "search-path");
        assert_eq!(json["executable_path"], expected.display().to_string());
        assert!(!base.path().join(".tool-v1").exists());
    }

    #[test]
    fn test_ensure_installs_from_cached_download() {
        let empty_path = tempdir().unwrap();
        let base = tempdir().unwrap();
        let (descriptor, spec) = write_descriptor(base.path());
        let url = expand_template(URL, &spec, &Platform::current().unwrap());
        let cache_root = base.path().join(".tool-v1");
        cache_archive(&cache_root, &url, BODY).unwrap();

        let output = bootbin(empty_path.path())
            .arg("ensure")
            .arg("--file").arg(&descriptor)
            .arg("--base-dir").arg(base.path())
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let installed = cache_root.join("bin").join(exe_file_name("tool"));
        assert_eq!(String::from_utf8_lossy(&output).trim(), installed.display().to_string());
        assert!(installed.exists());

        bootbin(empty_path.path())
            .arg("clean")
            .arg("--file").arg(&descriptor)
            .arg("--base-dir").arg(base.path())
            .assert()
            .success();
        assert!(!cache_root.join("downloads").exists());
        assert!(installed.exists());
    }

    #[test]
    fn test_ensure_offline_miss_reports_tool() {
        let empty_path = tempdir().unwrap();
        let base = tempdir().unwrap();
        let (descriptor, _) = write_descriptor(base.path());

        let output = bootbin(empty_path.path())
            .arg("ensure")
            .arg("--offline")
            .arg("--file").arg(&descriptor)
            .arg("--base-dir").arg(base.path())
            .assert()
            .failure()
            .get_output()
            .stderr
            .clone();
        let stderr = String::from_utf8_lossy(&output);
        assert!(stderr.contains("tool was not found on the search path"));
        assert!(stderr.contains("Installing tool is disabled"));
    }

    #[test]
    fn test_ensure_rejects_unknown_builtin() {
        let empty_path = tempdir().unwrap();
        let base = tempdir().unwrap();
        bootbin(empty_path.path())
            .args(["ensure", "no-such-tool"])
            .arg("--base-dir").arg(base.path())
            .assert()
            .failure();
    }

    #[cfg(unix)]
    #[test]
    fn test_run_forwards_arguments() {
        let path_dir = tempdir().unwrap();
        let base = tempdir().unwrap();
        let (descriptor, _) = write_descriptor(base.path());
        let script = path_dir.path().join("tool");
        std::fs::write(&script, "#!/bin/sh\necho \"args: $*\"\n").unwrap();
        make_executable(&script).unwrap();

        let output = bootbin(path_dir.path())
            .arg("run")
            .arg("--file").arg(&descriptor)
            .arg("--base-dir").arg(base.path())
            .args(["--", "--flag", "value"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        assert!(String::from_utf8_lossy(&output).contains("args: --flag value"));
    }
}
