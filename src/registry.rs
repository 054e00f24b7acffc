use crate::tool::{ReleaseAsset, ToolSpec};

/// Cache root shared by the built-in descriptors.
pub const DEFAULT_CACHE_ROOT: &str = ".bootbin";

const HELM_VERSION: &str = "3.14.4";

/// Names accepted by [`builtin`].
pub fn builtin_names() -> &'static [&'static str] {
    &["helm"]
}

/// Returns a built-in tool descriptor.
///
/// # Example
///
/// ```
/// use bootbin::builtin;
///
/// let helm = builtin("helm").unwrap();
/// assert_eq!(helm.name(), "helm");
/// assert!(builtin("unknown").is_none());
/// ```
pub fn builtin(name: &str) -> Option<ToolSpec> {
    match name {
        "helm" => helm_v3().ok(),
        _ => None,
    }
}

/// Helm 3 from `get.helm.sh`, verified against the published `.sha256sum` files.
fn helm_v3() -> anyhow::Result<ToolSpec> {
    let url = "https://get.helm.sh/helm-v{version}-{os}-{arch}.{ext}";
    let spec = ToolSpec::new("helm", HELM_VERSION, DEFAULT_CACHE_ROOT)?
        .with_release(ReleaseAsset {
            url: url.to_string(),
            checksum_url: Some(format!("{}.sha256sum", url)),
            sha256: None,
            binary: Some("{os}-{arch}/helm".to_string()),
        })
        .with_version_args(["version", "--template", "{{.Version}}"]);
    Ok(spec)
}
