use std::path::{Component, Path};
use serde::{Deserialize, Serialize};
use anyhow::{bail, Context, Result};
use crate::util::{ensure_relative_member, format_hash, is_valid_version};

/// Describes the external tool that has to be available.
///
/// A `ToolSpec` is read-only input to the resolver: there are no setters, and the
/// `with_*` builders consume the value and hand back a new one. Deserializing
/// goes through the same checks as [`ToolSpec::new`].
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RawToolSpec")]
pub struct ToolSpec {
    /// Invocation name of the executable (e.g. `"helm"`).
    name: String,
    /// Pinned version installed when the tool has to be fetched.
    version: String,
    /// Directory under the user's base directory that holds downloaded copies.
    cache_root_name: String,
    /// Arguments that make the tool print its version, e.g. `["--version"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    version_args: Vec<String>,
    /// Where to download a release from. Only needed by [`crate::ReleaseInstaller`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    release: Option<ReleaseAsset>,
}

/// Unchecked form of [`ToolSpec`] as it appears in a descriptor file.
#[derive(Deserialize)]
struct RawToolSpec {
    name: String,
    version: String,
    cache_root_name: String,
    #[serde(default)]
    version_args: Vec<String>,
    #[serde(default)]
    release: Option<ReleaseAsset>,
}

impl TryFrom<RawToolSpec> for ToolSpec {
    type Error = anyhow::Error;

    fn try_from(raw: RawToolSpec) -> Result<ToolSpec> {
        let spec = ToolSpec::new(&raw.name, &raw.version, &raw.cache_root_name)?
            .with_version_args(raw.version_args);
        let spec = match raw.release {
            Some(release) => spec.with_release(release),
            None => spec,
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Naming of the downloadable release artifact.
///
/// Every field is a template; see [`crate::util::expand_template`] for the placeholders.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// Download URL of the archive or raw binary.
    pub url: String,
    /// URL of a published SHA-256 file for the artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_url: Option<String>,
    /// Pinned SHA-256 of the artifact. Wins over `checksum_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Path of the executable inside the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
}

impl ToolSpec {
    /// Creates a validated `ToolSpec` without release information.
    ///
    /// # Errors
    /// Returns an error if the name is empty or contains a path separator,
    /// the version is not semver, or the cache root name is not a single relative component.
    pub fn new(name: &str, version: &str, cache_root_name: &str) -> Result<ToolSpec> {
        let spec = ToolSpec {
            name: name.to_string(),
            version: version.to_string(),
            cache_root_name: cache_root_name.to_string(),
            version_args: Vec::new(),
            release: None,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Attaches release naming used when the tool has to be downloaded.
    pub fn with_release(mut self, mut release: ReleaseAsset) -> ToolSpec {
        release.sha256 = release.sha256.map(|hash| format_hash(&hash));
        self.release = Some(release);
        self
    }

    /// Sets the arguments used to check the version of a cached copy.
    pub fn with_version_args<I, S>(mut self, args: I) -> ToolSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.version_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy pinned to another version.
    ///
    /// # Errors
    /// Returns an error if `version` is not a valid semver version.
    pub fn with_version(mut self, version: &str) -> Result<ToolSpec> {
        if !is_valid_version(version) {
            bail!("Invalid version: {}", version);
        }
        self.version = version.to_string();
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn cache_root_name(&self) -> &str {
        &self.cache_root_name
    }

    pub fn release(&self) -> Option<&ReleaseAsset> {
        self.release.as_ref()
    }

    pub fn version_args(&self) -> &[String] {
        &self.version_args
    }

    /// Checks the invariants every `ToolSpec` has to hold.
    ///
    /// # Errors
    /// Returns an error describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("Tool name must not be empty");
        }
        if self.name.contains('/') || self.name.contains('\\') {
            bail!("Tool name must not contain path separators: {}", self.name);
        }
        if !is_valid_version(&self.version) {
            bail!("Invalid version for {}: {}", self.name, self.version);
        }
        let mut components = Path::new(&self.cache_root_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => bail!(
                "Cache root name must be a single relative directory name: {:?}",
                self.cache_root_name
            ),
        }
        if let Some(release) = &self.release {
            if release.url.trim().is_empty() {
                bail!("Release url of {} must not be empty", self.name);
            }
            if let Some(binary) = &release.binary {
                ensure_relative_member(binary)
                    .with_context(|| format!("Invalid release binary for {}", self.name))?;
            }
        }
        Ok(())
    }

    /// Saves the descriptor to the given file path in pretty TOML format.
    ///
    /// # Errors
    /// Returns an error if the file can't be written or serialization fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Loads and validates a descriptor from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file can't be read, deserialized or fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ToolSpec> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read tool descriptor {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid tool descriptor {}", path.display()))
    }
}
