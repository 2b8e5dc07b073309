use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use semver::{Version, VersionReq};
use serde::Deserialize;
use url::Url;

use crate::error::AcquireError;

/// Default distribution mirror. Overridable via [`crate::Acquirer::with_mirror`].
pub const DEFAULT_MIRROR: &str = "https://nodejs.org";

static NIGHTLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-nightly\d+").expect("nightly pattern is valid"));

/// A classified version specifier.
///
/// The raw input is either a `file://` URL pointing at a local tarball, a
/// nightly build tag (resolved verbatim, no index lookup), an exact version,
/// or a semver range resolved against the remote release index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    LocalFile(PathBuf),
    Nightly(String),
    Exact(Version),
    Range(VersionReq),
}

impl Specifier {
    /// Classify a raw specifier string.
    ///
    /// Nightly tags are checked before semver parsing: `20.0.0-nightly202401`
    /// is a valid semver pre-release string, but must resolve against the
    /// nightly distribution path rather than the release index.
    pub fn parse(raw: &str) -> Result<Self, AcquireError> {
        let raw = raw.trim();
        if let Ok(url) = Url::parse(raw) {
            if url.scheme() == "file" {
                let path = url.to_file_path().map_err(|()| {
                    AcquireError::Resolution(format!("invalid file URL `{raw}`"))
                })?;
                return Ok(Specifier::LocalFile(path));
            }
        }
        if NIGHTLY.is_match(raw) {
            return Ok(Specifier::Nightly(raw.to_string()));
        }
        if let Ok(version) = Version::parse(raw.trim_start_matches('v')) {
            return Ok(Specifier::Exact(version));
        }
        match VersionReq::parse(raw) {
            Ok(req) => Ok(Specifier::Range(req)),
            Err(_) => Err(AcquireError::Resolution(format!(
                "`{raw}` is not a version, range, nightly tag or file URL"
            ))),
        }
    }
}

/// A concrete release, derived once per invocation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    /// Release tag, e.g. `v18.19.0` or `v20.0.0-nightly202401`.
    pub version: String,
    /// Directory URL holding the archives and `SHASUMS256.txt` for this release.
    pub base_url: String,
}

#[derive(Deserialize)]
struct IndexEntry {
    version: String,
}

/// Resolve a (non-local) specifier to a concrete release.
///
/// Exact versions and nightly tags resolve without any network access;
/// only ranges consult the remote release index.
pub async fn resolve(
    client: &reqwest::Client,
    mirror: &str,
    spec: &Specifier,
) -> Result<ResolvedRelease, AcquireError> {
    match spec {
        Specifier::LocalFile(path) => Err(AcquireError::Resolution(format!(
            "local archive {} does not resolve to a release",
            path.display()
        ))),
        Specifier::Nightly(tag) => {
            let version = if tag.starts_with('v') {
                tag.clone()
            } else {
                format!("v{tag}")
            };
            let base_url = format!("{mirror}/download/nightly/{version}");
            Ok(ResolvedRelease { version, base_url })
        }
        Specifier::Exact(version) => {
            let version = format!("v{version}");
            let base_url = format!("{mirror}/download/release/{version}");
            Ok(ResolvedRelease { version, base_url })
        }
        Specifier::Range(req) => {
            let version = resolve_range(client, mirror, req).await?;
            let version = format!("v{version}");
            let base_url = format!("{mirror}/download/release/{version}");
            Ok(ResolvedRelease { version, base_url })
        }
    }
}

/// Pick the highest released version matching `req` from the remote index.
async fn resolve_range(
    client: &reqwest::Client,
    mirror: &str,
    req: &VersionReq,
) -> Result<Version, AcquireError> {
    let url = format!("{mirror}/download/release/index.json");
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(AcquireError::Download {
            url,
            status: response.status().as_u16(),
        });
    }
    let entries: Vec<IndexEntry> = response.json().await?;
    entries
        .iter()
        .filter_map(|e| Version::parse(e.version.trim_start_matches('v')).ok())
        .filter(|v| req.matches(v))
        .max()
        .ok_or_else(|| AcquireError::Resolution(req.to_string()))
}

/// Target platform, as the caller names it (`linux`, `darwin`, `win32`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Darwin,
    Win32,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::Darwin,
            "windows" => Platform::Win32,
            _ => Platform::Linux,
        }
    }

    /// The platform component of distribution archive names (`win32` differs).
    pub fn dist_name(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
            Platform::Win32 => "win",
        }
    }

    pub fn archive_ext(self) -> &'static str {
        match self {
            Platform::Win32 => "zip",
            _ => "tar.gz",
        }
    }

    /// Path of the runtime binary relative to the extracted top-level directory.
    pub fn exe_relpath(self) -> PathBuf {
        match self {
            Platform::Win32 => PathBuf::from("node.exe"),
            _ => PathBuf::from("bin").join("node"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Platform::Linux),
            "darwin" | "macos" => Ok(Platform::Darwin),
            "win32" | "windows" => Ok(Platform::Win32),
            other => Err(format!(
                "unknown platform `{other}` (expected linux, darwin or win32)"
            )),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
            Platform::Win32 => "win32",
        };
        write!(f, "{name}")
    }
}
