use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use directories::ProjectDirs;

use crate::resolver::Platform;

/// Architecture component of cache names. Only x64 archives are distributed
/// for every supported platform, so this is fixed for now.
pub const ARCH: &str = "x64";

/// Deterministic addressing for one (version, platform, arch) artifact.
///
/// Identical keys always produce identical directory names, so concurrent
/// invocations for different versions never collide on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Release tag including the `v` prefix, e.g. `v18.19.0`.
    pub version: String,
    pub platform: Platform,
}

impl CacheKey {
    pub fn new(version: impl Into<String>, platform: Platform) -> Self {
        CacheKey {
            version: version.into(),
            platform,
        }
    }

    /// Name of the extracted top-level directory, e.g. `node-v18.19.0-linux-x64`.
    pub fn dir_name(&self) -> String {
        format!(
            "node-{}-{}-{}",
            self.version,
            self.platform.dist_name(),
            ARCH
        )
    }

    /// Name of the archive file, e.g. `node-v18.19.0-linux-x64.tar.gz`.
    pub fn archive_name(&self) -> String {
        format!("{}.{}", self.dir_name(), self.platform.archive_ext())
    }
}

/// On-disk locations of the two artifacts a cache key can hold.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub archive_path: PathBuf,
    pub binary_path: PathBuf,
}

impl CacheEntry {
    pub fn at(root: &Path, key: &CacheKey) -> Self {
        CacheEntry {
            archive_path: root.join(key.archive_name()),
            binary_path: root.join(key.dir_name()).join(key.platform.exe_relpath()),
        }
    }

    /// A cache hit requires the file to exist *and* be non-empty; a zero-byte
    /// file is what an interrupted first write leaves behind.
    pub fn has_archive(&self) -> bool {
        is_nonempty_file(&self.archive_path)
    }

    pub fn has_binary(&self) -> bool {
        is_nonempty_file(&self.binary_path)
    }
}

pub(crate) fn is_nonempty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// The per-user cache directory used when the caller does not pass one.
pub fn default_cache_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("org", "nodesea", "nodesea")
        .ok_or_else(|| anyhow!("could not determine a user cache directory"))?;
    Ok(proj_dirs.cache_dir().join("runtimes"))
}

/// Wipe and recreate a cache directory.
pub fn clean_cache(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)
}
