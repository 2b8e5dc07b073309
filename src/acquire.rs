use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheEntry, CacheKey};
use crate::error::AcquireError;
use crate::fetch::{self, SystemTools, ToolRunner};
use crate::resolver::{self, DEFAULT_MIRROR, Platform, ResolvedRelease, Specifier};
use crate::steps::Steps;
use crate::verify::{VerifyOutcome, verify_archive};

/// Re-attempts after a failed remote fetch, before the error is terminal.
pub const DEFAULT_RETRIES: u32 = 2;

/// The narrow slice of caller configuration the engine needs.
#[derive(Debug, Clone)]
pub struct AcquireRequest {
    /// Exact version, semver range, nightly tag, or `file://` URL.
    pub specifier: String,
    /// Cache root; always explicit, the engine reads no ambient state.
    pub cache_dir: PathBuf,
    pub platform: Platform,
    pub retries: u32,
}

impl AcquireRequest {
    pub fn new(specifier: impl Into<String>, cache_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        AcquireRequest {
            specifier: specifier.into(),
            cache_dir: cache_dir.into(),
            platform,
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// The acquisition engine: resolves a specifier, reuses or fills the cache,
/// and returns the path of a ready-to-run `node` binary.
pub struct Acquirer {
    client: reqwest::Client,
    mirror: String,
    tools: Arc<dyn ToolRunner>,
}

impl Acquirer {
    pub fn new() -> Self {
        Self::with_mirror(DEFAULT_MIRROR)
    }

    /// Point at a different distribution mirror (also used by tests to target
    /// a local mock server).
    pub fn with_mirror(mirror: impl Into<String>) -> Self {
        Acquirer {
            client: reqwest::Client::new(),
            mirror: mirror.into().trim_end_matches('/').to_string(),
            tools: Arc::new(SystemTools),
        }
    }

    /// Substitute the external-tool runner (tests pass a fake).
    pub fn tools(mut self, tools: Arc<dyn ToolRunner>) -> Self {
        self.tools = tools;
        self
    }

    /// Resolve a specifier without downloading anything.
    pub async fn resolve(&self, spec: &Specifier) -> Result<ResolvedRelease, AcquireError> {
        resolver::resolve(&self.client, &self.mirror, spec).await
    }

    /// Acquire the runtime for `request`, retrying remote failures up to
    /// `request.retries` times.
    ///
    /// Each attempt re-runs the whole resolve → cache-check → fetch → extract
    /// step, so a later attempt can pick up whatever a partial earlier one
    /// left in the cache. Local `file://` sources are never retried.
    pub async fn acquire(&self, request: &AcquireRequest) -> Result<PathBuf, AcquireError> {
        let steps = Steps::new();
        let spec = Specifier::parse(&request.specifier)?;

        if let Specifier::LocalFile(path) = &spec {
            steps.start(format!(
                "Extracting archive from {} to {}",
                path.display(),
                request.cache_dir.display()
            ));
            let binary =
                fetch::extract_local_archive(path, &request.cache_dir, request.platform).await?;
            steps.done();
            return Ok(binary);
        }

        let mut remaining = request.retries;
        loop {
            match self.attempt(&spec, request, &steps).await {
                Ok(binary) => {
                    steps.done();
                    return Ok(binary);
                }
                Err(err) if remaining > 0 && err.is_retryable() => {
                    steps.fail(&err);
                    log::warn!(
                        "attempt failed ({err}), {remaining} re-attempt(s) left"
                    );
                    remaining -= 1;
                    steps.start("Re-trying");
                }
                Err(err) => {
                    steps.fail(&err);
                    return Err(err);
                }
            }
        }
    }

    /// One full resolution attempt. Nothing in here retries; every failure
    /// surfaces to the loop in [`acquire`](Self::acquire).
    async fn attempt(
        &self,
        spec: &Specifier,
        request: &AcquireRequest,
        steps: &Steps,
    ) -> Result<PathBuf, AcquireError> {
        steps.start(format!(
            "Looking for Node.js version matching \"{}\"",
            request.specifier
        ));
        let release = self.resolve(spec).await?;

        let key = CacheKey::new(release.version.clone(), request.platform);
        let entry = CacheEntry::at(&request.cache_dir, &key);

        // Trust-the-cache: an extracted binary short-circuits everything,
        // including verification. Staleness is the caller's concern.
        if entry.has_binary() {
            return Ok(entry.binary_path.clone());
        }

        let archive_name = key.archive_name();
        let manifest_url = format!("{}/SHASUMS256.txt", release.base_url);
        let mut trusted = entry.has_archive();
        let mut demoted_for_mismatch = false;
        if trusted {
            steps.start(format!("Verifying existing archive via {manifest_url}"));
            match verify_archive(&self.client, &manifest_url, &entry.archive_path, &archive_name)
                .await
            {
                VerifyOutcome::Verified => {}
                VerifyOutcome::Mismatch { expected, actual } => {
                    log::warn!(
                        "checksum mismatch for {archive_name}: got {actual}, expected {expected}; re-downloading"
                    );
                    trusted = false;
                    demoted_for_mismatch = true;
                }
                VerifyOutcome::Unverifiable(reason) => {
                    log::warn!("could not verify {archive_name}: {reason}; re-downloading");
                    trusted = false;
                }
            }
        }

        if trusted {
            steps.start("Unpacking existing archive");
            fetch::extract_cached_archive(&entry, &request.cache_dir, request.platform, &self.tools)
                .await?;
        } else {
            let url = format!("{}/{}", release.base_url, archive_name);
            steps.start(format!("Downloading from {url}"));
            fetch::download_and_extract(
                &self.client,
                &url,
                &entry,
                &request.cache_dir,
                request.platform,
                &self.tools,
            )
            .await?;

            // A cached archive that failed its checksum was replaced; confirm
            // the replacement actually matches the manifest.
            if demoted_for_mismatch {
                steps.start(format!("Re-verifying fresh archive via {manifest_url}"));
                match verify_archive(
                    &self.client,
                    &manifest_url,
                    &entry.archive_path,
                    &archive_name,
                )
                .await
                {
                    VerifyOutcome::Verified => {}
                    VerifyOutcome::Mismatch { expected, actual } => {
                        return Err(AcquireError::Integrity {
                            name: archive_name,
                            expected,
                            actual,
                        });
                    }
                    VerifyOutcome::Unverifiable(reason) => {
                        log::warn!("could not re-verify {archive_name}: {reason}");
                    }
                }
            }
        }

        if !entry.has_binary() {
            return Err(AcquireError::ArchiveLayout(format!(
                "extracted tree is missing {}",
                entry.binary_path.display()
            )));
        }
        Ok(entry.binary_path.clone())
    }
}

impl Default for Acquirer {
    fn default() -> Self {
        Acquirer::new()
    }
}
