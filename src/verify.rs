use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::AcquireError;

/// Result of checking a cached archive against the published manifest.
///
/// `Mismatch` and `Unverifiable` both demote the archive to untrusted, but
/// they are distinct outcomes: one means the bytes are wrong, the other means
/// we could not tell. Callers log them differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Mismatch { expected: String, actual: String },
    Unverifiable(String),
}

/// Check `archive_path` against the digest published for `archive_name`.
///
/// The manifest fetch and the local digest run concurrently and are always
/// both awaited before comparison. The manifest is fetched fresh every time;
/// it is never cached, since a release's manifest can be republished.
pub async fn verify_archive(
    client: &reqwest::Client,
    manifest_url: &str,
    archive_path: &Path,
    archive_name: &str,
) -> VerifyOutcome {
    let (expected, actual) = tokio::join!(
        fetch_expected_digest(client, manifest_url, archive_name),
        file_sha256(archive_path),
    );
    let expected = match expected {
        Ok(Some(digest)) => digest,
        Ok(None) => {
            return VerifyOutcome::Unverifiable(format!(
                "no entry for {archive_name} in {manifest_url}"
            ));
        }
        Err(err) => return VerifyOutcome::Unverifiable(err.to_string()),
    };
    let actual = match actual {
        Ok(digest) => digest,
        Err(err) => {
            return VerifyOutcome::Unverifiable(format!("could not hash local archive: {err}"));
        }
    };
    if expected.eq_ignore_ascii_case(&actual) {
        VerifyOutcome::Verified
    } else {
        VerifyOutcome::Mismatch { expected, actual }
    }
}

async fn fetch_expected_digest(
    client: &reqwest::Client,
    manifest_url: &str,
    archive_name: &str,
) -> Result<Option<String>, AcquireError> {
    let response = client.get(manifest_url).send().await?;
    if !response.status().is_success() {
        return Err(AcquireError::Download {
            url: manifest_url.to_string(),
            status: response.status().as_u16(),
        });
    }
    let text = response.text().await?;
    Ok(digest_for(&text, archive_name))
}

/// Scan a `SHASUMS256.txt` body for the entry whose filename matches
/// `archive_name`, returning the leading hex token lowercased.
pub(crate) fn digest_for(manifest: &str, archive_name: &str) -> Option<String> {
    for line in manifest.lines() {
        let line = line.trim();
        if !line.ends_with(archive_name) {
            continue;
        }
        let token = line.split_whitespace().next()?;
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(token.to_ascii_lowercase());
        }
    }
    None
}

/// SHA-256 of a file, streamed in 64 KiB chunks.
pub async fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
