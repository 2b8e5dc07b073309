use thiserror::Error;

/// Failure modes of the acquisition engine.
///
/// Checksum mismatches on a *cached* archive are deliberately not an error:
/// they demote the cache entry and force a fresh download instead. The
/// [`Integrity`](AcquireError::Integrity) variant is only produced when a
/// freshly re-downloaded archive still fails verification.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// No release satisfies the given specifier.
    #[error("no Node.js release matches `{0}`")]
    Resolution(String),

    /// A non-success HTTP status while fetching an archive or manifest.
    #[error("could not download {url}: status {status}")]
    Download { url: String, status: u16 },

    /// A freshly downloaded archive does not match the published checksum.
    #[error("checksum mismatch for {name}: got {actual}, expected {expected}")]
    Integrity {
        name: String,
        expected: String,
        actual: String,
    },

    /// The extracted tree does not have the expected shape.
    #[error("unexpected archive layout: {0}")]
    ArchiveLayout(String),

    /// An external tool (e.g. `unzip`) exited unsuccessfully.
    #[error("{program} exited with {status}")]
    Tool {
        program: String,
        status: std::process::ExitStatus,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    /// Whether a later attempt could plausibly succeed.
    ///
    /// Resolution and layout failures are structural: retrying cannot fix a
    /// specifier that matches nothing or a tarball with the wrong shape.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquireError::Download { .. }
            | AcquireError::Integrity { .. }
            | AcquireError::Tool { .. }
            | AcquireError::Http(_)
            | AcquireError::Io(_) => true,
            AcquireError::Resolution(_) | AcquireError::ArchiveLayout(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_is_retryable() {
        let err = AcquireError::Download {
            url: "https://nodejs.org/x".to_string(),
            status: 503,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_structural_errors_are_not_retryable() {
        assert!(!AcquireError::Resolution("99.99.99".to_string()).is_retryable());
        assert!(!AcquireError::ArchiveLayout("2 top-level directories".to_string()).is_retryable());
    }
}
