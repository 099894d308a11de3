//! Error taxonomy for the fetch pipeline.
//! Every stage returns one of these; the orchestrator turns them into per-package outcomes.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Failure of one pipeline stage for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// Package name rejected before any network call
    InvalidPackage { package: String, reason: String },
    /// Registry lookup or metadata walk failed
    Resolution { package: String, reason: String },
    /// Tarball transfer or local write failed
    Download { url: String, reason: String },
    /// Tarball could not be unpacked or relocated
    Extraction { path: String, reason: String },
    /// Nothing to zip at the expected path
    MissingSource { path: String },
    /// Zip archive could not be written
    Packaging { path: String, reason: String },
    /// Batch-level filesystem error (e.g. creating node_modules)
    Io { operation: String, path: String, reason: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidPackage { package, reason } => {
                write!(f, "Invalid package name {:?}: {}", package, reason)
            }
            FetchError::Resolution { package, reason } => {
                write!(f, "Failed to resolve {}: {}", package, reason)
            }
            FetchError::Download { url, reason } => {
                write!(f, "Download failed: {} (url: {})", reason, url)
            }
            FetchError::Extraction { path, reason } => {
                write!(f, "Extraction error: {} (path: {})", reason, path)
            }
            FetchError::MissingSource { path } => {
                write!(f, "Nothing to zip, directory does not exist: {}", path)
            }
            FetchError::Packaging { path, reason } => {
                write!(f, "Zip creation failed: {} (path: {})", reason, path)
            }
            FetchError::Io { operation, path, reason } => {
                write!(f, "I/O error in {}: {} (path: {})", operation, reason, path)
            }
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Stable tag used in JSON reports and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidPackage { .. } => "invalid_package",
            FetchError::Resolution { .. } => "resolution",
            FetchError::Download { .. } => "download",
            FetchError::Extraction { .. } => "extraction",
            FetchError::MissingSource { .. } => "missing_source",
            FetchError::Packaging { .. } => "packaging",
            FetchError::Io { .. } => "io",
        }
    }

    pub fn resolution(package: &str, reason: impl ToString) -> Self {
        FetchError::Resolution { package: package.to_string(), reason: reason.to_string() }
    }

    pub fn download(url: &str, reason: impl ToString) -> Self {
        FetchError::Download { url: url.to_string(), reason: reason.to_string() }
    }

    pub fn extraction(path: &Path, reason: impl ToString) -> Self {
        FetchError::Extraction { path: path.display().to_string(), reason: reason.to_string() }
    }

    pub fn packaging(path: &Path, reason: impl ToString) -> Self {
        FetchError::Packaging { path: path.display().to_string(), reason: reason.to_string() }
    }

    pub fn io(operation: &str, path: &Path, source: std::io::Error) -> Self {
        FetchError::Io {
            operation: operation.to_string(),
            path: path.display().to_string(),
            reason: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::resolution("left-pad", "HTTP 404");
        assert_eq!(err.to_string(), "Failed to resolve left-pad: HTTP 404");

        let err = FetchError::MissingSource { path: "out/node_modules/x".to_string() };
        assert!(err.to_string().contains("out/node_modules/x"));
    }

    #[test]
    fn test_error_kind_matches_serde_tag() {
        let err = FetchError::packaging(Path::new("a.zip"), "disk full");
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["kind"], err.kind());
        assert_eq!(v["reason"], "disk full");
    }

    #[test]
    fn test_io_error_keeps_operation() {
        let err = FetchError::io(
            "create node_modules",
            Path::new("/nope"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let s = err.to_string();
        assert!(s.contains("create node_modules"));
        assert!(s.contains("denied"));
        assert_eq!(err.kind(), "io");
    }
}
