//! Error taxonomy for finding, installing, and building products
//!
//! Every failure is either *skippable* (this source could not produce a
//! binary, another one might) or fatal. Only [`Error::Skippable`] lets the
//! installer move on to the next source.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Problems detected before any network or filesystem access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one source is required")]
    NoSources,

    #[error("invalid product name: {0:?}")]
    InvalidProductName(String),

    #[error("invalid binary name: {0:?}")]
    InvalidBinaryName(String),

    #[error("license dir must be provided when requesting enterprise versions")]
    MissingLicenseDir,

    #[error("must use either exact binary path or product + extra paths")]
    MissingLookupTarget,

    #[error("use either exact binary path or product + extra paths, not both")]
    ConflictingLookupTarget,

    #[error("expected exact binary path ({0:?}) to be an absolute path")]
    RelativeExactPath(PathBuf),

    #[error("undeclared version getter for {0:?}")]
    MissingVersionGetter(String),

    #[error("no build instructions for {0:?}")]
    MissingBuildInstructions(String),

    #[error("missing repository URL for {0:?}")]
    MissingRepoUrl(String),

    #[error("no public key configured for checksum signature verification")]
    MissingPublicKey,
}

/// Failures talking to the release catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("unexpected response code ({status}) from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("unexpected content-type {content_type:?} from {url} (expected application/json)")]
    UnexpectedContentType { content_type: String, url: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{product}: cannot obtain {version} ({reason})")]
    UnsupportedVersion {
        product: String,
        version: String,
        reason: String,
    },

    #[error("no versions found for {0:?}")]
    NoVersions(String),

    #[error("no matching version found for {product:?} ({request})")]
    NoMatchingVersion { product: String, request: String },
}

/// Failures while establishing or applying trust in downloaded bytes
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("no suitable sig file found")]
    NoSignatureFile,

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("signature verification failed: {0}")]
    BadSignature(String),

    #[error("unexpected checksum line format: {0:?}")]
    MalformedLine(String),

    #[error("invalid hex digest {digest:?}: {source}")]
    InvalidHex {
        digest: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("unexpected sha256 format (len: {actual}, expected: {expected})")]
    InvalidDigestLength { actual: usize, expected: usize },

    #[error("no checksum found for {0:?}")]
    MissingChecksum(String),

    #[error("checksum mismatch (expected {expected:?}, calculated {calculated:?})")]
    ChecksumMismatch { expected: String, calculated: String },

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response code ({status}) from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures downloading or unpacking an archive
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("no builds found for {product} {version}")]
    NoBuilds { product: String, version: String },

    #[error("no build found for {os}/{arch}")]
    NoBuildForPlatform { os: String, arch: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response code ({0})")]
    UnexpectedStatus(u16),

    #[error("unexpected content-type: {0} (expected application/zip)")]
    UnexpectedContentType(String),

    #[error("unexpected size (downloaded: {downloaded}, expected: {expected})")]
    SizeMismatch { downloaded: u64, expected: u64 },

    #[error("invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive entry {0:?} escapes the destination directory")]
    UnsafeEntry(String),

    #[error("binary {0:?} not found in archive")]
    MissingBinary(PathBuf),

    #[error("extraction cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reasons a single source could not produce a binary
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("no suitable binary {binary:?} found{}", format_reasons(.reasons))]
    NotFound { binary: String, reasons: Vec<String> },

    #[error("{0:?} is not executable")]
    NotExecutable(PathBuf),

    #[error("unable to access {path:?}: {source}")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A path that could not be removed during cleanup
#[derive(Debug, Error)]
#[error("failed to remove {path:?}: {source}")]
pub struct RemoveError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}", format_validation(.0))]
    InvalidSources(Vec<ValidationError>),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Skippable(#[from] SkipReason),

    #[error("{phase} timed out after {timeout:?}")]
    Timeout {
        phase: &'static str,
        timeout: Duration,
    },

    #[error("unable to query version of {path:?}: {message}")]
    VersionQuery { path: PathBuf, message: String },

    #[error("unable to clone {product} from {url:?} @ {reference:?}: {message}")]
    Clone {
        product: String,
        url: String,
        reference: String,
        message: String,
    },

    #[error("build failed: {0}")]
    Build(String),

    #[error("{}", format_exhausted(.tried, .errors))]
    Exhausted { tried: usize, errors: Vec<Error> },

    #[error("{}", format_cleanup(.0))]
    Cleanup(Vec<RemoveError>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the installer may continue with the next source
    pub fn is_skippable(&self) -> bool {
        matches!(self, Error::Skippable(_))
    }

    pub fn timeout(phase: &'static str, timeout: Duration) -> Self {
        Error::Timeout { phase, timeout }
    }
}

fn format_reasons(reasons: &[String]) -> String {
    if reasons.is_empty() {
        return String::new();
    }
    format!(": {}", reasons.join("; "))
}

fn format_list<T: std::fmt::Display>(errors: &[T]) -> String {
    let mut out = format!(
        "{} error{} occurred:",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
    for err in errors {
        let _ = write!(out, "\n\t* {}", err);
    }
    out
}

fn format_validation(errors: &[ValidationError]) -> String {
    format!("invalid sources: {}", format_list(errors))
}

fn format_exhausted(tried: &usize, errors: &[Error]) -> String {
    format!(
        "unable to find, install, or build from {} sources: {}",
        tried,
        format_list(errors)
    )
}

fn format_cleanup(errors: &[RemoveError]) -> String {
    format!("cleanup failed: {}", format_list(errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_skip_reasons_are_skippable() {
        let skippable = Error::from(SkipReason::NotExecutable(PathBuf::from("/bin/x")));
        let fatal = Error::from(VerifyError::BadSignature("bad".to_string()));

        assert!(skippable.is_skippable());
        assert!(!fatal.is_skippable());
        assert!(!Error::timeout("install", Duration::from_secs(1)).is_skippable());
    }

    #[test]
    fn exhausted_message_enumerates_every_reason() {
        let err = Error::Exhausted {
            tried: 2,
            errors: vec![
                SkipReason::NotExecutable(PathBuf::from("/a/terraform")).into(),
                SkipReason::NotExecutable(PathBuf::from("/b/terraform")).into(),
            ],
        };

        assert_eq!(
            err.to_string(),
            "unable to find, install, or build from 2 sources: 2 errors occurred:\n\t* \"/a/terraform\" is not executable\n\t* \"/b/terraform\" is not executable"
        );
    }

    #[test]
    fn not_found_message_includes_per_directory_reasons() {
        let err = SkipReason::NotFound {
            binary: "terraform".to_string(),
            reasons: vec!["/a/terraform: missing".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "no suitable binary \"terraform\" found: /a/terraform: missing"
        );
    }
}
