//! Release catalog access and the download-verify-unpack pipeline
//!
//! This module provides:
//! - `ReleasesClient` for the product index and per-version manifests
//! - `ChecksumDownloader` and `SignatureVerifier` for signed checksum manifests
//! - `Downloader` for fetching and unpacking a host-specific build

pub mod archive;
pub mod checksum;
pub mod client;
pub mod downloader;
pub mod enterprise;
pub mod signature;
pub mod types;

pub use checksum::{ChecksumDownloader, ChecksumMap, HashSum};
pub use client::ReleasesClient;
pub use downloader::{Downloader, Verification};
pub use enterprise::EnterpriseOptions;
pub use signature::{PgpVerifier, SignatureVerifier};
pub use types::{ProductBuild, ProductIndex, ProductVersion, ProductVersionsMap};
