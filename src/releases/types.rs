//! JSON model of the release catalog

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Catalog versions keyed by their original version string, in catalog order
pub type ProductVersionsMap = IndexMap<String, ProductVersion>;

/// `GET {base}/{product}/index.json`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProductIndex {
    pub name: String,
    #[serde(default)]
    pub versions: ProductVersionsMap,
}

/// One version of a product and its downloadable builds
///
/// `GET {base}/{product}/{version}/index.json`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct ProductVersion {
    pub name: String,
    pub version: String,
    #[serde(default, rename = "shasums", skip_serializing_if = "String::is_empty")]
    pub shasums: String,
    #[serde(
        default,
        rename = "shasums_signature",
        skip_serializing_if = "String::is_empty"
    )]
    pub shasums_signature: String,
    #[serde(
        default,
        rename = "shasums_signatures",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub shasums_signatures: Vec<String>,
    #[serde(default)]
    pub builds: Vec<ProductBuild>,
}

impl ProductVersion {
    pub fn build_for(&self, os: &str, arch: &str) -> Option<&ProductBuild> {
        self.builds.iter().find(|b| b.os == os && b.arch == arch)
    }

    /// Signature filenames declared for the checksum manifest
    pub fn signature_filenames(&self) -> Vec<&str> {
        if self.shasums_signatures.is_empty() {
            if self.shasums_signature.is_empty() {
                return Vec::new();
            }
            return vec![self.shasums_signature.as_str()];
        }
        self.shasums_signatures.iter().map(String::as_str).collect()
    }
}

/// An OS/arch-specific archive, e.g. `consul_1.5.1_linux_amd64.zip`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct ProductBuild {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub os: String,
    pub arch: String,
    pub filename: String,
    pub url: String,
}

/// Catalog platform names for the running host
pub fn host_platform() -> (&'static str, &'static str) {
    (
        catalog_os(std::env::consts::OS),
        catalog_arch(std::env::consts::ARCH),
    )
}

fn catalog_os(os: &'static str) -> &'static str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn catalog_arch(arch: &'static str) -> &'static str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}
