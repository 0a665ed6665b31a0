//! Release catalog served by mockito

use std::io::{Cursor, Write};

use mockito::{Mock, Server, ServerGuard};
use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;

use hc_install::releases::types::host_platform;

use super::TRUSTED_SIGNATURE;

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A product catalog with signed checksum manifests for the host platform
///
/// Mocks stay registered for as long as the fixture lives.
pub struct CatalogFixture {
    pub server: ServerGuard,
    pub product: String,
    mocks: Vec<Mock>,
}

impl CatalogFixture {
    pub async fn new(product: &str) -> Self {
        Self {
            server: Server::new_async().await,
            product: product.to_string(),
            mocks: Vec::new(),
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    pub fn binary_name(&self) -> String {
        format!("{}{}", self.product, std::env::consts::EXE_SUFFIX)
    }

    fn archive_name(&self, version: &str) -> String {
        let (os, arch) = host_platform();
        format!("{}_{}_{}_{}.zip", self.product, version, os, arch)
    }

    fn version_json(&self, version: &str) -> serde_json::Value {
        let (os, arch) = host_platform();
        let filename = self.archive_name(version);
        serde_json::json!({
            "name": self.product,
            "version": version,
            "shasums": format!("{}_{}_SHA256SUMS", self.product, version),
            "shasums_signatures": [
                format!("{}_{}_SHA256SUMS.72D7468F.sig", self.product, version),
                format!("{}_{}_SHA256SUMS.sig", self.product, version),
            ],
            "builds": [{
                "name": self.product,
                "version": version,
                "os": os,
                "arch": arch,
                "filename": filename,
                "url": format!("{}/{}/{}/{}", self.url(), self.product, version, filename),
            }]
        })
    }

    async fn mock_get(&mut self, path: String, content_type: &str, body: Vec<u8>) {
        let mock = self
            .server
            .mock("GET", path.as_str())
            .with_status(200)
            .with_header("content-type", content_type)
            .with_body(body)
            .create_async()
            .await;
        self.mocks.push(mock);
    }

    /// Serve `{product}/index.json` listing `versions`
    pub async fn index(&mut self, versions: &[&str]) {
        let versions: serde_json::Map<String, serde_json::Value> = versions
            .iter()
            .map(|v| (v.to_string(), self.version_json(v)))
            .collect();
        let body = serde_json::json!({ "name": self.product, "versions": versions });
        self.mock_get(
            format!("/{}/index.json", self.product),
            "application/json",
            body.to_string().into_bytes(),
        )
        .await;
    }

    /// Serve the manifest, archive, and checksum files of one version
    ///
    /// The manifest lists the SHA-256 of `listed_archive`, while `served_archive`
    /// is what the download actually returns.
    pub async fn release_with(
        &mut self,
        version: &str,
        listed_archive: &[u8],
        served_archive: Vec<u8>,
        signature: &[u8],
    ) {
        let product = self.product.clone();
        let filename = self.archive_name(version);

        let manifest = self.version_json(version).to_string().into_bytes();
        self.mock_get(
            format!("/{}/{}/index.json", product, version),
            "application/json",
            manifest,
        )
        .await;

        let sums = format!("{}  {}\n", hex::encode(Sha256::digest(listed_archive)), filename);
        self.mock_get(
            format!("/{}/{}/{}_{}_SHA256SUMS", product, version, product, version),
            "text/plain",
            sums.into_bytes(),
        )
        .await;
        self.mock_get(
            format!("/{}/{}/{}_{}_SHA256SUMS.72D7468F.sig", product, version, product, version),
            "application/octet-stream",
            signature.to_vec(),
        )
        .await;
        self.mock_get(
            format!("/{}/{}/{}", product, version, filename),
            "application/zip",
            served_archive,
        )
        .await;
    }

    /// Serve an intact, correctly signed release whose binary contains `body`
    pub async fn release(&mut self, version: &str, body: &[u8]) {
        let archive = zip_bytes(&[
            (self.binary_name().as_str(), body),
            ("LICENSE.txt", b"license text"),
        ]);
        self.release_with(version, &archive, archive.clone(), TRUSTED_SIGNATURE)
            .await;
    }
}
