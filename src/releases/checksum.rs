//! Signed checksum manifests
//!
//! The manifest signature is verified before the manifest is parsed, so a
//! tampered manifest can only ever fail verification, never yield a digest.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::VerifyError;
use crate::releases::signature::SignatureVerifier;
use crate::releases::types::ProductVersion;

/// Size in bytes of a SHA-256 digest
pub const SHA256_SIZE: usize = 32;

/// A decoded SHA-256 digest
#[derive(Clone, PartialEq, Eq)]
pub struct HashSum(Vec<u8>);

impl HashSum {
    pub fn from_hex(digest: &str) -> Result<Self, VerifyError> {
        let bytes = hex::decode(digest).map_err(|source| VerifyError::InvalidHex {
            digest: digest.to_string(),
            source,
        })?;
        if bytes.len() != SHA256_SIZE {
            return Err(VerifyError::InvalidDigestLength {
                actual: bytes.len(),
                expected: SHA256_SIZE,
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HashSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for HashSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashSum({})", self)
    }
}

/// Verified mapping from archive filename to expected digest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChecksumMap {
    sums: HashMap<String, HashSum>,
}

impl ChecksumMap {
    /// Parse `<hex digest> <filename>` lines; blank lines are ignored
    pub fn parse(manifest: &str) -> Result<Self, VerifyError> {
        let mut sums = HashMap::new();

        for line in manifest.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let [digest, filename] = parts.as_slice() else {
                return Err(VerifyError::MalformedLine(line.to_string()));
            };
            sums.insert(filename.to_string(), HashSum::from_hex(digest)?);
        }

        Ok(Self { sums })
    }

    pub fn get(&self, filename: &str) -> Option<&HashSum> {
        self.sums.get(filename)
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Hash everything `reader` yields and compare it with the entry for `filename`
    pub fn verify(&self, filename: &str, mut reader: impl Read) -> Result<(), VerifyError> {
        let mut hasher = Sha256::new();
        std::io::copy(&mut reader, &mut hasher)?;
        self.verify_digest(filename, &hasher.finalize())
    }

    /// Compare an already calculated digest with the entry for `filename`
    pub fn verify_digest(&self, filename: &str, calculated: &[u8]) -> Result<(), VerifyError> {
        let expected = self
            .get(filename)
            .ok_or_else(|| VerifyError::MissingChecksum(filename.to_string()))?;

        if expected.as_bytes() != calculated {
            return Err(VerifyError::ChecksumMismatch {
                expected: expected.to_string(),
                calculated: hex::encode(calculated),
            });
        }

        debug!("checksum matches: {:?}", expected.to_string());
        Ok(())
    }
}

/// Picks the manifest signature file, preferring one qualified with `key_id`
pub fn find_signature_filename<'a>(
    pv: &'a ProductVersion,
    key_id: &str,
) -> Result<&'a str, VerifyError> {
    let files = pv.signature_filenames();
    let qualified = format!("_SHA256SUMS.{}.sig", key_id);

    files
        .iter()
        .find(|f| f.ends_with(&qualified))
        .or_else(|| files.iter().find(|f| f.ends_with("_SHA256SUMS.sig")))
        .copied()
        .ok_or(VerifyError::NoSignatureFile)
}

/// Downloads and verifies the checksum manifest of one product version
pub struct ChecksumDownloader<'a> {
    pub client: &'a reqwest::Client,
    pub base_url: &'a str,
    pub verifier: &'a dyn SignatureVerifier,
    pub key_id: &'a str,
}

impl ChecksumDownloader<'_> {
    pub async fn download_and_verify(&self, pv: &ProductVersion) -> Result<ChecksumMap, VerifyError> {
        let sig_filename = find_signature_filename(pv, self.key_id)?;

        let signature = self.fetch(pv, sig_filename).await?;
        let manifest = self.fetch(pv, &pv.shasums).await?;

        self.verifier.verify(&manifest, &signature)?;
        debug!("signature of {} verified", pv.shasums);

        let text = String::from_utf8_lossy(&manifest);
        let sums = ChecksumMap::parse(&text)?;
        debug!("{} checksums loaded from {}", sums.len(), pv.shasums);
        Ok(sums)
    }

    async fn fetch(&self, pv: &ProductVersion, filename: &str) -> Result<Vec<u8>, VerifyError> {
        let url = format!("{}/{}/{}/{}", self.base_url, pv.name, pv.version, filename);
        debug!("downloading {}", url);

        let fetch_err = |source| VerifyError::Fetch {
            url: url.clone(),
            source,
        };
        let response = self.client.get(&url).send().await.map_err(fetch_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.clone(),
            });
        }

        let bytes = response.bytes().await.map_err(fetch_err)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::releases::signature::MockSignatureVerifier;
    use mockito::Server;
    use rstest::rstest;

    // SHA-256 of "hello world"
    const HELLO_SUM: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn manifest() -> String {
        format!(
            "{}  terraform_1.0.0_linux_amd64.zip\n\n{}  terraform_1.0.0_darwin_arm64.zip\n",
            HELLO_SUM,
            "0".repeat(64)
        )
    }

    #[test]
    fn verify_accepts_matching_content() {
        let sums = ChecksumMap::parse(&manifest()).unwrap();

        assert_eq!(sums.len(), 2);
        sums.verify("terraform_1.0.0_linux_amd64.zip", &b"hello world"[..])
            .unwrap();
    }

    #[test]
    fn verify_rejects_single_byte_change_with_both_digests() {
        let sums = ChecksumMap::parse(&manifest()).unwrap();

        let err = sums
            .verify("terraform_1.0.0_linux_amd64.zip", &b"hello worle"[..])
            .unwrap_err();

        let VerifyError::ChecksumMismatch {
            expected,
            calculated,
        } = &err
        else {
            panic!("expected checksum mismatch, got {err:?}");
        };
        assert_eq!(expected, HELLO_SUM);
        assert_ne!(calculated, HELLO_SUM);
        assert!(err.to_string().contains(HELLO_SUM));
    }

    #[test]
    fn verify_rejects_unknown_filename() {
        let sums = ChecksumMap::parse(&manifest()).unwrap();

        let result = sums.verify("other.zip", &b"hello world"[..]);
        assert!(matches!(result, Err(VerifyError::MissingChecksum(_))));
    }

    #[rstest]
    #[case("abcd file.zip")]
    #[case("zz  file.zip")]
    #[case("only-one-field")]
    #[case("aa bb cc")]
    fn parse_rejects_malformed_manifests(#[case] manifest: &str) {
        assert!(ChecksumMap::parse(manifest).is_err());
    }

    #[test]
    fn parse_rejects_digest_of_wrong_length() {
        let result = ChecksumMap::parse(&format!("{}  file.zip", "ab".repeat(20)));
        assert!(matches!(
            result,
            Err(VerifyError::InvalidDigestLength {
                actual: 20,
                expected: 32
            })
        ));
    }

    #[rstest]
    #[case(vec!["p_1.0.0_SHA256SUMS.sig", "p_1.0.0_SHA256SUMS.72D7468F.sig"], Ok("p_1.0.0_SHA256SUMS.72D7468F.sig"))]
    #[case(vec!["p_1.0.0_SHA256SUMS.sig"], Ok("p_1.0.0_SHA256SUMS.sig"))]
    #[case(vec!["p_1.0.0_SHA256SUMS.DEADBEEF.sig"], Err(()))]
    #[case(vec![], Err(()))]
    fn find_signature_filename_prefers_key_qualified(
        #[case] files: Vec<&str>,
        #[case] expected: Result<&str, ()>,
    ) {
        let pv = ProductVersion {
            shasums_signatures: files.into_iter().map(String::from).collect(),
            ..Default::default()
        };

        assert_eq!(
            find_signature_filename(&pv, "72D7468F").map_err(|_| ()),
            expected
        );
    }

    fn product_version() -> ProductVersion {
        ProductVersion {
            name: "terraform".to_string(),
            version: "1.0.0".to_string(),
            shasums: "terraform_1.0.0_SHA256SUMS".to_string(),
            shasums_signature: "terraform_1.0.0_SHA256SUMS.sig".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn download_and_verify_checks_signature_over_exact_manifest_bytes() {
        let mut server = Server::new_async().await;
        let manifest = manifest();

        let sums_mock = server
            .mock("GET", "/terraform/1.0.0/terraform_1.0.0_SHA256SUMS")
            .with_status(200)
            .with_body(&manifest)
            .create_async()
            .await;
        let sig_mock = server
            .mock("GET", "/terraform/1.0.0/terraform_1.0.0_SHA256SUMS.sig")
            .with_status(200)
            .with_body("signature")
            .create_async()
            .await;

        let expected_manifest = manifest.clone().into_bytes();
        let mut verifier = MockSignatureVerifier::new();
        verifier
            .expect_verify()
            .withf(move |message, signature| {
                message == expected_manifest.as_slice() && signature == b"signature"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let client = reqwest::Client::new();
        let base_url = server.url();
        let downloader = ChecksumDownloader {
            client: &client,
            base_url: &base_url,
            verifier: &verifier,
            key_id: "72D7468F",
        };
        let sums = downloader
            .download_and_verify(&product_version())
            .await
            .unwrap();

        sums_mock.assert_async().await;
        sig_mock.assert_async().await;
        assert!(sums.get("terraform_1.0.0_linux_amd64.zip").is_some());
    }

    #[tokio::test]
    async fn download_and_verify_fails_before_parsing_on_bad_signature() {
        let mut server = Server::new_async().await;

        // Not a valid manifest: parsing it would fail with MalformedLine
        let _sums_mock = server
            .mock("GET", "/terraform/1.0.0/terraform_1.0.0_SHA256SUMS")
            .with_status(200)
            .with_body("forged manifest that would not parse")
            .create_async()
            .await;
        let _sig_mock = server
            .mock("GET", "/terraform/1.0.0/terraform_1.0.0_SHA256SUMS.sig")
            .with_status(200)
            .with_body("tampered")
            .create_async()
            .await;

        let mut verifier = MockSignatureVerifier::new();
        verifier
            .expect_verify()
            .returning(|_, _| Err(VerifyError::BadSignature("invalid signature".to_string())));

        let client = reqwest::Client::new();
        let base_url = server.url();
        let downloader = ChecksumDownloader {
            client: &client,
            base_url: &base_url,
            verifier: &verifier,
            key_id: "72D7468F",
        };
        let result = downloader.download_and_verify(&product_version()).await;

        assert!(matches!(result, Err(VerifyError::BadSignature(_))));
    }

    #[tokio::test]
    async fn download_and_verify_fails_without_signature_file() {
        let server = Server::new_async().await;
        let verifier = MockSignatureVerifier::new();

        let client = reqwest::Client::new();
        let base_url = server.url();
        let downloader = ChecksumDownloader {
            client: &client,
            base_url: &base_url,
            verifier: &verifier,
            key_id: "72D7468F",
        };
        let pv = ProductVersion {
            shasums_signature: String::new(),
            ..product_version()
        };

        let result = downloader.download_and_verify(&pv).await;
        assert!(matches!(result, Err(VerifyError::NoSignatureFile)));
    }
}
