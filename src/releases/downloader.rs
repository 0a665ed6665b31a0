//! Download, verify, and unpack a product build

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{DownloadError, Error};
use crate::releases::archive::{Extraction, LICENSE_FILES, copy_license_files, extract_zip};
use crate::releases::checksum::{ChecksumDownloader, ChecksumMap};
use crate::releases::client::ReleasesClient;
use crate::releases::signature::SignatureVerifier;
use crate::releases::types::{ProductVersion, host_platform};

const ARCHIVE_CONTENT_TYPES: &[&str] = &["application/zip", "application/octet-stream"];

/// Whether downloaded archives are checked against the signed manifest
#[derive(Clone, Copy)]
pub enum Verification<'a> {
    Verify {
        verifier: &'a dyn SignatureVerifier,
        key_id: &'a str,
    },
    Skip,
}

/// Cancels an extraction still running when the awaiting future is dropped
struct CancelOnDrop(Option<Extraction>);

impl CancelOnDrop {
    fn disarm(mut self) -> Vec<PathBuf> {
        self.0.take().map(|e| e.take_written()).unwrap_or_default()
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(extraction) = self.0.take() {
            debug!("cancelling unfinished extraction");
            extraction.cancel();
        }
    }
}

pub struct Downloader<'a> {
    pub client: &'a ReleasesClient,
    pub verification: Verification<'a>,
}

impl Downloader<'_> {
    /// Download the build of `pv` for the running host into `dst_dir`
    ///
    /// The archive digest is compared before anything is extracted.
    /// `binary_name` must be present in the archive and is made executable;
    /// its path is returned. Every extracted entry, created directory and
    /// copied license file is pushed to `written` as soon as it exists, so
    /// the caller can remove them whether or not unpacking succeeds.
    pub async fn download_and_unpack(
        &self,
        pv: &ProductVersion,
        dst_dir: &Path,
        binary_name: &str,
        license_dir: Option<&Path>,
        written: &mut Vec<PathBuf>,
    ) -> Result<PathBuf, Error> {
        let (os, arch) = host_platform();
        self.download_and_unpack_for(pv, (os, arch), dst_dir, binary_name, license_dir, written)
            .await
    }

    pub(crate) async fn download_and_unpack_for(
        &self,
        pv: &ProductVersion,
        (os, arch): (&str, &str),
        dst_dir: &Path,
        binary_name: &str,
        license_dir: Option<&Path>,
        written: &mut Vec<PathBuf>,
    ) -> Result<PathBuf, Error> {
        if pv.builds.is_empty() {
            return Err(DownloadError::NoBuilds {
                product: pv.name.clone(),
                version: pv.version.clone(),
            }
            .into());
        }

        let build = pv
            .build_for(os, arch)
            .ok_or_else(|| DownloadError::NoBuildForPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })?;

        let checksums = match self.verification {
            Verification::Verify { verifier, key_id } => {
                let downloader = ChecksumDownloader {
                    client: self.client.http(),
                    base_url: self.client.base_url(),
                    verifier,
                    key_id,
                };
                Some(downloader.download_and_verify(pv).await?)
            }
            Verification::Skip => {
                warn!("checksum verification disabled for {}", build.filename);
                None
            }
        };

        let archive = self
            .fetch_archive(&build.url, &build.filename, checksums.as_ref())
            .await?;

        let extraction = Extraction::new();
        let guard = CancelOnDrop(Some(extraction.clone()));
        let archive_path = archive.path().to_path_buf();
        let dest = dst_dir.to_path_buf();
        let extracted =
            tokio::task::spawn_blocking(move || extract_zip(&archive_path, &dest, &extraction))
                .await;
        let executable = dst_dir.join(binary_name);
        let extracted_paths = guard.disarm();
        let has_binary = extracted_paths.contains(&executable);
        debug!("{} paths unpacked into {}", extracted_paths.len(), dst_dir.display());
        written.extend(extracted_paths);
        extracted.map_err(|e| Error::Io(std::io::Error::other(e)))??;
        drop(archive);

        if let Some(license_dir) = license_dir {
            copy_license_files(dst_dir, license_dir, LICENSE_FILES, written)?;
        }

        if !has_binary {
            return Err(DownloadError::MissingBinary(executable).into());
        }
        make_executable(&executable)?;

        Ok(executable)
    }

    /// Stream the archive into a temporary file, hashing as it arrives
    async fn fetch_archive(
        &self,
        url: &str,
        filename: &str,
        checksums: Option<&ChecksumMap>,
    ) -> Result<tempfile::NamedTempFile, Error> {
        debug!("downloading archive from {}", url);
        let response = self
            .client
            .http()
            .get(url)
            .send()
            .await
            .map_err(DownloadError::from)?;

        let status = response.status();
        if !status.is_success() {
            warn!("archive host returned status {}: {}", status, url);
            return Err(DownloadError::UnexpectedStatus(status.as_u16()).into());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !ARCHIVE_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(DownloadError::UnexpectedContentType(content_type).into());
        }

        let expected_len = response.content_length();

        let tmp = tempfile::Builder::new()
            .prefix(filename)
            .tempfile()?;
        let mut file = tokio::fs::File::from_std(tmp.reopen()?);
        let mut hasher = Sha256::new();
        let mut received: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(DownloadError::from)?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
        }
        file.flush().await?;
        debug!("copied {} bytes to {}", received, tmp.path().display());

        check_content_length(expected_len, received)?;

        if let Some(checksums) = checksums {
            debug!("calculating checksum of {:?}", filename);
            checksums.verify_digest(filename, &hasher.finalize())?;
        }

        Ok(tmp)
    }
}

/// A declared length that differs from what arrived means a truncated archive
fn check_content_length(expected: Option<u64>, received: u64) -> Result<(), DownloadError> {
    match expected {
        Some(expected) if expected != received => Err(DownloadError::SizeMismatch {
            downloaded: received,
            expected,
        }),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
