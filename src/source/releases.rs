//! Installing official releases from the catalog

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use semver::Version;
use tracing::{debug, info, warn};

use crate::config::{
    DEFAULT_API_BASE_URL, DEFAULT_INSTALL_TIMEOUT, DEFAULT_LIST_TIMEOUT, DEFAULT_SIGNING_KEY_ID,
    InstallConfig,
};
use crate::error::{CatalogError, Error, ValidationError};
use crate::product::Product;
use crate::releases::enterprise::{EnterpriseOptions, required_metadata};
use crate::releases::{
    Downloader, PgpVerifier, ProductVersion, ReleasesClient, SignatureVerifier, Verification,
};
use crate::source::{InstallDetails, Installable, Lease};
use crate::validate::{is_binary_name_valid, is_product_name_valid};
use crate::version::semver::{cmp_precedence, parse_version, with_metadata};
use crate::version::{MatchCriteria, VersionRequest, find_latest_matching};

/// Settings shared by every release-based source
#[derive(Clone, Default)]
pub struct ReleaseOptions {
    /// Install here instead of a fresh temporary directory
    pub install_dir: Option<PathBuf>,
    /// Bounds catalog lookup, download, and unpack together
    pub timeout: Option<Duration>,
    pub skip_checksum_verification: bool,
    pub armored_public_key: Option<String>,
    pub signing_key_id: Option<String>,
    pub api_base_url: Option<String>,
    pub enterprise: Option<EnterpriseOptions>,
    /// Takes precedence over `armored_public_key`
    pub verifier: Option<Arc<dyn SignatureVerifier>>,
}

impl ReleaseOptions {
    /// Options taken from a loaded configuration file
    pub fn from_config(config: &InstallConfig) -> Self {
        Self {
            install_dir: None,
            timeout: Some(config.timeouts.install()),
            skip_checksum_verification: config.skip_checksum_verification,
            armored_public_key: config.armored_public_key.clone(),
            signing_key_id: Some(config.signing_key_id.clone()),
            api_base_url: Some(config.api_base_url.clone()),
            enterprise: config.enterprise.as_ref().map(|e| EnterpriseOptions {
                meta: e.meta.clone(),
                license_dir: e.license_dir.clone(),
            }),
            verifier: None,
        }
    }

    fn validate(&self, product: &Product) -> Result<(), ValidationError> {
        if !is_product_name_valid(&product.name) {
            return Err(ValidationError::InvalidProductName(product.name.clone()));
        }
        let binary = product.binary_name();
        if !is_binary_name_valid(&binary) {
            return Err(ValidationError::InvalidBinaryName(binary));
        }
        if let Some(enterprise) = &self.enterprise {
            enterprise.validate()?;
        }
        if !self.skip_checksum_verification
            && self.verifier.is_none()
            && self.armored_public_key.is_none()
        {
            return Err(ValidationError::MissingPublicKey);
        }
        Ok(())
    }

    fn client(&self) -> ReleasesClient {
        ReleasesClient::new(self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL))
    }

    fn signature_verifier(&self) -> Result<Option<Arc<dyn SignatureVerifier>>, Error> {
        if self.skip_checksum_verification {
            return Ok(None);
        }
        if let Some(verifier) = &self.verifier {
            return Ok(Some(verifier.clone()));
        }
        let armored = self
            .armored_public_key
            .as_deref()
            .ok_or(ValidationError::MissingPublicKey)?;
        Ok(Some(Arc::new(PgpVerifier::from_armored(armored)?)))
    }

    /// Run `resolve` then download and unpack what it returns, all under one timeout
    ///
    /// On failure everything created so far is removed before returning.
    async fn install_with<F, Fut>(
        &self,
        product: &Product,
        resolve: F,
    ) -> Result<(InstallDetails, Lease), Error>
    where
        F: FnOnce(ReleasesClient) -> Fut,
        Fut: Future<Output = Result<(ProductVersion, ReleasesClient), Error>>,
    {
        let timeout = self.timeout.unwrap_or(DEFAULT_INSTALL_TIMEOUT);
        let mut lease = Lease::new();

        let result = tokio::time::timeout(timeout, self.install_into(product, resolve, &mut lease))
            .await
            .unwrap_or_else(|_| Err(Error::timeout("install", timeout)));

        match result {
            Ok(details) => Ok((details, lease)),
            Err(e) => {
                if let Err(cleanup) = lease.remove().await {
                    warn!("cleanup after failed install of {}: {}", product.name, cleanup);
                }
                Err(e)
            }
        }
    }

    async fn install_into<F, Fut>(
        &self,
        product: &Product,
        resolve: F,
        lease: &mut Lease,
    ) -> Result<InstallDetails, Error>
    where
        F: FnOnce(ReleasesClient) -> Fut,
        Fut: Future<Output = Result<(ProductVersion, ReleasesClient), Error>>,
    {
        let dst_dir = match &self.install_dir {
            Some(dir) => dir.clone(),
            None => {
                let dir = tempfile::Builder::new()
                    .prefix(&format!("{}_", product.name))
                    .tempdir()?
                    .keep();
                lease.push(dir.clone());
                debug!("created new temp dir at {}", dir.display());
                dir
            }
        };
        debug!("will install into dir at {}", dst_dir.display());

        let (pv, client) = resolve(self.client()).await?;

        let verifier = self.signature_verifier()?;
        let key_id = self
            .signing_key_id
            .as_deref()
            .unwrap_or(DEFAULT_SIGNING_KEY_ID);
        let verification = match verifier.as_deref() {
            Some(verifier) => Verification::Verify { verifier, key_id },
            None => Verification::Skip,
        };

        let license_dir = self.enterprise.as_ref().map(|e| e.license_dir.as_path());
        let downloader = Downloader {
            client: &client,
            verification,
        };
        let mut written = Vec::new();
        let result = downloader
            .download_and_unpack(&pv, &dst_dir, &product.binary_name(), license_dir, &mut written)
            .await;
        lease.extend(written);
        let executable = result?;

        info!(
            "installed {} {} to {}",
            product.name,
            pv.version,
            executable.display()
        );
        Ok(InstallDetails {
            product: product.name.clone(),
            executable_path: executable,
            version: parse_version(&pv.version),
        })
    }
}

impl std::fmt::Debug for ReleaseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseOptions")
            .field("install_dir", &self.install_dir)
            .field("timeout", &self.timeout)
            .field("skip_checksum_verification", &self.skip_checksum_verification)
            .field("armored_public_key", &self.armored_public_key.is_some())
            .field("signing_key_id", &self.signing_key_id)
            .field("api_base_url", &self.api_base_url)
            .field("enterprise", &self.enterprise)
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

/// Installs one specific version
#[derive(Debug, Clone)]
pub struct ExactVersion {
    pub product: Product,
    pub version: Version,
    pub options: ReleaseOptions,
}

impl ExactVersion {
    pub fn new(product: Product, version: Version) -> Self {
        Self {
            product,
            version,
            options: ReleaseOptions::default(),
        }
    }

    /// Version as published in the catalog, tagged for enterprise requests
    fn catalog_version(&self) -> Result<Version, Error> {
        let meta = required_metadata(self.options.enterprise.as_ref());
        if meta.is_empty() {
            return Ok(self.version.clone());
        }
        with_metadata(&self.version, &meta).ok_or_else(|| {
            CatalogError::UnsupportedVersion {
                product: self.product.name.clone(),
                version: self.version.to_string(),
                reason: format!("invalid enterprise metadata {:?}", meta),
            }
            .into()
        })
    }
}

#[async_trait::async_trait]
impl Installable for ExactVersion {
    fn validate(&self) -> Result<(), ValidationError> {
        self.options.validate(&self.product)
    }

    async fn install(&self) -> Result<(InstallDetails, Lease), Error> {
        let version = self.catalog_version()?;
        let allow_enterprise = self.options.enterprise.is_some();
        let name = self.product.name.as_str();

        self.options
            .install_with(&self.product, |client| async move {
                let pv = client.get_version(name, &version, allow_enterprise).await?;
                Ok::<_, Error>((pv, client))
            })
            .await
    }
}

/// Installs the newest version satisfying a request
#[derive(Debug, Clone)]
pub struct LatestVersion {
    pub product: Product,
    pub request: VersionRequest,
    pub include_prereleases: bool,
    pub options: ReleaseOptions,
}

impl LatestVersion {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            request: VersionRequest::Latest,
            include_prereleases: false,
            options: ReleaseOptions::default(),
        }
    }
}

#[async_trait::async_trait]
impl Installable for LatestVersion {
    fn validate(&self) -> Result<(), ValidationError> {
        self.options.validate(&self.product)
    }

    async fn install(&self) -> Result<(InstallDetails, Lease), Error> {
        let name = self.product.name.as_str();
        let metadata = required_metadata(self.options.enterprise.as_ref());
        let criteria = MatchCriteria {
            request: &self.request,
            include_prereleases: self.include_prereleases,
            metadata: &metadata,
        };

        self.options
            .install_with(&self.product, |client| async move {
                let versions = client.list_versions(name).await?;
                if versions.is_empty() {
                    return Err(CatalogError::NoVersions(name.to_string()).into());
                }

                let (version, pv) =
                    find_latest_matching(versions.iter().map(|(k, v)| (k.as_str(), v)), criteria)
                        .ok_or_else(|| CatalogError::NoMatchingVersion {
                            product: name.to_string(),
                            request: criteria.request.to_string(),
                        })?;
                debug!("resolved {} {} to {}", name, criteria.request, version);
                Ok::<_, Error>((pv.clone(), client))
            })
            .await
    }
}

/// Lists every catalog version matching a request as installable sources
#[derive(Debug, Clone)]
pub struct Versions {
    pub product: Product,
    pub request: VersionRequest,
    pub include_prereleases: bool,
    pub list_timeout: Option<Duration>,
    /// Copied into every listed source; `timeout` bounds each install
    pub options: ReleaseOptions,
}

impl Versions {
    pub fn new(product: Product, request: VersionRequest) -> Self {
        Self {
            product,
            request,
            include_prereleases: false,
            list_timeout: None,
            options: ReleaseOptions::default(),
        }
    }

    /// Matching versions in ascending order
    pub async fn list(&self) -> Result<Vec<ExactVersion>, Error> {
        if !is_product_name_valid(&self.product.name) {
            return Err(ValidationError::InvalidProductName(self.product.name.clone()).into());
        }

        let timeout = self.list_timeout.unwrap_or(DEFAULT_LIST_TIMEOUT);
        let client = self.options.client();
        let versions = tokio::time::timeout(timeout, client.list_versions(&self.product.name))
            .await
            .map_err(|_| Error::timeout("list", timeout))??;

        let metadata = required_metadata(self.options.enterprise.as_ref());
        let criteria = MatchCriteria {
            request: &self.request,
            include_prereleases: self.include_prereleases,
            metadata: &metadata,
        };

        let mut matching: Vec<Version> = versions
            .keys()
            .filter_map(|raw| parse_version(raw))
            .filter(|v| criteria.accepts(v))
            .collect();
        matching.sort_by(cmp_precedence);

        Ok(matching
            .into_iter()
            .map(|version| ExactVersion {
                product: self.product.clone(),
                // ExactVersion re-applies enterprise metadata itself
                version: Version {
                    build: semver::BuildMetadata::EMPTY,
                    ..version
                },
                options: self.options.clone(),
            })
            .collect())
    }
}
