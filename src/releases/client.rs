//! Release catalog API client

use reqwest::header::CONTENT_TYPE;
use semver::Version;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{DEFAULT_API_BASE_URL, USER_AGENT};
use crate::error::CatalogError;
use crate::releases::types::{ProductIndex, ProductVersion, ProductVersionsMap};
use crate::version::semver::{metadata, parse_version};

/// Client for the release catalog (`{base}/{product}/index.json` layout)
#[derive(Debug, Clone)]
pub struct ReleasesClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReleasesClient {
    /// Creates a new ReleasesClient with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Lists every supported version of `product`, in catalog order
    ///
    /// Unparsable versions and builds with unsupported metadata are dropped.
    /// A product without versions yields an empty map.
    pub async fn list_versions(&self, product: &str) -> Result<ProductVersionsMap, CatalogError> {
        let url = format!("{}/{}/index.json", self.base_url, product);
        debug!("requesting versions from {}", url);

        let mut index: ProductIndex = self.get_json(&url, product).await?;

        index.versions.retain(|raw, _| match parse_version(raw) {
            Some(v) if is_supported_metadata(metadata(&v)) => true,
            Some(_) => {
                debug!("dropping unsupported build {}", raw);
                false
            }
            None => {
                debug!("dropping unparsable version {:?}", raw);
                false
            }
        });

        debug!("{} versions of {} listed", index.versions.len(), product);
        Ok(index.versions)
    }

    /// Fetches the manifest of one version
    ///
    /// Versions carrying build metadata are rejected unless `allow_enterprise`
    /// is set and the metadata is an enterprise tag.
    pub async fn get_version(
        &self,
        product: &str,
        version: &Version,
        allow_enterprise: bool,
    ) -> Result<ProductVersion, CatalogError> {
        let meta = metadata(version);
        if !meta.is_empty() {
            let reason = if !allow_enterprise {
                Some("enterprise versions are not supported")
            } else if !is_supported_metadata(meta) {
                Some("unsupported build metadata")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(CatalogError::UnsupportedVersion {
                    product: product.to_string(),
                    version: version.to_string(),
                    reason: reason.to_string(),
                });
            }
        }

        let url = format!("{}/{}/{}/index.json", self.base_url, product, version);
        debug!("requesting version from {}", url);

        self.get_json(&url, &format!("{} {}", product, version))
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        subject: &str,
    ) -> Result<T, CatalogError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!("received {}", status);

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(subject.to_string()));
        }

        if !status.is_success() {
            warn!("catalog returned status {}: {}", status, url);
            return Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("application/json") {
            return Err(CatalogError::UnexpectedContentType {
                content_type,
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!("Failed to parse catalog response from {}: {}", url, e);
            CatalogError::InvalidResponse(format!("failed to unmarshal {}: {}", url, e))
        })
    }
}

impl Default for ReleasesClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

/// Community builds carry no metadata; enterprise builds carry `ent` or `ent.<tags>`
pub fn is_supported_metadata(meta: &str) -> bool {
    if meta.is_empty() || meta == "ent" {
        return true;
    }
    match meta.strip_prefix("ent.") {
        Some(tags) => tags.split('.').all(|tag| {
            !tag.is_empty()
                && tag
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        }),
        None => false,
    }
}
