use std::path::PathBuf;

use crate::error::ValidationError;

/// Request for a commercial build of a product
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnterpriseOptions {
    /// Extra metadata tag, e.g. `hsm` or `fips1402`
    pub meta: Option<String>,
    /// Where license files found in the download are copied
    pub license_dir: PathBuf,
}

impl EnterpriseOptions {
    pub fn new(license_dir: impl Into<PathBuf>) -> Self {
        Self {
            meta: None,
            license_dir: license_dir.into(),
        }
    }

    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    /// Build metadata a catalog entry must carry: `ent` or `ent.<meta>`
    pub fn required_metadata(&self) -> String {
        match self.meta.as_deref() {
            Some(meta) if !meta.is_empty() => format!("ent.{}", meta),
            _ => "ent".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.license_dir.as_os_str().is_empty() {
            return Err(ValidationError::MissingLicenseDir);
        }
        Ok(())
    }
}

/// Metadata expected of catalog entries; community builds carry none
pub fn required_metadata(enterprise: Option<&EnterpriseOptions>) -> String {
    enterprise
        .map(EnterpriseOptions::required_metadata)
        .unwrap_or_default()
}
