//! Building a product from a git revision

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::build::{BuildInstructions, Cloner, DEFAULT_REF, GitCli};
use crate::config::{DEFAULT_BUILD_TIMEOUT, DEFAULT_CLONE_TIMEOUT, DEFAULT_PRE_CLONE_CHECK_TIMEOUT};
use crate::error::{Error, ValidationError};
use crate::product::Product;
use crate::releases::archive::copy_license_files;
use crate::source::{Buildable, InstallDetails, Lease};
use crate::validate::{is_binary_name_valid, is_product_name_valid};

const REPO_LICENSE_FILES: &[&str] = &["LICENSE.txt", "LICENSE"];

/// Clones the product repository at `reference` and builds it
#[derive(Clone)]
pub struct GitRevision {
    pub product: Product,
    pub install_dir: Option<PathBuf>,
    /// Defaults to the install directory
    pub license_dir: Option<PathBuf>,
    /// Branch or tag; `HEAD` when unset
    pub reference: Option<String>,
    pub clone_timeout: Option<Duration>,
    pub build_timeout: Option<Duration>,
    pub cloner: Arc<dyn Cloner>,
}

impl GitRevision {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            install_dir: None,
            license_dir: None,
            reference: None,
            clone_timeout: None,
            build_timeout: None,
            cloner: Arc::new(GitCli),
        }
    }

    fn instructions(&self) -> Result<&BuildInstructions, ValidationError> {
        self.product
            .build_instructions
            .as_ref()
            .ok_or_else(|| ValidationError::MissingBuildInstructions(self.product.name.clone()))
    }

    async fn build_into(&self, lease: &mut Lease) -> Result<PathBuf, Error> {
        let bi = self.instructions()?;
        let name = &self.product.name;

        if let Some(check) = &bi.pre_clone_check {
            let timeout = bi
                .pre_clone_check_timeout
                .unwrap_or(DEFAULT_PRE_CLONE_CHECK_TIMEOUT);
            debug!("running {} pre-clone check (timeout: {:?})", name, timeout);
            tokio::time::timeout(timeout, check.check())
                .await
                .map_err(|_| Error::timeout("pre-clone check", timeout))??;
            debug!("{} pre-clone check finished", name);
        }

        let repo_dir = tempfile::Builder::new()
            .prefix(&format!("hc-install-build-{}", name))
            .tempdir()?
            .keep();
        lease.push(repo_dir.clone());

        let reference = self.reference.as_deref().unwrap_or(DEFAULT_REF);
        let clone_timeout = self
            .clone_timeout
            .or(bi.clone_timeout)
            .unwrap_or(DEFAULT_CLONE_TIMEOUT);
        info!(
            "cloning {} repository from {} to {} (timeout: {:?})",
            name,
            bi.git_repo_url,
            repo_dir.display(),
            clone_timeout
        );
        tokio::time::timeout(
            clone_timeout,
            self.cloner.clone_repo(&bi.git_repo_url, reference, &repo_dir),
        )
        .await
        .map_err(|_| Error::timeout("clone", clone_timeout))?
        .map_err(|e| Error::Clone {
            product: name.clone(),
            url: bi.git_repo_url.clone(),
            reference: reference.to_string(),
            message: e.to_string(),
        })?;
        debug!("cloning {} finished", name);

        let install_dir = match &self.install_dir {
            Some(dir) => dir.clone(),
            None => {
                let dir = tempfile::Builder::new()
                    .prefix(&format!("hc-install-{}-", name))
                    .tempdir()?
                    .keep();
                lease.push(dir.clone());
                dir
            }
        };
        debug!("install dir is {}", install_dir.display());

        let license_dir = self.license_dir.as_deref().unwrap_or(&install_dir);
        let mut copied = Vec::new();
        let result = copy_licenses(&repo_dir, license_dir, &mut copied);
        lease.extend(copied);
        result?;

        let build_timeout = self
            .build_timeout
            .or(bi.build_timeout)
            .unwrap_or(DEFAULT_BUILD_TIMEOUT);
        info!("building {} (timeout: {:?})", name, build_timeout);
        lease.attach_builder(bi.builder.clone());
        let executable = tokio::time::timeout(
            build_timeout,
            bi.builder
                .build(&repo_dir, &install_dir, &self.product.binary_name()),
        )
        .await
        .map_err(|_| Error::timeout("build", build_timeout))??;
        lease.push(executable.clone());
        debug!("building of {} finished", name);

        Ok(executable)
    }
}

fn copy_licenses(
    repo_dir: &Path,
    license_dir: &Path,
    copied: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    debug!("attempting to copy license files to {}", license_dir.display());
    copy_license_files(repo_dir, license_dir, REPO_LICENSE_FILES, copied)
}

#[async_trait::async_trait]
impl Buildable for GitRevision {
    fn validate(&self) -> Result<(), ValidationError> {
        if !is_product_name_valid(&self.product.name) {
            return Err(ValidationError::InvalidProductName(
                self.product.name.clone(),
            ));
        }
        let binary = self.product.binary_name();
        if !is_binary_name_valid(&binary) {
            return Err(ValidationError::InvalidBinaryName(binary));
        }
        if self.instructions()?.git_repo_url.is_empty() {
            return Err(ValidationError::MissingRepoUrl(self.product.name.clone()));
        }
        Ok(())
    }

    async fn build(&self) -> Result<(InstallDetails, Lease), Error> {
        let mut lease = Lease::new();

        match self.build_into(&mut lease).await {
            Ok(executable) => Ok((
                InstallDetails {
                    product: self.product.name.clone(),
                    executable_path: executable,
                    version: None,
                },
                lease,
            )),
            Err(e) => {
                if let Err(cleanup) = lease.remove().await {
                    warn!("cleanup after failed build of {}: {}", self.product.name, cleanup);
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for GitRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRevision")
            .field("product", &self.product)
            .field("install_dir", &self.install_dir)
            .field("license_dir", &self.license_dir)
            .field("reference", &self.reference)
            .field("clone_timeout", &self.clone_timeout)
            .field("build_timeout", &self.build_timeout)
            .finish_non_exhaustive()
    }
}
