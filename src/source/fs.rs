//! Finding binaries that are already on disk

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use semver::Version;
use tracing::debug;

use crate::config::DEFAULT_FIND_TIMEOUT;
use crate::error::{Error, SkipReason, ValidationError};
use crate::product::Product;
use crate::source::{Findable, InstallDetails, Lease};
use crate::validate::is_binary_name_valid;
use crate::version::Constraints;
use crate::version::semver::same_precedence;

/// Finds an executable of any version
///
/// Either `exact_bin_path` is checked directly, or the product's binary is
/// looked up in `$PATH` followed by `extra_paths`. With `constraints`, the
/// first binary whose reported version satisfies them wins.
#[derive(Debug, Clone, Default)]
pub struct AnyVersion {
    pub product: Option<Product>,
    pub extra_paths: Vec<PathBuf>,
    pub constraints: Option<Constraints>,
    pub exact_bin_path: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl AnyVersion {
    pub fn product(product: Product) -> Self {
        Self {
            product: Some(product),
            ..Default::default()
        }
    }

    pub fn exact_path(path: impl Into<PathBuf>) -> Self {
        Self {
            exact_bin_path: Some(path.into()),
            ..Default::default()
        }
    }

    async fn find_in(&self, dirs: &[PathBuf]) -> Result<(InstallDetails, Lease), Error> {
        if let Some(path) = &self.exact_bin_path {
            check_executable(path).await?;
            let product = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok((
                InstallDetails {
                    product,
                    executable_path: path.clone(),
                    version: None,
                },
                Lease::new(),
            ));
        }

        let Some(product) = &self.product else {
            return Err(ValidationError::MissingLookupTarget.into());
        };

        let (path, version) = find_file(dirs, &product.binary_name(), |path| async move {
            let Some(constraints) = &self.constraints else {
                return Ok(None);
            };
            let Some(getter) = &product.version_getter else {
                return Err("undeclared version getter".to_string());
            };
            let version = getter
                .get_version(&path)
                .await
                .map_err(|e| e.to_string())?;
            match constraints.first_unmet(&version) {
                Some(clause) => Err(format!(
                    "version ({}) doesn't meet constraint {}",
                    version, clause
                )),
                None => Ok(Some(version)),
            }
        })
        .await?;

        Ok((
            InstallDetails {
                product: product.name.clone(),
                executable_path: path,
                version,
            },
            Lease::new(),
        ))
    }
}

#[async_trait::async_trait]
impl Findable for AnyVersion {
    fn validate(&self) -> Result<(), ValidationError> {
        match (&self.exact_bin_path, &self.product) {
            (None, None) => return Err(ValidationError::MissingLookupTarget),
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingLookupTarget),
            (Some(_), None) if !self.extra_paths.is_empty() || self.constraints.is_some() => {
                return Err(ValidationError::ConflictingLookupTarget);
            }
            (Some(path), None) if !path.is_absolute() => {
                return Err(ValidationError::RelativeExactPath(path.clone()));
            }
            _ => {}
        }

        if let Some(product) = &self.product {
            let binary = product.binary_name();
            if !is_binary_name_valid(&binary) {
                return Err(ValidationError::InvalidBinaryName(binary));
            }
            if self.constraints.is_some() && product.version_getter.is_none() {
                return Err(ValidationError::MissingVersionGetter(product.name.clone()));
            }
        }
        Ok(())
    }

    async fn find(&self) -> Result<(InstallDetails, Lease), Error> {
        let timeout = self.timeout.unwrap_or(DEFAULT_FIND_TIMEOUT);
        let dirs = lookup_dirs(&self.extra_paths);
        tokio::time::timeout(timeout, self.find_in(&dirs))
            .await
            .map_err(|_| Error::timeout("find", timeout))?
    }
}

/// Finds the first binary reporting exactly `version`
#[derive(Debug, Clone)]
pub struct ExactVersion {
    pub product: Product,
    pub version: Version,
    pub extra_paths: Vec<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ExactVersion {
    pub fn new(product: Product, version: Version) -> Self {
        Self {
            product,
            version,
            extra_paths: Vec::new(),
            timeout: None,
        }
    }

    async fn find_in(&self, dirs: &[PathBuf]) -> Result<(InstallDetails, Lease), Error> {
        let getter = self
            .product
            .version_getter
            .as_ref()
            .ok_or_else(|| ValidationError::MissingVersionGetter(self.product.name.clone()))?;

        let (path, version) = find_file(dirs, &self.product.binary_name(), |path| async move {
            let found = getter
                .get_version(&path)
                .await
                .map_err(|e| e.to_string())?;
            if !same_precedence(&found, &self.version) {
                return Err(format!("version ({}) doesn't match {}", found, self.version));
            }
            Ok(Some(found))
        })
        .await?;

        Ok((
            InstallDetails {
                product: self.product.name.clone(),
                executable_path: path,
                version,
            },
            Lease::new(),
        ))
    }
}

#[async_trait::async_trait]
impl Findable for ExactVersion {
    fn validate(&self) -> Result<(), ValidationError> {
        let binary = self.product.binary_name();
        if !is_binary_name_valid(&binary) {
            return Err(ValidationError::InvalidBinaryName(binary));
        }
        if self.product.version_getter.is_none() {
            return Err(ValidationError::MissingVersionGetter(
                self.product.name.clone(),
            ));
        }
        Ok(())
    }

    async fn find(&self) -> Result<(InstallDetails, Lease), Error> {
        let timeout = self.timeout.unwrap_or(DEFAULT_FIND_TIMEOUT);
        let dirs = lookup_dirs(&self.extra_paths);
        tokio::time::timeout(timeout, self.find_in(&dirs))
            .await
            .map_err(|_| Error::timeout("find", timeout))?
    }
}

/// `$PATH` entries followed by `extra`
pub fn lookup_dirs(extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect())
        .unwrap_or_default();
    dirs.extend(extra.iter().cloned());
    dirs
}

/// Return the first `dir/binary` that is executable and passes `accept`
///
/// Directories without the file are skipped silently; rejected candidates
/// are reported in the skippable error.
async fn find_file<F, Fut>(
    dirs: &[PathBuf],
    binary: &str,
    mut accept: F,
) -> Result<(PathBuf, Option<Version>), SkipReason>
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = Result<Option<Version>, String>>,
{
    let mut reasons = Vec::new();

    for dir in dirs {
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir.as_path()
        };
        let candidate = dir.join(binary);

        match check_executable(&candidate).await {
            Ok(()) => {}
            Err(SkipReason::Inaccessible { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                continue;
            }
            Err(reason) => {
                debug!("skipping {}: {}", candidate.display(), reason);
                reasons.push(reason.to_string());
                continue;
            }
        }

        match accept(candidate.clone()).await {
            Ok(version) => {
                let path = std::path::absolute(&candidate).map_err(|source| {
                    SkipReason::Inaccessible {
                        path: candidate.clone(),
                        source,
                    }
                })?;
                debug!("found {}", path.display());
                return Ok((path, version));
            }
            Err(reason) => {
                debug!("rejecting {}: {}", candidate.display(), reason);
                reasons.push(format!("{}: {}", candidate.display(), reason));
            }
        }
    }

    Err(SkipReason::NotFound {
        binary: binary.to_string(),
        reasons,
    })
}

async fn check_executable(path: &Path) -> Result<(), SkipReason> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|source| SkipReason::Inaccessible {
            path: path.to_path_buf(),
            source,
        })?;

    if meta.is_dir() || !is_executable(&meta) {
        return Err(SkipReason::NotExecutable(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    meta.is_file()
}
