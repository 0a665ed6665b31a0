//! Ownership of filesystem paths created by a source

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::build::Builder;
use crate::error::{Error, RemoveError};

/// Paths (and builder state) produced by one successful find, install, or build
///
/// Nothing is removed implicitly; call [`Lease::remove`] when the executable
/// is no longer needed.
#[derive(Default)]
pub struct Lease {
    paths: Vec<PathBuf>,
    builder: Option<Arc<dyn Builder>>,
}

impl Lease {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            builder: None,
        }
    }

    pub(crate) fn push(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub(crate) fn extend(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.paths.extend(paths);
    }

    pub(crate) fn attach_builder(&mut self, builder: Arc<dyn Builder>) {
        self.builder = Some(builder);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.builder.is_none()
    }

    /// Delete every owned path, newest first
    ///
    /// Paths that no longer exist are ignored, so removing twice succeeds.
    /// Every path is attempted even when an earlier one fails.
    pub async fn remove(&mut self) -> Result<(), Error> {
        let mut errors = Vec::new();

        for path in self.paths.iter().rev() {
            if let Err(source) = remove_path(path).await {
                warn!("failed to remove {}: {}", path.display(), source);
                errors.push(RemoveError {
                    path: path.clone(),
                    source,
                });
            }
        }

        if let Some(builder) = self.builder.take()
            && let Err(e) = builder.remove().await
        {
            if errors.is_empty() {
                return Err(e);
            }
            warn!("builder cleanup failed: {}", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Cleanup(errors))
        }
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("paths", &self.paths)
            .field("builder", &self.builder.is_some())
            .finish()
    }
}

async fn remove_path(path: &Path) -> std::io::Result<()> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Ok(()) => {
            debug!("removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
