//! Ordered fallback across sources
//!
//! Sources are validated up front and then tried strictly in order. A
//! skippable failure moves on to the next source; anything else ends the
//! attempt immediately, so a failed signature or checksum is never papered
//! over by a less trustworthy fallback.

use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, info, warn};

use crate::error::{Error, ValidationError};
use crate::source::{InstallDetails, Installable, Lease, Source};

/// Runs sources and keeps the leases of successful ones until [`Installer::remove`]
pub struct Installer {
    dispatch: Dispatch,
    leases: Vec<Lease>,
}

impl Installer {
    /// Creates an installer that logs nowhere
    pub fn new() -> Self {
        Self {
            dispatch: Dispatch::none(),
            leases: Vec::new(),
        }
    }

    /// Route this installer's logs (and those of its sources) to `dispatch`
    pub fn set_logger(&mut self, dispatch: Dispatch) {
        self.dispatch = dispatch;
    }

    /// Find, install, or build from the first source that succeeds
    pub async fn ensure(&mut self, sources: Vec<Source>) -> Result<InstallDetails, Error> {
        let dispatch = self.dispatch.clone();
        self.run(sources).with_subscriber(dispatch).await
    }

    /// Like [`Installer::ensure`], restricted to installable sources
    pub async fn install(
        &mut self,
        sources: Vec<Box<dyn Installable>>,
    ) -> Result<InstallDetails, Error> {
        let sources = sources.into_iter().map(Source::Install).collect();
        self.ensure(sources).await
    }

    /// Remove everything created by successful sources
    ///
    /// Every lease is attempted; failures are aggregated.
    pub async fn remove(&mut self) -> Result<(), Error> {
        let dispatch = self.dispatch.clone();
        let leases = std::mem::take(&mut self.leases);
        remove_all(leases).with_subscriber(dispatch).await
    }

    async fn run(&mut self, sources: Vec<Source>) -> Result<InstallDetails, Error> {
        validate_all(&sources)?;

        let tried = sources.len();
        let mut errors = Vec::new();

        for (i, source) in sources.iter().enumerate() {
            debug!("trying {} source {}/{}", source.kind(), i + 1, tried);

            match source.acquire().await {
                Ok((details, lease)) => {
                    info!(
                        "{} ready at {}",
                        details.product,
                        details.executable_path.display()
                    );
                    self.leases.push(lease);
                    return Ok(details);
                }
                Err(e) if e.is_skippable() => {
                    debug!("skipping {} source: {}", source.kind(), e);
                    errors.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Exhausted { tried, errors })
    }
}

impl Default for Installer {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_all(sources: &[Source]) -> Result<(), Error> {
    if sources.is_empty() {
        return Err(ValidationError::NoSources.into());
    }

    let errors: Vec<ValidationError> = sources
        .iter()
        .filter_map(|s| s.validate().err())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidSources(errors))
    }
}

async fn remove_all(leases: Vec<Lease>) -> Result<(), Error> {
    let mut remove_errors = Vec::new();
    let mut other = None;

    for mut lease in leases {
        match lease.remove().await {
            Ok(()) => {}
            Err(Error::Cleanup(errors)) => remove_errors.extend(errors),
            Err(e) => {
                warn!("cleanup failed: {}", e);
                other.get_or_insert(e);
            }
        }
    }

    match other {
        _ if !remove_errors.is_empty() => Err(Error::Cleanup(remove_errors)),
        Some(e) => Err(e),
        None => Ok(()),
    }
}
