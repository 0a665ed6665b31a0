//! Strategies that produce an executable
//!
//! A source is a value object exposing exactly one capability:
//! - [`Findable`]: locate an existing binary (`fs`)
//! - [`Installable`]: download a release (`releases`)
//! - [`Buildable`]: build from a git repository (`build`)
//!
//! Each successful call returns [`InstallDetails`] together with a [`Lease`]
//! owning whatever the call created on disk.

#[cfg(test)]
use mockall::automock;

use std::path::PathBuf;

use semver::Version;

use crate::error::{Error, ValidationError};

pub mod build;
pub mod fs;
pub mod lease;
pub mod releases;

pub use lease::Lease;

/// Result of a successful find, install, or build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallDetails {
    pub product: String,
    /// Absolute path of the executable
    pub executable_path: PathBuf,
    /// `None` when the strategy cannot tell (e.g. a build from source)
    pub version: Option<Version>,
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Findable: Send + Sync {
    fn validate(&self) -> Result<(), ValidationError>;
    async fn find(&self) -> Result<(InstallDetails, Lease), Error>;
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Installable: Send + Sync {
    fn validate(&self) -> Result<(), ValidationError>;
    async fn install(&self) -> Result<(InstallDetails, Lease), Error>;
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Buildable: Send + Sync {
    fn validate(&self) -> Result<(), ValidationError>;
    async fn build(&self) -> Result<(InstallDetails, Lease), Error>;
}

/// A source tagged with the capability it offers
pub enum Source {
    Find(Box<dyn Findable>),
    Install(Box<dyn Installable>),
    Build(Box<dyn Buildable>),
}

impl Source {
    pub fn find(source: impl Findable + 'static) -> Self {
        Source::Find(Box::new(source))
    }

    pub fn install(source: impl Installable + 'static) -> Self {
        Source::Install(Box::new(source))
    }

    pub fn build(source: impl Buildable + 'static) -> Self {
        Source::Build(Box::new(source))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Source::Find(s) => s.validate(),
            Source::Install(s) => s.validate(),
            Source::Build(s) => s.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Source::Find(_) => "find",
            Source::Install(_) => "install",
            Source::Build(_) => "build",
        }
    }

    /// Dispatch to whichever capability this source has
    pub async fn acquire(&self) -> Result<(InstallDetails, Lease), Error> {
        match self {
            Source::Find(s) => s.find().await,
            Source::Install(s) => s.install().await,
            Source::Build(s) => s.build().await,
        }
    }
}

impl From<Box<dyn Installable>> for Source {
    fn from(source: Box<dyn Installable>) -> Self {
        Source::Install(source)
    }
}

impl From<fs::AnyVersion> for Source {
    fn from(source: fs::AnyVersion) -> Self {
        Source::find(source)
    }
}

impl From<fs::ExactVersion> for Source {
    fn from(source: fs::ExactVersion) -> Self {
        Source::find(source)
    }
}

impl From<releases::ExactVersion> for Source {
    fn from(source: releases::ExactVersion) -> Self {
        Source::install(source)
    }
}

impl From<releases::LatestVersion> for Source {
    fn from(source: releases::LatestVersion) -> Self {
        Source::install(source)
    }
}

impl From<build::GitRevision> for Source {
    fn from(source: build::GitRevision) -> Self {
        Source::build(source)
    }
}
