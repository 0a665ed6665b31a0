pub mod build;
pub mod config;
pub mod error;
pub mod installer;
pub mod logging;
pub mod product;
pub mod releases;
pub mod source;
pub mod validate;
pub mod version;

pub use error::{Error, ValidationError};
pub use installer::Installer;
pub use product::Product;
pub use source::{InstallDetails, Lease, Source};
