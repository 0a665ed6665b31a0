//! Version parsing, constraint matching, and latest-version resolution
//!
//! # Modules
//!
//! - [`semver`]: lenient parsing and metadata-blind precedence
//! - [`constraint`]: `>=`, `~>`, ... clause sets and `check`
//! - [`resolver`]: `latest` requests and best-match selection over a catalog

pub mod constraint;
pub mod resolver;
pub mod semver;

pub use constraint::{ConstraintError, Constraints};
pub use resolver::{MatchCriteria, VersionRequest, find_latest_matching};
