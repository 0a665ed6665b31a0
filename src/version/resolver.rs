//! Latest matching version resolution
//!
//! Picks the newest catalog entry that survives metadata, prerelease, and
//! constraint filtering. An empty result is "no match", not an error.

use std::fmt;
use std::str::FromStr;

use semver::Version;

use crate::version::constraint::{ConstraintError, Constraints};
use crate::version::semver::{cmp_precedence, is_prerelease, metadata, parse_version};

/// Literal accepted in place of a constraint expression
pub const LATEST: &str = "latest";

/// What the caller asked for: the newest release or anything matching constraints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    Latest,
    Constraints(Constraints),
}

impl VersionRequest {
    pub fn check(&self, version: &Version) -> bool {
        match self {
            VersionRequest::Latest => true,
            VersionRequest::Constraints(c) => c.check(version),
        }
    }
}

impl FromStr for VersionRequest {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == LATEST {
            return Ok(VersionRequest::Latest);
        }
        Constraints::parse(s).map(VersionRequest::Constraints)
    }
}

impl From<Constraints> for VersionRequest {
    fn from(constraints: Constraints) -> Self {
        VersionRequest::Constraints(constraints)
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRequest::Latest => f.write_str(LATEST),
            VersionRequest::Constraints(c) => c.fmt(f),
        }
    }
}

/// Filters applied before picking the maximum
#[derive(Debug, Clone, Copy)]
pub struct MatchCriteria<'a> {
    pub request: &'a VersionRequest,
    pub include_prereleases: bool,
    /// Required build metadata: "" for community, "ent" or "ent.<meta>" for enterprise
    pub metadata: &'a str,
}

impl MatchCriteria<'_> {
    pub fn accepts(&self, version: &Version) -> bool {
        metadata(version) == self.metadata
            && (self.include_prereleases || !is_prerelease(version))
            && self.request.check(version)
    }
}

/// Find the newest candidate satisfying `criteria`
///
/// Candidates are `(version string, entry)` pairs in catalog order.
/// Unparsable version strings are dropped. Among equal-precedence survivors
/// the one appearing last in catalog order wins.
pub fn find_latest_matching<'a, T>(
    candidates: impl IntoIterator<Item = (&'a str, &'a T)>,
    criteria: MatchCriteria<'_>,
) -> Option<(Version, &'a T)>
where
    T: 'a,
{
    let mut matching: Vec<(Version, &'a T)> = candidates
        .into_iter()
        .filter_map(|(raw, entry)| parse_version(raw).map(|v| (v, entry)))
        .filter(|(v, _)| criteria.accepts(v))
        .collect();

    // sort_by is stable: ties keep catalog order
    matching.sort_by(|(a, _), (b, _)| cmp_precedence(a, b));
    matching.pop()
}
