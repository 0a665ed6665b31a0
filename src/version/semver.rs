use std::cmp::Ordering;

use semver::{BuildMetadata, Version};

/// Parse a version string into a semver::Version, normalizing partial versions.
///
/// Handles an optional `v` prefix and partial versions like "1" or "1.2" by
/// padding with zeros. Prerelease and build metadata are kept as-is.
///
/// Examples:
/// - "1" -> Version(1, 0, 0)
/// - "v1.2" -> Version(1, 2, 0)
/// - "1.2.3-beta1+ent" -> Version(1, 2, 3, pre: beta1, build: ent)
pub fn parse_version(version: &str) -> Option<Version> {
    parse_with_segments(version).map(|(v, _)| v)
}

/// Like [`parse_version`], also returning how many core segments were written.
///
/// The segment count drives the pessimistic (`~>`) operator.
pub(crate) fn parse_with_segments(version: &str) -> Option<(Version, usize)> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);

    let core_end = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(core_end);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let normalized = match parts.len() {
        1 => format!("{}.0.0{}", parts[0], suffix),
        2 => format!("{}.{}.0{}", parts[0], parts[1], suffix),
        3 => version.to_string(),
        _ => return None,
    };
    Version::parse(&normalized).ok().map(|v| (v, parts.len()))
}

/// Compare two versions by semantic-version precedence.
///
/// Unlike `Ord for Version`, build metadata never influences the result.
pub fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

/// Equality by precedence (metadata ignored)
pub fn same_precedence(a: &Version, b: &Version) -> bool {
    cmp_precedence(a, b) == Ordering::Equal
}

pub fn is_prerelease(version: &Version) -> bool {
    !version.pre.is_empty()
}

/// Build metadata as a plain string ("" when absent)
pub fn metadata(version: &Version) -> &str {
    version.build.as_str()
}

/// Returns a copy of `version` carrying `metadata` as its build metadata.
pub fn with_metadata(version: &Version, metadata: &str) -> Option<Version> {
    let mut tagged = version.clone();
    tagged.build = if metadata.is_empty() {
        BuildMetadata::EMPTY
    } else {
        BuildMetadata::new(metadata).ok()?
    };
    Some(tagged)
}
