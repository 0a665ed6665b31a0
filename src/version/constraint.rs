//! Version constraint expressions
//!
//! Supports comma-separated clauses, all of which must hold:
//! - `1.2.3`, `=1.2.3` - exact match (build metadata ignored)
//! - `!=1.2.3` - anything but
//! - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3` - comparison operators
//! - `~>1.2.3` - pessimistic: >=1.2.3 <1.3.0 (`~>1.2` means >=1.2.0 <2.0.0)
//!
//! Prerelease versions only satisfy an ordering clause whose own version is
//! a prerelease of the same major.minor.patch.

use std::fmt;
use std::str::FromStr;

use semver::Version;
use thiserror::Error;

use crate::version::semver::{cmp_precedence, is_prerelease, parse_with_segments, same_precedence};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("empty version constraint")]
    Empty,

    #[error("malformed constraint: {0:?}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Pessimistic,
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Pessimistic => "~>",
        }
    }
}

/// A single `<operator> <version>` clause
#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    operator: Operator,
    version: Version,
    /// Number of core segments written in the constraint (1..=3)
    segments: usize,
}

impl Clause {
    fn parse(clause: &str) -> Result<Self, ConstraintError> {
        let malformed = || ConstraintError::Malformed(clause.to_string());
        let input = clause.trim();

        // Longest operators first so ">=" is not read as ">"
        let (operator, rest) = [
            ("~>", Operator::Pessimistic),
            (">=", Operator::GreaterOrEqual),
            ("<=", Operator::LessOrEqual),
            ("!=", Operator::NotEqual),
            (">", Operator::Greater),
            ("<", Operator::Less),
            ("=", Operator::Equal),
        ]
        .into_iter()
        .find_map(|(prefix, op)| input.strip_prefix(prefix).map(|rest| (op, rest)))
        .unwrap_or((Operator::Equal, input));

        let (version, segments) = parse_with_segments(rest.trim()).ok_or_else(malformed)?;

        Ok(Self {
            operator,
            version,
            segments,
        })
    }

    fn check(&self, version: &Version) -> bool {
        let c = &self.version;
        match self.operator {
            Operator::Equal => same_precedence(version, c),
            Operator::NotEqual => !same_precedence(version, c),
            Operator::Greater => prerelease_check(version, c) && cmp_precedence(version, c).is_gt(),
            Operator::GreaterOrEqual => {
                prerelease_check(version, c) && cmp_precedence(version, c).is_ge()
            }
            Operator::Less => prerelease_check(version, c) && cmp_precedence(version, c).is_lt(),
            Operator::LessOrEqual => {
                prerelease_check(version, c) && cmp_precedence(version, c).is_le()
            }
            Operator::Pessimistic => {
                prerelease_check(version, c)
                    && cmp_precedence(version, c).is_ge()
                    && self.pessimistic_check(version)
            }
        }
    }

    /// All but the last written segment must match; the last may only grow.
    fn pessimistic_check(&self, version: &Version) -> bool {
        let wanted = [self.version.major, self.version.minor, self.version.patch];
        let actual = [version.major, version.minor, version.patch];
        let last = self.segments - 1;

        wanted[..last] == actual[..last] && actual[last] >= wanted[last]
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator.as_str(), self.version)
    }
}

fn prerelease_check(version: &Version, constraint: &Version) -> bool {
    match (is_prerelease(version), is_prerelease(constraint)) {
        (true, true) => {
            version.major == constraint.major
                && version.minor == constraint.minor
                && version.patch == constraint.patch
        }
        (true, false) => false,
        _ => true,
    }
}

/// A set of clauses combined with logical AND
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    clauses: Vec<Clause>,
}

impl Constraints {
    pub fn parse(expr: &str) -> Result<Self, ConstraintError> {
        if expr.trim().is_empty() {
            return Err(ConstraintError::Empty);
        }

        let clauses = expr
            .split(',')
            .map(Clause::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { clauses })
    }

    /// Constraint matching exactly one version
    pub fn exact(version: &Version) -> Self {
        Self {
            clauses: vec![Clause {
                operator: Operator::Equal,
                version: version.clone(),
                segments: 3,
            }],
        }
    }

    pub fn check(&self, version: &Version) -> bool {
        self.clauses.iter().all(|c| c.check(version))
    }

    /// Returns the first clause `version` fails, rendered for error messages
    pub fn first_unmet(&self, version: &Version) -> Option<String> {
        self.clauses
            .iter()
            .find(|c| !c.check(version))
            .map(|c| c.to_string())
    }
}

impl FromStr for Constraints {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        f.write_str(&rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::semver::parse_version;
    use rstest::rstest;

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    #[rstest]
    #[case("1.0.0", "1.0.0", true)]
    #[case("= 1.0.0", "1.0.0+ent", true)]
    #[case("1.0.0", "1.0.1", false)]
    #[case("!= 1.0.0", "1.0.1", true)]
    #[case(">= 1.0", "1.0.0", true)]
    #[case(">= 1.0", "0.9.9", false)]
    #[case("> 1.0.0", "1.0.0", false)]
    #[case("< 2.0.0", "1.99.0", true)]
    #[case("<= 2.0.0", "2.0.1", false)]
    #[case(">= 1.0, < 1.5", "1.4.9", true)]
    #[case(">= 1.0, < 1.5", "1.5.0", false)]
    fn check_comparison_operators(
        #[case] expr: &str,
        #[case] version: &str,
        #[case] expected: bool,
    ) {
        let constraints = Constraints::parse(expr).unwrap();
        assert_eq!(constraints.check(&v(version)), expected);
    }

    #[rstest]
    #[case("~> 1.2.3", "1.2.3", true)]
    #[case("~> 1.2.3", "1.2.9", true)]
    #[case("~> 1.2.3", "1.3.0", false)]
    #[case("~> 1.2.3", "1.2.2", false)]
    #[case("~> 1.2", "1.9.0", true)]
    #[case("~> 1.2", "2.0.0", false)]
    #[case("~> 1", "3.0.0", true)]
    fn check_pessimistic_operator(
        #[case] expr: &str,
        #[case] version: &str,
        #[case] expected: bool,
    ) {
        let constraints = Constraints::parse(expr).unwrap();
        assert_eq!(constraints.check(&v(version)), expected);
    }

    #[rstest]
    #[case(">= 1.0.0", "1.1.0-beta", false)]
    #[case(">= 1.1.0-alpha", "1.1.0-beta", true)]
    #[case(">= 1.0.0-alpha", "1.1.0-beta", false)]
    #[case("1.1.0-beta", "1.1.0-beta", true)]
    fn prerelease_only_matches_prerelease_clause_of_same_core(
        #[case] expr: &str,
        #[case] version: &str,
        #[case] expected: bool,
    ) {
        let constraints = Constraints::parse(expr).unwrap();
        assert_eq!(constraints.check(&v(version)), expected);
    }

    #[rstest]
    #[case("")]
    #[case(">= ")]
    #[case(">= 1.0, foo")]
    #[case("=> 1.0")]
    fn parse_rejects_malformed(#[case] expr: &str) {
        assert!(Constraints::parse(expr).is_err());
    }

    #[test]
    fn first_unmet_names_failing_clause() {
        let constraints = Constraints::parse(">= 1.0, < 1.5").unwrap();

        assert_eq!(constraints.first_unmet(&v("1.6.0")), Some("< 1.5.0".to_string()));
        assert_eq!(constraints.first_unmet(&v("1.2.0")), None);
    }

    #[test]
    fn display_joins_clauses() {
        let constraints: Constraints = ">=1.0,<2".parse().unwrap();
        assert_eq!(constraints.to_string(), ">= 1.0.0, < 2.0.0");
    }
}
