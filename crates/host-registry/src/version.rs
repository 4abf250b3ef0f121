//! Version constraint parsing and checking for extension dependencies.
//!
//! Dependency declarations may constrain the version of the extension they
//! target, e.g. `node (>=1.0)` or `views (>=2.0,<3.0)`. Constraints are
//! informational for load ordering but are parsed and validated up front so
//! malformed declarations fail at registration time rather than at dispatch.
//!
//! # Examples
//!
//! ```
//! use host_registry::version::VersionConstraint;
//!
//! let constraint = VersionConstraint::parse(">=1.2").unwrap();
//! assert!(constraint.satisfies("1.2.0"));
//! assert!(constraint.satisfies("2.0.1"));
//! assert!(!constraint.satisfies("1.1.9"));
//!
//! let constraint = VersionConstraint::parse(">=1.0,<2.0").unwrap();
//! assert!(constraint.satisfies("1.5.0"));
//! assert!(!constraint.satisfies("2.0.0"));
//! ```

use crate::error::{Error, Result};

/// A single version comparison relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    GreaterEq,
    Greater,
    LessEq,
    Less,
    Equal,
    NotEqual,
}

/// One relation paired with the version it compares against.
#[derive(Debug, Clone)]
struct Comparator {
    relation: Relation,
    version: semver::Version,
}

impl Comparator {
    fn matches(&self, candidate: &semver::Version) -> bool {
        match self.relation {
            Relation::GreaterEq => candidate >= &self.version,
            Relation::Greater => candidate > &self.version,
            Relation::LessEq => candidate <= &self.version,
            Relation::Less => candidate < &self.version,
            Relation::Equal => candidate == &self.version,
            Relation::NotEqual => candidate != &self.version,
        }
    }
}

/// A parsed version constraint.
///
/// Comma-separated comparators form a conjunction: every comparator must
/// match for the constraint to be satisfied.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    comparators: Vec<Comparator>,
    raw: String,
}

impl VersionConstraint {
    /// Parse a constraint string such as `>=1.0`, `!=1.3`, or `>=1.0,<2.0`.
    ///
    /// Versions may omit the patch component; `1.2` is read as `1.2.0`.
    /// A bare version with no operator means exact equality.
    pub fn parse(constraint: &str) -> Result<Self> {
        let raw = constraint.to_string();
        let mut comparators = Vec::new();

        for part in constraint.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            comparators.push(parse_comparator(part)?);
        }

        if comparators.is_empty() {
            return Err(Error::ConstraintParse {
                constraint: raw,
                reason: "empty constraint".to_string(),
            });
        }

        Ok(Self { comparators, raw })
    }

    /// Check whether a version string satisfies this constraint.
    ///
    /// Returns `false` when the version string cannot be parsed.
    pub fn satisfies(&self, version: &str) -> bool {
        match lenient_version(version) {
            Some(parsed) => self.satisfies_version(&parsed),
            None => false,
        }
    }

    /// Check whether a parsed version satisfies this constraint.
    pub fn satisfies_version(&self, version: &semver::Version) -> bool {
        self.comparators.iter().all(|c| c.matches(version))
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_comparator(part: &str) -> Result<Comparator> {
    const OPERATORS: &[(&str, Relation)] = &[
        (">=", Relation::GreaterEq),
        ("<=", Relation::LessEq),
        ("==", Relation::Equal),
        ("!=", Relation::NotEqual),
        (">", Relation::Greater),
        ("<", Relation::Less),
    ];

    let (relation, version_str) = OPERATORS
        .iter()
        .find_map(|(op, relation)| part.strip_prefix(op).map(|rest| (*relation, rest)))
        .unwrap_or((Relation::Equal, part));

    let version_str = version_str.trim();
    let version = lenient_version(version_str).ok_or_else(|| Error::ConstraintParse {
        constraint: part.to_string(),
        reason: format!("invalid version: {version_str}"),
    })?;

    Ok(Comparator { relation, version })
}

/// Parse a version string, tolerating a missing patch component.
fn lenient_version(s: &str) -> Option<semver::Version> {
    let s = s.trim();
    if let Ok(v) = semver::Version::parse(s) {
        return Some(v);
    }
    semver::Version::parse(&format!("{s}.0")).ok()
}
