//! Composable match predicates over a [`Distribution`]

use super::Distribution;
use crate::platform::{BitSize, CpuArch, Os, OsVersion};
use crate::version::{NumericVersion, VersionRange};

/// A pure boolean predicate over a distribution.
///
/// `All(vec![])` is always true and `Any(vec![])` is never true, so
/// conjunction and disjunction compose without special cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    Always,
    Os(Os),
    Arch(CpuArch),
    Bits(BitSize),
    /// Sub-version is one of the listed releases; a missing sub-version never matches
    OsVersionIn(Vec<OsVersion>),
    Version(VersionRange),
    All(Vec<Match>),
    Any(Vec<Match>),
}

impl Match {
    /// Evaluate the predicate against `distribution`
    pub fn matches(&self, distribution: &Distribution) -> bool {
        let platform = &distribution.platform;
        match self {
            Match::Always => true,
            Match::Os(os) => platform.os == *os,
            Match::Arch(arch) => platform.arch == *arch,
            Match::Bits(bits) => platform.bits == *bits,
            Match::OsVersionIn(versions) => platform
                .os_version
                .is_some_and(|current| versions.contains(&current)),
            Match::Version(range) => range.contains(&distribution.version.numeric()),
            Match::All(all) => all.iter().all(|m| m.matches(distribution)),
            Match::Any(any) => any.iter().any(|m| m.matches(distribution)),
        }
    }

    /// Conjunction, flattening nested `All`s
    pub fn and(self, other: Match) -> Match {
        match (self, other) {
            (Match::All(mut left), Match::All(right)) => {
                left.extend(right);
                Match::All(left)
            }
            (Match::All(mut left), other) => {
                left.push(other);
                Match::All(left)
            }
            (this, Match::All(mut right)) => {
                right.insert(0, this);
                Match::All(right)
            }
            (this, other) => Match::All(vec![this, other]),
        }
    }

    /// Disjunction, flattening nested `Any`s
    pub fn or(self, other: Match) -> Match {
        match (self, other) {
            (Match::Any(mut left), Match::Any(right)) => {
                left.extend(right);
                Match::Any(left)
            }
            (Match::Any(mut left), other) => {
                left.push(other);
                Match::Any(left)
            }
            (this, Match::Any(mut right)) => {
                right.insert(0, this);
                Match::Any(right)
            }
            (this, other) => Match::Any(vec![this, other]),
        }
    }

    pub fn os_version_in(versions: impl IntoIterator<Item = OsVersion>) -> Match {
        Match::OsVersionIn(versions.into_iter().collect())
    }

    pub fn version_between(min: NumericVersion, max: NumericVersion) -> Match {
        Match::Version(VersionRange::new(min, max))
    }

    /// `min` and everything newer, including `latest`
    pub fn version_from(min: NumericVersion) -> Match {
        Match::version_between(min, NumericVersion::LATEST)
    }

    /// Any of several, possibly disjoint, release windows
    pub fn versions(ranges: impl IntoIterator<Item = VersionRange>) -> Match {
        Match::Any(ranges.into_iter().map(Match::Version).collect())
    }
}
