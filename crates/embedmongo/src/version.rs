//! MongoDB release versions, inclusive version ranges and range compression

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric `(major, minor, patch)` triple of a release.
///
/// Ordering is lexicographic on the three components, which is what the
/// derived `Ord` gives us given the field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NumericVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl NumericVersion {
    /// Sentinel used for the `latest` pseudo-release
    pub const LATEST: NumericVersion = NumericVersion::new(u32::MAX, u32::MAX, u32::MAX);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// `self >= other`
    pub fn newer_or_equal(&self, other: &NumericVersion) -> bool {
        self >= other
    }

    /// `self <= other`
    pub fn older_or_equal(&self, other: &NumericVersion) -> bool {
        self <= other
    }

    /// `self < other`
    pub fn older_than(&self, other: &NumericVersion) -> bool {
        self < other
    }

    /// `self > other`
    pub fn newer_than(&self, other: &NumericVersion) -> bool {
        self > other
    }

    /// True when both versions share major/minor and their patches differ by one
    pub fn is_adjacent_patch(&self, other: &NumericVersion) -> bool {
        self.major == other.major
            && self.minor == other.minor
            && self.patch.abs_diff(other.patch) == 1
    }
}

impl fmt::Display for NumericVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == NumericVersion::LATEST {
            return write!(f, "latest");
        }
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A release version as it appears in download file names.
///
/// The canonical string keeps pre-release suffixes (`4.0.0-rc0`) verbatim,
/// while comparisons use the numeric triple only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    canonical: String,
    numeric: NumericVersion,
}

impl Version {
    /// Parse a version such as `4.0.12`, `3.6`, `4.0.0-rc0` or `latest`
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(VersionError::Empty);
        }

        if input.eq_ignore_ascii_case("latest") {
            return Ok(Self::latest());
        }

        let (core, suffix) = match input.split_once('-') {
            Some((core, suffix)) => (core, Some(suffix)),
            None => (input, None),
        };

        if let Some(suffix) = suffix {
            let valid = !suffix.is_empty()
                && suffix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
            if !valid {
                return Err(VersionError::Malformed(input.to_string()));
            }
        }

        let parts = core
            .split('.')
            .map(|p| p.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::Malformed(input.to_string()))?;

        let numeric = match parts.as_slice() {
            [major, minor] => NumericVersion::new(*major, *minor, 0),
            [major, minor, patch] => NumericVersion::new(*major, *minor, *patch),
            _ => return Err(VersionError::Malformed(input.to_string())),
        };

        Ok(Self {
            canonical: input.to_string(),
            numeric,
        })
    }

    /// The rolling `latest` build
    pub fn latest() -> Self {
        Self {
            canonical: "latest".to_string(),
            numeric: NumericVersion::LATEST,
        }
    }

    /// String used verbatim when substituting `{version}` into download URLs
    pub fn as_canonical_str(&self) -> &str {
        &self.canonical
    }

    /// Numeric triple, ignoring any suffix
    pub fn numeric(&self) -> NumericVersion {
        self.numeric
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.canonical
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Inclusive `min..=max` range of numeric versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub min: NumericVersion,
    pub max: NumericVersion,
}

impl VersionRange {
    pub const fn new(min: NumericVersion, max: NumericVersion) -> Self {
        Self { min, max }
    }

    /// Range covering a single release
    pub const fn single(version: NumericVersion) -> Self {
        Self::new(version, version)
    }

    /// Inclusive on both ends
    pub fn contains(&self, version: &NumericVersion) -> bool {
        version.newer_or_equal(&self.min) && version.older_or_equal(&self.max)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}..={}", self.min, self.max)
        }
    }
}

/// Collapse a list of published releases into the smallest set of ranges
/// where every range is a run of adjacent patch releases.
///
/// Only used for diagnostics when maintaining the rule tables; resolution
/// never calls it.
pub fn compress_ranges(versions: &[NumericVersion]) -> Vec<VersionRange> {
    let mut sorted = versions.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut ranges: Vec<VersionRange> = Vec::new();
    for version in sorted {
        match ranges.last_mut() {
            Some(last) if last.max.is_adjacent_patch(&version) => last.max = version,
            _ => ranges.push(VersionRange::single(version)),
        }
    }
    ranges
}

/// Errors that can occur while parsing versions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("Version string is empty")]
    Empty,

    #[error("Malformed version '{0}', expected MAJOR.MINOR[.PATCH][-SUFFIX]")]
    Malformed(String),
}
