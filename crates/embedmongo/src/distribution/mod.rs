//! Distribution resolution: which prebuilt archive serves a version on a platform
//!
//! Rules are partitioned by OS. Inside each partition, distribution or
//! server-generation specific rules come first, generic legacy builds next,
//! and a catch-all rejects whatever is left. The first matching rule decides.

mod artifact;
mod legacy;
mod linux;
pub mod matcher;
mod osx;
pub mod rules;
mod windows;

pub use artifact::{ArchiveType, ArtifactDescriptor};
pub use matcher::Match;
pub use rules::{ArtifactFinder, ResolveError, Rule, RuleAction, RuleTable, UrlTemplate};

use crate::platform::{Os, Platform};
use crate::version::{NumericVersion, Version, VersionRange};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Default download server
pub const DEFAULT_BASE_URL: &str = "https://fastdl.mongodb.org/";

/// A version paired with the platform it should run on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Distribution {
    pub version: Version,
    pub platform: Platform,
}

impl Distribution {
    pub fn new(version: Version, platform: Platform) -> Self {
        Self { version, platform }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.version, self.platform)
    }
}

/// Shorthand for release windows in the rule tables
pub(crate) const fn between(min: [u32; 3], max: [u32; 3]) -> VersionRange {
    VersionRange::new(
        NumericVersion::new(min[0], min[1], min[2]),
        NumericVersion::new(max[0], max[1], max[2]),
    )
}

pub(crate) const fn v(major: u32, minor: u32, patch: u32) -> NumericVersion {
    NumericVersion::new(major, minor, patch)
}

struct BuiltinTables {
    linux: RuleTable,
    windows: RuleTable,
    osx: RuleTable,
    solaris: RuleTable,
    freebsd: RuleTable,
}

static BUILTIN: LazyLock<BuiltinTables> = LazyLock::new(|| BuiltinTables {
    linux: linux::rules().extend(legacy::linux_rules()),
    windows: windows::rules(),
    osx: osx::rules(),
    solaris: legacy::solaris_rules(),
    freebsd: legacy::freebsd_rules(),
});

/// Resolves distributions to download artifacts.
///
/// Uses the built-in rule tables unless an override finder was installed,
/// which then replaces them entirely.
#[derive(Clone)]
pub struct Resolver {
    base_url: String,
    override_finder: Option<Arc<dyn ArtifactFinder>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            override_finder: None,
        }
    }

    /// Base URL relative artifact URLs are joined with
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the built-in rule tables with a custom finder
    pub fn with_override(mut self, finder: Arc<dyn ArtifactFinder>) -> Self {
        self.override_finder = Some(finder);
        self
    }

    /// Prefix joined to relative artifact URLs
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The built-in table consulted for an OS
    pub fn builtin_table(os: Os) -> &'static RuleTable {
        let tables = &*BUILTIN;
        match os {
            Os::Linux => &tables.linux,
            Os::Windows => &tables.windows,
            Os::OsX => &tables.osx,
            Os::Solaris => &tables.solaris,
            Os::FreeBsd => &tables.freebsd,
        }
    }

    /// Resolve through the override finder if set, else the built-in table for the OS
    pub fn resolve(&self, distribution: &Distribution) -> Result<ArtifactDescriptor, ResolveError> {
        let artifact = match &self.override_finder {
            Some(finder) => finder
                .find(distribution)
                .ok_or_else(|| ResolveError::NoArtifact {
                    distribution: distribution.to_string(),
                    rule: "override".to_string(),
                })?,
            None => Self::builtin_table(distribution.platform.os).resolve(distribution)?,
        };

        let artifact = artifact.with_base_url(&self.base_url);
        log::debug!("Resolved {} to {}", distribution, artifact);
        Ok(artifact)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("base_url", &self.base_url)
            .field("override", &self.override_finder.is_some())
            .finish()
    }
}
