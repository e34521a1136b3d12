//! Ordered first-match-wins resolution rules

use super::artifact::{ArchiveType, ArtifactDescriptor};
use super::matcher::Match;
use super::Distribution;
use crate::platform::Os;
use crate::version::Version;
use std::fmt;
use std::sync::Arc;

/// Produces the artifact for a distribution, or nothing if it has none.
///
/// Implemented for plain closures so callers can replace the built-in tables
/// with a one-liner.
pub trait ArtifactFinder: Send + Sync {
    fn find(&self, distribution: &Distribution) -> Option<ArtifactDescriptor>;
}

impl<F> ArtifactFinder for F
where
    F: Fn(&Distribution) -> Option<ArtifactDescriptor> + Send + Sync,
{
    fn find(&self, distribution: &Distribution) -> Option<ArtifactDescriptor> {
        self(distribution)
    }
}

/// URL template with a single `{version}` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    archive: ArchiveType,
    os: Os,
    template: String,
}

impl UrlTemplate {
    pub const PLACEHOLDER: &'static str = "{version}";

    pub fn new(archive: ArchiveType, os: Os, template: impl Into<String>) -> Self {
        Self {
            archive,
            os,
            template: template.into(),
        }
    }

    /// Gzipped tarball template
    pub fn tgz(os: Os, template: impl Into<String>) -> Self {
        Self::new(ArchiveType::Tgz, os, template)
    }

    /// Zip archive template
    pub fn zip(os: Os, template: impl Into<String>) -> Self {
        Self::new(ArchiveType::Zip, os, template)
    }

    /// Substitute every `{version}` with the canonical version string
    pub fn render(&self, version: &Version) -> String {
        self.template.replace(Self::PLACEHOLDER, version.as_canonical_str())
    }
}

impl ArtifactFinder for UrlTemplate {
    fn find(&self, distribution: &Distribution) -> Option<ArtifactDescriptor> {
        Some(ArtifactDescriptor::new(
            self.archive,
            self.render(&distribution.version),
            self.os,
        ))
    }
}

/// What a rule does once its predicate matched
#[derive(Clone)]
pub enum RuleAction {
    Find(Arc<dyn ArtifactFinder>),
    /// Fail resolution with the rule's label as the reason
    Reject,
}

impl fmt::Debug for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Find(_) => write!(f, "Find(..)"),
            RuleAction::Reject => write!(f, "Reject"),
        }
    }
}

/// A (predicate, action) pair
#[derive(Debug, Clone)]
pub struct Rule {
    pub label: String,
    pub matcher: Match,
    pub action: RuleAction,
}

/// Rules evaluated top to bottom; the first matching predicate is final.
///
/// Predicates overlap on purpose. Reordering rules changes which package is
/// picked, so never sort or index them.
#[derive(Debug, Clone)]
pub struct RuleTable {
    name: String,
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Create an empty table; `name` shows up in errors
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rule resolving through `finder`
    pub fn rule(
        mut self,
        label: impl Into<String>,
        matcher: Match,
        finder: impl ArtifactFinder + 'static,
    ) -> Self {
        self.rules.push(Rule {
            label: label.into(),
            matcher,
            action: RuleAction::Find(Arc::new(finder)),
        });
        self
    }

    /// Append a rule that fails resolution with `reason`
    pub fn reject(mut self, reason: impl Into<String>, matcher: Match) -> Self {
        self.rules.push(Rule {
            label: reason.into(),
            matcher,
            action: RuleAction::Reject,
        });
        self
    }

    /// Append a catch-all rejecting everything that reached it
    pub fn otherwise_reject(self, reason: impl Into<String>) -> Self {
        self.reject(reason, Match::Always)
    }

    /// Append all rules of another table, keeping their order
    pub fn extend(mut self, other: RuleTable) -> Self {
        self.rules.extend(other.rules);
        self
    }

    /// Resolve with the first rule whose predicate matches
    pub fn resolve(&self, distribution: &Distribution) -> Result<ArtifactDescriptor, ResolveError> {
        let Some(rule) = self.rules.iter().find(|r| r.matcher.matches(distribution)) else {
            return Err(ResolveError::Unsupported {
                distribution: distribution.to_string(),
                reason: format!("no rule in the {} table matched", self.name),
            });
        };

        log::trace!("[{}] {} matched rule '{}'", self.name, distribution, rule.label);

        match &rule.action {
            RuleAction::Find(finder) => {
                finder
                    .find(distribution)
                    .ok_or_else(|| ResolveError::NoArtifact {
                        distribution: distribution.to_string(),
                        rule: rule.label.clone(),
                    })
            }
            RuleAction::Reject => Err(ResolveError::Unsupported {
                distribution: distribution.to_string(),
                reason: rule.label.clone(),
            }),
        }
    }
}

/// Errors that can occur while resolving a distribution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Unsupported distribution {distribution}: {reason}")]
    Unsupported { distribution: String, reason: String },

    #[error("Rule '{rule}' matched {distribution} but produced no artifact")]
    NoArtifact { distribution: String, rule: String },
}
