//! The rule catalog: an ordered list of compiled rule categories.
//!
//! Rules come from configuration as data ([`RuleConfig`]) and are compiled
//! once into case-insensitive, unanchored regexes in which `.` also matches
//! a newline, so a command continued over several lines is matched as a
//! whole. The catalog is never
//! mutated after construction, so a single instance can be shared by any
//! number of concurrent evaluations.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::{Config, RuleConfig};

/// Placeholder replaced by the protected container alternation.
const PROTECTED_PLACEHOLDER: &str = "{protected}";

/// Matches nothing; stands in for an empty protected list.
const NEVER: &str = r"\b\B";

/// Conceptual grouping of rules. Purely descriptive: precedence comes from
/// catalog order, not from the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Group {
    ContainerLifecycle,
    SystemPower,
    ProcessKill,
    DestructiveFilesystem,
    PermissionDestruction,
    ResourceExhaustion,
}

impl Group {
    pub const ALL: [Group; 6] = [
        Group::ContainerLifecycle,
        Group::SystemPower,
        Group::ProcessKill,
        Group::DestructiveFilesystem,
        Group::PermissionDestruction,
        Group::ResourceExhaustion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Group::ContainerLifecycle => "container-lifecycle",
            Group::SystemPower => "system-power",
            Group::ProcessKill => "process-kill",
            Group::DestructiveFilesystem => "destructive-filesystem",
            Group::PermissionDestruction => "permission-destruction",
            Group::ResourceExhaustion => "resource-exhaustion",
        }
    }
}

/// Errors raised while compiling the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("rule `{id}` has an invalid pattern: {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("indirection marker `{marker}` is not a valid pattern: {source}")]
    InvalidMarker {
        marker: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule id `{0}` appears more than once")]
    DuplicateId(String),
    #[error("rule catalog is empty")]
    Empty,
}

/// A compiled rule: matcher plus the text shown when it fires.
#[derive(Debug)]
pub struct RuleCategory {
    /// Unique identifier, e.g. `compose-down`.
    pub id: String,
    pub group: Group,
    /// Label shown to humans, e.g. `CONTAINER_DESTRUCTION`.
    pub category: String,
    pub reason: String,
    pub suggestion: String,
    matcher: Regex,
}

impl RuleCategory {
    /// Compile a rule, splicing `protected` into the `{protected}` placeholder.
    pub fn compile(rule: &RuleConfig, protected: &str) -> Result<Self, CatalogError> {
        let pattern = rule.pattern.replace(PROTECTED_PLACEHOLDER, protected);
        let matcher = case_insensitive(&pattern).map_err(|source| CatalogError::InvalidPattern {
            id: rule.id.clone(),
            source,
        })?;
        Ok(Self {
            id: rule.id.clone(),
            group: rule.group,
            category: rule.category.clone(),
            reason: rule.reason.clone(),
            suggestion: rule.suggestion.clone(),
            matcher,
        })
    }

    /// Whether the pattern occurs anywhere in `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    /// The compiled pattern source, after placeholder expansion.
    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }
}

/// Immutable, ordered collection of rule categories.
#[derive(Debug)]
pub struct RuleCatalog {
    version: u32,
    rules: Vec<RuleCategory>,
}

impl RuleCatalog {
    /// Compile the catalog declared in `config`.
    ///
    /// Fails on an empty catalog, a duplicate id, or a pattern that does not compile.
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        Self::compile(config.version, &config.rules, &config.containers.protected)
    }

    pub fn compile(
        version: u32,
        rules: &[RuleConfig],
        protected: &[String],
    ) -> Result<Self, CatalogError> {
        if rules.is_empty() {
            return Err(CatalogError::Empty);
        }

        let protected = protected_alternation(protected);
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(CatalogError::DuplicateId(rule.id.clone()));
            }
            compiled.push(RuleCategory::compile(rule, &protected)?);
        }

        Ok(Self {
            version,
            rules: compiled,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Rules in precedence order.
    pub fn rules(&self) -> &[RuleCategory] {
        &self.rules
    }

    /// The first rule, in catalog order, whose pattern occurs in `text`.
    pub fn first_match(&self, text: &str) -> Option<&RuleCategory> {
        self.rules.iter().find(|r| r.matches(text))
    }
}

/// Compile a case-insensitive pattern whose `.` crosses line breaks.
pub(crate) fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

/// Build `name1|name2|...` from the protected names, regex-escaped.
fn protected_alternation(names: &[String]) -> String {
    if names.is_empty() {
        return NEVER.into();
    }
    names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|")
}
