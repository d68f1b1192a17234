//! Rule contract and registry.
//!
//! Rules are plug-ins: they declare an immutable [`RuleDescriptor`] and an
//! `evaluate` entry point, and the dispatcher hands them every node whose
//! kind they subscribed to. A rule may keep private mutable state across
//! the nodes it sees; the coordinator guarantees an instance is only ever
//! driven sequentially (see the crate docs), which is what makes
//! `&mut self` sound here.

use crate::config::RunConfig;
use crate::report::Finding;
use ir::{AstNode, CompilationUnit, NodeKind, PackageModel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
/// Severity associated with a rule or finding.
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
/// How confident a rule is that its finding is a true positive.
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(format!("unknown confidence '{other}'")),
        }
    }
}

/// Immutable identity of a rule, created once at registration and never
/// mutated during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDescriptor {
    /// Stable rule id (`G401`-style).
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub confidence: Confidence,
    /// Node kinds the rule wants to see.
    pub kinds: Vec<NodeKind>,
}

impl RuleDescriptor {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        severity: Severity,
        confidence: Confidence,
        kinds: Vec<NodeKind>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            severity,
            confidence,
            kinds,
        }
    }
}

/// Read-only view handed to `evaluate`. `package.path` is the scope key a
/// stateful rule compares to reset its private cross-file state.
pub struct RuleContext<'a> {
    pub unit: &'a CompilationUnit,
    pub package: &'a PackageModel,
}

/// A rule-internal evaluation failure. Never aborts dispatch of other
/// rules or nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleError {
    pub rule_id: String,
    pub message: String,
}

impl RuleError {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {}: {}", self.rule_id, self.message)
    }
}

impl std::error::Error for RuleError {}

/// A construction-time failure of one rule's configuration blob.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub rule_id: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {} configuration: {}", self.rule_id, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Contract every rule implements.
pub trait Rule: Send {
    fn descriptor(&self) -> &RuleDescriptor;

    /// Inspects one node. Must not mutate the tree; may consult the unit's
    /// type tables and the rule's own private state. Returns at most one
    /// finding per call.
    fn evaluate(
        &mut self,
        node: &AstNode,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Finding>, RuleError>;
}

type RuleFactory = Arc<dyn Fn(&RunConfig) -> Result<Box<dyn Rule>, ConfigError> + Send + Sync>;

#[derive(Clone)]
struct RegistryEntry {
    descriptor: RuleDescriptor,
    factory: RuleFactory,
}

/// Startup registry of rule factories. Factories run once per worker so
/// every worker owns its own live instances; they must be deterministic
/// with respect to the run configuration.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    entries: Vec<RegistryEntry>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, descriptor: RuleDescriptor, factory: F)
    where
        F: Fn(&RunConfig) -> Result<Box<dyn Rule>, ConfigError> + Send + Sync + 'static,
    {
        self.entries.push(RegistryEntry {
            descriptor,
            factory: Arc::new(factory),
        });
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Constructs live instances for the given configuration. Rules whose
    /// factory rejects its configuration are skipped and reported in the
    /// error list; the caller decides whether that is fatal.
    pub fn build(&self, cfg: &RunConfig) -> (Vec<Box<dyn Rule>>, Vec<ConfigError>) {
        let mut rules = Vec::with_capacity(self.entries.len());
        let mut errors = Vec::new();
        for entry in &self.entries {
            match (entry.factory)(cfg) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    warn!(rule = %e.rule_id, "skipping rule: {}", e.message);
                    errors.push(e);
                }
            }
        }
        (rules, errors)
    }

    /// Registry restricted to the rules that configured successfully in a
    /// probe build, so workers never re-run failing factories.
    pub(crate) fn filtered(&self, keep: &std::collections::HashSet<String>) -> RuleRegistry {
        RuleRegistry {
            entries: self
                .entries
                .iter()
                .filter(|e| keep.contains(&e.descriptor.id))
                .cloned()
                .collect(),
        }
    }
}
