//! Report-facing types: findings, issues, suppressions, metrics.
//!
//! These carry stable field semantics so any external formatter can render
//! a run without re-deriving suppression logic.

use crate::rule::{Confidence, RuleDescriptor, Severity};
use ir::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Candidate security observation produced by one rule at one node,
/// before suppression is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub message: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub file: String,
    pub line: usize,
    pub column: usize,
    /// Machine-suggested fix text, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Finding {
    pub fn new(
        descriptor: &RuleDescriptor,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: descriptor.id.clone(),
            message: message.into(),
            severity: descriptor.severity,
            confidence: descriptor.confidence,
            file: file.into(),
            line: span.start_line,
            column: span.start_column,
            fix: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Origin of a suppression applied to an issue.
pub enum SuppressionKind {
    /// A directive comment in the analyzed source.
    InSource,
    /// A run-wide exclusion of the rule id.
    External,
}

/// One suppression applied to an issue, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    pub kind: SuppressionKind,
    pub justification: String,
}

/// A finding plus every suppression applied to it. The unit that appears
/// in a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    #[serde(flatten)]
    pub finding: Finding,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressions: Vec<Suppression>,
}

impl Issue {
    pub fn new(finding: Finding) -> Self {
        Self {
            finding,
            suppressions: Vec::new(),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        !self.suppressions.is_empty()
    }
}

impl From<Finding> for Issue {
    fn from(finding: Finding) -> Self {
        Issue::new(finding)
    }
}

/// Run counters, summed across workers at the merge point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Units dispatched.
    pub files: usize,
    /// Physical lines of the dispatched units.
    pub lines: usize,
    /// Findings produced by rules, before suppression.
    pub findings: usize,
    /// Findings silenced by an in-source directive.
    pub suppressed: usize,
}

impl RunMetrics {
    pub fn merge(&mut self, other: &RunMetrics) {
        self.files += other.files;
        self.lines += other.lines;
        self.findings += other.findings;
        self.suppressed += other.suppressed;
    }
}

/// Structured per-file failure: frontend parse/type-check errors and
/// rule-internal evaluation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Final output of a run. Issue order is canonical (file, then position,
/// then rule id) so the worker count never changes the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub issues: Vec<Issue>,
    pub metrics: RunMetrics,
    pub errors: BTreeMap<String, Vec<FileError>>,
}
