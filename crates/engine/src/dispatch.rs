//! AST dispatcher: walks each unit's tree exactly once and fans every
//! node out to the rules that subscribed to its kind.

use crate::config::RunConfig;
use crate::report::{FileError, Issue, RunMetrics, SuppressionKind};
use crate::rule::{Rule, RuleContext};
use crate::suppress::SuppressionMatcher;
use ir::{CompilationUnit, NodeKind, PackageModel};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of dispatching one unit.
#[derive(Default)]
pub(crate) struct UnitOutcome {
    pub issues: Vec<Issue>,
    /// Rule-internal failures, reported against this unit.
    pub failures: Vec<FileError>,
    pub metrics: RunMetrics,
}

/// Kind-to-rule-slot index, built once per worker rule set.
pub(crate) fn kind_index(rules: &[Box<dyn Rule>]) -> HashMap<NodeKind, Vec<usize>> {
    let mut index: HashMap<NodeKind, Vec<usize>> = HashMap::new();
    for (slot, rule) in rules.iter().enumerate() {
        for kind in &rule.descriptor().kinds {
            index.entry(*kind).or_default().push(slot);
        }
    }
    index
}

pub(crate) fn dispatch_unit(
    unit: &CompilationUnit,
    package: &PackageModel,
    rules: &mut [Box<dyn Rule>],
    index: &HashMap<NodeKind, Vec<usize>>,
    cfg: &RunConfig,
) -> UnitOutcome {
    let mut out = UnitOutcome::default();

    // Unit-level switches, evaluated once before the walk.
    if (unit.generated && !cfg.include_generated) || (unit.test_file && !cfg.include_tests) {
        debug!(file = %unit.path, "unit skipped by inclusion switches");
        return out;
    }
    out.metrics.files = 1;
    out.metrics.lines = unit.lines;

    let matcher = SuppressionMatcher::for_unit(unit, cfg);
    let ctx = RuleContext { unit, package };

    for node in unit.tree.preorder() {
        let Some(slots) = index.get(&node.kind) else {
            continue;
        };
        for &slot in slots {
            match rules[slot].evaluate(node, &ctx) {
                Ok(Some(finding)) => {
                    out.metrics.findings += 1;
                    let mut issue = Issue::new(finding);
                    matcher.apply(&mut issue);
                    if issue
                        .suppressions
                        .iter()
                        .any(|s| s.kind == SuppressionKind::InSource)
                    {
                        out.metrics.suppressed += 1;
                    }
                    if !issue.is_suppressed() || cfg.audit {
                        out.issues.push(issue);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    // One misbehaving rule must not blind the run to the
                    // other rules' findings.
                    warn!(
                        rule = %e.rule_id,
                        file = %unit.path,
                        line = node.span.start_line,
                        "rule evaluation failed: {}",
                        e.message
                    );
                    out.failures.push(FileError {
                        line: node.span.start_line,
                        column: node.span.start_column,
                        message: format!("rule {} failed: {}", e.rule_id, e.message),
                    });
                }
            }
        }
    }
    debug!(
        file = %unit.path,
        findings = out.metrics.findings,
        suppressed = out.metrics.suppressed,
        "unit dispatched"
    );
    out
}
