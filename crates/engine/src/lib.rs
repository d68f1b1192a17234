//! Rule-execution engine: turns a forest of per-file syntax trees plus
//! type information into a deduplicated, suppression-aware issue list,
//! optionally in parallel.
//!
//! # Concurrency discipline
//!
//! Several rules keep private mutable state (variable-to-taint maps,
//! "current package scope") whose correctness depends on strictly
//! sequential visitation. The coordinator therefore gives every worker
//! thread its own rule-instance set and dispatches whole packages: a rule
//! instance only ever sees complete packages, one after another, on one
//! thread. Within a package, nodes arrive in the tree's stable pre-order.
//! Across packages no ordering is guaranteed; the aggregator restores
//! determinism by deduplicating and canonically sorting the merged issues,
//! so the worker count never changes the reported set.

pub mod autofix;
pub mod cache;
pub mod calls;
pub mod config;
mod dispatch;
pub mod frontend;
pub mod helpers;
pub mod report;
pub mod rule;
pub mod suppress;

pub use autofix::{suggest_fixes, FixGenerator};
pub use cache::MemoCache;
pub use calls::{CallSite, CallTable};
pub use config::RunConfig;
pub use frontend::{Frontend, LoadOutcome};
pub use report::{
    FileError, Finding, Issue, RunMetrics, ScanReport, Suppression, SuppressionKind,
};
pub use rule::{
    ConfigError, Confidence, Rule, RuleContext, RuleDescriptor, RuleError, RuleRegistry, Severity,
};
pub use suppress::{
    parse_directive, DirectiveIndex, DirectiveKind, SuppressionDirective, SuppressionMatcher,
};

use dispatch::{dispatch_unit, kind_index, UnitOutcome};
use ir::PackageModel;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashSet;
use tracing::debug;

/// Everything one worker produced for one package, merged into the report
/// at a single point after the parallel section.
#[derive(Default)]
struct PackageOutcome {
    issues: Vec<Issue>,
    metrics: RunMetrics,
    errors: Vec<(String, FileError)>,
}

fn run_package(
    package: &PackageModel,
    rules: &mut [Box<dyn Rule>],
    cfg: &RunConfig,
) -> PackageOutcome {
    debug!(package = %package.path, units = package.units.len(), "analyzing package");
    let index = kind_index(rules);
    let mut out = PackageOutcome::default();
    for unit in &package.units {
        let UnitOutcome {
            issues,
            failures,
            metrics,
        } = dispatch_unit(unit, package, rules, &index, cfg);
        out.metrics.merge(&metrics);
        out.issues.extend(issues);
        out.errors
            .extend(failures.into_iter().map(|f| (unit.path.clone(), f)));
    }
    out
}

fn dedup_issues(issues: &mut Vec<Issue>) {
    let mut seen = HashSet::new();
    issues.retain(|i| {
        seen.insert((
            i.finding.rule_id.clone(),
            i.finding.file.clone(),
            i.finding.line,
            i.finding.column,
        ))
    });
}

fn canonical_sort(issues: &mut [Issue]) {
    issues.sort_by(|a, b| {
        a.finding
            .file
            .cmp(&b.finding.file)
            .then(a.finding.line.cmp(&b.finding.line))
            .then(a.finding.column.cmp(&b.finding.column))
            .then(a.finding.rule_id.cmp(&b.finding.rule_id))
    });
}

/// Runs every registered rule over the given packages.
///
/// Rule construction is validated once up front: a rule whose
/// configuration blob is rejected is skipped (fatal instead under
/// `strict_startup`). Workers never re-run failing factories.
pub fn process(
    packages: &[PackageModel],
    registry: &RuleRegistry,
    cfg: &RunConfig,
) -> anyhow::Result<ScanReport> {
    cfg.validate()?;

    let (probe, config_errors) = registry.build(cfg);
    if cfg.strict_startup {
        if let Some(e) = config_errors.first() {
            anyhow::bail!("rule {} failed to configure: {}", e.rule_id, e.message);
        }
    }
    let valid: HashSet<String> = probe.iter().map(|r| r.descriptor().id.clone()).collect();
    drop(probe);
    let registry = registry.filtered(&valid);
    debug!(
        rules = registry.len(),
        skipped = config_errors.len(),
        packages = packages.len(),
        concurrency = cfg.concurrency,
        "starting analysis"
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(cfg.concurrency)
        .build()?;
    let outcomes: Vec<PackageOutcome> = pool.install(|| {
        packages
            .par_iter()
            .map_init(
                // One rule-instance set per worker thread: instances are
                // never shared across threads, and a package is always
                // visited sequentially by the set that owns it.
                || registry.build(cfg).0,
                |rules, package| run_package(package, rules, cfg),
            )
            .collect()
    });

    // Single write point for issues, metrics and errors.
    let mut report = ScanReport::default();
    for outcome in outcomes {
        report.metrics.merge(&outcome.metrics);
        report.issues.extend(outcome.issues);
        for (file, error) in outcome.errors {
            report.errors.entry(file).or_default().push(error);
        }
    }
    dedup_issues(&mut report.issues);
    canonical_sort(&mut report.issues);
    Ok(report)
}

/// [`process`] over a frontend [`LoadOutcome`], seeding the report's error
/// map with the frontend's per-file errors so partial loads still report
/// everything analyzable.
pub fn process_load(
    outcome: &LoadOutcome,
    registry: &RuleRegistry,
    cfg: &RunConfig,
) -> anyhow::Result<ScanReport> {
    let mut report = process(&outcome.packages, registry, cfg)?;
    for (file, errors) in &outcome.errors {
        report
            .errors
            .entry(file.clone())
            .or_default()
            .extend(errors.iter().cloned());
    }
    Ok(report)
}
