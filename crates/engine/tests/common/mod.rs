#![allow(dead_code)]

//! Shared builders for engine tests: small syntax trees, units, packages
//! and a handful of representative rules.

use engine::helpers::{secret_pattern, shannon_entropy, truncate};
use engine::{
    CallTable, ConfigError, Confidence, Finding, Rule, RuleContext, RuleDescriptor, RuleError,
    RuleRegistry, Severity,
};
use ir::{AstNode, Comment, CompilationUnit, NodeKind, PackageModel, Span};
use serde_json::json;
use std::collections::HashSet;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn comment(line: usize, text: &str) -> Comment {
    Comment::new(line, 3, text)
}

/// `<qualifier>.<name>(...)` as a single-line expression statement.
/// Uses node ids `stmt_id` and `stmt_id + 1`.
pub fn stmt_call(stmt_id: usize, line: usize, qualifier: &str, name: &str) -> AstNode {
    let mut stmt = AstNode::new(
        stmt_id,
        None,
        NodeKind::ExprStmt,
        json!({}),
        Span::line(line, 1, 40),
    );
    stmt.push(AstNode::new(
        stmt_id + 1,
        Some(stmt_id),
        NodeKind::CallExpr,
        json!({"qualifier": qualifier, "name": name}),
        Span::line(line, 1, 38),
    ));
    stmt
}

/// `conn.<name>(...)` with the receiver as an identifier node. Uses node
/// ids `stmt_id..=stmt_id + 2`; the receiver's type goes into
/// `unit.node_types` under `stmt_id + 2`.
pub fn stmt_method_call(stmt_id: usize, line: usize, name: &str) -> AstNode {
    let mut stmt = AstNode::new(
        stmt_id,
        None,
        NodeKind::ExprStmt,
        json!({}),
        Span::line(line, 1, 40),
    );
    let mut call = AstNode::new(
        stmt_id + 1,
        Some(stmt_id),
        NodeKind::CallExpr,
        json!({"name": name, "receiver": stmt_id + 2}),
        Span::line(line, 1, 38),
    );
    call.push(AstNode::new(
        stmt_id + 2,
        Some(stmt_id + 1),
        NodeKind::Ident,
        json!({"name": "conn"}),
        Span::line(line, 1, 5),
    ));
    stmt.push(call);
    stmt
}

/// `<qualifier>.<name>(arg, ...)` with identifier arguments.
/// Argument ids are chosen by the caller.
pub fn stmt_call_with_args(
    stmt_id: usize,
    line: usize,
    qualifier: &str,
    name: &str,
    args: &[(usize, &str)],
) -> AstNode {
    let arg_ids: Vec<usize> = args.iter().map(|(id, _)| *id).collect();
    let mut stmt = AstNode::new(
        stmt_id,
        None,
        NodeKind::ExprStmt,
        json!({}),
        Span::line(line, 1, 40),
    );
    let mut call = AstNode::new(
        stmt_id + 1,
        Some(stmt_id),
        NodeKind::CallExpr,
        json!({"qualifier": qualifier, "name": name, "args": arg_ids}),
        Span::line(line, 1, 38),
    );
    for (id, ident) in args {
        call.push(AstNode::new(
            *id,
            Some(stmt_id + 1),
            NodeKind::Ident,
            json!({"name": ident}),
            Span::line(line, 20, 28),
        ));
    }
    stmt.push(call);
    stmt
}

/// `<target> := <qualifier>.<name>(...)`. Uses ids `stmt_id`, `stmt_id+1`.
pub fn assign_call(
    stmt_id: usize,
    line: usize,
    target: &str,
    qualifier: &str,
    name: &str,
) -> AstNode {
    let mut stmt = AstNode::new(
        stmt_id,
        None,
        NodeKind::AssignStmt,
        json!({"targets": [target], "value": stmt_id + 1}),
        Span::line(line, 1, 40),
    );
    stmt.push(AstNode::new(
        stmt_id + 1,
        Some(stmt_id),
        NodeKind::CallExpr,
        json!({"qualifier": qualifier, "name": name}),
        Span::line(line, 10, 38),
    ));
    stmt
}

/// `<target> := <multi-line literal>` spanning several lines; the literal
/// node itself starts one line below the statement, so findings on it are
/// reported inside the statement span but not on its first line.
pub fn assign_multiline_literal(
    stmt_id: usize,
    start_line: usize,
    end_line: usize,
    target: &str,
    text: &str,
) -> AstNode {
    let mut stmt = AstNode::new(
        stmt_id,
        None,
        NodeKind::AssignStmt,
        json!({"targets": [target], "value": stmt_id + 1}),
        Span::new(start_line, 1, end_line, 2),
    );
    stmt.push(AstNode::new(
        stmt_id + 1,
        Some(stmt_id),
        NodeKind::BasicLit,
        json!({"text": text, "lit_kind": "string"}),
        Span::new(start_line + 1, 5, end_line, 2),
    ));
    stmt
}

pub fn unit_with(path: &str, stmts: Vec<AstNode>) -> CompilationUnit {
    let mut unit = CompilationUnit::new(path);
    for stmt in stmts {
        unit.tree.push(stmt);
    }
    unit.lines = 20;
    unit
}

pub fn package(path: &str, units: Vec<CompilationUnit>) -> PackageModel {
    let mut pkg = PackageModel::new(path);
    for unit in units {
        pkg.push(unit);
    }
    pkg
}

fn table_of(entries: &[(String, String)]) -> CallTable {
    let mut table = CallTable::new();
    for (selector, name) in entries {
        table.add(selector, name);
    }
    table
}

/// Flags calls to a fixed set of blocklisted symbols.
pub struct BlocklistRule {
    descriptor: RuleDescriptor,
    calls: CallTable,
    strict: bool,
}

impl Rule for BlocklistRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &mut self,
        node: &AstNode,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Finding>, RuleError> {
        Ok(self
            .calls
            .match_call(node, ctx.unit, self.strict)
            .map(|site| {
                Finding::new(
                    &self.descriptor,
                    &ctx.unit.path,
                    site.span,
                    format!("blocklisted call to {}.{}", site.selector, site.name),
                )
            }))
    }
}

pub fn register_blocklist(
    registry: &mut RuleRegistry,
    id: &str,
    entries: &[(&str, &str)],
    strict: bool,
) {
    let descriptor = RuleDescriptor::new(
        id,
        "use of a blocklisted call",
        Severity::Medium,
        Confidence::High,
        vec![NodeKind::CallExpr],
    );
    let entries: Vec<(String, String)> = entries
        .iter()
        .map(|(s, n)| (s.to_string(), n.to_string()))
        .collect();
    let template = descriptor.clone();
    registry.register(descriptor, move |_cfg| {
        Ok(Box::new(BlocklistRule {
            descriptor: template.clone(),
            calls: table_of(&entries),
            strict,
        }))
    });
}

/// Marks variables assigned from a producer call and fires when one of
/// them reaches a sink call. Keeps private state across the nodes of a
/// package and resets it when the package scope changes.
pub struct TaintRule {
    descriptor: RuleDescriptor,
    producers: CallTable,
    sinks: CallTable,
    tainted: HashSet<String>,
    scope: Option<String>,
}

impl Rule for TaintRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &mut self,
        node: &AstNode,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Finding>, RuleError> {
        if self.scope.as_deref() != Some(ctx.package.path.as_str()) {
            self.tainted.clear();
            self.scope = Some(ctx.package.path.clone());
        }
        match node.kind {
            NodeKind::AssignStmt => {
                if let Some(value_id) = node.assign_value() {
                    let value = ctx.unit.tree.node(value_id).ok_or_else(|| {
                        RuleError::new(&self.descriptor.id, "dangling assignment value node")
                    })?;
                    if self.producers.match_call(value, ctx.unit, false).is_some() {
                        for target in node.assign_targets() {
                            self.tainted.insert(target.to_string());
                        }
                    }
                }
                Ok(None)
            }
            NodeKind::CallExpr => {
                if self.sinks.match_call(node, ctx.unit, false).is_none() {
                    return Ok(None);
                }
                for arg_id in node.call_args() {
                    let tainted = ctx
                        .unit
                        .tree
                        .node(arg_id)
                        .and_then(|arg| arg.ident_name())
                        .is_some_and(|name| self.tainted.contains(name));
                    if tainted {
                        return Ok(Some(Finding::new(
                            &self.descriptor,
                            &ctx.unit.path,
                            node.span,
                            "value from a risky constructor reaches a risky sink",
                        )));
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

pub fn register_taint(
    registry: &mut RuleRegistry,
    id: &str,
    producers: &[(&str, &str)],
    sinks: &[(&str, &str)],
) {
    let descriptor = RuleDescriptor::new(
        id,
        "risky value reaches a risky sink",
        Severity::High,
        Confidence::Medium,
        vec![NodeKind::AssignStmt, NodeKind::CallExpr],
    );
    let producers: Vec<(String, String)> = producers
        .iter()
        .map(|(s, n)| (s.to_string(), n.to_string()))
        .collect();
    let sinks: Vec<(String, String)> = sinks
        .iter()
        .map(|(s, n)| (s.to_string(), n.to_string()))
        .collect();
    let template = descriptor.clone();
    registry.register(descriptor, move |_cfg| {
        Ok(Box::new(TaintRule {
            descriptor: template.clone(),
            producers: table_of(&producers),
            sinks: table_of(&sinks),
            tainted: HashSet::new(),
            scope: None,
        }))
    });
}

/// Flags string literals that look like credentials, by pattern or by
/// entropy. The threshold comes from the rule's configuration blob.
pub struct SecretRule {
    descriptor: RuleDescriptor,
    threshold: f64,
}

impl Rule for SecretRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &mut self,
        node: &AstNode,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Finding>, RuleError> {
        let Some(text) = node.literal_text() else {
            return Ok(None);
        };
        let suspicious =
            secret_pattern(text).is_some() || shannon_entropy(text) > self.threshold;
        if !suspicious {
            return Ok(None);
        }
        Ok(Some(Finding::new(
            &self.descriptor,
            &ctx.unit.path,
            node.span,
            format!("credential-like literal '{}'", truncate(text, 16)),
        )))
    }
}

pub const SECRET_DEFAULT_THRESHOLD: f64 = 3.8;

pub fn register_secret(registry: &mut RuleRegistry, id: &str) {
    let descriptor = RuleDescriptor::new(
        id,
        "credential-like literal",
        Severity::High,
        Confidence::Low,
        vec![NodeKind::BasicLit],
    );
    let template = descriptor.clone();
    let rule_id = id.to_string();
    registry.register(descriptor, move |cfg| {
        let threshold = match cfg.rule_config(&rule_id) {
            None => SECRET_DEFAULT_THRESHOLD,
            Some(blob) => blob
                .get("entropy_threshold")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| {
                    ConfigError::new(&rule_id, "entropy_threshold must be a number")
                })?,
        };
        Ok(Box::new(SecretRule {
            descriptor: template.clone(),
            threshold,
        }))
    });
}

/// Always fails to evaluate; used to verify failure isolation.
pub struct FailingRule {
    descriptor: RuleDescriptor,
}

impl Rule for FailingRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &mut self,
        _node: &AstNode,
        _ctx: &RuleContext<'_>,
    ) -> Result<Option<Finding>, RuleError> {
        Err(RuleError::new(
            &self.descriptor.id,
            "scratch state type mismatch",
        ))
    }
}

pub fn register_failing(registry: &mut RuleRegistry, id: &str) {
    let descriptor = RuleDescriptor::new(
        id,
        "always fails",
        Severity::Low,
        Confidence::Low,
        vec![NodeKind::CallExpr],
    );
    let template = descriptor.clone();
    registry.register(descriptor, move |_cfg| {
        Ok(Box::new(FailingRule {
            descriptor: template.clone(),
        }))
    });
}
