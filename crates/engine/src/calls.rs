//! Call resolution: deciding whether a call-site node invokes one of a
//! rule's configured symbols, under partial type information.
//!
//! A [`CallTable`] maps selectors (module paths or receiver type strings)
//! to identifier sets. Tables are built at rule construction and frozen
//! afterwards, so concurrent reads need no synchronization. Resolution
//! never matches on a bare name: the callee must be a qualified reference,
//! and at least one of import resolution, receiver-type lookup or (in lax
//! mode) the written qualifier has to line up.

use ir::{AstNode, CompilationUnit, NodeKind, Span};
use std::collections::{HashMap, HashSet};

/// A resolved call site: which table entry matched, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Matched selector in canonical (non-pointer) form.
    pub selector: String,
    pub name: String,
    pub span: Span,
}

/// Canonical form of a selector: pointer/value receiver spelling collapses
/// to the plain type, since method sets are receiver-shape-insensitive at
/// the call site.
fn normalize_selector(selector: &str) -> &str {
    let mut s = selector.trim();
    loop {
        if s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
            s = &s[1..s.len() - 1];
            continue;
        }
        if let Some(rest) = s.strip_prefix('*') {
            s = rest;
            continue;
        }
        if let Some(rest) = s.strip_prefix('&') {
            s = rest;
            continue;
        }
        return s;
    }
}

/// Final path segment of a module selector (`md5` for `crypto/md5`).
fn final_segment(selector: &str) -> &str {
    selector.rsplit('/').next().unwrap_or(selector)
}

/// Selector to identifier-set table. Append-only before first use, frozen
/// after.
#[derive(Debug, Clone, Default)]
pub struct CallTable {
    entries: HashMap<String, HashSet<String>>,
}

impl CallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one identifier under a selector. Idempotent and
    /// order-independent.
    pub fn add(&mut self, selector: &str, ident: &str) {
        self.entries
            .entry(normalize_selector(selector).to_string())
            .or_default()
            .insert(ident.to_string());
    }

    pub fn add_all(&mut self, selector: &str, idents: &[&str]) {
        for ident in idents {
            self.add(selector, ident);
        }
    }

    pub fn contains(&self, selector: &str, ident: &str) -> bool {
        self.entries
            .get(normalize_selector(selector))
            .is_some_and(|names| names.contains(ident))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a call-site node against the table.
    ///
    /// Resolution order: imported-module qualifier, then inferred receiver
    /// type (pointer/value normalized). With `strict` set, an unresolved
    /// qualifier never matches; without it, the written qualifier text may
    /// match a selector (or its final path segment) to cover
    /// partially-type-checked input.
    pub fn match_call(
        &self,
        node: &AstNode,
        unit: &CompilationUnit,
        strict: bool,
    ) -> Option<CallSite> {
        if node.kind != NodeKind::CallExpr {
            return None;
        }
        let name = node.call_name()?;
        let qualifier = node.call_qualifier();
        let receiver = node.call_receiver();
        if qualifier.is_none() && receiver.is_none() {
            // Bare names never match, whatever the mode.
            return None;
        }

        if let Some(q) = qualifier {
            if let Some(module) = unit.imports.get(q) {
                // The qualifier is an imported module: resolution is
                // definitive either way.
                if self.contains(module, name) {
                    return Some(CallSite {
                        selector: normalize_selector(module).to_string(),
                        name: name.to_string(),
                        span: node.span,
                    });
                }
                return None;
            }
        }

        if let Some(rid) = receiver {
            if let Some(ty) = unit.node_types.get(&rid) {
                let canonical = normalize_selector(ty);
                if self.contains(canonical, name) {
                    return Some(CallSite {
                        selector: canonical.to_string(),
                        name: name.to_string(),
                        span: node.span,
                    });
                }
                return None;
            }
        }

        if strict {
            return None;
        }

        // Lax fallback: the type model could not resolve the qualifier;
        // accept the written text against a selector or its final segment.
        let q = qualifier?;
        let mut hit: Option<&String> = None;
        for (selector, names) in &self.entries {
            if !names.contains(name) {
                continue;
            }
            if selector == q || final_segment(selector) == q {
                match hit {
                    Some(prev) if prev <= selector => {}
                    _ => hit = Some(selector),
                }
            }
        }
        hit.map(|selector| CallSite {
            selector: selector.clone(),
            name: name.to_string(),
            span: node.span,
        })
    }
}
