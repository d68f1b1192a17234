//! In-source suppression: directive parsing and application.
//!
//! The directive micro-language lives in comments:
//!
//! ```text
//! #nosec                       -- blanket, silences every rule
//! #nosec G401 G402             -- only the listed rule ids
//! #nosec !G401                 -- legacy negated list, same meaning
//! #nosec G401 -- false positive, reviewed 2024-03
//! ```
//!
//! The tag must be the first token of the comment content; a marker word
//! buried mid-sentence never suppresses. Directives attach to the nearest
//! enclosing statement and cover every finding inside that statement's
//! span, which is what keeps a directive above a multi-line literal in
//! effect for findings reported deep inside it. Anything unparseable is
//! treated as "no directive": an ambiguous tag fails open to reporting,
//! never to suppressing.

use crate::config::RunConfig;
use crate::report::{Finding, Issue, Suppression, SuppressionKind};
use ir::{CompilationUnit, Span};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const EXTERNAL_JUSTIFICATION: &str = "globally excluded rule";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Silences every rule on the governed statement.
    Blanket,
    /// Silences only the listed rule ids.
    RuleList,
}

/// A parsed suppression directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionDirective {
    pub kind: DirectiveKind,
    pub rules: HashSet<String>,
    /// Free text after the `--` separator. Stored, never matched on.
    pub justification: String,
    /// Line the directive comment sits on.
    pub line: usize,
}

impl SuppressionDirective {
    /// Whether the directive silences `rule_id`.
    pub fn covers(&self, rule_id: &str) -> bool {
        match self.kind {
            DirectiveKind::Blanket => true,
            DirectiveKind::RuleList => self.rules.contains(rule_id),
        }
    }
}

static RULE_ID_RE: OnceLock<Regex> = OnceLock::new();

fn rule_id_re() -> &'static Regex {
    RULE_ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("rule id regex"))
}

/// Parses one comment's content into a directive.
///
/// `tag` is the full tag, marker included (`#nosec`). Matching is
/// case-sensitive and the tag must be the first token after optional
/// leading whitespace. A malformed rule-id token voids the whole
/// directive.
pub fn parse_directive(text: &str, tag: &str, line: usize) -> Option<SuppressionDirective> {
    let content = text.trim_start();
    let rest = content.strip_prefix(tag)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        // Tag must be a whole token: `#nosecure` is not `#nosec`.
        return None;
    }

    let (body, justification) = match rest.find("--") {
        Some(pos) => (&rest[..pos], rest[pos + 2..].trim().to_string()),
        None => (rest, String::new()),
    };

    let mut rules = HashSet::new();
    for token in body.split_whitespace() {
        // Legacy negated-list dialect: `!G401` means the same as `G401`.
        let id = token.strip_prefix('!').unwrap_or(token);
        if !rule_id_re().is_match(id) {
            return None;
        }
        rules.insert(id.to_string());
    }

    let kind = if rules.is_empty() {
        DirectiveKind::Blanket
    } else {
        DirectiveKind::RuleList
    };
    Some(SuppressionDirective {
        kind,
        rules,
        justification,
        line,
    })
}

/// Directives of one unit, resolved to the statement spans they govern.
#[derive(Debug, Default)]
pub struct DirectiveIndex {
    spans: Vec<(Span, SuppressionDirective)>,
}

impl DirectiveIndex {
    /// Attaches directives to statements.
    ///
    /// Only the comment line immediately above a statement (or a trailing
    /// directive inside its span) governs it: of stacked directives the
    /// last one wins, and an intervening unrelated comment breaks the
    /// chain. When several comments share a line, the later one is kept.
    pub fn build(unit: &CompilationUnit, tag: &str) -> Self {
        let mut by_line: HashMap<usize, SuppressionDirective> = HashMap::new();
        for comment in &unit.comments {
            if let Some(d) = parse_directive(&comment.text, tag, comment.line) {
                by_line.insert(comment.line, d);
            }
        }
        if by_line.is_empty() {
            return Self::default();
        }

        let mut spans = Vec::new();
        for node in unit.tree.preorder() {
            if !node.kind.is_statement() {
                continue;
            }
            let span = node.span;
            let mut governing = None;
            for line in span.start_line..=span.end_line {
                if let Some(d) = by_line.get(&line) {
                    governing = Some(d);
                }
            }
            if governing.is_none() {
                if let Some(above) = span.start_line.checked_sub(1) {
                    governing = by_line.get(&above);
                }
            }
            if let Some(d) = governing {
                spans.push((span, d.clone()));
            }
        }
        Self { spans }
    }

    /// The directive governing a position, from the innermost enclosing
    /// statement.
    pub fn directive_at(&self, line: usize, column: usize) -> Option<&SuppressionDirective> {
        self.spans
            .iter()
            .filter(|(span, _)| span.contains(line, column))
            .min_by_key(|(span, _)| (span.line_count(), std::cmp::Reverse(span.start_line)))
            .map(|(_, directive)| directive)
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Per-unit suppression decisions for candidate findings.
pub struct SuppressionMatcher {
    index: DirectiveIndex,
    ignore_in_source: bool,
    excluded: HashSet<String>,
}

impl SuppressionMatcher {
    pub fn for_unit(unit: &CompilationUnit, cfg: &RunConfig) -> Self {
        // Directives are parsed even when ignored, so the decision to
        // honor them stays a query-time concern.
        Self {
            index: DirectiveIndex::build(unit, &cfg.tag()),
            ignore_in_source: cfg.ignore_suppressions,
            excluded: cfg.excluded_rules.clone(),
        }
    }

    /// Every suppression that applies to a finding. In-source and external
    /// suppressions are independent; both can apply at once and both are
    /// returned.
    pub fn suppressions_for(&self, finding: &Finding) -> Vec<Suppression> {
        let mut out = Vec::new();
        if !self.ignore_in_source {
            if let Some(directive) = self.index.directive_at(finding.line, finding.column) {
                if directive.covers(&finding.rule_id) {
                    out.push(Suppression {
                        kind: SuppressionKind::InSource,
                        justification: directive.justification.clone(),
                    });
                }
            }
        }
        if self.excluded.contains(&finding.rule_id) {
            out.push(Suppression {
                kind: SuppressionKind::External,
                justification: EXTERNAL_JUSTIFICATION.to_string(),
            });
        }
        out
    }

    /// Applies suppressions to an issue, recording each applicable
    /// suppression exactly once. Re-applying is a no-op and never touches
    /// the finding itself.
    pub fn apply(&self, issue: &mut Issue) {
        for suppression in self.suppressions_for(&issue.finding) {
            if !issue.suppressions.contains(&suppression) {
                issue.suppressions.push(suppression);
            }
        }
    }
}
