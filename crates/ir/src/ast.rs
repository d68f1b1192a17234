//! Syntax tree representation handed to the engine by the frontend.
//!
//! The tree preserves the source hierarchy; a flat node index ordered by
//! `id` allows O(1) lookups from node references stored elsewhere (type
//! tables, call payloads). [`Span`] locates every node in the file.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Inclusive source region, 1-based lines and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Span covering part of a single line.
    pub fn line(line: usize, start_column: usize, end_column: usize) -> Self {
        Self::new(line, start_column, line, end_column)
    }

    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Whether a position falls inside the span. Columns only constrain
    /// the boundary lines.
    pub fn contains(&self, line: usize, column: usize) -> bool {
        if !self.contains_line(line) {
            return false;
        }
        if line == self.start_line && column < self.start_column {
            return false;
        }
        if line == self.end_line && column > self.end_column {
            return false;
        }
        true
    }

    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// Logical kind of a syntax node. Rules subscribe to kinds; the dispatcher
/// only hands a rule nodes whose kind it declared interest in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    CallExpr,
    AssignStmt,
    DeclStmt,
    ExprStmt,
    ReturnStmt,
    RangeStmt,
    BlockStmt,
    FuncDecl,
    ImportSpec,
    BasicLit,
    CompositeLit,
    BinaryExpr,
    Ident,
    Other,
}

impl NodeKind {
    /// Kinds that can carry a suppression directive. Directives attach to
    /// the nearest enclosing statement, never to bare expressions.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::AssignStmt
                | NodeKind::DeclStmt
                | NodeKind::ExprStmt
                | NodeKind::ReturnStmt
                | NodeKind::RangeStmt
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNode {
    /// Incremental unique identifier of the node within the unit.
    pub id: usize,
    /// Reference to the parent node, if any.
    pub parent: Option<usize>,
    pub kind: NodeKind,
    /// Kind-specific payload (callee parts, literal text, identifier name).
    pub value: JsonValue,
    /// Children in source order, preserving structural context.
    pub children: Vec<AstNode>,
    pub span: Span,
}

impl AstNode {
    pub fn new(
        id: usize,
        parent: Option<usize>,
        kind: NodeKind,
        value: JsonValue,
        span: Span,
    ) -> Self {
        Self {
            id,
            parent,
            kind,
            value,
            children: Vec::new(),
            span,
        }
    }

    fn value_str(&self, key: &str) -> Option<&str> {
        self.value.get(key)?.as_str()
    }

    fn value_id(&self, key: &str) -> Option<usize> {
        self.value.get(key)?.as_u64().map(|v| v as usize)
    }

    /// Callee function or method name of a `CallExpr`.
    pub fn call_name(&self) -> Option<&str> {
        self.value_str("name")
    }

    /// Written qualifier of a `CallExpr` callee (`md5` in `md5.New(...)`),
    /// when the callee is a simple qualified reference.
    pub fn call_qualifier(&self) -> Option<&str> {
        self.value_str("qualifier")
    }

    /// Node id of the receiver expression of a method call.
    pub fn call_receiver(&self) -> Option<usize> {
        self.value_id("receiver")
    }

    /// Node ids of the call arguments, in order.
    pub fn call_args(&self) -> Vec<usize> {
        self.value
            .get("args")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_u64())
                    .map(|v| v as usize)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Raw text of a `BasicLit`, quotes stripped by the frontend.
    pub fn literal_text(&self) -> Option<&str> {
        self.value_str("text")
    }

    pub fn ident_name(&self) -> Option<&str> {
        self.value_str("name")
    }

    /// Target identifiers of an `AssignStmt`.
    pub fn assign_targets(&self) -> Vec<&str> {
        self.value
            .get("targets")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// Node id of the assigned value expression.
    pub fn assign_value(&self) -> Option<usize> {
        self.value_id("value")
    }

    pub fn push(&mut self, child: AstNode) {
        self.children.push(child);
    }
}

/// Tree of one compilation unit: root nodes plus a flat index ordered by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyntaxTree {
    /// Root nodes of the tree.
    pub nodes: Vec<AstNode>,
    /// Flat node index ordered by `id`.
    pub index: Vec<AstNode>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: AstNode) {
        self.collect(&node);
        self.nodes.push(node);
    }

    fn collect(&mut self, node: &AstNode) {
        if node.id == self.index.len() {
            self.index.push(node.clone());
        } else if node.id < self.index.len() {
            self.index[node.id] = node.clone();
        } else {
            self.index.push(node.clone());
        }
        for child in &node.children {
            self.collect(child);
        }
    }

    /// Node lookup by id.
    pub fn node(&self, id: usize) -> Option<&AstNode> {
        self.index.get(id).filter(|n| n.id == id)
    }

    /// Parent node of `id`, if any.
    pub fn parent(&self, id: usize) -> Option<&AstNode> {
        self.node(id)
            .and_then(|n| n.parent.and_then(|p| self.node(p)))
    }

    /// Visits every node once in a stable pre-order. The order never varies
    /// between runs over the same tree.
    pub fn preorder(&self) -> Preorder<'_> {
        let mut stack: Vec<&AstNode> = Vec::with_capacity(self.nodes.len());
        for root in self.nodes.iter().rev() {
            stack.push(root);
        }
        Preorder { stack }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Depth-first pre-order traversal over a [`SyntaxTree`].
pub struct Preorder<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}
