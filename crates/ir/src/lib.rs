//! Data model shared between the frontend and the CodeSentry engine.
//!
//! The frontend (parsing, type-checking, package loading) builds one
//! [`CompilationUnit`] per source file and groups them into
//! [`PackageModel`]s. Everything here is read-only during analysis: the
//! engine never mutates a unit, and type lookup tables are frozen once a
//! package is built.

pub mod ast;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use ast::{AstNode, NodeKind, Preorder, Span, SyntaxTree};

/// A source comment, with the leader (`//`, `/* */`) already stripped by
/// the frontend. `column` is the column of the first content character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub line: usize,
    pub column: usize,
    pub text: String,
}

impl Comment {
    pub fn new(line: usize, column: usize, text: impl Into<String>) -> Self {
        Self {
            line,
            column,
            text: text.into(),
        }
    }
}

/// One source file: its syntax tree, comments and the slice of the type
/// model that concerns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub path: String,
    pub tree: SyntaxTree,
    /// Comments in source order.
    pub comments: Vec<Comment>,
    /// Local import name (alias-aware) to module path.
    #[serde(default)]
    pub imports: HashMap<String, String>,
    /// Node id to inferred type string. Partial by design: entries are
    /// missing wherever type-checking could not resolve an expression.
    #[serde(default)]
    pub node_types: HashMap<usize, String>,
    /// Physical line count of the file.
    pub lines: usize,
    /// Marked as machine-generated by the frontend.
    #[serde(default)]
    pub generated: bool,
    /// Belongs to the package's test sources.
    #[serde(default)]
    pub test_file: bool,
}

impl CompilationUnit {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tree: SyntaxTree::new(),
            comments: Vec::new(),
            imports: HashMap::new(),
            node_types: HashMap::new(),
            lines: 0,
            generated: false,
            test_file: false,
        }
    }
}

/// A package: its units plus the scope identifier stateful rules compare
/// to notice they have crossed into a new package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageModel {
    /// Package scope identifier (import path or directory).
    pub path: String,
    pub units: Vec<CompilationUnit>,
}

impl PackageModel {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            units: Vec::new(),
        }
    }

    pub fn push(&mut self, unit: CompilationUnit) {
        self.units.push(unit);
    }
}
