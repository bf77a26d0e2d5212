// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Syntax nodes of the program graph.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Every node
//! knows its parent, so analyses can walk upwards from a reference to the
//! statement, block, or member that contains it.

use serde::{Deserialize, Serialize};

use crate::symbol::SymbolId;
use crate::types::TypeId;
use crate::{NodeId, Span};

/// A node in the syntax arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub span: Span,
    /// `None` only for root declarations.
    pub parent: Option<NodeId>,
}

/// How an argument or parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RefKind {
    /// By value.
    #[default]
    None,
    Ref,
    Out,
    /// Read-only reference.
    In,
}

impl RefKind {
    /// Whether the callee can write a new value through this binding.
    pub fn is_writable(self) -> bool {
        matches!(self, RefKind::Ref | RefKind::Out)
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// `default` / `default(T)`
    Default,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// The kind of a node, with its children inline.
#[derive(Debug, Clone)]
pub enum NodeKind {
    // ── Declarations ────────────────────────────────────────────
    /// A class or struct declaration.
    TypeDecl { ty: TypeId, members: Vec<NodeId> },
    /// Method, constructor, or local function. `body` is either a block or an
    /// expression (arrow body).
    MethodDecl {
        symbol: SymbolId,
        params: Vec<NodeId>,
        body: Option<NodeId>,
    },
    /// Property declaration. Getter/setter bodies are blocks or expressions.
    PropertyDecl {
        symbol: SymbolId,
        getter: Option<NodeId>,
        setter: Option<NodeId>,
        initializer: Option<NodeId>,
    },
    FieldDecl {
        symbol: SymbolId,
        initializer: Option<NodeId>,
    },
    Parameter {
        symbol: SymbolId,
        default: Option<NodeId>,
    },
    /// `var x = init;` or `using var x = init;`.
    LocalDecl {
        symbol: SymbolId,
        initializer: Option<NodeId>,
        is_using: bool,
    },

    // ── Statements ──────────────────────────────────────────────
    Block { statements: Vec<NodeId> },
    ExprStmt { expr: NodeId },
    Return { value: Option<NodeId> },
    /// `using (resource) body` where `resource` is a local declaration or an
    /// expression.
    Using { resource: NodeId, body: NodeId },
    If {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    /// `while`, `for` and `foreach`. `header` is the condition or the iterated
    /// expression.
    Loop { header: Option<NodeId>, body: NodeId },

    // ── Expressions ─────────────────────────────────────────────
    Literal(Literal),
    /// A simple name. What it denotes comes from the graph's resolution table.
    Identifier { name: String },
    This,
    Base,
    /// `receiver.name`, or `receiver?.name` when `conditional`.
    MemberAccess {
        receiver: NodeId,
        name: String,
        conditional: bool,
    },
    Invocation { callee: NodeId, args: Vec<NodeId> },
    /// `new T(args) { initializer }`
    ObjectCreation {
        ty: TypeId,
        args: Vec<NodeId>,
        initializer: Vec<NodeId>,
    },
    Argument {
        name: Option<String>,
        ref_kind: RefKind,
        expr: NodeId,
    },
    Assignment { target: NodeId, value: NodeId },
    Lambda { params: Vec<NodeId>, body: NodeId },
    Await { expr: NodeId },
    Cast { expr: NodeId, ty: TypeId },
    Conditional {
        condition: NodeId,
        when_true: NodeId,
        when_false: NodeId,
    },
    Coalesce { value: NodeId, fallback: NodeId },
    Unary { op: UnaryOp, operand: NodeId },
    /// `_` as an assignment target.
    Discard,
}

impl NodeKind {
    /// Direct children in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::TypeDecl { members, .. } => members.clone(),
            NodeKind::MethodDecl { params, body, .. } => {
                params.iter().copied().chain(body.iter().copied()).collect()
            }
            NodeKind::PropertyDecl { getter, setter, initializer, .. } => getter
                .iter()
                .chain(setter.iter())
                .chain(initializer.iter())
                .copied()
                .collect(),
            NodeKind::FieldDecl { initializer, .. } => initializer.iter().copied().collect(),
            NodeKind::Parameter { default, .. } => default.iter().copied().collect(),
            NodeKind::LocalDecl { initializer, .. } => initializer.iter().copied().collect(),
            NodeKind::Block { statements } => statements.clone(),
            NodeKind::ExprStmt { expr } => vec![*expr],
            NodeKind::Return { value } => value.iter().copied().collect(),
            NodeKind::Using { resource, body } => vec![*resource, *body],
            NodeKind::If { condition, then_branch, else_branch } => {
                let mut out = vec![*condition, *then_branch];
                out.extend(else_branch.iter().copied());
                out
            }
            NodeKind::Loop { header, body } => {
                header.iter().copied().chain(std::iter::once(*body)).collect()
            }
            NodeKind::Literal(_)
            | NodeKind::Identifier { .. }
            | NodeKind::This
            | NodeKind::Base
            | NodeKind::Discard => Vec::new(),
            NodeKind::MemberAccess { receiver, .. } => vec![*receiver],
            NodeKind::Invocation { callee, args } => {
                std::iter::once(*callee).chain(args.iter().copied()).collect()
            }
            NodeKind::ObjectCreation { args, initializer, .. } => {
                args.iter().chain(initializer.iter()).copied().collect()
            }
            NodeKind::Argument { expr, .. } => vec![*expr],
            NodeKind::Assignment { target, value } => vec![*target, *value],
            NodeKind::Lambda { params, body } => {
                params.iter().copied().chain(std::iter::once(*body)).collect()
            }
            NodeKind::Await { expr } | NodeKind::Cast { expr, .. } => vec![*expr],
            NodeKind::Conditional { condition, when_true, when_false } => {
                vec![*condition, *when_true, *when_false]
            }
            NodeKind::Coalesce { value, fallback } => vec![*value, *fallback],
            NodeKind::Unary { operand, .. } => vec![*operand],
        }
    }

    /// The symbol introduced by a declaration node.
    pub fn declared_symbol(&self) -> Option<SymbolId> {
        match self {
            NodeKind::MethodDecl { symbol, .. }
            | NodeKind::PropertyDecl { symbol, .. }
            | NodeKind::FieldDecl { symbol, .. }
            | NodeKind::Parameter { symbol, .. }
            | NodeKind::LocalDecl { symbol, .. } => Some(*symbol),
            _ => None,
        }
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::LocalDecl { .. }
                | NodeKind::Block { .. }
                | NodeKind::ExprStmt { .. }
                | NodeKind::Return { .. }
                | NodeKind::Using { .. }
                | NodeKind::If { .. }
                | NodeKind::Loop { .. }
        )
    }

    /// Members, local functions and lambdas: the boundaries a `return` cannot
    /// cross.
    pub fn is_function_boundary(&self) -> bool {
        matches!(
            self,
            NodeKind::MethodDecl { .. }
                | NodeKind::PropertyDecl { .. }
                | NodeKind::FieldDecl { .. }
                | NodeKind::Lambda { .. }
        )
    }
}
