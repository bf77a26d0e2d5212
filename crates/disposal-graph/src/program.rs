// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The interface analyses require from a front end.
//!
//! A front end parses and binds source, then exposes the result through
//! [`ProgramGraph`]. Analyses only ever read the graph; callers must not mutate
//! it while a query is running.

use std::collections::HashSet;

use crate::symbol::{Symbol, SymbolId};
use crate::syntax::{Node, NodeKind};
use crate::types::{TypeDef, TypeId};
use crate::NodeId;

/// What a reference node denotes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    None,
    Single(SymbolId),
    /// Overload resolution failed; several candidates remain.
    Ambiguous(Vec<SymbolId>),
}

impl Resolution {
    /// The symbol, if resolution produced exactly one.
    pub fn single(&self) -> Option<SymbolId> {
        match self {
            Resolution::Single(id) => Some(*id),
            _ => None,
        }
    }
}

/// Read-only access to syntax, bound symbols and the type system.
pub trait ProgramGraph: Sync {
    fn node(&self, id: NodeId) -> Option<&Node>;

    /// Number of nodes; ids are dense in `0..node_count()`.
    fn node_count(&self) -> usize;

    fn resolve(&self, node: NodeId) -> Resolution;

    fn symbol(&self, id: SymbolId) -> Option<&Symbol>;

    fn type_def(&self, id: TypeId) -> Option<&TypeDef>;

    /// Static type of an expression node.
    fn type_of(&self, node: NodeId) -> Option<TypeId>;

    fn lookup_type(&self, name: &str) -> Option<TypeId>;

    fn is_assignable_to(&self, ty: TypeId, candidate: TypeId) -> bool;

    /// Name of the generic definition of `ty`, or its own name.
    fn definition_name(&self, ty: TypeId) -> &str;

    // ── Provided navigation ─────────────────────────────────────

    fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    fn symbol_of(&self, node: NodeId) -> Option<SymbolId> {
        self.resolve(node).single()
    }

    /// Strict ancestors, innermost first.
    fn ancestors(&self, id: NodeId) -> Ancestors<'_, Self>
    where
        Self: Sized,
    {
        Ancestors { graph: self, next: self.parent(id) }
    }

    fn first_ancestor<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        Self: Sized,
        F: Fn(&NodeKind) -> bool,
    {
        self.ancestors(id).find(|&a| self.kind(a).is_some_and(&pred))
    }

    /// Method, property, field or lambda containing `id`.
    fn enclosing_function(&self, id: NodeId) -> Option<NodeId>
    where
        Self: Sized,
    {
        self.first_ancestor(id, NodeKind::is_function_boundary)
    }

    fn enclosing_type(&self, id: NodeId) -> Option<NodeId>
    where
        Self: Sized,
    {
        self.first_ancestor(id, |k| matches!(k, NodeKind::TypeDecl { .. }))
    }

    /// Whether `node` is `ancestor` or lies beneath it.
    fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool
    where
        Self: Sized,
    {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// All nodes beneath `id` in pre-order, excluding `id`.
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.kind(id) {
            Some(kind) => kind.children().into_iter().rev().collect(),
            None => Vec::new(),
        };
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(kind) = self.kind(next) {
                stack.extend(kind.children().into_iter().rev());
            }
        }
        out
    }

    /// Members named `name` declared on `ty` or inherited from its bases.
    fn members_named(&self, ty: TypeId, name: &str) -> Vec<SymbolId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(ty);
        while let Some(t) = current {
            if !seen.insert(t) {
                break;
            }
            let Some(def) = self.type_def(t) else { break };
            let def = match def.definition.and_then(|d| self.type_def(d)) {
                Some(generic) => generic,
                None => def,
            };
            out.extend(
                def.members
                    .iter()
                    .copied()
                    .filter(|&m| self.symbol(m).is_some_and(|s| s.name == name)),
            );
            current = def.base;
        }
        out
    }
}

/// Iterator over a node's ancestors.
pub struct Ancestors<'a, G: ?Sized> {
    graph: &'a G,
    next: Option<NodeId>,
}

impl<G: ProgramGraph + ?Sized> Iterator for Ancestors<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.graph.parent(current);
        Some(current)
    }
}
