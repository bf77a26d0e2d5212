// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! In-memory program graph.

use std::collections::HashMap;

use crate::program::{ProgramGraph, Resolution};
use crate::symbol::{Symbol, SymbolId, SymbolTable};
use crate::syntax::{Literal, Node, NodeKind};
use crate::types::{TypeDef, TypeId, TypeTable};
use crate::NodeId;

/// Arena-backed [`ProgramGraph`], produced by [`crate::GraphBuilder`].
#[derive(Debug, Default)]
pub struct SyntaxGraph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) symbols: SymbolTable,
    pub(crate) types: TypeTable,
    /// Mapping from reference nodes to what they denote.
    pub(crate) resolutions: HashMap<NodeId, Resolution>,
    /// Types recorded by the front end; everything else is derived.
    pub(crate) node_types: HashMap<NodeId, TypeId>,
}

impl SyntaxGraph {
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Type declarations that are not nested in anything.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.parent.is_none() && matches!(n.kind, NodeKind::TypeDecl { .. }))
            .map(|n| n.id)
    }

    fn derived_type(&self, node: &Node) -> Option<TypeId> {
        match &node.kind {
            NodeKind::ObjectCreation { ty, .. } | NodeKind::Cast { ty, .. } => Some(*ty),
            NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. } | NodeKind::Invocation { .. } => {
                let symbol = self.symbols.get(self.resolve(node.id).single()?)?;
                if symbol.is_constructor() {
                    None
                } else {
                    symbol.ty
                }
            }
            NodeKind::Literal(lit) => {
                let name = match lit {
                    Literal::Bool(_) => "System.Boolean",
                    Literal::Int(_) => "System.Int32",
                    Literal::Str(_) => "System.String",
                    Literal::Null | Literal::Default => return None,
                };
                self.types.lookup(name)
            }
            NodeKind::Argument { expr, .. } => self.type_of(*expr),
            NodeKind::Assignment { value, .. } => self.type_of(*value),
            NodeKind::Conditional { when_true, when_false, .. } => {
                self.type_of(*when_true).or_else(|| self.type_of(*when_false))
            }
            NodeKind::Coalesce { value, fallback } => {
                self.type_of(*value).or_else(|| self.type_of(*fallback))
            }
            NodeKind::Await { expr } => {
                let awaited = self.types.get(self.type_of(*expr)?)?;
                match awaited.type_args.as_slice() {
                    [single] => Some(*single),
                    _ => None,
                }
            }
            NodeKind::This | NodeKind::Base => {
                let decl = self.enclosing_type(node.id)?;
                match self.kind(decl)? {
                    NodeKind::TypeDecl { ty, .. } => Some(*ty),
                    _ => None,
                }
            }
            NodeKind::Unary { .. } => self.types.lookup("System.Boolean"),
            _ => None,
        }
    }
}

impl ProgramGraph for SyntaxGraph {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn resolve(&self, node: NodeId) -> Resolution {
        self.resolutions.get(&node).cloned().unwrap_or_default()
    }

    fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    fn type_def(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id)
    }

    fn type_of(&self, node: NodeId) -> Option<TypeId> {
        if let Some(&ty) = self.node_types.get(&node) {
            return Some(ty);
        }
        self.derived_type(self.node(node)?)
    }

    fn lookup_type(&self, name: &str) -> Option<TypeId> {
        self.types.lookup(name)
    }

    fn is_assignable_to(&self, ty: TypeId, candidate: TypeId) -> bool {
        self.types.is_assignable_to(ty, candidate)
    }

    fn definition_name(&self, ty: TypeId) -> &str {
        self.types.definition_name(ty)
    }
}
