// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-query state: target resolution and the recursion guard.

use std::collections::{HashMap, HashSet};

use disposal_graph::{
    KnownTypes, Literal, NodeId, NodeKind, ProgramGraph, Symbol, SymbolId, SymbolKind, TypeId,
    WrapperRule,
};
use tracing::{debug, trace};

use crate::cancel::CancellationToken;
use crate::error::AnalysisError;

/// A reference resolved to the symbol it denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    /// The reference: argument, identifier, member access, invocation or
    /// object creation.
    pub source: NodeId,
    pub symbol: SymbolId,
    /// Declaring node that can be walked for more evidence: the method for
    /// arguments and calls, the member or local otherwise.
    pub declaration: Option<NodeId>,
}

/// The value bound to a parameter at a call site.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// Expression of an explicit argument.
    Expr(NodeId),
    /// The parameter's default value.
    Default(Literal),
}

/// State of one top-level query.
///
/// Borrows the graph for the query's duration. Nothing here outlives the
/// query or is visible to another one.
pub struct Recursion<'g, G: ProgramGraph> {
    pub(crate) graph: &'g G,
    pub(crate) known: &'g KnownTypes,
    capability: Option<TypeId>,
    cancel: &'g CancellationToken,
    /// `(symbol, reference)` pairs entered on this query. Only grows.
    visited: HashSet<(SymbolId, NodeId)>,
    targets: HashMap<NodeId, Option<Target>>,
}

impl<'g, G: ProgramGraph> Recursion<'g, G> {
    pub fn new(
        graph: &'g G,
        known: &'g KnownTypes,
        capability: Option<TypeId>,
        cancel: &'g CancellationToken,
    ) -> Self {
        Self {
            graph,
            known,
            capability,
            cancel,
            visited: HashSet::new(),
            targets: HashMap::new(),
        }
    }

    /// Fail if the caller gave up on this query.
    pub fn checkpoint(&self) -> Result<(), AnalysisError> {
        if self.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(())
    }

    /// Record that `target` is being entered. Returns false when it already
    /// was on this query; the caller stops following it there.
    pub fn enter(&mut self, target: &Target) -> bool {
        let fresh = self.visited.insert((target.symbol, target.source));
        if !fresh {
            debug!(symbol = target.symbol.0, node = target.source.0, "recursion guard cut-off");
        }
        fresh
    }

    /// Resolve a reference to its target. Memoized for the query.
    pub fn resolve(&mut self, node: NodeId) -> Option<Target> {
        if let Some(hit) = self.targets.get(&node) {
            return *hit;
        }
        let target = self.resolve_uncached(node);
        trace!(node = node.0, symbol = ?target.map(|t| t.symbol.0), "resolved target");
        self.targets.insert(node, target);
        target
    }

    fn resolve_uncached(&self, node: NodeId) -> Option<Target> {
        match self.graph.kind(node)? {
            NodeKind::Argument { .. } => self.resolve_argument(node),
            NodeKind::Invocation { .. }
            | NodeKind::ObjectCreation { .. }
            | NodeKind::Identifier { .. }
            | NodeKind::MemberAccess { .. } => {
                let symbol = self.graph.symbol_of(node)?;
                Some(Target { source: node, symbol, declaration: self.declaration_of(symbol) })
            }
            _ => None,
        }
    }

    fn declaration_of(&self, symbol: SymbolId) -> Option<NodeId> {
        self.graph.symbol(symbol)?.declarations.first().copied()
    }

    /// Bind an argument to its parameter: by name, else by position, with a
    /// trailing `params` parameter absorbing the rest.
    fn resolve_argument(&self, arg: NodeId) -> Option<Target> {
        let graph = self.graph;
        let NodeKind::Argument { name, .. } = graph.kind(arg)? else {
            return None;
        };
        let call = graph.parent(arg)?;
        let args = match graph.kind(call)? {
            NodeKind::Invocation { args, .. } | NodeKind::ObjectCreation { args, .. } => args,
            _ => return None,
        };
        let method_id = graph.symbol_of(call)?;
        let params = graph.symbol(method_id)?.params();

        let param = match name {
            Some(name) => params
                .iter()
                .copied()
                .find(|&p| graph.symbol(p).is_some_and(|s| &s.name == name))?,
            None => {
                let position = args.iter().position(|&a| a == arg)?;
                match params.get(position) {
                    Some(&p) => p,
                    None => {
                        let &last = params.last()?;
                        let absorbs = matches!(
                            graph.symbol(last)?.kind,
                            SymbolKind::Parameter { is_params: true, .. }
                        );
                        if !absorbs {
                            return None;
                        }
                        last
                    }
                }
            }
        };
        Some(Target {
            source: arg,
            symbol: param,
            declaration: self.declaration_of(method_id),
        })
    }

    /// The value a call passes for the parameter named `parameter`.
    pub fn argument_for(&mut self, call: NodeId, parameter: &str) -> Option<Bound> {
        let graph = self.graph;
        let args = match graph.kind(call)? {
            NodeKind::Invocation { args, .. } | NodeKind::ObjectCreation { args, .. } => args,
            _ => return None,
        };
        for &arg in args {
            let Some(target) = self.resolve(arg) else { continue };
            if graph.symbol(target.symbol).is_some_and(|s| s.name == parameter) {
                if let Some(NodeKind::Argument { expr, .. }) = graph.kind(arg) {
                    return Some(Bound::Expr(*expr));
                }
            }
        }
        let method = graph.symbol(graph.symbol_of(call)?)?;
        method
            .params()
            .iter()
            .filter_map(|&p| graph.symbol(p))
            .find(|p| p.name == parameter)
            .and_then(|p| p.default_value().cloned())
            .map(Bound::Default)
    }

    // ── Type and allow-list queries ─────────────────────────────

    /// Whether values of `ty` carry the resource capability.
    pub fn is_resource(&self, ty: Option<TypeId>) -> bool {
        match (ty, self.capability) {
            (Some(ty), Some(capability)) => self.graph.is_assignable_to(ty, capability),
            _ => false,
        }
    }

    pub fn node_is_resource(&self, node: NodeId) -> bool {
        self.is_resource(self.graph.type_of(node))
    }

    fn owner_name(&self, symbol: &Symbol) -> Option<&'g str> {
        let graph: &'g G = self.graph;
        symbol.containing_type.map(|ty| graph.definition_name(ty))
    }

    pub fn is_non_owning(&self, symbol: &Symbol) -> bool {
        self.owner_name(symbol)
            .is_some_and(|ty| self.known.is_non_owning(ty, &symbol.name))
    }

    pub fn is_passthrough(&self, symbol: &Symbol) -> bool {
        self.owner_name(symbol)
            .is_some_and(|ty| self.known.is_passthrough(ty, &symbol.name))
    }

    pub fn is_storing(&self, symbol: &Symbol) -> bool {
        self.owner_name(symbol)
            .is_some_and(|ty| self.known.is_storing(ty, &symbol.name))
    }

    /// The adopting-wrapper rule covering `ty`, by name or assignability.
    pub fn wrapper_for(&self, ty: TypeId) -> Option<&'g WrapperRule> {
        let graph: &'g G = self.graph;
        let known: &'g KnownTypes = self.known;
        let name = graph.definition_name(ty);
        known.adopting_wrappers.iter().find(|rule| {
            rule.type_name == name
                || graph
                    .lookup_type(&rule.type_name)
                    .is_some_and(|w| graph.is_assignable_to(ty, w))
        })
    }

    pub fn is_disposing_container(&self, ty: TypeId) -> bool {
        self.known.is_disposing_container(self.graph.definition_name(ty))
    }

    /// Receiver of a release call (`x.Dispose()` or `x?.Dispose()`).
    pub fn release_receiver(&self, invocation: NodeId) -> Option<NodeId> {
        let NodeKind::Invocation { callee, args } = self.graph.kind(invocation)? else {
            return None;
        };
        if !args.is_empty() {
            return None;
        }
        match self.graph.kind(*callee)? {
            NodeKind::MemberAccess { receiver, name, .. } if self.known.is_release_method(name) => {
                Some(*receiver)
            }
            _ => None,
        }
    }

    /// Whether `invocation` releases the value `symbol` refers to.
    pub fn is_release_of(&self, invocation: NodeId, symbol: SymbolId) -> bool {
        self.release_receiver(invocation)
            .is_some_and(|r| self.graph.symbol_of(r) == Some(symbol))
    }
}

/// Statically known boolean value of an expression.
pub(crate) fn literal_bool<G: ProgramGraph>(graph: &G, node: NodeId) -> Option<bool> {
    match graph.kind(node)? {
        NodeKind::Literal(Literal::Bool(b)) => Some(*b),
        NodeKind::Cast { expr, .. } => literal_bool(graph, *expr),
        _ => None,
    }
}
