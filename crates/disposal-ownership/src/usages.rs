// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Syntactic queries shared by the analyses.

use disposal_graph::{NodeId, NodeKind, ProgramGraph, SymbolId, TypeId};

/// References to `symbol` beneath `scope`, in source order.
pub(crate) fn references<G: ProgramGraph>(graph: &G, symbol: SymbolId, scope: NodeId) -> Vec<NodeId> {
    graph
        .descendants(scope)
        .into_iter()
        .filter(|&n| {
            matches!(
                graph.kind(n),
                Some(NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. })
            ) && graph.symbol_of(n) == Some(symbol)
        })
        .collect()
}

/// Declarations and assignments that bind a new value to `symbol` beneath
/// `scope`, ordered by position.
pub(crate) fn binding_sites<G: ProgramGraph>(graph: &G, symbol: SymbolId, scope: NodeId) -> Vec<NodeId> {
    let mut sites: Vec<NodeId> = graph
        .descendants(scope)
        .into_iter()
        .filter(|&n| bound_symbol(graph, n) == Some(symbol) && bound_value(graph, n).is_some())
        .collect();
    sites.sort_by_key(|&n| graph.node(n).map(|node| node.span.start));
    sites
}

/// Symbol a binding site writes to.
pub(crate) fn bound_symbol<G: ProgramGraph>(graph: &G, site: NodeId) -> Option<SymbolId> {
    match graph.kind(site)? {
        NodeKind::LocalDecl { symbol, .. }
        | NodeKind::FieldDecl { symbol, .. }
        | NodeKind::PropertyDecl { symbol, .. } => Some(*symbol),
        NodeKind::Assignment { target, .. } => graph.symbol_of(*target),
        NodeKind::Argument { expr, ref_kind, .. } if ref_kind.is_writable() => {
            match graph.kind(*expr)? {
                NodeKind::LocalDecl { symbol, .. } => Some(*symbol),
                _ => graph.symbol_of(*expr),
            }
        }
        _ => None,
    }
}

/// Value a binding site stores. For `out`/`ref` arguments this is the
/// argument itself.
pub(crate) fn bound_value<G: ProgramGraph>(graph: &G, site: NodeId) -> Option<NodeId> {
    match graph.kind(site)? {
        NodeKind::LocalDecl { initializer, .. } | NodeKind::FieldDecl { initializer, .. } => *initializer,
        NodeKind::PropertyDecl { initializer, .. } => *initializer,
        NodeKind::Assignment { value, .. } => Some(*value),
        NodeKind::Argument { ref_kind, .. } if ref_kind.is_writable() => Some(site),
        _ => None,
    }
}

/// The statement containing `node`, or `node` itself if it is one.
pub(crate) fn statement_of<G: ProgramGraph>(graph: &G, node: NodeId) -> Option<NodeId> {
    if graph.kind(node)?.is_statement() {
        return Some(node);
    }
    graph.first_ancestor(node, NodeKind::is_statement)
}

/// Method, property or field whose body contains `node`. Lambdas are looked
/// through, since locals may be captured.
pub(crate) fn member_scope<G: ProgramGraph>(graph: &G, node: NodeId) -> Option<NodeId> {
    graph.first_ancestor(node, |k| {
        matches!(
            k,
            NodeKind::MethodDecl { .. } | NodeKind::PropertyDecl { .. } | NodeKind::FieldDecl { .. }
        )
    })
}

/// Values returned by the function declared by `decl` (method, property or
/// lambda), excluding returns of nested lambdas. An expression body counts as
/// a returned value.
pub(crate) fn returned_values<G: ProgramGraph>(graph: &G, decl: NodeId) -> Vec<NodeId> {
    let body = match graph.kind(decl) {
        Some(NodeKind::MethodDecl { body: Some(body), .. }) => *body,
        Some(NodeKind::PropertyDecl { getter: Some(getter), .. }) => *getter,
        Some(NodeKind::Lambda { body, .. }) => *body,
        _ => return Vec::new(),
    };
    if !matches!(graph.kind(body), Some(NodeKind::Block { .. })) {
        return vec![body];
    }
    graph
        .descendants(body)
        .into_iter()
        .filter_map(|n| match graph.kind(n) {
            Some(NodeKind::Return { value: Some(value) }) => Some((n, *value)),
            _ => None,
        })
        .filter(|&(ret, _)| graph.enclosing_function(ret) == Some(decl))
        .map(|(_, value)| value)
        .collect()
}

/// Whether `node` is the value of a `return` or the expression body of a
/// function.
pub(crate) fn is_returned<G: ProgramGraph>(graph: &G, node: NodeId) -> bool {
    let Some(parent) = graph.parent(node) else {
        return false;
    };
    match graph.kind(parent) {
        Some(NodeKind::Return { value }) => *value == Some(node),
        Some(NodeKind::MethodDecl { body, .. }) => {
            *body == Some(node) && !matches!(graph.kind(node), Some(NodeKind::Block { .. }))
        }
        Some(NodeKind::PropertyDecl { getter, .. }) => {
            *getter == Some(node) && !matches!(graph.kind(node), Some(NodeKind::Block { .. }))
        }
        Some(NodeKind::Lambda { body, .. }) => {
            *body == node && !matches!(graph.kind(node), Some(NodeKind::Block { .. }))
        }
        _ => false,
    }
}

/// Type declaration enclosing `node`, as a type id.
pub(crate) fn enclosing_type_id<G: ProgramGraph>(graph: &G, node: NodeId) -> Option<TypeId> {
    match graph.kind(graph.enclosing_type(node)?)? {
        NodeKind::TypeDecl { ty, .. } => Some(*ty),
        _ => None,
    }
}
