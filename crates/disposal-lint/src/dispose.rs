// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Release obligation rules.
//!
//! - created: a local bound to a new resource that is never released
//! - ignored: a new resource discarded, or handed to a callee that keeps it unreleased
//! - member: a field or property assigned a new resource its type never releases

use disposal_graph::{NodeId, NodeKind, ProgramGraph, Symbol, SymbolId};
use disposal_ownership::{AnalysisError, CancellationToken, Engine};

use crate::types::LintDiagnostic;

/// Symbol written by a binding site, if the site is one.
fn binding_symbol<G: ProgramGraph>(graph: &G, node: NodeId) -> Option<SymbolId> {
    match graph.kind(node)? {
        NodeKind::LocalDecl { symbol, initializer: Some(_), .. }
        | NodeKind::FieldDecl { symbol, initializer: Some(_), .. }
        | NodeKind::PropertyDecl { symbol, initializer: Some(_), .. } => Some(*symbol),
        NodeKind::Assignment { target, .. } => graph.symbol_of(*target),
        NodeKind::Argument { ref_kind, expr, .. } if ref_kind.is_writable() => match graph.kind(*expr)? {
            NodeKind::LocalDecl { symbol, .. } => Some(*symbol),
            _ => graph.symbol_of(*expr),
        },
        _ => None,
    }
}

/// dispose/created: flag a local that must release its value and never does.
pub fn check_created<G: ProgramGraph>(
    engine: &Engine<'_, G>,
    node: NodeId,
    cancel: &CancellationToken,
) -> Result<Vec<LintDiagnostic>, AnalysisError> {
    let graph = engine.graph();
    let Some(symbol) = binding_symbol(graph, node) else {
        return Ok(Vec::new());
    };
    let Some(local) = graph.symbol(symbol).filter(|s| s.is_local()) else {
        return Ok(Vec::new());
    };
    if !engine.should_release(symbol, node, cancel)? || engine.is_released(symbol, cancel)?.is_positive() {
        return Ok(Vec::new());
    }
    Ok(vec![LintDiagnostic::warning(
        graph,
        node,
        "dispose/created",
        format!("`{}` holds a new resource that is never released", local.name),
        "declare it with `using`, or call `Dispose()` on every path",
    )])
}

/// dispose/ignored: flag a creation whose value nobody takes over.
pub fn check_ignored<G: ProgramGraph>(
    engine: &Engine<'_, G>,
    node: NodeId,
    cancel: &CancellationToken,
) -> Result<Vec<LintDiagnostic>, AnalysisError> {
    let graph = engine.graph();
    if !matches!(
        graph.kind(node),
        Some(NodeKind::ObjectCreation { .. } | NodeKind::Invocation { .. } | NodeKind::Await { .. })
    ) {
        return Ok(Vec::new());
    }
    let message = match graph.parent(node).and_then(|p| graph.kind(p)) {
        Some(NodeKind::ExprStmt { .. }) => "new resource is discarded without being released",
        Some(NodeKind::Argument { ref_kind, .. }) if !ref_kind.is_writable() => {
            "new resource is passed to a callee that neither releases nor adopts it"
        }
        _ => return Ok(Vec::new()),
    };
    if !engine.is_creation(node, cancel)?.is_positive() {
        return Ok(Vec::new());
    }
    if engine.escapes_or_is_disposed(node, cancel)?.outcome.is_positive() {
        return Ok(Vec::new());
    }
    Ok(vec![LintDiagnostic::warning(
        graph,
        node,
        "dispose/ignored",
        message.to_string(),
        "bind the result with `using`, or hand it to an owner",
    )])
}

/// dispose/member: flag a member bound to a creation its type never releases.
pub fn check_member<G: ProgramGraph>(
    engine: &Engine<'_, G>,
    node: NodeId,
    cancel: &CancellationToken,
) -> Result<Vec<LintDiagnostic>, AnalysisError> {
    let graph = engine.graph();
    let Some(symbol) = binding_symbol(graph, node) else {
        return Ok(Vec::new());
    };
    let Some(member) = graph.symbol(symbol).filter(|s| s.is_member()) else {
        return Ok(Vec::new());
    };
    if !engine.should_release(symbol, node, cancel)?
        || engine.is_member_released(symbol, cancel)?.is_positive()
    {
        return Ok(Vec::new());
    }
    Ok(vec![LintDiagnostic::warning(
        graph,
        node,
        "dispose/member",
        format!(
            "`{}` is assigned a new resource that `{}` never releases",
            member.name,
            owner_name(graph, member)
        ),
        "release the member from the type's `Dispose` routine",
    )])
}

fn owner_name<'g, G: ProgramGraph>(graph: &'g G, member: &Symbol) -> &'g str {
    member
        .containing_type
        .map(|ty| graph.definition_name(ty))
        .unwrap_or("<unknown>")
}
