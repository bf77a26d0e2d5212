// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Does an expression produce a new resource instance?

use disposal_graph::{NodeId, NodeKind, ProgramGraph, Symbol, SymbolKind, TypeId};

use crate::error::AnalysisError;
use crate::outcome::Outcome;
use crate::recursion::{Recursion, Target};
use crate::usages::{binding_sites, bound_value, member_scope, returned_values};

/// Classify `expr` as a creation site.
///
/// Object creation of a resource type is `Yes`. Calls and property reads are
/// followed into their bodies when available; an unavailable callee typed as a
/// resource is `AssumeYes`. Reads of existing locals, parameters and fields are
/// `No`. Unresolved references stay `Unknown`.
pub(crate) fn classify<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    expr: NodeId,
) -> Result<Outcome, AnalysisError> {
    rec.checkpoint()?;
    let graph = rec.graph;
    let Some(kind) = graph.kind(expr) else {
        return Ok(Outcome::Unknown);
    };
    match kind {
        NodeKind::Literal(_) => Ok(Outcome::No),
        NodeKind::ObjectCreation { ty, .. } => Ok(if rec.is_resource(Some(*ty)) {
            Outcome::Yes
        } else {
            Outcome::No
        }),
        NodeKind::Cast { expr, .. } => classify(rec, *expr),
        NodeKind::Assignment { value, .. } => classify(rec, *value),
        NodeKind::Conditional { when_true, when_false, .. } => {
            let (when_true, when_false) = (*when_true, *when_false);
            Ok(classify(rec, when_true)?.or(classify(rec, when_false)?))
        }
        NodeKind::Coalesce { value, fallback } => {
            let (value, fallback) = (*value, *fallback);
            Ok(classify(rec, value)?.or(classify(rec, fallback)?))
        }
        NodeKind::Argument { ref_kind, expr: inner, .. } => {
            if ref_kind.is_writable() {
                classify_written_argument(rec, expr)
            } else {
                classify(rec, *inner)
            }
        }
        NodeKind::Await { expr } => classify_awaited(rec, *expr),
        NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. } | NodeKind::Invocation { .. } => {
            classify_reference(rec, expr, None)
        }
        NodeKind::This
        | NodeKind::Base
        | NodeKind::Unary { .. }
        | NodeKind::Lambda { .. }
        | NodeKind::Discard => Ok(Outcome::No),
        _ => Ok(Outcome::Unknown),
    }
}

/// `await call()`: the awaited value is the type argument of the awaitable.
fn classify_awaited<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    awaited: NodeId,
) -> Result<Outcome, AnalysisError> {
    let graph = rec.graph;
    if let Some(NodeKind::Invocation { args, .. }) = graph.kind(awaited) {
        let passthrough = graph
            .symbol_of(awaited)
            .and_then(|m| graph.symbol(m))
            .is_some_and(|m| rec.is_passthrough(m));
        if passthrough {
            return match args.first() {
                Some(&arg) => classify(rec, arg),
                None => Ok(Outcome::No),
            };
        }
    }
    let Some(task) = graph.type_of(awaited).and_then(|t| graph.type_def(t)) else {
        return Ok(Outcome::Unknown);
    };
    if !rec.known.is_awaitable(graph.definition_name(task.id)) {
        return Ok(Outcome::No);
    }
    match task.type_args.as_slice() {
        [result] => classify_reference(rec, awaited, Some(*result)),
        _ => Ok(Outcome::No),
    }
}

/// Identifier, member access or invocation. `produced` overrides the type of
/// the value when it is unwrapped from an awaitable.
fn classify_reference<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    expr: NodeId,
    produced: Option<TypeId>,
) -> Result<Outcome, AnalysisError> {
    let graph = rec.graph;
    let Some(symbol) = graph.symbol_of(expr).and_then(|s| graph.symbol(s)) else {
        return Ok(Outcome::Unknown);
    };
    match symbol.kind {
        SymbolKind::Local | SymbolKind::Parameter { .. } | SymbolKind::Field { .. } => Ok(Outcome::No),
        SymbolKind::Property { .. } => classify_property(rec, expr, symbol),
        SymbolKind::Method { .. } => {
            if !matches!(graph.kind(expr), Some(NodeKind::Invocation { .. })) {
                // A method group, not a call.
                return Ok(Outcome::No);
            }
            classify_call(rec, expr, symbol, produced)
        }
    }
}

fn classify_call<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    call: NodeId,
    method: &Symbol,
    produced: Option<TypeId>,
) -> Result<Outcome, AnalysisError> {
    if method.returns_void() || rec.is_non_owning(method) {
        return Ok(Outcome::No);
    }
    let produced = produced.or_else(|| rec.graph.type_of(call)).or(method.ty);
    if !rec.is_resource(produced) {
        return Ok(Outcome::No);
    }
    let Some(target) = rec.resolve(call) else {
        return Ok(Outcome::Unknown);
    };
    let Some(decl) = target.declaration else {
        return Ok(Outcome::AssumeYes);
    };
    if !matches!(rec.graph.kind(decl), Some(NodeKind::MethodDecl { body: Some(_), .. })) {
        return Ok(Outcome::AssumeYes);
    }
    if !rec.enter(&target) {
        return Ok(Outcome::AssumeNo);
    }
    classify_returns(rec, decl)
}

fn classify_property<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    access: NodeId,
    property: &Symbol,
) -> Result<Outcome, AnalysisError> {
    if rec.is_non_owning(property) || !rec.is_resource(property.ty) {
        return Ok(Outcome::No);
    }
    let Some(target) = rec.resolve(access) else {
        return Ok(Outcome::Unknown);
    };
    let Some(decl) = target.declaration else {
        return Ok(Outcome::AssumeYes);
    };
    match rec.graph.kind(decl) {
        Some(NodeKind::PropertyDecl { getter: Some(_), .. }) => {}
        // Auto-property: reads the stored instance.
        _ => return Ok(Outcome::No),
    }
    if !rec.enter(&target) {
        return Ok(Outcome::AssumeNo);
    }
    classify_returns(rec, decl)
}

/// Combine the classification of every value the function returns.
pub(crate) fn classify_returns<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    decl: NodeId,
) -> Result<Outcome, AnalysisError> {
    let values = returned_values(rec.graph, decl);
    if values.is_empty() {
        return Ok(Outcome::No);
    }
    let mut result = Outcome::Unknown;
    for value in values {
        result = result.or(classify_returned(rec, value)?);
    }
    Ok(result)
}

/// A returned local is followed to the values assigned to it.
fn classify_returned<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    value: NodeId,
) -> Result<Outcome, AnalysisError> {
    let graph = rec.graph;
    let local = graph
        .symbol_of(value)
        .filter(|&s| graph.symbol(s).is_some_and(Symbol::is_local));
    let (Some(local), Some(scope)) = (local, member_scope(graph, value)) else {
        return classify(rec, value);
    };
    if !rec.enter(&Target { source: value, symbol: local, declaration: None }) {
        return Ok(Outcome::AssumeNo);
    }
    let mut result = Outcome::Unknown;
    for site in binding_sites(graph, local, scope) {
        if let Some(assigned) = bound_value(graph, site) {
            result = result.or(classify(rec, assigned)?);
        }
    }
    Ok(if result == Outcome::Unknown { Outcome::No } else { result })
}

/// `Create(out x)`: what does the callee write through the parameter?
fn classify_written_argument<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    arg: NodeId,
) -> Result<Outcome, AnalysisError> {
    let graph = rec.graph;
    let Some(target) = rec.resolve(arg) else {
        return Ok(Outcome::Unknown);
    };
    let param_ty = graph.symbol(target.symbol).and_then(|s| s.ty);
    let body_available = target
        .declaration
        .is_some_and(|d| matches!(graph.kind(d), Some(NodeKind::MethodDecl { body: Some(_), .. })));
    let Some(decl) = target.declaration.filter(|_| body_available) else {
        return Ok(if rec.is_resource(param_ty) {
            Outcome::AssumeYes
        } else {
            Outcome::No
        });
    };
    if !rec.enter(&target) {
        return Ok(Outcome::AssumeNo);
    }
    let mut result = Outcome::Unknown;
    for site in binding_sites(graph, target.symbol, decl) {
        if let Some(NodeKind::Assignment { value, .. }) = graph.kind(site) {
            result = result.or(classify(rec, *value)?);
        }
    }
    Ok(if result == Outcome::Unknown { Outcome::No } else { result })
}
