// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Release obligations of bindings and whether they are discharged.

use disposal_graph::{NodeId, NodeKind, ProgramGraph, SymbolId, SymbolKind};
use tracing::debug;

use crate::creation::classify;
use crate::error::AnalysisError;
use crate::escape::{assigns_in, escape, handed_to_call, releases_in};
use crate::outcome::Outcome;
use crate::pattern::release_routine;
use crate::recursion::Recursion;
use crate::usages::{
    binding_sites, bound_symbol, bound_value, enclosing_type_id, member_scope, references, statement_of,
};

/// Must `symbol` release the value bound at `site`?
///
/// True when the symbol kind can own a resource, the bound value is a
/// creation, and the binding itself does not hand the value off.
pub(crate) fn should_release<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    symbol: SymbolId,
    site: NodeId,
) -> Result<bool, AnalysisError> {
    let graph = rec.graph;
    let Some(sym) = graph.symbol(symbol) else {
        return Ok(false);
    };
    let permitted = match sym.kind {
        SymbolKind::Local => true,
        SymbolKind::Parameter { ref_kind, .. } => ref_kind.is_writable(),
        SymbolKind::Field { .. } | SymbolKind::Property { .. } => {
            match (enclosing_type_id(graph, site), sym.containing_type) {
                (Some(here), Some(owner)) => graph.is_assignable_to(here, owner),
                _ => false,
            }
        }
        SymbolKind::Method { .. } => false,
    };
    if !permitted || bound_symbol(graph, site) != Some(symbol) {
        return Ok(false);
    }
    let Some(value) = bound_value(graph, site) else {
        return Ok(false);
    };
    if !classify(rec, value)?.terminal().is_positive() {
        return Ok(false);
    }
    if matches!(graph.kind(site), Some(NodeKind::Argument { .. })) {
        return Ok(true);
    }
    Ok(!escape(rec, site)?.outcome.is_positive())
}

/// Is the value held by a local or parameter released on some path?
///
/// Joins the verdicts of every reference in the declaring member. A local
/// overwritten while still holding an unreleased creation is `No` outright.
pub(crate) fn is_released<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    symbol: SymbolId,
) -> Result<Outcome, AnalysisError> {
    let graph = rec.graph;
    let Some(sym) = graph.symbol(symbol) else {
        return Ok(Outcome::Unknown);
    };
    if sym.is_member() {
        return member_released(rec, symbol);
    }
    let Some(scope) = sym.declarations.first().and_then(|&d| member_scope(graph, d)) else {
        return Ok(Outcome::Unknown);
    };
    if sym.is_local() && overwrite_leaks(rec, symbol, scope)? {
        debug!(symbol = %sym.name, "overwritten while holding a resource");
        return Ok(Outcome::No);
    }

    let mut result = Outcome::Unknown;
    for usage in references(graph, symbol, scope) {
        rec.checkpoint()?;
        result = result.join(usage_verdict(rec, symbol, usage)?)?;
    }
    Ok(if result == Outcome::Unknown { Outcome::No } else { result })
}

/// Verdict of a single reference. Only ever positive, `AssumeNo`, or
/// `Unknown`, so references never contradict each other.
fn usage_verdict<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    symbol: SymbolId,
    usage: NodeId,
) -> Result<Outcome, AnalysisError> {
    let graph = rec.graph;
    let Some(parent) = graph.parent(usage) else {
        return Ok(Outcome::Unknown);
    };
    match graph.kind(parent) {
        Some(NodeKind::MemberAccess { receiver, .. }) if *receiver == usage => {
            let released = graph
                .parent(parent)
                .is_some_and(|inv| rec.release_receiver(inv) == Some(usage));
            Ok(if released { Outcome::Yes } else { Outcome::Unknown })
        }
        Some(NodeKind::Assignment { target, .. }) if *target == usage => {
            let to_caller = graph
                .symbol(symbol)
                .and_then(|s| s.ref_kind())
                .is_some_and(|k| k.is_writable());
            Ok(if to_caller { Outcome::Yes } else { Outcome::Unknown })
        }
        _ => Ok(match escape(rec, usage)?.outcome {
            o @ (Outcome::Yes | Outcome::AssumeYes | Outcome::AssumeNo) => o,
            Outcome::No | Outcome::Unknown => Outcome::Unknown,
        }),
    }
}

fn creates<G: ProgramGraph>(rec: &mut Recursion<'_, G>, site: NodeId) -> Result<bool, AnalysisError> {
    match bound_value(rec.graph, site) {
        Some(value) => Ok(classify(rec, value)?.terminal().is_positive()),
        None => Ok(false),
    }
}

fn released_among<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    symbol: SymbolId,
    usages: &[NodeId],
) -> Result<bool, AnalysisError> {
    for &usage in usages {
        if usage_verdict(rec, symbol, usage)?.is_positive() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// A creation bound to a local is overwritten before any release: either by
/// a later assignment in the same block, or by the next iteration of a loop
/// whose body never releases the local.
fn overwrite_leaks<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    symbol: SymbolId,
    scope: NodeId,
) -> Result<bool, AnalysisError> {
    let graph = rec.graph;
    let sites = binding_sites(graph, symbol, scope);
    let usages = references(graph, symbol, scope);

    for pair in sites.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if !matches!(graph.kind(second), Some(NodeKind::Assignment { .. })) {
            continue;
        }
        if matches!(graph.kind(first), Some(NodeKind::LocalDecl { is_using: true, .. })) {
            continue;
        }
        let (Some(s1), Some(s2)) = (statement_of(graph, first), statement_of(graph, second)) else {
            continue;
        };
        let Some(block) = graph.parent(s1).filter(|&b| graph.parent(s2) == Some(b)) else {
            continue;
        };
        let Some(NodeKind::Block { statements }) = graph.kind(block) else {
            continue;
        };
        let (Some(i1), Some(i2)) = (
            statements.iter().position(|&s| s == s1),
            statements.iter().position(|&s| s == s2),
        ) else {
            continue;
        };
        if i1 >= i2 {
            continue;
        }
        if !creates(rec, first)? || escape(rec, first)?.outcome.is_positive() {
            continue;
        }
        let between: Vec<NodeId> = usages
            .iter()
            .copied()
            .filter(|&u| {
                statements[i1..i2].iter().any(|&s| graph.is_within(u, s))
                    && !graph.is_within(u, second)
            })
            .collect();
        if !released_among(rec, symbol, &between)? {
            return Ok(true);
        }
    }

    for &site in &sites {
        if !matches!(graph.kind(site), Some(NodeKind::Assignment { .. })) {
            continue;
        }
        let Some(lp) = graph.first_ancestor(site, |k| matches!(k, NodeKind::Loop { .. })) else {
            continue;
        };
        if !graph.is_within(lp, scope) {
            continue;
        }
        let declared_inside = graph
            .symbol(symbol)
            .is_some_and(|s| s.declarations.iter().any(|&d| graph.is_within(d, lp)));
        if declared_inside || !creates(rec, site)? {
            continue;
        }
        let Some(NodeKind::Loop { body, .. }) = graph.kind(lp) else {
            continue;
        };
        let in_body: Vec<NodeId> = usages
            .iter()
            .copied()
            .filter(|&u| graph.is_within(u, *body))
            .collect();
        if !released_among(rec, symbol, &in_body)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Is a field or property released by its containing type?
///
/// References inside the release routine count only through the routine
/// check: `Yes` when the routine conforms, `AssumeYes` otherwise.
pub(crate) fn member_released<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    member: SymbolId,
) -> Result<Outcome, AnalysisError> {
    let graph = rec.graph;
    let Some(sym) = graph.symbol(member) else {
        return Ok(Outcome::Unknown);
    };
    let (Some(ty), Some(type_decl)) = (
        sym.containing_type,
        sym.declarations.first().and_then(|&d| graph.enclosing_type(d)),
    ) else {
        return Ok(Outcome::Unknown);
    };
    let routine = release_routine(rec, ty)?;

    let mut result = Outcome::Unknown;
    let mut in_routine = Outcome::Unknown;
    for usage in references(graph, member, type_decl) {
        rec.checkpoint()?;
        let verdict = member_usage_verdict(rec, usage)?;
        if routine.contains(graph, usage) {
            in_routine = in_routine.or(verdict);
        } else {
            result = result.join(verdict)?;
        }
    }
    if in_routine.is_positive() {
        let verdict = if routine.is_conforming() {
            Outcome::Yes
        } else {
            Outcome::AssumeYes
        };
        result = result.join(verdict)?;
    }
    Ok(if result == Outcome::Unknown { Outcome::No } else { result })
}

/// A member reference releases the member when it is the receiver of a
/// release call, a `using` resource, or handed to an adopting call. Returning
/// or copying a member does not move ownership away from the type.
fn member_usage_verdict<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    usage: NodeId,
) -> Result<Outcome, AnalysisError> {
    let graph = rec.graph;
    let Some(parent) = graph.parent(usage) else {
        return Ok(Outcome::Unknown);
    };
    Ok(match graph.kind(parent) {
        Some(NodeKind::MemberAccess { receiver, .. }) if *receiver == usage => {
            let released = graph
                .parent(parent)
                .is_some_and(|inv| rec.release_receiver(inv) == Some(usage));
            if released {
                Outcome::Yes
            } else {
                Outcome::Unknown
            }
        }
        Some(NodeKind::Using { resource, .. }) if *resource == usage => Outcome::Yes,
        Some(NodeKind::Argument { .. }) => match handed_to_call(rec, parent)? {
            Some(found) if found.outcome.is_positive() => found.outcome,
            _ => Outcome::Unknown,
        },
        _ => Outcome::Unknown,
    })
}

/// Is the local or parameter returned at `ret` already released?
///
/// Looks back from the `return` through the enclosing blocks of the same
/// function: a `using` scope around it, or an earlier release not followed by
/// a new binding. A release nested in a branch is `AssumeYes`.
pub(crate) fn returns_released<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    ret: NodeId,
) -> Result<Outcome, AnalysisError> {
    rec.checkpoint()?;
    let graph = rec.graph;
    let Some(NodeKind::Return { value: Some(value) }) = graph.kind(ret) else {
        return Ok(Outcome::No);
    };
    let holder = graph.symbol_of(*value).filter(|&s| {
        graph
            .symbol(s)
            .is_some_and(|sym| matches!(sym.kind, SymbolKind::Local | SymbolKind::Parameter { .. }))
    });
    let Some(symbol) = holder else {
        return Ok(Outcome::No);
    };
    let function = graph.enclosing_function(ret);

    let mut node = ret;
    while let Some(parent) = graph.parent(node) {
        if Some(parent) == function {
            break;
        }
        match graph.kind(parent) {
            Some(NodeKind::Using { resource, .. }) if *resource != node => {
                if bound_symbol(graph, *resource).or_else(|| graph.symbol_of(*resource)) == Some(symbol) {
                    return Ok(Outcome::Yes);
                }
            }
            Some(NodeKind::Block { statements }) => {
                let index = statements.iter().position(|&s| s == node).unwrap_or(0);
                for &prev in statements[..index].iter().rev() {
                    match graph.kind(prev) {
                        Some(NodeKind::LocalDecl { symbol: declared, is_using, .. }) if *declared == symbol => {
                            return Ok(if *is_using { Outcome::Yes } else { Outcome::No });
                        }
                        Some(NodeKind::ExprStmt { expr }) if rec.is_release_of(*expr, symbol) => {
                            return Ok(Outcome::Yes);
                        }
                        _ => {}
                    }
                    if releases_in(rec, prev, symbol) {
                        return Ok(Outcome::AssumeYes);
                    }
                    if assigns_in(graph, prev, symbol) {
                        return Ok(Outcome::No);
                    }
                }
            }
            _ => {}
        }
        node = parent;
    }
    Ok(Outcome::No)
}
