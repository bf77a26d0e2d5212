// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Where does a resource's release obligation go?

use disposal_graph::{Literal, NodeId, NodeKind, ProgramGraph, SymbolId, SymbolKind};

use crate::error::AnalysisError;
use crate::obligation::member_released;
use crate::outcome::Outcome;
use crate::recursion::{literal_bool, Bound, Recursion, Target};
use crate::usages::{enclosing_type_id, is_returned, references, statement_of};

/// Verdict of the escape analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escape {
    pub outcome: Outcome,
    /// Node that took over the obligation: the adopting creation or call, or
    /// the storing assignment. `None` when released in place or returned.
    pub owner: Option<NodeId>,
}

impl Escape {
    pub fn new(outcome: Outcome, owner: Option<NodeId>) -> Self {
        Self { outcome, owner }
    }

    /// Nothing took the obligation over.
    pub fn retained() -> Self {
        Self::new(Outcome::No, None)
    }

    fn unknown() -> Self {
        Self::new(Outcome::Unknown, None)
    }

    /// The stronger of two alternative fates.
    fn or(self, other: Escape) -> Escape {
        if self.outcome.or(other.outcome) == self.outcome {
            self
        } else {
            other
        }
    }
}

/// Run the escape checks on `expr`, first match wins.
///
/// `expr` may also be a binding site (local declaration or assignment), in
/// which case the checks apply to the binding as a whole.
pub(crate) fn escape<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    expr: NodeId,
) -> Result<Escape, AnalysisError> {
    rec.checkpoint()?;
    let graph = rec.graph;
    let node = climb_transparent(graph, expr);
    let Some(parent) = graph.parent(node) else {
        return Ok(Escape::retained());
    };

    if is_scoped(graph, node, parent) {
        return Ok(Escape::new(Outcome::Yes, None));
    }
    if released_nearby(rec, node, parent) {
        return Ok(Escape::new(Outcome::Yes, None));
    }
    match graph.kind(parent) {
        Some(NodeKind::Argument { .. }) => {
            if let Some(found) = handed_to_call(rec, parent)? {
                return Ok(found);
            }
        }
        Some(NodeKind::ObjectCreation { ty, initializer, .. }) => {
            if initializer.contains(&node) && rec.is_disposing_container(*ty) {
                return Ok(Escape::new(Outcome::Yes, Some(parent)));
            }
        }
        _ => {}
    }
    if is_returned(graph, node) {
        return Ok(Escape::new(Outcome::Yes, None));
    }
    if let Some(NodeKind::Assignment { target, value }) = graph.kind(parent) {
        if *value == node && stores_in_owner(rec, *target, node) {
            return Ok(Escape::new(Outcome::Yes, Some(parent)));
        }
    }
    Ok(Escape::retained())
}

/// Does the value of the call that `expr` is passed to take ownership of it?
pub(crate) fn disposed_by_return_value<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    expr: NodeId,
) -> Result<Escape, AnalysisError> {
    rec.checkpoint()?;
    let graph = rec.graph;
    let node = climb_transparent(graph, expr);
    let arg = match graph.parent(node) {
        Some(arg) if matches!(graph.kind(arg), Some(NodeKind::Argument { .. })) => arg,
        _ => return Ok(Escape::retained()),
    };
    let Some(call) = graph.parent(arg) else {
        return Ok(Escape::retained());
    };
    let Some(callee) = graph.symbol_of(call).and_then(|s| graph.symbol(s)) else {
        return Ok(Escape::unknown());
    };
    if let Some(found) = adopted_by_wrapper(rec, arg, call) {
        return Ok(found);
    }
    if rec.is_passthrough(callee) {
        return Ok(Escape::new(Outcome::Yes, Some(call)));
    }
    let found = callee_adopts(rec, arg, call, Fate::AdoptionOnly)?;
    Ok(found.unwrap_or_else(Escape::retained))
}

/// Casts and conditional operators pass their operand through.
fn climb_transparent<G: ProgramGraph>(graph: &G, mut node: NodeId) -> NodeId {
    while let Some(parent) = graph.parent(node) {
        let transparent = match graph.kind(parent) {
            Some(NodeKind::Cast { expr, .. }) => *expr == node,
            Some(NodeKind::Conditional { condition, .. }) => *condition != node,
            Some(NodeKind::Coalesce { .. }) => true,
            _ => false,
        };
        if !transparent {
            break;
        }
        node = parent;
    }
    node
}

/// `using (x)`, `using var x = ...`, `using (var x = ...)`.
fn is_scoped<G: ProgramGraph>(graph: &G, node: NodeId, parent: NodeId) -> bool {
    if let Some(NodeKind::LocalDecl { is_using: true, .. }) = graph.kind(node) {
        return true;
    }
    if let Some(NodeKind::LocalDecl { .. }) = graph.kind(node) {
        return matches!(graph.kind(parent), Some(NodeKind::Using { resource, .. }) if *resource == node);
    }
    match graph.kind(parent) {
        Some(NodeKind::Using { resource, .. }) => *resource == node,
        Some(NodeKind::LocalDecl { is_using: true, .. }) => true,
        Some(NodeKind::LocalDecl { .. }) => graph
            .parent(parent)
            .is_some_and(|p| matches!(graph.kind(p), Some(NodeKind::Using { resource, .. }) if *resource == parent)),
        _ => false,
    }
}

/// A value bound to a symbol is released in the same block before the
/// symbol is reassigned. Inside a loop, a release earlier in the body
/// releases the previous iteration's value before the overwrite.
fn released_nearby<G: ProgramGraph>(rec: &Recursion<'_, G>, value: NodeId, parent: NodeId) -> bool {
    let graph = rec.graph;
    let symbol = match graph.kind(parent) {
        Some(NodeKind::LocalDecl { symbol, initializer: Some(init), .. }) if *init == value => *symbol,
        Some(NodeKind::Assignment { target, value: v }) if *v == value => match graph.symbol_of(*target) {
            Some(symbol) => symbol,
            None => return false,
        },
        _ => return false,
    };
    let Some(stmt) = statement_of(graph, parent) else {
        return false;
    };
    let Some(block) = graph.parent(stmt) else {
        return false;
    };
    let Some(NodeKind::Block { statements }) = graph.kind(block) else {
        return false;
    };
    let Some(index) = statements.iter().position(|&s| s == stmt) else {
        return false;
    };

    for &next in &statements[index + 1..] {
        if releases_in(rec, next, symbol) {
            return true;
        }
        if assigns_in(graph, next, symbol) {
            break;
        }
    }

    let in_loop = graph
        .parent(block)
        .is_some_and(|p| matches!(graph.kind(p), Some(NodeKind::Loop { .. })));
    let declared_outside = graph
        .symbol(symbol)
        .is_some_and(|s| s.declarations.iter().all(|&d| !graph.is_within(d, block)));
    in_loop && declared_outside && statements[..index].iter().any(|&prev| releases_in(rec, prev, symbol))
}

/// A release call on `symbol` within `stmt`, outside nested lambdas.
pub(crate) fn releases_in<G: ProgramGraph>(rec: &Recursion<'_, G>, stmt: NodeId, symbol: SymbolId) -> bool {
    let graph = rec.graph;
    let function = graph.enclosing_function(stmt);
    std::iter::once(stmt)
        .chain(graph.descendants(stmt))
        .any(|n| rec.is_release_of(n, symbol) && graph.enclosing_function(n) == function)
}

pub(crate) fn assigns_in<G: ProgramGraph>(graph: &G, stmt: NodeId, symbol: SymbolId) -> bool {
    std::iter::once(stmt).chain(graph.descendants(stmt)).any(|n| match graph.kind(n) {
        Some(NodeKind::Assignment { target, .. }) => graph.symbol_of(*target) == Some(symbol),
        _ => false,
    })
}

/// Assignment target is a field or property of the type containing the
/// assignment, or a writable parameter handing the value to the caller.
fn stores_in_owner<G: ProgramGraph>(rec: &Recursion<'_, G>, target: NodeId, at: NodeId) -> bool {
    let graph = rec.graph;
    let Some(symbol) = graph.symbol_of(target).and_then(|s| graph.symbol(s)) else {
        return false;
    };
    match symbol.kind {
        SymbolKind::Field { .. } | SymbolKind::Property { .. } => {
            match (enclosing_type_id(graph, at), symbol.containing_type) {
                (Some(here), Some(owner)) => graph.is_assignable_to(here, owner),
                _ => false,
            }
        }
        SymbolKind::Parameter { ref_kind, .. } => ref_kind.is_writable(),
        _ => false,
    }
}

/// The argument `arg` is passed to a call. Wrapper tables first, then known
/// passthrough and storing members, then the callee's body.
pub(crate) fn handed_to_call<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    arg: NodeId,
) -> Result<Option<Escape>, AnalysisError> {
    let graph = rec.graph;
    let Some(call) = graph.parent(arg) else {
        return Ok(None);
    };
    let Some(callee) = graph.symbol_of(call).and_then(|s| graph.symbol(s)) else {
        return Ok(Some(Escape::unknown()));
    };
    if let Some(found) = adopted_by_wrapper(rec, arg, call) {
        return Ok(Some(found));
    }
    if matches!(graph.kind(call), Some(NodeKind::Invocation { .. })) {
        if rec.is_passthrough(callee) {
            return escape(rec, call).map(Some);
        }
        if rec.is_storing(callee) {
            return Ok(Some(Escape::new(Outcome::AssumeYes, Some(call))));
        }
    }
    callee_adopts(rec, arg, call, Fate::Any)
}

/// A known wrapper constructor adopting its resource argument, subject to an
/// ownership switch such as `leaveOpen`.
fn adopted_by_wrapper<G: ProgramGraph>(rec: &mut Recursion<'_, G>, arg: NodeId, call: NodeId) -> Option<Escape> {
    let graph = rec.graph;
    let Some(NodeKind::ObjectCreation { ty, .. }) = graph.kind(call) else {
        return None;
    };
    let rule = rec.wrapper_for(*ty)?;
    let Some(target) = rec.resolve(arg) else {
        return Some(Escape::unknown());
    };
    let param = graph.symbol(target.symbol);
    let param_ty = param.and_then(|s| s.ty);
    let absorbs = param.is_some_and(|p| matches!(p.kind, SymbolKind::Parameter { is_params: true, .. }));
    if param_ty.is_some() && !absorbs && !rec.is_resource(param_ty) {
        return None;
    }
    if rule
        .ownership_switch
        .as_ref()
        .is_some_and(|switch| param.is_some_and(|p| p.name == switch.parameter))
    {
        return None;
    }
    let Some(switch) = &rule.ownership_switch else {
        return Some(Escape::new(Outcome::Yes, Some(call)));
    };
    let value = match rec.argument_for(call, &switch.parameter) {
        Some(Bound::Expr(expr)) => match literal_bool(graph, expr) {
            Some(value) => value,
            None => return Some(Escape::new(Outcome::AssumeYes, Some(call))),
        },
        Some(Bound::Default(Literal::Bool(value))) => value,
        Some(Bound::Default(_)) | None => return Some(Escape::new(Outcome::Yes, Some(call))),
    };
    if value == switch.retains_when {
        Some(Escape::retained())
    } else {
        Some(Escape::new(Outcome::Yes, Some(call)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    /// Released in the callee, adopted, or passed on.
    Any,
    /// Only fates that tie the argument to the call's result.
    AdoptionOnly,
}

/// Follow the argument into the callee's body.
fn callee_adopts<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    arg: NodeId,
    call: NodeId,
    fate: Fate,
) -> Result<Option<Escape>, AnalysisError> {
    let graph = rec.graph;
    let Some(target) = rec.resolve(arg) else {
        return Ok(None);
    };
    let body = target
        .declaration
        .filter(|&d| matches!(graph.kind(d), Some(NodeKind::MethodDecl { body: Some(_), .. })));
    let Some(decl) = body else {
        // External method returning a resource built from a resource argument.
        let returns_resource = matches!(graph.kind(call), Some(NodeKind::Invocation { .. }))
            && rec.node_is_resource(call);
        if returns_resource && rec.node_is_resource(arg) {
            return Ok(Some(Escape::new(Outcome::AssumeYes, Some(call))));
        }
        return Ok(None);
    };
    if !rec.enter(&target) {
        // Already followed on this query; the remaining checks decide.
        return Ok(None);
    }

    let mut result = Escape::unknown();
    for usage in references(graph, target.symbol, decl) {
        rec.checkpoint()?;
        let found = parameter_usage(rec, usage, call, fate)?;
        result = result.or(found);
    }
    Ok(match result.outcome {
        Outcome::Yes | Outcome::AssumeYes | Outcome::AssumeNo => Some(result),
        Outcome::No | Outcome::Unknown => None,
    })
}

/// What the callee does with one read of its parameter.
fn parameter_usage<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    usage: NodeId,
    call: NodeId,
    fate: Fate,
) -> Result<Escape, AnalysisError> {
    let graph = rec.graph;
    let Some(parent) = graph.parent(usage) else {
        return Ok(Escape::unknown());
    };

    if is_returned(graph, usage) {
        return Ok(Escape::new(Outcome::Yes, Some(call)));
    }
    if let Some(NodeKind::Assignment { target, value }) = graph.kind(parent) {
        if *value == usage {
            return stored_in_released_member(rec, *target, call);
        }
    }
    if fate == Fate::AdoptionOnly {
        return returned_wrapper(rec, usage, parent, call);
    }

    let released = match graph.kind(parent) {
        Some(NodeKind::MemberAccess { receiver, .. }) if *receiver == usage => graph
            .parent(parent)
            .is_some_and(|inv| rec.release_receiver(inv) == Some(usage)),
        Some(NodeKind::Using { resource, .. }) => *resource == usage,
        _ => false,
    };
    if released {
        return Ok(Escape::new(Outcome::Yes, None));
    }
    if let Some(NodeKind::Argument { .. }) = graph.kind(parent) {
        return Ok(handed_to_call(rec, parent)?.unwrap_or_else(Escape::unknown));
    }
    Ok(Escape::unknown())
}

/// The callee hands its parameter to a call whose result adopts it, and
/// returns that result: `Wrap(Stream s) => new StreamReader(s)`.
fn returned_wrapper<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    usage: NodeId,
    parent: NodeId,
    call: NodeId,
) -> Result<Escape, AnalysisError> {
    let graph = rec.graph;
    if !matches!(graph.kind(parent), Some(NodeKind::Argument { .. })) {
        return Ok(Escape::unknown());
    }
    let adopted = disposed_by_return_value(rec, usage)?;
    let returned = adopted
        .owner
        .is_some_and(|owner| is_returned(graph, climb_transparent(graph, owner)));
    Ok(if adopted.outcome.is_positive() && returned {
        Escape::new(adopted.outcome, Some(call))
    } else {
        Escape::unknown()
    })
}

/// The callee stores the argument into one of its type's members; the
/// obligation moves with it if that member is released.
fn stored_in_released_member<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    target: NodeId,
    call: NodeId,
) -> Result<Escape, AnalysisError> {
    let graph = rec.graph;
    let Some(member) = graph.symbol_of(target) else {
        return Ok(Escape::unknown());
    };
    if !graph.symbol(member).is_some_and(|s| s.is_member()) {
        return Ok(Escape::unknown());
    }
    if !rec.enter(&Target { source: target, symbol: member, declaration: None }) {
        return Ok(Escape::new(Outcome::AssumeNo, None));
    }
    let released = member_released(rec, member)?;
    Ok(if released.is_positive() {
        Escape::new(released, Some(call))
    } else {
        Escape::unknown()
    })
}
