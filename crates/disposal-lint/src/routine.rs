// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Declaration and return value rules.
//!
//! - property-creates: a property getter that returns a new resource
//! - not-resource-type: a member returns a new resource under a type that hides it
//! - released-value: a `return` hands out a value that was already released
//! - two-phase: a `Dispose(bool)` routine that departs from the pattern

use disposal_graph::{NodeId, NodeKind, ProgramGraph, TypeId};
use disposal_ownership::{AnalysisError, CancellationToken, Engine, RoutineKind};

use crate::types::LintDiagnostic;

/// return/property-creates: reading the property hands out a fresh instance.
pub fn check_property_creates<G: ProgramGraph>(
    engine: &Engine<'_, G>,
    node: NodeId,
    cancel: &CancellationToken,
) -> Result<Vec<LintDiagnostic>, AnalysisError> {
    let graph = engine.graph();
    let Some(NodeKind::PropertyDecl { symbol, getter: Some(_), .. }) = graph.kind(node) else {
        return Ok(Vec::new());
    };
    if !engine.returns_creation(node, cancel)?.is_positive() {
        return Ok(Vec::new());
    }
    let name = graph.symbol(*symbol).map(|s| s.name.as_str()).unwrap_or("<unknown>");
    Ok(vec![LintDiagnostic::warning(
        graph,
        node,
        "return/property-creates",
        format!("property `{name}` returns a new resource on every read"),
        "turn it into a method, or create the instance once and release it with the type",
    )])
}

/// return/not-resource-type: the caller cannot tell it must release the value.
pub fn check_return_type<G: ProgramGraph>(
    engine: &Engine<'_, G>,
    node: NodeId,
    cancel: &CancellationToken,
) -> Result<Vec<LintDiagnostic>, AnalysisError> {
    let graph = engine.graph();
    let symbol = match graph.kind(node) {
        Some(NodeKind::MethodDecl { symbol, body: Some(_), .. }) => *symbol,
        Some(NodeKind::PropertyDecl { symbol, getter: Some(_), .. }) => *symbol,
        _ => return Ok(Vec::new()),
    };
    let Some(member) = graph.symbol(symbol) else {
        return Ok(Vec::new());
    };
    let Some(declared) = member.ty.filter(|_| !member.returns_void()) else {
        return Ok(Vec::new());
    };
    if announces_resource(engine, declared) || !engine.returns_creation(node, cancel)?.is_positive() {
        return Ok(Vec::new());
    }
    Ok(vec![LintDiagnostic::warning(
        graph,
        node,
        "return/not-resource-type",
        format!(
            "`{}` returns a new resource as `{}`",
            member.name,
            graph.definition_name(declared)
        ),
        "declare the return type as a releasable type",
    )])
}

/// The type is a resource, or an awaitable producing one.
fn announces_resource<G: ProgramGraph>(engine: &Engine<'_, G>, ty: TypeId) -> bool {
    if engine.is_resource_type(ty) {
        return true;
    }
    let graph = engine.graph();
    let Some(def) = graph.type_def(ty) else {
        return false;
    };
    if !engine.known().is_awaitable(graph.definition_name(def.id)) {
        return false;
    }
    matches!(def.type_args.as_slice(), [result] if engine.is_resource_type(*result))
}

/// return/released-value: the caller receives an instance that is already
/// released.
pub fn check_released_return<G: ProgramGraph>(
    engine: &Engine<'_, G>,
    node: NodeId,
    cancel: &CancellationToken,
) -> Result<Vec<LintDiagnostic>, AnalysisError> {
    let graph = engine.graph();
    let Some(NodeKind::Return { value: Some(value) }) = graph.kind(node) else {
        return Ok(Vec::new());
    };
    if !engine.returns_released(node, cancel)?.is_positive() {
        return Ok(Vec::new());
    }
    let name = graph
        .symbol_of(*value)
        .and_then(|s| graph.symbol(s))
        .map(|s| s.name.as_str())
        .unwrap_or("<unknown>");
    Ok(vec![LintDiagnostic::warning(
        graph,
        node,
        "return/released-value",
        format!("`{name}` is released before it is returned"),
        "return a live instance, or drop the release and leave it to the caller",
    )])
}

/// pattern/two-phase: one finding per violation, anchored at the core routine.
pub fn check_two_phase<G: ProgramGraph>(
    engine: &Engine<'_, G>,
    node: NodeId,
    cancel: &CancellationToken,
) -> Result<Vec<LintDiagnostic>, AnalysisError> {
    let graph = engine.graph();
    let Some(NodeKind::TypeDecl { ty, .. }) = graph.kind(node) else {
        return Ok(Vec::new());
    };
    let routine = engine.release_routine(*ty, cancel)?;
    if routine.kind != RoutineKind::TwoPhase {
        return Ok(Vec::new());
    }
    let anchor = routine.core.unwrap_or(node);
    Ok(routine
        .violations
        .iter()
        .map(|violation| {
            LintDiagnostic::warning(
                graph,
                anchor,
                "pattern/two-phase",
                format!("`{}`: {violation}", graph.definition_name(*ty)),
                "check the flag first, release members, set the flag, then call the base routine",
            )
        })
        .collect())
}
