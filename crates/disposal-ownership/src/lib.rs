// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Ownership and escape analysis for releasable resources.
//!
//! This crate answers, for a bound program graph:
//! - does an expression create a new resource instance
//! - does a resource escape to an owner (caller, wrapper, container, field)
//! - must a binding release its value, and does it
//! - does a type's release routine follow the two-phase pattern
//!
//! Every query runs with its own [`Recursion`] context; queries share nothing
//! and may run concurrently over the same graph.

mod cancel;
mod creation;
mod error;
mod escape;
mod obligation;
mod outcome;
mod pattern;
mod recursion;
mod state;
mod usages;

#[cfg(test)]
mod tests;

pub use cancel::CancellationToken;
pub use error::AnalysisError;
pub use escape::Escape;
pub use outcome::Outcome;
pub use pattern::{PatternViolation, ReleaseRoutine, RoutineKind};
pub use recursion::{Bound, Recursion, Target};
pub use state::ReleaseState;

use disposal_graph::{KnownTypes, NodeId, ProgramGraph, SymbolId, TypeId};
use tracing::{error, warn};

/// Entry point for ownership queries over one program graph.
pub struct Engine<'g, G: ProgramGraph> {
    graph: &'g G,
    known: &'g KnownTypes,
    /// The resource interface, if the graph declares it.
    capability: Option<TypeId>,
}

impl<'g, G: ProgramGraph> Engine<'g, G> {
    pub fn new(graph: &'g G, known: &'g KnownTypes) -> Self {
        let capability = graph.lookup_type(&known.resource_capability);
        if capability.is_none() {
            warn!(
                capability = %known.resource_capability,
                "resource capability type is not declared; nothing will classify as a resource"
            );
        }
        Self { graph, known, capability }
    }

    pub fn graph(&self) -> &'g G {
        self.graph
    }

    pub fn known(&self) -> &'g KnownTypes {
        self.known
    }

    /// Run one top-level query with a fresh recursion context.
    fn query<T>(
        &self,
        name: &'static str,
        cancel: &CancellationToken,
        run: impl FnOnce(&mut Recursion<'_, G>) -> Result<T, AnalysisError>,
    ) -> Result<T, AnalysisError> {
        let mut rec = Recursion::new(self.graph, self.known, self.capability, cancel);
        let result = run(&mut rec);
        if let Err(AnalysisError::Conflict { left, right }) = &result {
            error!(query = name, ?left, ?right, "conflicting ownership evidence");
        }
        result
    }

    /// Does `expr` produce a new resource instance?
    pub fn is_creation(&self, expr: NodeId, cancel: &CancellationToken) -> Result<Outcome, AnalysisError> {
        self.query("is_creation", cancel, |rec| Ok(creation::classify(rec, expr)?.terminal()))
    }

    /// Does the method, property getter or lambda declared by `decl` return a
    /// new resource instance?
    pub fn returns_creation(&self, decl: NodeId, cancel: &CancellationToken) -> Result<Outcome, AnalysisError> {
        self.query("returns_creation", cancel, |rec| {
            Ok(creation::classify_returns(rec, decl)?.terminal())
        })
    }

    /// Is the resource produced by `expr` released in place or handed to an
    /// owner? The owner, if any, is reported with the verdict.
    pub fn escapes_or_is_disposed(
        &self,
        expr: NodeId,
        cancel: &CancellationToken,
    ) -> Result<Escape, AnalysisError> {
        self.query("escapes_or_is_disposed", cancel, |rec| {
            let found = escape::escape(rec, expr)?;
            Ok(Escape::new(found.outcome.terminal(), found.owner))
        })
    }

    /// Does the value of the call `expr` is passed to take ownership of it?
    pub fn disposed_by_return_value(
        &self,
        expr: NodeId,
        cancel: &CancellationToken,
    ) -> Result<Escape, AnalysisError> {
        self.query("disposed_by_return_value", cancel, |rec| {
            let found = escape::disposed_by_return_value(rec, expr)?;
            Ok(Escape::new(found.outcome.terminal(), found.owner))
        })
    }

    /// Must `symbol` release the value bound at `site`?
    pub fn should_release(
        &self,
        symbol: SymbolId,
        site: NodeId,
        cancel: &CancellationToken,
    ) -> Result<bool, AnalysisError> {
        self.query("should_release", cancel, |rec| obligation::should_release(rec, symbol, site))
    }

    /// Is the value held by `symbol` released? Fields and properties are
    /// answered by [`Engine::is_member_released`].
    pub fn is_released(&self, symbol: SymbolId, cancel: &CancellationToken) -> Result<Outcome, AnalysisError> {
        self.query("is_released", cancel, |rec| Ok(obligation::is_released(rec, symbol)?.terminal()))
    }

    /// Is a field or property released by its containing type?
    pub fn is_member_released(
        &self,
        member: SymbolId,
        cancel: &CancellationToken,
    ) -> Result<Outcome, AnalysisError> {
        self.query("is_member_released", cancel, |rec| {
            Ok(obligation::member_released(rec, member)?.terminal())
        })
    }

    /// Is the value returned by the `return` statement `ret` already released?
    pub fn returns_released(&self, ret: NodeId, cancel: &CancellationToken) -> Result<Outcome, AnalysisError> {
        self.query("returns_released", cancel, |rec| {
            Ok(obligation::returns_released(rec, ret)?.terminal())
        })
    }

    /// The release routine declared on `ty` and its pattern violations.
    pub fn release_routine(
        &self,
        ty: TypeId,
        cancel: &CancellationToken,
    ) -> Result<ReleaseRoutine, AnalysisError> {
        self.query("release_routine", cancel, |rec| pattern::release_routine(rec, ty))
    }

    /// Whether values of `ty` carry the resource capability.
    pub fn is_resource_type(&self, ty: TypeId) -> bool {
        self.capability
            .is_some_and(|capability| self.graph.is_assignable_to(ty, capability))
    }
}
