// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Recognition of a type's release routine.
//!
//! A two-phase routine is a public no-argument release entry point that
//! delegates to a `Release(bool disposing)` core. The core must check an
//! idempotency flag and set it before releasing anything, and, when it
//! overrides a base implementation, call the base routine last. Only the
//! shape is matched; overriding subtypes are never enumerated.

use std::fmt;

use disposal_graph::{
    Literal, NodeId, NodeKind, ProgramGraph, RefKind, SymbolId, SymbolKind, TypeId, UnaryOp,
};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::recursion::Recursion;
use crate::state::{record, ReleaseState, Step};

/// Shape of a type's release routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutineKind {
    /// No release method with a body.
    None,
    /// A single no-argument release method.
    Single,
    /// Entry point plus `Release(bool)` core.
    TwoPhase,
}

/// A departure from the two-phase release pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternViolation {
    /// The no-argument entry point does not call the core routine.
    EntryDoesNotDelegate,
    /// The core never checks an idempotency flag.
    MissingIdempotencyGuard,
    /// A member is released before the idempotency flag is checked.
    ReleaseBeforeGuard,
    /// A member is released before the flag is set.
    ReleaseBeforeFlagSet,
    /// The flag is checked but never set.
    FlagNeverSet,
    /// Something other than setting the flag follows the base call.
    BaseCallNotLast,
    /// An overriding core never calls the base routine.
    MissingBaseCall,
}

impl fmt::Display for PatternViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PatternViolation::EntryDoesNotDelegate => "release entry point does not delegate to the core routine",
            PatternViolation::MissingIdempotencyGuard => "release routine has no idempotency guard",
            PatternViolation::ReleaseBeforeGuard => "members are released before the idempotency guard",
            PatternViolation::ReleaseBeforeFlagSet => "members are released before the idempotency flag is set",
            PatternViolation::FlagNeverSet => "idempotency flag is checked but never set",
            PatternViolation::BaseCallNotLast => "base release call is not the last statement",
            PatternViolation::MissingBaseCall => "overriding release routine never calls the base routine",
        };
        f.write_str(text)
    }
}

/// A type's release routine and how well it matches the pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRoutine {
    pub kind: RoutineKind,
    /// Declaration of the no-argument entry point.
    pub entry: Option<NodeId>,
    /// Declaration of the `Release(bool)` core.
    pub core: Option<NodeId>,
    pub violations: Vec<PatternViolation>,
}

impl ReleaseRoutine {
    fn none() -> Self {
        Self {
            kind: RoutineKind::None,
            entry: None,
            core: None,
            violations: Vec::new(),
        }
    }

    pub fn is_conforming(&self) -> bool {
        self.kind != RoutineKind::None && self.violations.is_empty()
    }

    /// Whether `node` lies inside the entry point or the core.
    pub fn contains<G: ProgramGraph>(&self, graph: &G, node: NodeId) -> bool {
        self.entry
            .iter()
            .chain(self.core.iter())
            .any(|&decl| graph.is_within(node, decl))
    }
}

/// Locate and verify the release routine declared on `ty`.
pub(crate) fn release_routine<G: ProgramGraph>(
    rec: &mut Recursion<'_, G>,
    ty: TypeId,
) -> Result<ReleaseRoutine, AnalysisError> {
    rec.checkpoint()?;
    let graph = rec.graph;
    let Some(def) = graph.type_def(ty) else {
        return Ok(ReleaseRoutine::none());
    };

    let mut entry = None;
    let mut core = None;
    for &member in &def.members {
        let Some(sym) = graph.symbol(member) else { continue };
        if !sym.is_method() || !rec.known.is_release_method(&sym.name) {
            continue;
        }
        let Some(&decl) = sym.declarations.first() else { continue };
        if !matches!(graph.kind(decl), Some(NodeKind::MethodDecl { body: Some(_), .. })) {
            continue;
        }
        match sym.params() {
            [] => entry = Some(decl),
            [param] if graph.symbol(*param).and_then(|p| p.ref_kind()) == Some(RefKind::None) => {
                core = Some((member, decl));
            }
            _ => {}
        }
    }

    let Some((core_symbol, core_decl)) = core else {
        return Ok(match entry {
            Some(entry) => ReleaseRoutine {
                kind: RoutineKind::Single,
                entry: Some(entry),
                core: None,
                violations: Vec::new(),
            },
            None => ReleaseRoutine::none(),
        });
    };

    let is_override = graph
        .symbol(core_symbol)
        .is_some_and(|s| s.method_flags().is_override);
    let mut violations = Vec::new();
    // An overriding core inherits its entry point.
    if !is_override && !entry.is_some_and(|e| delegates(graph, e, core_symbol)) {
        record(&mut violations, PatternViolation::EntryDoesNotDelegate);
    }

    let mut scan = Scan {
        state: ReleaseState::NotReleased,
        flag: None,
        flag_set: false,
        base_called: false,
        violations,
    };
    if let Some(NodeKind::MethodDecl { body: Some(body), .. }) = graph.kind(core_decl) {
        let statements = match graph.kind(*body) {
            Some(NodeKind::Block { statements }) => statements.clone(),
            _ => vec![*body],
        };
        scan.walk(rec, &statements);
    }

    if scan.flag.is_none() {
        record(&mut scan.violations, PatternViolation::MissingIdempotencyGuard);
    } else if !scan.flag_set {
        scan.violations.retain(|v| *v != PatternViolation::ReleaseBeforeFlagSet);
        record(&mut scan.violations, PatternViolation::FlagNeverSet);
    }
    if is_override && !scan.base_called {
        record(&mut scan.violations, PatternViolation::MissingBaseCall);
    }

    Ok(ReleaseRoutine {
        kind: RoutineKind::TwoPhase,
        entry,
        core: Some(core_decl),
        violations: scan.violations,
    })
}

/// Whether the entry point calls the core.
fn delegates<G: ProgramGraph>(graph: &G, entry: NodeId, core: SymbolId) -> bool {
    graph.descendants(entry).into_iter().any(|n| {
        matches!(graph.kind(n), Some(NodeKind::Invocation { .. })) && graph.symbol_of(n) == Some(core)
    })
}

struct Scan {
    state: ReleaseState,
    flag: Option<SymbolId>,
    flag_set: bool,
    base_called: bool,
    violations: Vec<PatternViolation>,
}

impl Scan {
    fn walk<G: ProgramGraph>(&mut self, rec: &Recursion<'_, G>, statements: &[NodeId]) {
        let graph = rec.graph;
        for &stmt in statements {
            if let Some((flag, guarded)) = guard_of(graph, stmt) {
                self.flag = Some(flag);
                self.advance(Step::Guard);
                if let Some(guarded) = guarded {
                    let inner = match graph.kind(guarded) {
                        Some(NodeKind::Block { statements }) => statements.clone(),
                        _ => vec![guarded],
                    };
                    self.walk(rec, &inner);
                }
            } else if sets_flag(graph, stmt, self.flag) {
                self.flag_set = true;
                self.advance(Step::SetFlag);
            } else if is_base_release(rec, stmt) {
                self.base_called = true;
                self.advance(Step::BaseCall);
            } else if releases_member(rec, stmt) {
                self.advance(Step::Release);
            } else {
                self.advance(Step::Other);
            }
        }
    }

    fn advance(&mut self, step: Step) {
        self.state = self.state.step(step, self.flag_set, &mut self.violations);
    }
}

/// `if (flag) return;` yields the flag; `if (!flag) { body }` yields the
/// flag and the guarded body.
fn guard_of<G: ProgramGraph>(graph: &G, stmt: NodeId) -> Option<(SymbolId, Option<NodeId>)> {
    let NodeKind::If { condition, then_branch, else_branch: None } = graph.kind(stmt)? else {
        return None;
    };
    if let Some(NodeKind::Unary { op: UnaryOp::Not, operand }) = graph.kind(*condition) {
        let flag = field_of(graph, *operand)?;
        return Some((flag, Some(*then_branch)));
    }
    let flag = field_of(graph, *condition)?;
    let returns = match graph.kind(*then_branch)? {
        NodeKind::Return { .. } => true,
        NodeKind::Block { statements } => {
            matches!(statements.as_slice(), [only] if matches!(graph.kind(*only), Some(NodeKind::Return { .. })))
        }
        _ => false,
    };
    returns.then_some((flag, None))
}

fn field_of<G: ProgramGraph>(graph: &G, node: NodeId) -> Option<SymbolId> {
    let symbol = graph.symbol_of(node)?;
    matches!(graph.symbol(symbol)?.kind, SymbolKind::Field { .. } | SymbolKind::Property { .. })
        .then_some(symbol)
}

/// `flag = true;`
fn sets_flag<G: ProgramGraph>(graph: &G, stmt: NodeId, flag: Option<SymbolId>) -> bool {
    let Some(NodeKind::ExprStmt { expr }) = graph.kind(stmt) else {
        return false;
    };
    let Some(NodeKind::Assignment { target, value }) = graph.kind(*expr) else {
        return false;
    };
    if !matches!(graph.kind(*value), Some(NodeKind::Literal(Literal::Bool(true)))) {
        return false;
    }
    match (flag, field_of(graph, *target)) {
        (Some(flag), Some(target)) => flag == target,
        (None, Some(_)) => true,
        _ => false,
    }
}

/// `base.Release(disposing);`
fn is_base_release<G: ProgramGraph>(rec: &Recursion<'_, G>, stmt: NodeId) -> bool {
    let graph = rec.graph;
    let Some(NodeKind::ExprStmt { expr }) = graph.kind(stmt) else {
        return false;
    };
    let Some(NodeKind::Invocation { callee, .. }) = graph.kind(*expr) else {
        return false;
    };
    match graph.kind(*callee) {
        Some(NodeKind::MemberAccess { receiver, name, .. }) => {
            matches!(graph.kind(*receiver), Some(NodeKind::Base)) && rec.known.is_release_method(name)
        }
        _ => false,
    }
}

/// Any release call on something other than `base`.
fn releases_member<G: ProgramGraph>(rec: &Recursion<'_, G>, stmt: NodeId) -> bool {
    let graph = rec.graph;
    std::iter::once(stmt).chain(graph.descendants(stmt)).any(|n| {
        rec.release_receiver(n)
            .is_some_and(|r| !matches!(graph.kind(r), Some(NodeKind::Base)))
    })
}
