// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Resource-release lints built on the ownership engine.

pub mod dispose;
pub mod routine;
mod rules;
pub mod types;

pub use types::{LintDiagnostic, LintOpts, LintReport, Severity};

use disposal_graph::{KnownTypes, NodeId, ProgramGraph};
use disposal_ownership::Engine;
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::rules::NodeResult;

/// Run the selected rules over every node of `graph`.
///
/// Nodes are checked in parallel, each query with its own recursion context.
/// Diagnostics come back ordered by span.
pub fn lint<G: ProgramGraph>(graph: &G, known: &KnownTypes, opts: &LintOpts) -> LintReport {
    let span = info_span!("lint", nodes = graph.node_count());
    let _guard = span.enter();

    let engine = Engine::new(graph, known);
    let rules = rules::selected::<G>(opts);
    debug!(rules = rules.len(), "selected rules");

    let results: Vec<NodeResult> = (0..graph.node_count())
        .into_par_iter()
        .map(|index| rules::check_node(&engine, &rules, NodeId(index as u32), &opts.cancel))
        .collect();

    let cancelled = results.iter().any(|r| r.cancelled);
    let mut diagnostics: Vec<LintDiagnostic> = results.into_iter().flat_map(|r| r.diagnostics).collect();
    diagnostics.sort_by(|a, b| (a.span, &a.rule, a.node).cmp(&(b.span, &b.rule, b.node)));

    let error_count = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warning_count = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();

    if cancelled {
        warn!(found = diagnostics.len(), "lint cancelled");
    } else {
        info!(errors = error_count, warnings = warning_count, "lint finished");
    }

    LintReport {
        version: 1,
        success: error_count == 0 && !cancelled,
        cancelled,
        diagnostics,
        error_count,
        warning_count,
    }
}

/// Serialize a lint report to JSON.
pub fn lint_json(report: &LintReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
