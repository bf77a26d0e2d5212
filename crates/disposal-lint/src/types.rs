// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Output types for the disposal lints.

use disposal_graph::{NodeId, ProgramGraph, Span};
use disposal_ownership::CancellationToken;
use serde::Serialize;

/// Complete lint report for a program graph.
#[derive(Debug, Serialize)]
pub struct LintReport {
    pub version: u32,
    pub success: bool,
    /// The run was cancelled; `diagnostics` holds what was found before.
    pub cancelled: bool,
    pub diagnostics: Vec<LintDiagnostic>,
    pub error_count: usize,
    pub warning_count: usize,
}

/// A single lint finding.
#[derive(Debug, Clone, Serialize)]
pub struct LintDiagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub node: NodeId,
    pub span: Span,
    pub fix: String,
}

impl LintDiagnostic {
    pub(crate) fn at<G: ProgramGraph>(
        graph: &G,
        node: NodeId,
        rule: &str,
        severity: Severity,
        message: String,
        fix: &str,
    ) -> Self {
        Self {
            rule: rule.to_string(),
            severity,
            message,
            node,
            span: graph.node(node).map(|n| n.span).unwrap_or_default(),
            fix: fix.to_string(),
        }
    }

    pub(crate) fn warning<G: ProgramGraph>(graph: &G, node: NodeId, rule: &str, message: String, fix: &str) -> Self {
        Self::at(graph, node, rule, Severity::Warning, message, fix)
    }
}

/// Severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Options for lint.
#[derive(Default)]
pub struct LintOpts {
    /// Include rules matching these patterns (e.g., "dispose/*")
    pub rules: Vec<String>,
    /// Exclude rules matching these patterns
    pub excludes: Vec<String>,
    /// Checked between nodes and at every analysis step.
    pub cancel: CancellationToken,
}
