// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Rule registry and dispatch.

use disposal_graph::{NodeId, ProgramGraph};
use disposal_ownership::{AnalysisError, CancellationToken, Engine};

use crate::types::{LintDiagnostic, LintOpts, Severity};
use crate::{dispose, routine};

pub(crate) type Check<G> =
    fn(&Engine<'_, G>, NodeId, &CancellationToken) -> Result<Vec<LintDiagnostic>, AnalysisError>;

/// A lint rule: id, per-node check function.
pub(crate) struct Rule<G: ProgramGraph> {
    pub id: &'static str,
    check: Check<G>,
}

/// All registered rules.
fn all_rules<G: ProgramGraph>() -> Vec<Rule<G>> {
    vec![
        // Release obligations
        Rule { id: "dispose/created", check: dispose::check_created },
        Rule { id: "dispose/ignored", check: dispose::check_ignored },
        Rule { id: "dispose/member", check: dispose::check_member },
        // Declarations
        Rule { id: "return/property-creates", check: routine::check_property_creates },
        Rule { id: "return/not-resource-type", check: routine::check_return_type },
        Rule { id: "return/released-value", check: routine::check_released_return },
        Rule { id: "pattern/two-phase", check: routine::check_two_phase },
    ]
}

/// Rules selected by the include/exclude filters.
pub(crate) fn selected<G: ProgramGraph>(opts: &LintOpts) -> Vec<Rule<G>> {
    all_rules().into_iter().filter(|rule| should_run(rule.id, opts)).collect()
}

/// What running every rule on one node produced.
pub(crate) struct NodeResult {
    pub diagnostics: Vec<LintDiagnostic>,
    pub cancelled: bool,
}

/// Run `rules` against one node. A conflict in one rule is reported for this
/// node and does not stop the others.
pub(crate) fn check_node<G: ProgramGraph>(
    engine: &Engine<'_, G>,
    rules: &[Rule<G>],
    node: NodeId,
    cancel: &CancellationToken,
) -> NodeResult {
    let mut diagnostics = Vec::new();
    for rule in rules {
        if cancel.is_cancelled() {
            return NodeResult { diagnostics, cancelled: true };
        }
        match (rule.check)(engine, node, cancel) {
            Ok(found) => diagnostics.extend(found),
            Err(AnalysisError::Cancelled) => return NodeResult { diagnostics, cancelled: true },
            Err(err @ AnalysisError::Conflict { .. }) => diagnostics.push(LintDiagnostic::at(
                engine.graph(),
                node,
                "internal/conflict",
                Severity::Error,
                format!("{} while running `{}`", err, rule.id),
                "report this program to the analysis maintainers",
            )),
        }
    }
    NodeResult { diagnostics, cancelled: false }
}

/// Check if a rule should run based on include/exclude filters.
fn should_run(rule_id: &str, opts: &LintOpts) -> bool {
    // Exclude takes priority
    if opts.excludes.iter().any(|pattern| matches_rule(rule_id, pattern)) {
        return false;
    }

    // If no include filters, run all
    opts.rules.is_empty() || opts.rules.iter().any(|pattern| matches_rule(rule_id, pattern))
}

/// Match a rule ID against a glob pattern.
/// Supports: exact match, "category/*" for all rules in a category, "*".
fn matches_rule(rule_id: &str, pattern: &str) -> bool {
    if pattern == rule_id || pattern == "*" {
        return true;
    }

    // "dispose/*" matches "dispose/created", "dispose/member", etc.
    match (pattern.strip_suffix("/*"), rule_id.split_once('/')) {
        (Some(prefix), Some((category, _))) => category == prefix,
        _ => false,
    }
}
