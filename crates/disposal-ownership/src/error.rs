// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Query failures.

use thiserror::Error;

use crate::outcome::Outcome;

/// Why a query produced no answer.
///
/// Indeterminate evidence is never an error; it is folded into the
/// [`Outcome`] lattice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Two definitive answers disagree. Fatal to the current query only.
    #[error("conflicting evidence: {left:?} joined with {right:?}")]
    Conflict { left: Outcome, right: Outcome },

    /// The caller abandoned the query.
    #[error("query cancelled")]
    Cancelled,
}
