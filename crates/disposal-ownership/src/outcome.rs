// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The five-valued decision lattice.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Answer to an ownership question.
///
/// `Yes`/`No` come from inspected bodies; `AssumeYes`/`AssumeNo` are the
/// conservative defaults for unavailable declarations. `Unknown` means nothing
/// was evaluated yet and must not reach a consumer; see [`Outcome::terminal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    AssumeYes,
    AssumeNo,
    No,
    #[default]
    Unknown,
}

impl Outcome {
    pub fn is_either(self, a: Outcome, b: Outcome) -> bool {
        self == a || self == b
    }

    /// `Yes` or `AssumeYes`: positive enough to act on.
    pub fn is_positive(self) -> bool {
        self.is_either(Outcome::Yes, Outcome::AssumeYes)
    }

    /// Combine evidence about the same question from two usage sites.
    ///
    /// `Unknown` is the identity. Definitive answers dominate assumed ones and
    /// positive evidence dominates negative assumptions. `Yes` joined with
    /// `No` is a broken evidence chain.
    pub fn join(self, other: Outcome) -> Result<Outcome, AnalysisError> {
        use Outcome::*;
        match (self, other) {
            (Unknown, x) | (x, Unknown) => Ok(x),
            (Yes, No) | (No, Yes) => Err(AnalysisError::Conflict { left: self, right: other }),
            (Yes, _) | (_, Yes) => Ok(Yes),
            (AssumeYes, _) | (_, AssumeYes) => Ok(AssumeYes),
            (No, _) | (_, No) => Ok(No),
            (AssumeNo, AssumeNo) => Ok(AssumeNo),
        }
    }

    /// Combine alternatives where any one may be taken at runtime (branches
    /// of `?:`, several `return` statements). Never conflicts.
    pub fn or(self, other: Outcome) -> Outcome {
        fn rank(o: Outcome) -> u8 {
            match o {
                Outcome::Yes => 4,
                Outcome::AssumeYes => 3,
                Outcome::AssumeNo => 2,
                Outcome::No => 1,
                Outcome::Unknown => 0,
            }
        }
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }

    /// Coerce `Unknown` for a consumer-facing answer.
    pub fn terminal(self) -> Outcome {
        match self {
            Outcome::Unknown => Outcome::AssumeNo,
            other => other,
        }
    }
}
