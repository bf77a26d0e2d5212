// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Release-routine state tracking.

use crate::pattern::PatternViolation;

/// Progress of a two-phase release routine through its statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    /// Before the idempotency guard. No member may be released yet.
    NotReleased,
    /// Past the guard; member release calls may run once the flag is set.
    Releasing,
    /// The base routine was invoked. Only the flag may still be set.
    Released,
}

/// What one statement of the routine does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// `if (flag) return;` or `if (!flag) { ... }`
    Guard,
    /// `flag = true;`
    SetFlag,
    /// Releases at least one member.
    Release,
    /// `base.Dispose(disposing);`
    BaseCall,
    Other,
}

impl ReleaseState {
    /// Advance by one statement, recording any violation of the pattern.
    /// `flag_set` tells whether an earlier statement already set the flag.
    pub(crate) fn step(self, step: Step, flag_set: bool, violations: &mut Vec<PatternViolation>) -> ReleaseState {
        use ReleaseState::*;
        match (self, step) {
            (_, Step::BaseCall) => Released,
            (Released, Step::SetFlag) => Released,
            (Released, _) => {
                record(violations, PatternViolation::BaseCallNotLast);
                Released
            }
            (NotReleased, Step::Guard) => Releasing,
            (NotReleased, Step::Release) => {
                record(violations, PatternViolation::ReleaseBeforeGuard);
                Releasing
            }
            (Releasing, Step::Release) => {
                if !flag_set {
                    record(violations, PatternViolation::ReleaseBeforeFlagSet);
                }
                Releasing
            }
            (state, _) => state,
        }
    }
}

pub(crate) fn record(violations: &mut Vec<PatternViolation>, violation: PatternViolation) {
    if !violations.contains(&violation) {
        violations.push(violation);
    }
}
