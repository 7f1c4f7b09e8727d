//! Control loop states and outcomes.

use std::fmt;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Observing,
    Normalizing,
    Deciding,
    Reporting,
    Acting,
    Settling,
    Finished,
    Aborted,
    StepBudgetExhausted,
}

impl LoopState {
    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Observing => "observing",
            LoopState::Normalizing => "normalizing",
            LoopState::Deciding => "deciding",
            LoopState::Reporting => "reporting",
            LoopState::Acting => "acting",
            LoopState::Settling => "settling",
            LoopState::Finished => "finished",
            LoopState::Aborted => "aborted",
            LoopState::StepBudgetExhausted => "step_budget_exhausted",
        }
    }

    /// Whether the run has ended in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Finished | LoopState::Aborted | LoopState::StepBudgetExhausted
        )
    }

    /// Whether `next` may directly follow `self`.
    ///
    /// Acting never aborts: an in-flight primitive always completes and
    /// dispatch failures are not fatal.
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Idle, Observing | Aborted | StepBudgetExhausted)
                | (Observing, Normalizing | Aborted)
                | (Normalizing, Deciding | Aborted)
                | (Deciding, Reporting | Aborted)
                | (Reporting, Acting | Aborted)
                | (Acting, Settling | Finished)
                | (Settling, Observing | Aborted | StepBudgetExhausted)
        )
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    CaptureFailed,
    NormalizeFailed,
    PolicyFailed,
    Cancelled,
}

impl AbortReason {
    /// Reason string reported to callers, e.g. `policy_failed`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::CaptureFailed => "capture_failed",
            AbortReason::NormalizeFailed => "normalize_failed",
            AbortReason::PolicyFailed => "policy_failed",
            AbortReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended. Produced exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    Finished { message: String },
    Aborted { reason: AbortReason, detail: String },
    StepBudgetExhausted { steps: u32 },
}

impl LoopOutcome {
    /// Whether the goal was reached.
    pub fn is_finished(&self) -> bool {
        matches!(self, LoopOutcome::Finished { .. })
    }

    /// The terminal state this outcome corresponds to.
    pub fn state(&self) -> LoopState {
        match self {
            LoopOutcome::Finished { .. } => LoopState::Finished,
            LoopOutcome::Aborted { .. } => LoopState::Aborted,
            LoopOutcome::StepBudgetExhausted { .. } => LoopState::StepBudgetExhausted,
        }
    }
}

impl fmt::Display for LoopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopOutcome::Finished { message } => write!(f, "finished: {}", message),
            LoopOutcome::Aborted { reason, detail } => write!(f, "aborted ({}): {}", reason, detail),
            LoopOutcome::StepBudgetExhausted { steps } => {
                write!(f, "step budget of {} exhausted", steps)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            LoopState::Idle,
            LoopState::Observing,
            LoopState::Normalizing,
            LoopState::Deciding,
            LoopState::Reporting,
            LoopState::Acting,
            LoopState::Settling,
            LoopState::Observing,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(LoopState::Acting.can_transition_to(LoopState::Finished));
        assert!(LoopState::Settling.can_transition_to(LoopState::StepBudgetExhausted));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!LoopState::Acting.can_transition_to(LoopState::Aborted));
        assert!(!LoopState::Deciding.can_transition_to(LoopState::Acting));
        assert!(!LoopState::Observing.can_transition_to(LoopState::Deciding));
        assert!(!LoopState::Settling.can_transition_to(LoopState::Finished));
        for terminal in [
            LoopState::Finished,
            LoopState::Aborted,
            LoopState::StepBudgetExhausted,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(LoopState::Observing));
        }
    }

    #[test]
    fn test_abort_reason_strings() {
        assert_eq!(AbortReason::CaptureFailed.as_str(), "capture_failed");
        assert_eq!(AbortReason::NormalizeFailed.as_str(), "normalize_failed");
        assert_eq!(AbortReason::PolicyFailed.as_str(), "policy_failed");
        assert_eq!(AbortReason::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_outcome_state() {
        let outcome = LoopOutcome::Aborted {
            reason: AbortReason::PolicyFailed,
            detail: "x".into(),
        };
        assert_eq!(outcome.state(), LoopState::Aborted);
        assert!(!outcome.is_finished());
        assert_eq!(outcome.to_string(), "aborted (policy_failed): x");
    }
}
