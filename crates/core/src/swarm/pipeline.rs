//! # Pipeline Status
//!
//! The state machine the coordinator drives:
//!
//! ```text
//! idle → fetching → scout-working → architect-working → taskmaster-working → completed
//!                                                                  completed ⇄ refining
//! (any non-terminal) → error
//! ```

use serde::{Deserialize, Serialize};

/// Status of the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStatus {
    #[default]
    Idle,
    /// Pulling repository files
    Fetching,
    /// Scout mapping the codebase
    ScoutWorking,
    /// Architect designing the change
    ArchitectWorking,
    /// Taskmaster writing the prompt chunks
    TaskmasterWorking,
    /// Refiner rewriting the final prompt from feedback
    Refining,
    Completed,
    Error,
}

impl PipelineStatus {
    /// Next status on the happy path of a full run
    pub fn advance(self) -> PipelineStatus {
        match self {
            PipelineStatus::Idle => PipelineStatus::Fetching,
            PipelineStatus::Fetching => PipelineStatus::ScoutWorking,
            PipelineStatus::ScoutWorking => PipelineStatus::ArchitectWorking,
            PipelineStatus::ArchitectWorking => PipelineStatus::TaskmasterWorking,
            PipelineStatus::TaskmasterWorking => PipelineStatus::Completed,
            PipelineStatus::Refining => PipelineStatus::Completed,
            PipelineStatus::Completed => PipelineStatus::Completed,
            PipelineStatus::Error => PipelineStatus::Error,
        }
    }

    /// A call is outstanding
    pub fn is_working(self) -> bool {
        matches!(
            self,
            PipelineStatus::Fetching
                | PipelineStatus::ScoutWorking
                | PipelineStatus::ArchitectWorking
                | PipelineStatus::TaskmasterWorking
                | PipelineStatus::Refining
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStatus::Completed | PipelineStatus::Error)
    }

    /// Whether `next` is a legal transition from `self`.
    ///
    /// A fresh run may start from any non-working status.
    pub fn can_transition_to(self, next: PipelineStatus) -> bool {
        if next == PipelineStatus::Fetching {
            return !self.is_working();
        }
        match next {
            PipelineStatus::Error => self.is_working(),
            // a failed refinement leaves the final prompt in place to retry
            PipelineStatus::Refining => self.is_terminal(),
            PipelineStatus::Idle => false,
            _ => self.advance() == next && self != next,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::Fetching => "fetching",
            PipelineStatus::ScoutWorking => "scout-working",
            PipelineStatus::ArchitectWorking => "architect-working",
            PipelineStatus::TaskmasterWorking => "taskmaster-working",
            PipelineStatus::Refining => "refining",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_advance() {
        let mut status = PipelineStatus::Idle;
        let mut seen = vec![status];
        while !status.is_terminal() {
            status = status.advance();
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                PipelineStatus::Idle,
                PipelineStatus::Fetching,
                PipelineStatus::ScoutWorking,
                PipelineStatus::ArchitectWorking,
                PipelineStatus::TaskmasterWorking,
                PipelineStatus::Completed,
            ]
        );
    }

    #[test]
    fn test_refinement_cycle() {
        assert!(PipelineStatus::Completed.can_transition_to(PipelineStatus::Refining));
        assert!(PipelineStatus::Refining.can_transition_to(PipelineStatus::Completed));
        assert!(PipelineStatus::Refining.can_transition_to(PipelineStatus::Error));
        assert!(PipelineStatus::Error.can_transition_to(PipelineStatus::Refining));
        assert!(!PipelineStatus::Idle.can_transition_to(PipelineStatus::Refining));
    }

    #[test]
    fn test_error_only_from_working_states() {
        assert!(PipelineStatus::ArchitectWorking.can_transition_to(PipelineStatus::Error));
        assert!(!PipelineStatus::Completed.can_transition_to(PipelineStatus::Error));
        assert!(!PipelineStatus::Idle.can_transition_to(PipelineStatus::Error));
    }

    #[test]
    fn test_restart_from_error() {
        assert!(PipelineStatus::Error.can_transition_to(PipelineStatus::Fetching));
        assert!(PipelineStatus::Completed.can_transition_to(PipelineStatus::Fetching));
        assert!(!PipelineStatus::ScoutWorking.can_transition_to(PipelineStatus::Fetching));
    }

    #[test]
    fn test_serializes_kebab_case() {
        let json = serde_json::to_string(&PipelineStatus::TaskmasterWorking).unwrap();
        assert_eq!(json, "\"taskmaster-working\"");
        assert_eq!(PipelineStatus::ScoutWorking.to_string(), "scout-working");
    }
}
