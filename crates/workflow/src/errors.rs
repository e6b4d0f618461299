//! Workflow error taxonomy.

use thiserror::Error;

use autot1_core_types::{PolicyError, WorkflowStep};
use autot1_grid::GridError;
use autot1_primitives::ActionError;
use autot1_resolver::ResolverError;
use autot1_session::SessionError;

/// Anything a single step can fail with.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Step-specific failures that have no lower-level error behind
    /// them, e.g. a verification that simply did not confirm.
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("step {step} failed: {source}")]
    Step {
        step: WorkflowStep,
        #[source]
        source: StepError,
    },

    #[error("cancelled before step {step}")]
    Cancelled { step: WorkflowStep },
}

impl WorkflowError {
    /// Failures in session bring-up, login or the initial navigation
    /// doom every record, not just the current one.
    pub fn is_batch_fatal(&self) -> bool {
        match self {
            WorkflowError::Step { step, .. } => matches!(
                step,
                WorkflowStep::Initializing
                    | WorkflowStep::Authenticating
                    | WorkflowStep::Navigating
            ),
            WorkflowError::Cancelled { .. } => false,
        }
    }

    pub fn step(&self) -> WorkflowStep {
        match self {
            WorkflowError::Step { step, .. } | WorkflowError::Cancelled { step } => *step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_preparation_steps_are_batch_fatal() {
        let fatal = WorkflowError::Step {
            step: WorkflowStep::Authenticating,
            source: StepError::Other("bad credentials".into()),
        };
        assert!(fatal.is_batch_fatal());

        let isolated = WorkflowError::Step {
            step: WorkflowStep::Submitting,
            source: StepError::Other("send disabled".into()),
        };
        assert!(!isolated.is_batch_fatal());
    }
}
