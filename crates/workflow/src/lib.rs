//! Per-record workflows over the action primitives.
//!
//! The [`StepDriver`] owns sequencing and outcome emission; the
//! [`SubmissionWorkflow`] and [`LookupWorkflow`] provide the step
//! bodies. Preparation (sign-in, landing navigation) is shared and
//! batch-fatal on failure.

mod config;
mod driver;
mod errors;
mod lookup;
mod prepare;
mod scripts;
mod submission;

pub use config::{selectors, WorkflowConfig};
pub use driver::{PrepareSteps, RecordSteps, StepDriver, PREPARE_ORDER};
pub use errors::{StepError, WorkflowError};
pub use lookup::{LookupOutcome, LookupWorkflow};
pub use prepare::SignInSteps;
pub use submission::SubmissionWorkflow;
