//! The step driver: one loop that owns sequencing, outcome emission and
//! the escape to `Failed`.
//!
//! Workflows implement the step bodies; the driver guarantees the
//! invariants: steps run in canonical order, the outcome for step N is
//! published before step N+1 starts, a failure emits its outcome,
//! transitions the record to `Failed` and stops, and cancellation is
//! honoured between steps but never interrupts one mid-flight.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use autot1_core_types::{ProgressEvent, Record, StepOutcome, WorkflowStep};
use autot1_event_bus::{EventBus, OutcomeHistory, ProgressBus};
use autot1_session::Session;

use crate::errors::{StepError, WorkflowError};

/// Batch-scoped steps, run once before the first record.
pub const PREPARE_ORDER: [WorkflowStep; 3] = [
    WorkflowStep::Initializing,
    WorkflowStep::Authenticating,
    WorkflowStep::Navigating,
];

/// Label used on progress events for steps that belong to the batch
/// rather than to a record.
const BATCH_LABEL: &str = "batch";

#[async_trait]
pub trait PrepareSteps: Send + Sync {
    async fn execute(&self, step: WorkflowStep) -> Result<Option<String>, StepError>;
}

#[async_trait]
pub trait RecordSteps: Send + Sync {
    async fn execute(
        &self,
        step: WorkflowStep,
        record: &Record,
    ) -> Result<Option<String>, StepError>;
}

pub struct StepDriver {
    bus: Arc<ProgressBus>,
    history: Arc<OutcomeHistory>,
    cancel: CancellationToken,
    session: Option<Arc<Session>>,
}

impl StepDriver {
    pub fn new(
        bus: Arc<ProgressBus>,
        history: Arc<OutcomeHistory>,
        cancel: CancellationToken,
        session: Option<Arc<Session>>,
    ) -> Self {
        Self {
            bus,
            history,
            cancel,
            session,
        }
    }

    async fn emit_step_changed(&self, label: &str, step: WorkflowStep) {
        // Progress is best effort; a missing consumer must not stop work.
        let _ = self
            .bus
            .publish(ProgressEvent::StepChanged {
                mrn: label.to_string(),
                step,
                percent: step.progress_percent(),
            })
            .await;
    }

    async fn emit_outcome(&self, label: &str, outcome: StepOutcome) {
        self.history.push(outcome.clone());
        let _ = self
            .bus
            .publish(ProgressEvent::StepFinished {
                mrn: label.to_string(),
                outcome,
            })
            .await;
    }

    async fn run_one<F>(
        &self,
        label: &str,
        step: WorkflowStep,
        body: F,
    ) -> Result<(), WorkflowError>
    where
        F: std::future::Future<Output = Result<Option<String>, StepError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled { step });
        }
        self.emit_step_changed(label, step).await;

        match body.await {
            Ok(detail) => {
                info!(label, step = %step, "step completed");
                self.emit_outcome(label, StepOutcome::ok(step, detail)).await;
                Ok(())
            }
            Err(source) => {
                error!(label, step = %step, error = %source, "step failed");
                self.emit_outcome(label, StepOutcome::failed(step, source.to_string()))
                    .await;
                self.emit_step_changed(label, WorkflowStep::Failed).await;
                if let Some(session) = &self.session {
                    session
                        .capture_quiet(&format!("step_failed_{}", step.name()))
                        .await;
                }
                Err(WorkflowError::Step { step, source })
            }
        }
    }

    /// Run the batch-scoped preparation steps. Any failure here is
    /// batch-fatal for the caller.
    pub async fn drive_prepare(&self, steps: &dyn PrepareSteps) -> Result<(), WorkflowError> {
        for step in PREPARE_ORDER {
            self.run_one(BATCH_LABEL, step, steps.execute(step)).await?;
        }
        Ok(())
    }

    /// Run one record through the per-record order up to `Completed`.
    pub async fn drive_record(
        &self,
        steps: &dyn RecordSteps,
        record: &Record,
    ) -> Result<(), WorkflowError> {
        for step in WorkflowStep::RECORD_ORDER {
            if step == WorkflowStep::Completed {
                self.emit_step_changed(&record.mrn, step).await;
                self.emit_outcome(&record.mrn, StepOutcome::ok(step, None))
                    .await;
                return Ok(());
            }
            self.run_one(&record.mrn, step, steps.execute(step, record))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use autot1_event_bus::InMemoryBus;

    struct Scripted {
        executed: Mutex<Vec<WorkflowStep>>,
        fail_at: Option<WorkflowStep>,
    }

    impl Scripted {
        fn new(fail_at: Option<WorkflowStep>) -> Self {
            Self {
                executed: Mutex::new(Vec::new()),
                fail_at,
            }
        }

        fn executed(&self) -> Vec<WorkflowStep> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordSteps for Scripted {
        async fn execute(
            &self,
            step: WorkflowStep,
            _record: &Record,
        ) -> Result<Option<String>, StepError> {
            self.executed.lock().unwrap().push(step);
            if self.fail_at == Some(step) {
                Err(StepError::Other("scripted failure".into()))
            } else {
                Ok(None)
            }
        }
    }

    fn driver(bus: Arc<ProgressBus>) -> StepDriver {
        StepDriver::new(bus, OutcomeHistory::new(64), CancellationToken::new(), None)
    }

    fn executing_steps() -> Vec<WorkflowStep> {
        WorkflowStep::RECORD_ORDER
            .into_iter()
            .filter(|s| *s != WorkflowStep::Completed)
            .collect()
    }

    #[tokio::test]
    async fn all_steps_run_in_order_and_outcomes_precede_next_step() {
        let bus: Arc<ProgressBus> = InMemoryBus::new(256);
        let mut rx = bus.subscribe();
        let steps = Scripted::new(None);
        let record = Record::new("24IT01");

        driver(bus.clone())
            .drive_record(&steps, &record)
            .await
            .unwrap();

        assert_eq!(steps.executed(), executing_steps());

        // Event stream must interleave strictly: changed(N), finished(N),
        // changed(N+1), ... ending with Completed.
        let mut expected = WorkflowStep::RECORD_ORDER.iter();
        let mut current = expected.next().copied();
        let mut finished: Vec<WorkflowStep> = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ProgressEvent::StepChanged { step, .. } => {
                    assert_eq!(Some(step), current, "step changed out of order");
                }
                ProgressEvent::StepFinished { outcome, .. } => {
                    assert_eq!(Some(outcome.step), current);
                    assert!(outcome.success);
                    finished.push(outcome.step);
                    current = expected.next().copied();
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(finished, WorkflowStep::RECORD_ORDER.to_vec());
    }

    #[tokio::test]
    async fn failure_stops_the_record_and_reports_the_step() {
        let bus: Arc<ProgressBus> = InMemoryBus::new(256);
        let mut rx = bus.subscribe();
        let steps = Scripted::new(Some(WorkflowStep::VerifyingDestination));
        let record = Record::new("24IT01");

        let err = driver(bus.clone())
            .drive_record(&steps, &record)
            .await
            .unwrap_err();
        assert_eq!(err.step(), WorkflowStep::VerifyingDestination);
        assert!(!err.is_batch_fatal());

        // Executed steps are a strict prefix of the canonical order.
        let executed = steps.executed();
        let order = executing_steps();
        assert_eq!(executed, order[..executed.len()].to_vec());
        assert_eq!(
            executed.last().copied(),
            Some(WorkflowStep::VerifyingDestination)
        );

        // The failing step's outcome is emitted, then the Failed state.
        let mut saw_failed_outcome = false;
        let mut saw_failed_state = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProgressEvent::StepFinished { outcome, .. } if !outcome.success => {
                    assert_eq!(outcome.step, WorkflowStep::VerifyingDestination);
                    assert!(!saw_failed_state, "outcome must precede Failed state");
                    saw_failed_outcome = true;
                }
                ProgressEvent::StepChanged {
                    step: WorkflowStep::Failed,
                    ..
                } => saw_failed_state = true,
                _ => {}
            }
        }
        assert!(saw_failed_outcome);
        assert!(saw_failed_state);
    }

    #[tokio::test]
    async fn cancellation_is_honoured_between_steps() {
        let bus: Arc<ProgressBus> = InMemoryBus::new(256);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let driver = StepDriver::new(bus, OutcomeHistory::new(8), cancel, None);
        let steps = Scripted::new(None);
        let record = Record::new("24IT01");

        let err = driver.drive_record(&steps, &record).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled { .. }));
        assert!(steps.executed().is_empty());
    }

    struct ScriptedPrepare {
        fail_at: Option<WorkflowStep>,
    }

    #[async_trait]
    impl PrepareSteps for ScriptedPrepare {
        async fn execute(&self, step: WorkflowStep) -> Result<Option<String>, StepError> {
            if self.fail_at == Some(step) {
                Err(StepError::Other("scripted".into()))
            } else {
                Ok(None)
            }
        }
    }

    #[tokio::test]
    async fn preparation_failures_are_batch_fatal() {
        let bus: Arc<ProgressBus> = InMemoryBus::new(64);
        let err = driver(bus)
            .drive_prepare(&ScriptedPrepare {
                fail_at: Some(WorkflowStep::Authenticating),
            })
            .await
            .unwrap_err();
        assert_eq!(err.step(), WorkflowStep::Authenticating);
        assert!(err.is_batch_fatal());
    }
}
