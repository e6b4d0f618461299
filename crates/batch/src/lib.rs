//! Batch orchestration.
//!
//! Records run strictly sequentially; one record's failure is recorded
//! and the loop moves on. Only two things end a batch early: a fatal
//! error (preparation failed, or the session died under us) and the
//! stop token. The orchestrator never looks inside a record, it only
//! sequences, counts and reports.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use autot1_core_types::{BatchOutcome, LogLevel, ProgressEvent, Record, ResultRow};
use autot1_event_bus::{EventBus, ProgressBus};

/// What processing one record produced: an optional human-readable
/// detail plus any grid rows harvested along the way.
#[derive(Debug, Default)]
pub struct Processed {
    pub detail: Option<String>,
    pub rows: Vec<ResultRow>,
}

impl Processed {
    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<ResultRow>) -> Self {
        self.rows = rows;
        self
    }
}

/// Error surface between the orchestrator and whatever processes a
/// record. `fatal` marks failures that doom every remaining record.
/// Rows harvested before the failure still ride along so the outcome
/// keeps them.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProcessorError {
    pub message: String,
    pub fatal: bool,
    pub rows: Vec<ResultRow>,
}

impl ProcessorError {
    /// A failure confined to the current record.
    pub fn record(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
            rows: Vec::new(),
        }
    }

    /// A failure that ends the whole batch.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<ResultRow>) -> Self {
        self.rows = rows;
        self
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    /// Preparation failed or a record hit a batch-fatal condition.
    /// Carries the counters accumulated up to the abort.
    #[error("batch aborted during {phase}: {message}")]
    Fatal {
        phase: String,
        message: String,
        outcome: BatchOutcome,
    },
}

#[async_trait]
pub trait RecordProcessor: Send + Sync {
    /// Batch-scoped setup (session, sign-in, landing page). An error
    /// here is always fatal.
    async fn prepare(&self) -> Result<(), ProcessorError>;

    /// Process one record. `is_last` lets the processor skip the
    /// return-to-start transition after the final record.
    async fn process(&self, record: &Record, is_last: bool)
        -> Result<Processed, ProcessorError>;
}

pub struct BatchOrchestrator {
    bus: Arc<ProgressBus>,
    cancel: CancellationToken,
}

impl BatchOrchestrator {
    pub fn new(bus: Arc<ProgressBus>, cancel: CancellationToken) -> Self {
        Self { bus, cancel }
    }

    async fn log(&self, level: LogLevel, message: String) {
        let _ = self
            .bus
            .publish(ProgressEvent::Log { level, message })
            .await;
    }

    pub async fn run(
        &self,
        processor: &dyn RecordProcessor,
        records: &[Record],
    ) -> Result<BatchOutcome, BatchError> {
        let total = records.len();
        let mut outcome = BatchOutcome::new(total);
        info!(total, "batch starting");

        if let Err(err) = processor.prepare().await {
            error!(error = %err, "batch preparation failed");
            return Err(BatchError::Fatal {
                phase: "preparation".into(),
                message: err.message,
                outcome,
            });
        }

        for (i, record) in records.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(processed = i, total, "batch stopped by request");
                self.log(
                    LogLevel::Warn,
                    format!("stopped after {i} of {total} records"),
                )
                .await;
                outcome.aborted = true;
                break;
            }

            let index = i + 1;
            let is_last = index == total;
            let _ = self
                .bus
                .publish(ProgressEvent::RecordStarted {
                    index,
                    total,
                    mrn: record.mrn.clone(),
                })
                .await;

            let (success, fatal) = match processor.process(record, is_last).await {
                Ok(processed) => {
                    info!(
                        mrn = %record.mrn,
                        index,
                        total,
                        rows = processed.rows.len(),
                        "record completed"
                    );
                    outcome.record_success(&record.mrn, processed.detail);
                    outcome.rows.extend(processed.rows);
                    (true, None)
                }
                Err(err) => {
                    error!(mrn = %record.mrn, index, total, error = %err, "record failed");
                    outcome.record_failure(&record.mrn, err.message.clone());
                    outcome.rows.extend(err.rows);
                    (false, err.fatal.then_some(err.message))
                }
            };

            let _ = self
                .bus
                .publish(ProgressEvent::RecordCompleted {
                    index,
                    total,
                    mrn: record.mrn.clone(),
                    success,
                })
                .await;
            let _ = self
                .bus
                .publish(ProgressEvent::BatchProgress {
                    current: index,
                    total,
                })
                .await;

            if let Some(message) = fatal {
                error!(remaining = total - index, "fatal record failure, aborting batch");
                return Err(BatchError::Fatal {
                    phase: format!("record {index}"),
                    message,
                    outcome,
                });
            }
        }

        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            aborted = outcome.aborted,
            "batch finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use autot1_event_bus::InMemoryBus;

    struct Scripted {
        fail_at: Vec<usize>,
        fatal_at: Option<usize>,
        fail_prepare: bool,
        seen: Mutex<Vec<(String, bool)>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                fail_at: Vec::new(),
                fatal_at: None,
                fail_prepare: false,
                seen: Mutex::new(Vec::new()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl RecordProcessor for Scripted {
        async fn prepare(&self) -> Result<(), ProcessorError> {
            if self.fail_prepare {
                Err(ProcessorError::fatal("login rejected"))
            } else {
                Ok(())
            }
        }

        async fn process(
            &self,
            record: &Record,
            is_last: bool,
        ) -> Result<Processed, ProcessorError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            let n = *calls;
            self.seen.lock().unwrap().push((record.mrn.clone(), is_last));
            if self.fatal_at == Some(n) {
                return Err(ProcessorError::fatal("session lost"));
            }
            if self.fail_at.contains(&n) {
                return Err(ProcessorError::record("step failed"));
            }
            Ok(Processed::default())
        }
    }

    fn records(n: usize) -> Vec<Record> {
        (1..=n).map(|i| Record::new(format!("MRN{i}"))).collect()
    }

    fn orchestrator() -> (BatchOrchestrator, Arc<ProgressBus>) {
        let bus: Arc<ProgressBus> = InMemoryBus::new(256);
        (
            BatchOrchestrator::new(bus.clone(), CancellationToken::new()),
            bus,
        )
    }

    #[tokio::test]
    async fn one_failing_record_does_not_stop_its_neighbours() {
        let (orchestrator, _bus) = orchestrator();
        let mut processor = Scripted::new();
        processor.fail_at = vec![2];

        let outcome = orchestrator.run(&processor, &records(3)).await.unwrap();
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 1);
        assert!(!outcome.aborted);

        let seen = processor.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3, "records after the failure must still run");
        assert!(!outcome.records[1].success);
        assert!(outcome.records[2].success);
    }

    #[tokio::test]
    async fn is_last_is_only_set_on_the_final_record() {
        let (orchestrator, _bus) = orchestrator();
        let processor = Scripted::new();
        orchestrator.run(&processor, &records(3)).await.unwrap();
        let seen = processor.seen.lock().unwrap().clone();
        assert_eq!(
            seen.iter().map(|(_, last)| *last).collect::<Vec<_>>(),
            vec![false, false, true]
        );
    }

    #[tokio::test]
    async fn failed_preparation_aborts_before_any_record() {
        let (orchestrator, _bus) = orchestrator();
        let mut processor = Scripted::new();
        processor.fail_prepare = true;

        let err = orchestrator.run(&processor, &records(2)).await.unwrap_err();
        let BatchError::Fatal { phase, outcome, .. } = err;
        assert_eq!(phase, "preparation");
        assert_eq!(outcome.succeeded + outcome.failed, 0);
        assert!(processor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fatal_record_failure_stops_the_remainder() {
        let (orchestrator, _bus) = orchestrator();
        let mut processor = Scripted::new();
        processor.fatal_at = Some(2);

        let err = orchestrator.run(&processor, &records(4)).await.unwrap_err();
        let BatchError::Fatal { outcome, .. } = err;
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(processor.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stop_token_aborts_between_records() {
        let bus: Arc<ProgressBus> = InMemoryBus::new(256);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orchestrator = BatchOrchestrator::new(bus, cancel);
        let processor = Scripted::new();

        let outcome = orchestrator.run(&processor, &records(3)).await.unwrap();
        assert!(outcome.aborted);
        assert_eq!(outcome.succeeded + outcome.failed, 0);
    }

    struct Harvesting;

    #[async_trait]
    impl RecordProcessor for Harvesting {
        async fn prepare(&self) -> Result<(), ProcessorError> {
            Ok(())
        }

        async fn process(
            &self,
            record: &Record,
            _is_last: bool,
        ) -> Result<Processed, ProcessorError> {
            let row = ResultRow {
                registration_number: record.mrn.clone(),
                message_name: "NCTS Arrival Notification IT".into(),
                ..Default::default()
            };
            if record.mrn == "MRN2" {
                // A classification failure still hands back what the
                // grid showed for this record.
                Err(ProcessorError::record("unrecognised messages").with_rows(vec![row]))
            } else {
                Ok(Processed::with_detail("already fully processed").with_rows(vec![row]))
            }
        }
    }

    #[tokio::test]
    async fn harvested_rows_accumulate_across_success_and_failure() {
        let (orchestrator, _bus) = orchestrator();
        let outcome = orchestrator.run(&Harvesting, &records(3)).await.unwrap();

        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 1);
        let keys: Vec<&str> = outcome
            .rows
            .iter()
            .map(|r| r.registration_number.as_str())
            .collect();
        assert_eq!(keys, vec!["MRN1", "MRN2", "MRN3"]);
    }

    #[tokio::test]
    async fn progress_events_are_published_per_record() {
        let (orchestrator, bus) = orchestrator();
        let mut rx = bus.subscribe();
        let processor = Scripted::new();
        orchestrator.run(&processor, &records(2)).await.unwrap();

        let mut started = 0;
        let mut completed = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProgressEvent::RecordStarted { .. } => started += 1,
                ProgressEvent::RecordCompleted { success, .. } => {
                    assert!(success);
                    completed += 1;
                }
                _ => {}
            }
        }
        assert_eq!(started, 2);
        assert_eq!(completed, 2);
    }
}
