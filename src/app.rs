//! Wiring: build the session and collaborators from [`AppConfig`],
//! adapt the workflows to the batch orchestrator, and report progress.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use autot1_batch::{BatchError, BatchOrchestrator, Processed, ProcessorError, RecordProcessor};
use autot1_core_types::{BatchOutcome, ProgressEvent, Record, ResultRow};
use autot1_event_bus::{to_mpsc, InMemoryBus, OutcomeHistory, ProgressBus};
use autot1_grid::GridExtractor;
use autot1_primitives::{ActionError, Primitives};
use autot1_resolver::{Resolver, ResolverError};
use autot1_session::{Session, SessionError};
use autot1_sheet::{CsvSheet, Spreadsheet};
use autot1_workflow::{
    selectors, LookupOutcome, LookupWorkflow, SignInSteps, StepDriver, StepError,
    SubmissionWorkflow, WorkflowError,
};

use crate::config::AppConfig;

/// What one invocation of the tool produced, fatal abort included.
pub struct RunReport {
    pub outcome: BatchOutcome,
    /// Set when the batch was cut short by a fatal error.
    pub fatal: Option<String>,
}

fn step_error_lost_session(err: &StepError) -> bool {
    match err {
        StepError::Action(ActionError::SessionNotReady) => true,
        StepError::Session(SessionError::NotReady) => true,
        StepError::Resolver(ResolverError::Session(SessionError::NotReady)) => true,
        _ => false,
    }
}

fn workflow_error_is_fatal(err: &WorkflowError) -> bool {
    if err.is_batch_fatal() {
        return true;
    }
    match err {
        WorkflowError::Step { source, .. } => step_error_lost_session(source),
        WorkflowError::Cancelled { .. } => false,
    }
}

/// Columns the lookup run adds for the harvested grid row, in
/// [`ResultRow`] field order.
const RESULT_COLUMNS: [&str; ResultRow::FIELD_COUNT] = [
    "UserGroup",
    "CRN",
    "RegistrationNumber",
    "DeclarationStatus",
    "CustomsChargeStatus",
    "CreatedAt",
    "ModifiedAt",
    "MessageName",
];

/// Shared sheet handle. Write-back failures are logged, never allowed
/// to fail a record whose browser work already happened.
struct ResultSheet {
    inner: Mutex<CsvSheet>,
    status_column: String,
    detail_column: String,
}

impl ResultSheet {
    fn lock(&self) -> std::sync::MutexGuard<'_, CsvSheet> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_back(&self, record: &Record, status: &str, detail: &str) {
        let Some(row) = record.source_row else {
            return;
        };
        let mut sheet = self.lock();
        let result = sheet
            .write_cell(row, &self.status_column, status)
            .and_then(|_| sheet.write_cell(row, &self.detail_column, detail))
            .and_then(|_| sheet.save());
        if let Err(err) = result {
            warn!(mrn = %record.mrn, row, error = %err, "sheet write-back failed");
        }
    }

    /// Write one harvested grid row into the record's source row.
    fn write_result(&self, record: &Record, result: &ResultRow) {
        let Some(row) = record.source_row else {
            return;
        };
        let mut sheet = self.lock();
        let outcome = RESULT_COLUMNS
            .iter()
            .zip(result.cells())
            .try_for_each(|(column, value)| sheet.write_cell(row, column, value))
            .and_then(|_| sheet.save());
        if let Err(err) = outcome {
            warn!(mrn = %record.mrn, row, error = %err, "result row write-back failed");
        }
    }

    fn close(&self) {
        if let Err(err) = self.lock().close() {
            warn!(error = %err, "sheet close failed");
        }
    }
}

/// Adapts the submission workflow to the orchestrator: sign in once,
/// then drive each record through the full declaration and return to
/// the start page for the next one.
struct SubmissionProcessor {
    driver: StepDriver,
    signin: SignInSteps,
    workflow: SubmissionWorkflow,
    sheet: ResultSheet,
}

#[async_trait]
impl RecordProcessor for SubmissionProcessor {
    async fn prepare(&self) -> Result<(), ProcessorError> {
        self.driver
            .drive_prepare(&self.signin)
            .await
            .map_err(|err| ProcessorError::fatal(err.to_string()))
    }

    async fn process(
        &self,
        record: &Record,
        is_last: bool,
    ) -> Result<Processed, ProcessorError> {
        let result = self.driver.drive_record(&self.workflow, record).await;

        match result {
            Ok(()) => {
                self.sheet.write_back(record, "SENT", "");
                if !is_last {
                    if let Err(err) = self.workflow.return_to_start().await {
                        if step_error_lost_session(&err) {
                            return Err(ProcessorError::fatal(format!(
                                "session lost while returning to start: {err}"
                            )));
                        }
                        // The next record will fail on its own terms if
                        // the page really is stuck.
                        warn!(error = %err, "return to declarations page failed");
                    }
                }
                Ok(Processed::with_detail("declaration sent"))
            }
            Err(err) => {
                self.sheet
                    .write_back(record, "ERROR", &err.to_string());
                if workflow_error_is_fatal(&err) {
                    Err(ProcessorError::fatal(err.to_string()))
                } else {
                    // Leave the stack where the failure put it and force
                    // a clean page for the next record.
                    if !is_last {
                        if let Err(nav) = self.workflow.return_to_start().await {
                            if step_error_lost_session(&nav) {
                                return Err(ProcessorError::fatal(format!(
                                    "session lost while recovering: {nav}"
                                )));
                            }
                            warn!(error = %nav, "recovery navigation failed");
                        }
                    }
                    Err(ProcessorError::record(err.to_string()))
                }
            }
        }
    }
}

/// Adapts the lookup workflow: sign in, apply the display filter once,
/// then search and classify each registration number, harvesting the
/// matched grid rows back into the sheet and the batch outcome.
struct LookupProcessor {
    driver: StepDriver,
    signin: SignInSteps,
    workflow: LookupWorkflow,
    grid: Arc<GridExtractor>,
    sheet: ResultSheet,
}

impl LookupProcessor {
    /// Write the freshest matched row into the record's source row and
    /// hand all of them to the orchestrator.
    fn harvest(&self, record: &Record, rows: Option<Vec<ResultRow>>) -> Vec<ResultRow> {
        let rows = rows.unwrap_or_default();
        if let Some(first) = rows.first() {
            self.sheet.write_result(record, first);
        }
        rows
    }
}

#[async_trait]
impl RecordProcessor for LookupProcessor {
    async fn prepare(&self) -> Result<(), ProcessorError> {
        self.driver
            .drive_prepare(&self.signin)
            .await
            .map_err(|err| ProcessorError::fatal(err.to_string()))?;
        self.workflow
            .apply_display_filter()
            .await
            .map_err(|err| ProcessorError::fatal(format!("display filter failed: {err}")))?;
        // The layout drives which columns the grid renders; log them so
        // a silently wrong layout shows up in the trail.
        match self.grid.extract_headers().await {
            Ok(headers) => info!(?headers, "grid columns after layout"),
            Err(err) => warn!(error = %err, "could not read grid headers"),
        }
        Ok(())
    }

    async fn process(
        &self,
        record: &Record,
        _is_last: bool,
    ) -> Result<Processed, ProcessorError> {
        match self.workflow.process_record(record).await {
            Ok((LookupOutcome::FullyProcessed, rows)) => {
                self.sheet.write_back(record, "PROCESSED", "");
                let rows = self.harvest(record, rows);
                Ok(Processed::with_detail("already fully processed").with_rows(rows))
            }
            Ok((LookupOutcome::RemarksSubmitted, rows)) => {
                self.sheet.write_back(record, "REMARKS_SENT", "");
                let rows = self.harvest(record, rows);
                Ok(Processed::with_detail("unloading remarks submitted").with_rows(rows))
            }
            Ok((LookupOutcome::NoMatch, _)) => {
                self.sheet.write_back(record, "NOT_FOUND", "");
                Err(ProcessorError::record("no declaration found"))
            }
            Ok((LookupOutcome::Unrecognized { messages }, rows)) => {
                let detail = messages.join("; ");
                self.sheet.write_back(record, "UNRECOGNIZED", &detail);
                let rows = self.harvest(record, rows);
                Err(ProcessorError::record(format!(
                    "unrecognised messages: {detail}"
                ))
                .with_rows(rows))
            }
            Err(err) => {
                self.sheet
                    .write_back(record, "ERROR", &err.to_string());
                if step_error_lost_session(&err) {
                    Err(ProcessorError::fatal(err.to_string()))
                } else {
                    Err(ProcessorError::record(err.to_string()))
                }
            }
        }
    }
}

fn load_sheet(
    config: &AppConfig,
    extra_columns: &[&str],
) -> anyhow::Result<(ResultSheet, Vec<Record>)> {
    let settings = &config.sheet;
    let mut sheet = CsvSheet::load(
        &settings.path,
        settings.create_if_missing,
        &[
            settings.mrn_column.as_str(),
            settings.status_column.as_str(),
            settings.detail_column.as_str(),
        ],
    )?;
    sheet.ensure_columns(&[
        settings.status_column.as_str(),
        settings.detail_column.as_str(),
    ]);
    sheet.ensure_columns(extra_columns);
    let records = sheet.read_records(&settings.mrn_column)?;
    info!(
        path = %settings.path.display(),
        records = records.len(),
        "sheet loaded"
    );
    Ok((
        ResultSheet {
            inner: Mutex::new(sheet),
            status_column: settings.status_column.clone(),
            detail_column: settings.detail_column.clone(),
        },
        records,
    ))
}

/// Mirror bus traffic into the log so an unattended run leaves a trail.
fn spawn_progress_logger(bus: Arc<ProgressBus>) -> tokio::task::JoinHandle<()> {
    let mut rx = to_mpsc(bus, 256);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::RecordStarted { index, total, mrn } => {
                    info!(index, total, %mrn, "record started");
                }
                ProgressEvent::StepChanged { mrn, step, percent } => {
                    info!(%mrn, %step, percent, "step");
                }
                ProgressEvent::StepFinished { mrn, outcome } => {
                    if !outcome.success {
                        warn!(
                            %mrn,
                            step = %outcome.step,
                            detail = outcome.detail.as_deref().unwrap_or(""),
                            "step failed"
                        );
                    }
                }
                ProgressEvent::RecordCompleted {
                    index,
                    total,
                    mrn,
                    success,
                } => {
                    info!(index, total, %mrn, success, "record completed");
                }
                ProgressEvent::BatchProgress { current, total } => {
                    info!(current, total, "batch progress");
                }
                ProgressEvent::Log { level, message } => {
                    info!(?level, message, "batch note");
                }
            }
        }
    })
}

struct Runtime {
    session: Arc<Session>,
    primitives: Arc<Primitives>,
    bus: Arc<ProgressBus>,
    cancel: CancellationToken,
    logger: tokio::task::JoinHandle<()>,
}

impl Runtime {
    fn driver(&self) -> StepDriver {
        StepDriver::new(
            self.bus.clone(),
            OutcomeHistory::new(512),
            self.cancel.clone(),
            Some(self.session.clone()),
        )
    }
}

async fn bring_up(config: &AppConfig) -> anyhow::Result<Runtime> {
    let bus: Arc<ProgressBus> = InMemoryBus::new(1024);
    let cancel = CancellationToken::new();

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current record");
            ctrl_c_cancel.cancel();
        }
    });

    let logger = spawn_progress_logger(bus.clone());
    let session = Arc::new(Session::launch(config.session.to_session_config()).await?);
    let primitives = Arc::new(Primitives::new(session.clone()));

    Ok(Runtime {
        session,
        primitives,
        bus,
        cancel,
        logger,
    })
}

async fn run_batch(
    runtime: Runtime,
    processor: &dyn RecordProcessor,
    records: &[Record],
) -> RunReport {
    let orchestrator = BatchOrchestrator::new(runtime.bus.clone(), runtime.cancel.clone());
    let report = match orchestrator.run(processor, records).await {
        Ok(outcome) => RunReport {
            outcome,
            fatal: None,
        },
        Err(BatchError::Fatal {
            phase,
            message,
            outcome,
        }) => RunReport {
            outcome,
            fatal: Some(format!("{phase}: {message}")),
        },
    };
    runtime.session.close().await;
    runtime.logger.abort();
    report
}

/// Submit every record in the sheet as a new declaration.
pub async fn run_submission(config: AppConfig) -> anyhow::Result<RunReport> {
    let (sheet, records) = load_sheet(&config, &[])?;
    let runtime = bring_up(&config).await?;

    let processor = SubmissionProcessor {
        driver: runtime.driver(),
        signin: SignInSteps::new(
            runtime.session.clone(),
            runtime.primitives.clone(),
            config.workflow.clone(),
        ),
        workflow: SubmissionWorkflow::new(
            runtime.session.clone(),
            runtime.primitives.clone(),
            Arc::new(Resolver::new(runtime.session.clone())),
            config.workflow.clone(),
        ),
        sheet,
    };
    let report = run_batch(runtime, &processor, &records).await;
    processor.sheet.close();
    Ok(report)
}

/// Verify previously submitted records and push unloading remarks.
pub async fn run_lookup(config: AppConfig) -> anyhow::Result<RunReport> {
    let (sheet, records) = load_sheet(&config, &RESULT_COLUMNS)?;
    let runtime = bring_up(&config).await?;

    let grid = Arc::new(GridExtractor::new(
        runtime.session.clone(),
        selectors::RESULTS_GRID,
    ));
    let processor = LookupProcessor {
        driver: runtime.driver(),
        signin: SignInSteps::new(
            runtime.session.clone(),
            runtime.primitives.clone(),
            config.workflow.clone(),
        ),
        workflow: LookupWorkflow::new(
            runtime.session.clone(),
            runtime.primitives.clone(),
            grid.clone(),
            config.workflow.clone(),
        ),
        grid,
        sheet,
    };
    let report = run_batch(runtime, &processor, &records).await;
    processor.sheet.close();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_loss_is_detected_through_every_wrapper() {
        let direct = StepError::Action(ActionError::SessionNotReady);
        assert!(step_error_lost_session(&direct));

        let nested = StepError::Resolver(ResolverError::Session(SessionError::NotReady));
        assert!(step_error_lost_session(&nested));

        let benign = StepError::Other("send disabled".into());
        assert!(!step_error_lost_session(&benign));
    }

    fn result_sheet(dir: &tempfile::TempDir) -> ResultSheet {
        let path = dir.path().join("records.csv");
        std::fs::write(&path, "MRN,Status,Detail\n24IT01,,\n").unwrap();
        let mut sheet = CsvSheet::load(&path, false, &[]).unwrap();
        sheet.ensure_columns(&RESULT_COLUMNS);
        ResultSheet {
            inner: Mutex::new(sheet),
            status_column: "Status".into(),
            detail_column: "Detail".into(),
        }
    }

    #[test]
    fn harvested_row_lands_in_named_result_columns() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = result_sheet(&dir);
        let record = Record::with_row("24IT01", 1);
        let row = ResultRow {
            registration_number: "24IT01".into(),
            status: "Registered".into(),
            message_name: "NCTS Arrival Notification IT".into(),
            ..Default::default()
        };
        sheet.write_result(&record, &row);

        let reloaded = CsvSheet::load(dir.path().join("records.csv"), false, &[]).unwrap();
        let headers = reloaded.headers().to_vec();
        let cells = &reloaded.read_all_rows()[0];
        let at = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(cells[at("RegistrationNumber")], "24IT01");
        assert_eq!(cells[at("DeclarationStatus")], "Registered");
        assert_eq!(cells[at("MessageName")], "NCTS Arrival Notification IT");
        // The key column the record came from is untouched.
        assert_eq!(cells[at("MRN")], "24IT01");
    }

    #[test]
    fn records_without_a_source_row_are_skipped_on_write_back() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = result_sheet(&dir);
        let record = Record::new("24IT99");
        sheet.write_result(&record, &ResultRow::default());
        sheet.write_back(&record, "SENT", "");

        let reloaded = CsvSheet::load(dir.path().join("records.csv"), false, &[]).unwrap();
        assert_eq!(reloaded.read_all_rows()[0][1], "", "status stays empty");
    }

    #[test]
    fn record_step_failures_are_not_batch_fatal() {
        let err = WorkflowError::Step {
            step: autot1_core_types::WorkflowStep::Submitting,
            source: StepError::Other("send disabled".into()),
        };
        assert!(!workflow_error_is_fatal(&err));

        let lost = WorkflowError::Step {
            step: autot1_core_types::WorkflowStep::Submitting,
            source: StepError::Action(ActionError::SessionNotReady),
        };
        assert!(workflow_error_is_fatal(&lost));
    }
}
