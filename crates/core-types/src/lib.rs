//! Shared data model for the Auto-T1 declaration batch tool.
//!
//! Everything that crosses a crate boundary lives here: the input
//! [`Record`], the per-record [`WorkflowStep`] state machine vocabulary,
//! [`StepOutcome`] reports, harvested grid [`ResultRow`]s and the final
//! [`BatchOutcome`] counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod datetime;
mod events;

pub use datetime::{DateTimeMode, DateTimePolicy, PolicyError};
pub use events::{LogLevel, ProgressEvent};

/// Identifier for one batch run, used to correlate log lines and
/// diagnostic captures across crates.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of input work: a movement reference number plus the
/// spreadsheet row it came from (1-based, if known). Immutable once read.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub mrn: String,
    pub source_row: Option<u32>,
}

impl Record {
    pub fn new(mrn: impl Into<String>) -> Self {
        Self {
            mrn: mrn.into(),
            source_row: None,
        }
    }

    pub fn with_row(mrn: impl Into<String>, row: u32) -> Self {
        Self {
            mrn: mrn.into(),
            source_row: Some(row),
        }
    }
}

/// The per-record lifecycle. Steps are totally ordered; a record moves
/// strictly forward through [`WorkflowStep::SUBMISSION_ORDER`] or escapes
/// to [`WorkflowStep::Failed`] from any non-terminal step. There are no
/// backward transitions and no step skipping.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Initializing,
    Authenticating,
    Navigating,
    StartingDeclaration,
    SelectingMessageType,
    SelectingProfile,
    Confirming,
    AwaitingPage,
    FillingMrn,
    VerifyingDestination,
    FillingArrivalDateTime,
    Submitting,
    Completed,
    Failed,
}

impl WorkflowStep {
    /// The canonical forward order for a submission record, terminal
    /// `Completed` included. `Failed` is reachable from every non-terminal
    /// step but is never part of the forward order.
    pub const SUBMISSION_ORDER: [WorkflowStep; 13] = [
        WorkflowStep::Initializing,
        WorkflowStep::Authenticating,
        WorkflowStep::Navigating,
        WorkflowStep::StartingDeclaration,
        WorkflowStep::SelectingMessageType,
        WorkflowStep::SelectingProfile,
        WorkflowStep::Confirming,
        WorkflowStep::AwaitingPage,
        WorkflowStep::FillingMrn,
        WorkflowStep::VerifyingDestination,
        WorkflowStep::FillingArrivalDateTime,
        WorkflowStep::Submitting,
        WorkflowStep::Completed,
    ];

    /// The slice of the order that is repeated for every record. The three
    /// steps before it (session, login, landing page) run once per batch.
    pub const RECORD_ORDER: [WorkflowStep; 10] = [
        WorkflowStep::StartingDeclaration,
        WorkflowStep::SelectingMessageType,
        WorkflowStep::SelectingProfile,
        WorkflowStep::Confirming,
        WorkflowStep::AwaitingPage,
        WorkflowStep::FillingMrn,
        WorkflowStep::VerifyingDestination,
        WorkflowStep::FillingArrivalDateTime,
        WorkflowStep::Submitting,
        WorkflowStep::Completed,
    ];

    /// Stable snake_case name, used for log fields and screenshot tags.
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStep::Initializing => "initializing",
            WorkflowStep::Authenticating => "authenticating",
            WorkflowStep::Navigating => "navigating",
            WorkflowStep::StartingDeclaration => "starting_declaration",
            WorkflowStep::SelectingMessageType => "selecting_message_type",
            WorkflowStep::SelectingProfile => "selecting_profile",
            WorkflowStep::Confirming => "confirming",
            WorkflowStep::AwaitingPage => "awaiting_page",
            WorkflowStep::FillingMrn => "filling_mrn",
            WorkflowStep::VerifyingDestination => "verifying_destination",
            WorkflowStep::FillingArrivalDateTime => "filling_arrival_date_time",
            WorkflowStep::Submitting => "submitting",
            WorkflowStep::Completed => "completed",
            WorkflowStep::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStep::Completed | WorkflowStep::Failed)
    }

    fn order_index(&self) -> Option<usize> {
        Self::SUBMISSION_ORDER.iter().position(|s| s == self)
    }

    /// Next step in the forward order, `None` for terminal steps.
    pub fn successor(&self) -> Option<WorkflowStep> {
        let idx = self.order_index()?;
        Self::SUBMISSION_ORDER.get(idx + 1).copied()
    }

    /// Whether `next` is a legal transition from `self`: the immediate
    /// successor, or `Failed` from any non-terminal step.
    pub fn can_transition_to(&self, next: WorkflowStep) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == WorkflowStep::Failed {
            return true;
        }
        self.successor() == Some(next)
    }

    /// Coarse progress for status displays. `Failed` reports the same
    /// number as `Completed` since the record is finished either way.
    pub fn progress_percent(&self) -> u8 {
        match self.order_index() {
            Some(idx) => {
                let last = Self::SUBMISSION_ORDER.len() - 1;
                ((idx * 100) / last) as u8
            }
            None => 100,
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Report emitted after every step, success or failure, before the next
/// step is allowed to start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: WorkflowStep,
    pub success: bool,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StepOutcome {
    pub fn ok(step: WorkflowStep, detail: impl Into<Option<String>>) -> Self {
        Self {
            step,
            success: true,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(step: WorkflowStep, detail: impl Into<String>) -> Self {
        Self {
            step,
            success: false,
            detail: Some(detail.into()),
            timestamp: Utc::now(),
        }
    }
}

/// One harvested row from the declarations result grid. Field order
/// matches the grid's data columns left to right.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub user_group: String,
    pub crn: String,
    pub registration_number: String,
    pub status: String,
    pub customs_charge_status: String,
    pub created_at: String,
    pub modified_at: String,
    pub message_name: String,
}

impl ResultRow {
    /// Number of data columns backing a row.
    pub const FIELD_COUNT: usize = 8;

    pub fn from_cells(cells: [String; Self::FIELD_COUNT]) -> Self {
        let [user_group, crn, registration_number, status, customs_charge_status, created_at, modified_at, message_name] =
            cells;
        Self {
            user_group,
            crn,
            registration_number,
            status,
            customs_charge_status,
            created_at,
            modified_at,
            message_name,
        }
    }

    /// Cell values back in grid column order, for write-back.
    pub fn cells(&self) -> [&str; Self::FIELD_COUNT] {
        [
            &self.user_group,
            &self.crn,
            &self.registration_number,
            &self.status,
            &self.customs_charge_status,
            &self.created_at,
            &self.modified_at,
            &self.message_name,
        ]
    }

    /// A row is only usable when every cell rendered with content.
    pub fn is_complete(&self) -> bool {
        self.cells().iter().all(|cell| !cell.trim().is_empty())
    }
}

/// Per-record summary kept in the batch outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordReport {
    pub mrn: String,
    pub success: bool,
    pub detail: Option<String>,
}

/// Final counters for one batch run. `succeeded + failed` equals the
/// number of records attempted; records skipped by an abort are counted
/// in neither. `rows` is the flattened set of grid rows harvested
/// across all records, in processing order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub aborted: bool,
    pub records: Vec<RecordReport>,
    pub rows: Vec<ResultRow>,
}

impl BatchOutcome {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, mrn: impl Into<String>, detail: Option<String>) {
        self.succeeded += 1;
        self.records.push(RecordReport {
            mrn: mrn.into(),
            success: true,
            detail,
        });
    }

    pub fn record_failure(&mut self, mrn: impl Into<String>, detail: impl Into<String>) {
        self.failed += 1;
        self.records.push(RecordReport {
            mrn: mrn.into(),
            success: false,
            detail: Some(detail.into()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_order_starts_and_ends_correctly() {
        assert_eq!(
            WorkflowStep::SUBMISSION_ORDER.first(),
            Some(&WorkflowStep::Initializing)
        );
        assert_eq!(
            WorkflowStep::SUBMISSION_ORDER.last(),
            Some(&WorkflowStep::Completed)
        );
        assert!(!WorkflowStep::SUBMISSION_ORDER.contains(&WorkflowStep::Failed));
    }

    #[test]
    fn record_order_is_a_suffix_of_submission_order() {
        let offset = WorkflowStep::SUBMISSION_ORDER.len() - WorkflowStep::RECORD_ORDER.len();
        assert_eq!(
            &WorkflowStep::SUBMISSION_ORDER[offset..],
            &WorkflowStep::RECORD_ORDER[..]
        );
    }

    #[test]
    fn transitions_only_move_forward() {
        assert!(WorkflowStep::FillingMrn.can_transition_to(WorkflowStep::VerifyingDestination));
        assert!(!WorkflowStep::FillingMrn.can_transition_to(WorkflowStep::Submitting));
        assert!(!WorkflowStep::VerifyingDestination.can_transition_to(WorkflowStep::FillingMrn));
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_step() {
        for step in WorkflowStep::SUBMISSION_ORDER {
            if step.is_terminal() {
                assert!(!step.can_transition_to(WorkflowStep::Failed));
            } else {
                assert!(step.can_transition_to(WorkflowStep::Failed));
            }
        }
    }

    #[test]
    fn terminal_steps_have_no_successor() {
        assert_eq!(WorkflowStep::Completed.successor(), None);
        assert_eq!(WorkflowStep::Failed.successor(), None);
        assert!(!WorkflowStep::Completed.can_transition_to(WorkflowStep::Failed));
    }

    #[test]
    fn progress_is_monotonic() {
        let mut last = 0;
        for step in WorkflowStep::SUBMISSION_ORDER {
            let pct = step.progress_percent();
            assert!(pct >= last, "{step} went backwards");
            last = pct;
        }
        assert_eq!(WorkflowStep::Completed.progress_percent(), 100);
        assert_eq!(WorkflowStep::Failed.progress_percent(), 100);
    }

    #[test]
    fn result_row_completeness() {
        let mut row = ResultRow::from_cells([
            "GRP".into(),
            "CRN1".into(),
            "24IT0001".into(),
            "Registered".into(),
            "Paid".into(),
            "2024-01-01".into(),
            "2024-01-02".into(),
            "NCTS Arrival Notification IT".into(),
        ]);
        assert!(row.is_complete());
        row.status = "  ".into();
        assert!(!row.is_complete());
    }

    #[test]
    fn batch_outcome_counters() {
        let mut outcome = BatchOutcome::new(3);
        outcome.record_success("MRN1", None);
        outcome.record_failure("MRN2", "submit button disabled");
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.records.len(), 2);
        assert!(!outcome.aborted);
    }
}
