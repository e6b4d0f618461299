//! Progress events broadcast during a batch run.

use serde::{Deserialize, Serialize};

use crate::{StepOutcome, WorkflowStep};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Everything a status consumer (CLI printer, future UI) can observe
/// about a running batch. Carried on the in-process event bus.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    RecordStarted {
        index: usize,
        total: usize,
        mrn: String,
    },
    StepChanged {
        mrn: String,
        step: WorkflowStep,
        percent: u8,
    },
    StepFinished {
        mrn: String,
        outcome: StepOutcome,
    },
    RecordCompleted {
        index: usize,
        total: usize,
        mrn: String,
        success: bool,
    },
    BatchProgress {
        current: usize,
        total: usize,
    },
    Log {
        level: LogLevel,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_as_json() {
        let event = ProgressEvent::StepChanged {
            mrn: "24IT000000000000A1".into(),
            step: WorkflowStep::FillingMrn,
            percent: WorkflowStep::FillingMrn.progress_percent(),
        };
        let encoded = serde_json::to_string(&event).unwrap();
        assert!(encoded.contains("\"kind\":\"step_changed\""));
        assert!(encoded.contains("filling_mrn"));
        let decoded: ProgressEvent = serde_json::from_str(&encoded).unwrap();
        match decoded {
            ProgressEvent::StepChanged { step, .. } => assert_eq!(step, WorkflowStep::FillingMrn),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
