//! The lookup workflow: verify what happened to previously submitted
//! declarations and push unloading remarks for the half-done ones.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Local};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{info, warn};

use autot1_core_types::{Record, ResultRow};
use autot1_grid::GridExtractor;
use autot1_primitives::Primitives;
use autot1_session::Session;

use crate::config::{selectors, WorkflowConfig};
use crate::errors::StepError;
use crate::scripts;

/// What the grid said about one searched record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LookupOutcome {
    /// Arrival and release messages both present; nothing to do.
    FullyProcessed,
    /// Arrival only; unloading remarks were opened and submitted.
    RemarksSubmitted,
    /// The search returned no row for this registration number.
    NoMatch,
    /// Rows matched but none carried a recognised marker message.
    Unrecognized { messages: Vec<String> },
}

#[derive(Deserialize)]
struct WriteProbe {
    found: bool,
    actual: Option<String>,
}

pub struct LookupWorkflow {
    session: Arc<Session>,
    primitives: Arc<Primitives>,
    grid: Arc<GridExtractor>,
    config: WorkflowConfig,
}

impl LookupWorkflow {
    pub fn new(
        session: Arc<Session>,
        primitives: Arc<Primitives>,
        grid: Arc<GridExtractor>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            session,
            primitives,
            grid,
            config,
        }
    }

    async fn settle(&self) {
        sleep(Duration::from_millis(self.config.settle_ms)).await;
    }

    async fn set_date(&self, selector: &str, value: &str) -> Result<(), StepError> {
        let probe: WriteProbe = self
            .session
            .evaluate(scripts::set_component_value(selector, value))
            .await?;
        if !probe.found {
            return Err(StepError::Other(format!("date picker {selector} not found")));
        }
        if probe.actual.as_deref() != Some(value) {
            return Err(StepError::Other(format!(
                "date picker {selector} rejected {value}: {:?}",
                probe.actual
            )));
        }
        Ok(())
    }

    /// One-time search setup: apply the shared grid layout and a
    /// trailing date window ending today.
    pub async fn apply_display_filter(&self) -> Result<(), StepError> {
        let timeout = self.config.step_timeout_ms;

        self.primitives
            .click_by_id(selectors::SETTINGS, timeout)
            .await?;
        self.settle().await;

        let probe: WriteProbe = self
            .session
            .evaluate(scripts::fill_combo_box(
                selectors::PUBLIC_LAYOUT_COMBO,
                &self.config.layout_name,
            ))
            .await?;
        if !probe.found {
            return Err(StepError::Other("Public Layout combo box not found".into()));
        }
        // The application normalises layout names; accept a value that
        // merely contains what we typed.
        let accepted = probe
            .actual
            .as_deref()
            .map(|actual| !actual.is_empty() && actual.contains(&self.config.layout_name))
            .unwrap_or(false);
        if !accepted {
            self.session.capture_quiet("layout_value_mismatch").await;
            warn!(
                expected = %self.config.layout_name,
                actual = ?probe.actual,
                "layout combo accepted a different value"
            );
        }

        self.primitives
            .click_by_id(selectors::APPLY, timeout)
            .await?;
        self.settle().await;

        let today = Local::now().date_naive();
        let from = today
            .checked_sub_days(Days::new(self.config.lookback_days.unsigned_abs()))
            .unwrap_or(today);
        self.set_date(selectors::DATE_FROM, &from.format("%Y-%m-%d").to_string())
            .await?;
        self.set_date(selectors::DATE_TO, &today.format("%Y-%m-%d").to_string())
            .await?;

        info!(from = %from, to = %today, layout = %self.config.layout_name, "display filter applied");
        Ok(())
    }

    /// Search one registration number and classify the result.
    pub async fn process_record(
        &self,
        record: &Record,
    ) -> Result<(LookupOutcome, Option<Vec<ResultRow>>), StepError> {
        let timeout = self.config.step_timeout_ms;

        self.primitives
            .fill(selectors::SEARCH_MRN, &record.mrn)
            .await?;
        self.primitives
            .click_by_id(selectors::FIND, timeout)
            .await?;
        self.settle().await;

        let Some(rows) = self.grid.extract_rows(&record.mrn).await? else {
            warn!(mrn = %record.mrn, "no declaration found in search window");
            self.session.capture_quiet("lookup_no_match").await;
            return Ok((LookupOutcome::NoMatch, None));
        };

        let has_arrival = rows
            .iter()
            .any(|r| r.message_name.contains(&self.config.arrival_marker));
        let has_release = rows
            .iter()
            .any(|r| r.message_name.contains(&self.config.release_marker));

        let outcome = if has_arrival && has_release {
            info!(mrn = %record.mrn, "already fully processed, skipping");
            LookupOutcome::FullyProcessed
        } else if has_arrival {
            self.submit_remarks(record).await?;
            LookupOutcome::RemarksSubmitted
        } else {
            let messages: Vec<String> = rows.iter().map(|r| r.message_name.clone()).collect();
            warn!(mrn = %record.mrn, ?messages, "no recognised marker message, skipping");
            LookupOutcome::Unrecognized { messages }
        };
        Ok((outcome, Some(rows)))
    }

    /// Open the arrival notification and submit the unloading remarks.
    async fn submit_remarks(&self, record: &Record) -> Result<(), StepError> {
        let timeout = self.config.step_timeout_ms;

        let slot = self
            .grid
            .find_cell_slot(&record.mrn, &self.config.arrival_marker)
            .await?
            .ok_or_else(|| {
                StepError::Other(format!(
                    "arrival row for {} disappeared before double-click",
                    record.mrn
                ))
            })?;
        self.grid.double_click_cell(slot).await?;
        self.settle().await;

        self.primitives
            .click_by_id(selectors::UNLOADING_REMARKS, timeout)
            .await?;
        self.primitives.click_by_text("OK", timeout).await?;
        self.primitives
            .click_by_text(selectors::UNLOADING_TAB_TEXT, timeout)
            .await?;
        self.settle().await;
        self.primitives
            .click_by_id(selectors::SEND, timeout)
            .await?;

        info!(mrn = %record.mrn, "unloading remarks submitted");
        Ok(())
    }
}
