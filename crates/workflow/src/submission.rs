//! The submission workflow: one MRN becomes one sent declaration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info};

use autot1_core_types::{DateTimePolicy, Record, WorkflowStep};
use autot1_primitives::{ActionError, Primitives};
use autot1_resolver::{dual_write_verified, ControlKind, Resolver, SemanticTarget};
use autot1_session::Session;

use crate::config::{selectors, WorkflowConfig};
use crate::driver::RecordSteps;
use crate::errors::StepError;
use crate::scripts;

/// Shape shared by the form-fill scripts.
#[derive(Deserialize)]
struct WriteProbe {
    found: bool,
    actual: Option<String>,
}

pub struct SubmissionWorkflow {
    session: Arc<Session>,
    primitives: Arc<Primitives>,
    resolver: Arc<Resolver>,
    config: WorkflowConfig,
}

impl SubmissionWorkflow {
    pub fn new(
        session: Arc<Session>,
        primitives: Arc<Primitives>,
        resolver: Arc<Resolver>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            session,
            primitives,
            resolver,
            config,
        }
    }

    fn mrn_target(&self) -> SemanticTarget {
        SemanticTarget::new("MRN field", ControlKind::TextInput)
            .with_label("MRN")
            .with_id_guesses(selectors::MRN_ID_GUESSES.iter().copied())
            .with_placeholder("MRN")
    }

    async fn settle(&self) {
        sleep(Duration::from_millis(self.config.settle_ms)).await;
    }

    /// Deterministic return to the declarations page between records.
    /// A forced navigation instead of a button click: the page reloads
    /// completely, so the grid is always fresh for the next MRN.
    pub async fn return_to_start(&self) -> Result<(), StepError> {
        self.primitives
            .navigate(&self.config.declarations_url)
            .await?;
        self.primitives
            .wait_for_visible("vaadin-grid", self.config.step_timeout_ms)
            .await?;
        self.settle().await;
        Ok(())
    }

    async fn fill_arrival_datetime(&self) -> Result<String, StepError> {
        let now = Local::now().naive_local();
        let resolved = self.config.arrival_datetime.resolve(now)?;
        let iso = DateTimePolicy::render(resolved);
        let probe: WriteProbe = self
            .session
            .evaluate(scripts::fill_arrival_datetime(
                selectors::ARRIVAL_PICKER,
                &iso,
            ))
            .await?;
        if !probe.found {
            return Err(StepError::Other("arrival date/time picker not found".into()));
        }
        if probe.actual.as_deref() != Some(iso.as_str()) {
            return Err(StepError::Other(format!(
                "arrival date/time not accepted: expected {iso}, found {:?}",
                probe.actual
            )));
        }
        Ok(iso)
    }
}

#[async_trait]
impl RecordSteps for SubmissionWorkflow {
    async fn execute(
        &self,
        step: WorkflowStep,
        record: &Record,
    ) -> Result<Option<String>, StepError> {
        let timeout = self.config.step_timeout_ms;
        match step {
            WorkflowStep::StartingDeclaration => {
                self.primitives
                    .click_by_id(selectors::NEW_DECLARATION, timeout)
                    .await?;
                self.primitives
                    .wait_for_visible("vaadin-grid", timeout)
                    .await?;
                self.settle().await;
                Ok(None)
            }
            WorkflowStep::SelectingMessageType => {
                self.primitives
                    .click_by_text(&self.config.message_type, timeout)
                    .await?;
                Ok(Some(self.config.message_type.clone()))
            }
            WorkflowStep::SelectingProfile => {
                self.primitives
                    .click_by_text(&self.config.profile, timeout)
                    .await?;
                Ok(Some(self.config.profile.clone()))
            }
            WorkflowStep::Confirming => {
                // The confirmation button has carried a stable id; fall
                // back to its text if the id ever changes again.
                match self.primitives.click_by_id(selectors::CONFIRM, timeout).await {
                    Ok(()) => {}
                    Err(ActionError::NotFound { .. }) => {
                        debug!("confirmation button id missing, clicking by text");
                        self.primitives.click_by_text("OK", timeout).await?;
                    }
                    Err(err) => return Err(err.into()),
                }
                Ok(None)
            }
            WorkflowStep::AwaitingPage => {
                self.primitives
                    .wait_for_visible("vaadin-text-field", timeout)
                    .await?;
                self.settle().await;
                Ok(None)
            }
            WorkflowStep::FillingMrn => {
                let resolution = self.resolver.resolve(&self.mrn_target()).await?;
                dual_write_verified(&self.session, &resolution.handle, &record.mrn).await?;
                info!(mrn = %record.mrn, method = %resolution.method, "MRN filled");
                Ok(Some(format!("resolved via {}", resolution.method)))
            }
            WorkflowStep::VerifyingDestination => {
                let present: bool = self
                    .session
                    .evaluate(scripts::destination_office_present(
                        &self.config.destination_title,
                    ))
                    .await?;
                if present {
                    Ok(Some(format!(
                        "destination office {} confirmed",
                        self.config.destination_code
                    )))
                } else {
                    Err(StepError::Other(format!(
                        "destination office {} not confirmed",
                        self.config.destination_code
                    )))
                }
            }
            WorkflowStep::FillingArrivalDateTime => {
                let iso = self.fill_arrival_datetime().await?;
                Ok(Some(iso))
            }
            WorkflowStep::Submitting => {
                // Disabled means the form did not validate; surfacing
                // that beats clicking into the void.
                self.primitives
                    .click_by_id(selectors::SEND, timeout)
                    .await?;
                Ok(Some("declaration sent".into()))
            }
            other => Err(StepError::Other(format!(
                "{other} is not a submission record step"
            ))),
        }
    }
}
