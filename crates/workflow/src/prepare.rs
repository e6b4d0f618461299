//! Batch preparation: session check, sign-in, landing navigation.
//!
//! Shared by the submission and lookup workflows; any failure here is
//! batch-fatal, there is no point trying records against a session that
//! never signed in.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::info;

use autot1_core_types::WorkflowStep;
use autot1_primitives::Primitives;
use autot1_session::Session;

use crate::config::{selectors, WorkflowConfig};
use crate::driver::PrepareSteps;
use crate::errors::StepError;

pub struct SignInSteps {
    session: Arc<Session>,
    primitives: Arc<Primitives>,
    config: WorkflowConfig,
}

impl SignInSteps {
    pub fn new(session: Arc<Session>, primitives: Arc<Primitives>, config: WorkflowConfig) -> Self {
        Self {
            session,
            primitives,
            config,
        }
    }

    async fn settle(&self) {
        sleep(Duration::from_millis(self.config.settle_ms)).await;
    }
}

#[async_trait]
impl PrepareSteps for SignInSteps {
    async fn execute(&self, step: WorkflowStep) -> Result<Option<String>, StepError> {
        let timeout = self.config.step_timeout_ms;
        match step {
            WorkflowStep::Initializing => {
                self.session.ensure_open()?;
                Ok(Some("browser session ready".into()))
            }
            WorkflowStep::Authenticating => {
                // Hitting the app URL unauthenticated lands on the login
                // form; fill it and wait for the application shell.
                self.primitives
                    .navigate(&self.config.declarations_url)
                    .await?;
                self.primitives
                    .fill(selectors::USERNAME, &self.config.username)
                    .await?;
                self.primitives
                    .fill(selectors::PASSWORD, &self.config.password)
                    .await?;
                self.primitives
                    .click_by_id(selectors::LOGIN, timeout)
                    .await?;
                self.primitives
                    .wait_for_visible(
                        &format!("{}, vaadin-app-layout", selectors::NEW_DECLARATION),
                        timeout * 2,
                    )
                    .await?;
                info!(user = %self.config.username, "signed in");
                Ok(Some(format!("signed in as {}", self.config.username)))
            }
            WorkflowStep::Navigating => {
                self.primitives
                    .navigate(&self.config.declarations_url)
                    .await?;
                self.primitives
                    .wait_for_visible(selectors::NEW_DECLARATION, timeout)
                    .await?;
                self.settle().await;
                Ok(Some("declarations area ready".into()))
            }
            other => Err(StepError::Other(format!(
                "{other} is not a preparation step"
            ))),
        }
    }
}
