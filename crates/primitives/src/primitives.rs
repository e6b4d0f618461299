//! The action primitives themselves.
//!
//! Every primitive has the same shape: fail fast when the session is
//! gone, run one bounded DOM operation, and on failure capture a tagged
//! screenshot before handing the error up. Retrying is the caller's
//! decision, never taken here.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use autot1_resolver::{dual_write_verified, ElementHandle};
use autot1_session::Session;

use crate::errors::ActionError;
use crate::scripts;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Tags scanned by text clicks; covers buttons, links, tab headers and
/// the grid cells used as menu entries on the new-declaration page.
const CLICKABLE_TAGS: &[&str] = &[
    "vaadin-button",
    "button",
    "a",
    "vaadin-tab",
    "vaadin-item",
    "vaadin-grid-cell-content",
];

pub struct Primitives {
    session: Arc<Session>,
}

impl Primitives {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    async fn fail<T>(&self, tag: &str, err: ActionError) -> Result<T, ActionError> {
        // SessionNotReady means there is nothing left to photograph.
        if !matches!(err, ActionError::SessionNotReady) {
            self.session.capture_quiet(tag).await;
        }
        Err(err)
    }

    /// Navigate the page, screenshot on failure.
    pub async fn navigate(&self, url: &str) -> Result<(), ActionError> {
        match self.session.goto(url).await {
            Ok(()) => Ok(()),
            Err(err) => self.fail("navigate_failed", err.into()).await,
        }
    }

    async fn click_with_script<F>(
        &self,
        what: &str,
        timeout_ms: u64,
        script: F,
    ) -> Result<(), ActionError>
    where
        F: Fn() -> String,
    {
        self.session.ensure_open()?;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut last_status = String::from("missing");

        loop {
            // A page-side exception is an action failure too; it gets
            // the same screenshot as a terminal miss.
            let status: String = match self.session.evaluate(script()).await {
                Ok(status) => status,
                Err(err) => return self.fail("click_failed", err.into()).await,
            };
            match status.as_str() {
                "ok" => {
                    debug!(what, "clicked");
                    return Ok(());
                }
                // A disabled control will not enable itself by us
                // staring at it; the page state is wrong.
                "disabled" => {
                    return self
                        .fail(
                            "click_disabled",
                            ActionError::NotEnabled { what: what.into() },
                        )
                        .await;
                }
                other => last_status = other.to_string(),
            }
            if Instant::now() >= deadline {
                let err = if last_status == "hidden" {
                    ActionError::NotVisible { what: what.into() }
                } else {
                    ActionError::NotFound {
                        what: what.into(),
                        ms: timeout_ms,
                    }
                };
                return self.fail("click_failed", err).await;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Click the element matching `selector` once it is present, visible
    /// and enabled. Disabled is an immediate failure, not a wait.
    pub async fn click_by_id(&self, selector: &str, timeout_ms: u64) -> Result<(), ActionError> {
        self.click_with_script(selector, timeout_ms, || scripts::click_status(selector))
            .await
    }

    /// Click the first clickable element whose text matches.
    pub async fn click_by_text(&self, text: &str, timeout_ms: u64) -> Result<(), ActionError> {
        self.click_with_script(text, timeout_ms, || {
            scripts::click_by_text_status(text, CLICKABLE_TAGS)
        })
        .await
    }

    /// Verified fill through the shadow-DOM dual write.
    pub async fn fill(&self, selector: &str, value: &str) -> Result<(), ActionError> {
        self.session.ensure_open()?;
        let handle = ElementHandle::css(selector);
        match dual_write_verified(&self.session, &handle, value).await {
            Ok(()) => Ok(()),
            Err(err) => self.fail("fill_failed", err.into()).await,
        }
    }

    /// Wait until the element is present and visible.
    pub async fn wait_for_visible(
        &self,
        selector: &str,
        timeout_ms: u64,
    ) -> Result<(), ActionError> {
        self.session.ensure_open()?;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let visible: bool = match self.session.evaluate(scripts::is_visible(selector)).await {
                Ok(visible) => visible,
                Err(err) => return self.fail("wait_for_visible_failed", err.into()).await,
            };
            if visible {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return self
                    .fail(
                        "wait_for_visible_failed",
                        ActionError::Timeout {
                            what: format!("visibility of {selector}"),
                            ms: timeout_ms,
                        },
                    )
                    .await;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Trimmed text content of the element.
    pub async fn extract_text(&self, selector: &str) -> Result<String, ActionError> {
        self.session.ensure_open()?;
        let text: Option<String> = match self.session.evaluate(scripts::text_of(selector)).await {
            Ok(text) => text,
            Err(err) => return self.fail("extract_text_failed", err.into()).await,
        };
        match text {
            Some(text) => Ok(text),
            None => {
                self.fail(
                    "extract_text_failed",
                    ActionError::NotFound {
                        what: selector.into(),
                        ms: 0,
                    },
                )
                .await
            }
        }
    }

    /// Attribute value; `Ok(None)` when the element exists without it.
    pub async fn extract_attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, ActionError> {
        self.session.ensure_open()?;
        match self.session.evaluate(scripts::attr_of(selector, name)).await {
            Ok(value) => Ok(value),
            Err(err) => self.fail("extract_attribute_failed", err.into()).await,
        }
    }

    /// Attribute of an element inside the component's shadow root.
    pub async fn extract_shadow_attribute(
        &self,
        selector: &str,
        inner: &str,
        name: &str,
    ) -> Result<Option<String>, ActionError> {
        self.session.ensure_open()?;
        match self
            .session
            .evaluate(scripts::shadow_attr_of(selector, inner, name))
            .await
        {
            Ok(value) => Ok(value),
            Err(err) => self.fail("extract_shadow_attribute_failed", err.into()).await,
        }
    }
}
