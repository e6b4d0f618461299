//! The fallback chain of lookup strategies.
//!
//! Order matters and mirrors how a human hunts for a field: the visible
//! label first, then ids we have seen this application use, then
//! component metadata, then placeholder text, and only as a last resort
//! "the first thing that looks right".

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use autot1_session::Session;

use crate::errors::ResolverError;
use crate::scripts;
use crate::types::{ElementHandle, SemanticTarget};

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(Some)` on a hit, `Ok(None)` when the strategy does not apply
    /// to this target or found nothing. Hard errors bubble up.
    async fn attempt(
        &self,
        target: &SemanticTarget,
    ) -> Result<Option<ElementHandle>, ResolverError>;
}

async fn run_probe(session: &Session, script: String) -> Result<Option<ElementHandle>, ResolverError> {
    let selector: Option<String> = session.evaluate(script).await?;
    Ok(selector.map(ElementHandle::css))
}

fn fresh_marker() -> String {
    Uuid::new_v4().to_string()
}

/// Strategy 1: match the text of an HTML `<label>` and chase its field.
pub struct LabelTextStrategy {
    session: Arc<Session>,
}

impl LabelTextStrategy {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Strategy for LabelTextStrategy {
    fn name(&self) -> &'static str {
        "label_text"
    }

    async fn attempt(
        &self,
        target: &SemanticTarget,
    ) -> Result<Option<ElementHandle>, ResolverError> {
        let Some(label) = &target.label else {
            return Ok(None);
        };
        let script = scripts::probe_by_label(label, target.kind.host_tags(), &fresh_marker());
        run_probe(&self.session, script).await
    }
}

/// Strategy 2: ids this application is known to use for the field.
pub struct KnownIdStrategy {
    session: Arc<Session>,
}

impl KnownIdStrategy {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Strategy for KnownIdStrategy {
    fn name(&self) -> &'static str {
        "known_id"
    }

    async fn attempt(
        &self,
        target: &SemanticTarget,
    ) -> Result<Option<ElementHandle>, ResolverError> {
        if target.id_guesses.is_empty() {
            return Ok(None);
        }
        let script = scripts::probe_by_ids(&target.id_guesses);
        run_probe(&self.session, script).await
    }
}

/// Strategy 3: the component's own `label` attribute or the label node
/// inside its shadow root.
pub struct ComponentLabelStrategy {
    session: Arc<Session>,
}

impl ComponentLabelStrategy {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Strategy for ComponentLabelStrategy {
    fn name(&self) -> &'static str {
        "component_label"
    }

    async fn attempt(
        &self,
        target: &SemanticTarget,
    ) -> Result<Option<ElementHandle>, ResolverError> {
        let Some(label) = &target.label else {
            return Ok(None);
        };
        let script =
            scripts::probe_by_component_label(label, target.kind.host_tags(), &fresh_marker());
        run_probe(&self.session, script).await
    }
}

/// Strategy 4: placeholder text, host or shadow input.
pub struct PlaceholderStrategy {
    session: Arc<Session>,
}

impl PlaceholderStrategy {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Strategy for PlaceholderStrategy {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn attempt(
        &self,
        target: &SemanticTarget,
    ) -> Result<Option<ElementHandle>, ResolverError> {
        let Some(placeholder) = &target.placeholder else {
            return Ok(None);
        };
        let script =
            scripts::probe_by_placeholder(placeholder, target.kind.host_tags(), &fresh_marker());
        run_probe(&self.session, script).await
    }
}

/// Strategy 5: the first visible enabled control of the wanted kind.
pub struct FirstVisibleStrategy {
    session: Arc<Session>,
}

impl FirstVisibleStrategy {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Strategy for FirstVisibleStrategy {
    fn name(&self) -> &'static str {
        "first_visible"
    }

    async fn attempt(
        &self,
        target: &SemanticTarget,
    ) -> Result<Option<ElementHandle>, ResolverError> {
        let script = scripts::probe_first_visible(target.kind.host_tags(), &fresh_marker());
        run_probe(&self.session, script).await
    }
}

/// The canonical chain, in priority order.
pub fn default_chain(session: Arc<Session>) -> Vec<Arc<dyn Strategy>> {
    vec![
        Arc::new(LabelTextStrategy::new(session.clone())),
        Arc::new(KnownIdStrategy::new(session.clone())),
        Arc::new(ComponentLabelStrategy::new(session.clone())),
        Arc::new(PlaceholderStrategy::new(session.clone())),
        Arc::new(FirstVisibleStrategy::new(session)),
    ]
}
