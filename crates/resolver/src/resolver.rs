//! Fallback-chain orchestration and verified writes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use autot1_session::Session;

use crate::errors::ResolverError;
use crate::scripts;
use crate::strategies::{default_chain, Strategy};
use crate::types::{ElementHandle, Resolution, SemanticTarget};

/// Failure-path capture hook. The real implementation is the browser
/// session; tests substitute a recorder.
#[async_trait]
pub trait Diagnostics: Send + Sync {
    async fn capture_tagged(&self, tag: &str);
}

#[async_trait]
impl Diagnostics for Session {
    async fn capture_tagged(&self, tag: &str) {
        self.capture_quiet(tag).await;
    }
}

/// Iterates the strategy chain with one uniform loop. No strategy knows
/// about any other; adding one means appending to the chain.
pub struct Resolver {
    strategies: Vec<Arc<dyn Strategy>>,
    diag: Arc<dyn Diagnostics>,
}

impl Resolver {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            strategies: default_chain(session.clone()),
            diag: session,
        }
    }

    /// Build a resolver over an explicit chain. Used by tests and by
    /// callers that want a restricted chain.
    pub fn with_strategies(strategies: Vec<Arc<dyn Strategy>>, diag: Arc<dyn Diagnostics>) -> Self {
        Self { strategies, diag }
    }

    /// Try each strategy in order. The first hit wins and its name is
    /// recorded as the resolution method. Exhaustion reports every
    /// strategy that was attempted.
    pub async fn resolve(&self, target: &SemanticTarget) -> Result<Resolution, ResolverError> {
        let mut attempted = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            attempted.push(strategy.name().to_string());
            match strategy.attempt(target).await {
                Ok(Some(handle)) => {
                    info!(
                        target = %target,
                        method = strategy.name(),
                        selector = %handle.selector,
                        "element resolved"
                    );
                    return Ok(Resolution {
                        handle,
                        method: strategy.name().to_string(),
                    });
                }
                Ok(None) => {
                    debug!(target = %target, method = strategy.name(), "strategy found nothing");
                }
                Err(err) => {
                    warn!(target = %target, method = strategy.name(), error = %err, "strategy failed");
                    self.diag
                        .capture_tagged(&format!("resolve_{}_error", strategy.name()))
                        .await;
                }
            }
        }

        self.diag.capture_tagged("resolve_exhausted").await;
        Err(ResolverError::Exhausted {
            target: target.to_string(),
            attempted,
        })
    }
}

#[derive(Deserialize)]
struct WriteResult {
    found: bool,
    actual: Option<String>,
}

/// Write `value` through a resolved handle and verify by reading it
/// back. A mismatch is a failure even though the write itself went
/// through; reporting success on faith is how silent data corruption
/// gets into customs declarations.
pub async fn dual_write_verified(
    session: &Session,
    handle: &ElementHandle,
    value: &str,
) -> Result<(), ResolverError> {
    let script = scripts::dual_write(&handle.selector, value);
    let result: WriteResult = session.evaluate(script).await?;

    if !result.found {
        return Err(ResolverError::StaleHandle {
            selector: handle.selector.clone(),
        });
    }
    match &result.actual {
        Some(actual) if actual == value => Ok(()),
        _ => Err(ResolverError::VerificationMismatch {
            expected: value.to_string(),
            actual: result.actual,
        }),
    }
}
