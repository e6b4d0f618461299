//! Resolver error taxonomy.

use thiserror::Error;

use autot1_session::SessionError;

#[derive(Debug, Error)]
pub enum ResolverError {
    /// Every strategy in the chain was tried and none produced a handle.
    /// Carries the names of the strategies that were attempted, in order.
    #[error("no strategy resolved {target} (attempted: {})", attempted.join(", "))]
    Exhausted {
        target: String,
        attempted: Vec<String>,
    },

    /// The write went through but reading the field back produced a
    /// different value. The fill must not be reported as a success.
    #[error("field verification mismatch: expected {expected:?}, found {actual:?}")]
    VerificationMismatch {
        expected: String,
        actual: Option<String>,
    },

    /// A previously resolved handle no longer matches anything, the page
    /// has moved on underneath us.
    #[error("stale handle: nothing matches selector {selector}")]
    StaleHandle { selector: String },

    /// A probe script returned something the strategy could not read.
    #[error("probe returned malformed result: {0}")]
    Probe(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ResolverError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolverError::Session(err) => err.is_retryable(),
            ResolverError::StaleHandle { .. } => true,
            _ => false,
        }
    }
}
