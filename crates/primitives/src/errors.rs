//! Action primitive error taxonomy.
//!
//! The distinctions matter to callers: a disabled button means the page
//! state is wrong (`NotEnabled`), which is a different situation from
//! the button not existing at all (`NotFound`), and neither should be
//! conflated with a dead session (`SessionNotReady`).

use thiserror::Error;

use autot1_resolver::ResolverError;
use autot1_session::SessionError;

#[derive(Debug, Error)]
pub enum ActionError {
    /// The browser session is gone. Fail immediately, never wait.
    #[error("session not ready, refusing to act")]
    SessionNotReady,

    #[error("{what} not found within {ms}ms")]
    NotFound { what: String, ms: u64 },

    #[error("{what} is present but not visible")]
    NotVisible { what: String },

    #[error("{what} is present but disabled")]
    NotEnabled { what: String },

    #[error("{what} timed out after {ms}ms")]
    Timeout { what: String, ms: u64 },

    #[error("fill failed: {0}")]
    Fill(ResolverError),

    #[error(transparent)]
    Session(SessionError),
}

impl From<SessionError> for ActionError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotReady => ActionError::SessionNotReady,
            other => ActionError::Session(other),
        }
    }
}

impl From<ResolverError> for ActionError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::Session(SessionError::NotReady) => ActionError::SessionNotReady,
            other => ActionError::Fill(other),
        }
    }
}

impl ActionError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ActionError::SessionNotReady | ActionError::NotEnabled { .. } => false,
            ActionError::NotFound { .. }
            | ActionError::NotVisible { .. }
            | ActionError::Timeout { .. } => true,
            ActionError::Fill(err) => err.is_retryable(),
            ActionError::Session(err) => err.is_retryable(),
        }
    }
}
