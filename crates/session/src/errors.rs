//! Session error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// The session was never opened or has been closed; callers must not
    /// wait or retry, the whole batch is over for this browser.
    #[error("browser session is not ready")]
    NotReady,

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("{what} timed out after {ms}ms")]
    Timeout { what: String, ms: u64 },

    #[error("screenshot capture failed: {0}")]
    Screenshot(String),
}

impl SessionError {
    /// Whether a fresh attempt against the same session could succeed.
    /// `NotReady` and `Launch` never can; the browser is gone.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Navigation { .. } | SessionError::Timeout { .. }
        )
    }
}
