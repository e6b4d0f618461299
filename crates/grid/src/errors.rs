//! Grid extraction errors.
//!
//! "No rows matched" is not an error; extraction reports that as
//! `Ok(None)`. Errors mean the grid itself could not be read.

use thiserror::Error;

use autot1_session::SessionError;

#[derive(Debug, Error)]
pub enum GridError {
    /// The grid element is not on the page (yet, or at all).
    #[error("results grid {selector} is not present")]
    NotReady { selector: String },

    /// A cell we resolved a moment ago is gone, the grid re-rendered.
    #[error("grid cell at slot {slot} disappeared")]
    CellMissing { slot: usize },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl GridError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GridError::NotReady { .. } | GridError::CellMissing { .. } => true,
            GridError::Session(err) => err.is_retryable(),
        }
    }
}
