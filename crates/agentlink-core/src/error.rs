//! Failures of a single dispatch.

use agentlink_types::BackendError;
use thiserror::Error;

/// Why a dispatch ended in the `Failed` phase.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The backend could not open, resume, or initialize the session.
    #[error("{0}")]
    Initialization(BackendError),

    #[error("Backend returned no session identity")]
    MissingIdentity,

    /// Raised while sending the prompt or draining the event stream.
    #[error("{0}")]
    Stream(BackendError),

    #[error("Event stream ended without a result")]
    StreamEnded,
}

impl CoordinatorError {
    /// True for failures that happened before the session was registered.
    pub fn is_initialization(&self) -> bool {
        matches!(self, Self::Initialization(_) | Self::MissingIdentity)
    }
}
