//! Typed errors for the runner core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced directly to callers of the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// `start` was called while a run is in flight. Recoverable; observers
    /// should disable their start trigger rather than rely on this.
    #[error("a run is already in progress")]
    AlreadyRunning,
}

/// A fault raised inside the work loop. Carried in `Outcome::Failed`;
/// never allowed to escape to the observer as a raw panic or error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct WorkFault {
    pub message: String,
}

impl WorkFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
