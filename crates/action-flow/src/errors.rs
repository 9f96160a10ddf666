//! Flow execution error types

use action_primitives::ActionError;
use soulpilot_registry::RegistryError;
use thiserror::Error;

/// Flow execution errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    /// Action failed with a non-retryable error
    #[error(transparent)]
    Action(#[from] ActionError),

    /// Every attempt failed with a retryable error
    #[error("gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: ActionError },

    /// The session could not provide a page
    #[error("session error: {0}")]
    Session(#[from] RegistryError),
}

impl FlowError {
    /// The last action-level error, if any.
    pub fn action_error(&self) -> Option<&ActionError> {
        match self {
            FlowError::Action(err) | FlowError::RetriesExhausted { last: err, .. } => Some(err),
            FlowError::Session(_) => None,
        }
    }

    /// The session's page can no longer be trusted.
    pub fn is_session_fatal(&self) -> bool {
        self.action_error()
            .map(ActionError::is_session_fatal)
            .unwrap_or(false)
    }
}
