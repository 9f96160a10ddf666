//! Error types for action execution

use action_locator::LocatorError;
use cdp_adapter::{AdapterError, AdapterErrorKind};
use serde::Serialize;
use thiserror::Error;

/// Comprehensive error types for action execution
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ActionError {
    /// No element matched the selector on any tier
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The action did not finish within its timeout
    #[error("Action timeout: {0}")]
    ActionTimeout(String),

    /// Read-back after typing did not match the input
    #[error("Validation failed: expected {expected:?}, found {actual:?}")]
    ValidationFailure { expected: String, actual: String },

    #[error("Unsupported action type: {0}")]
    UnsupportedAction(String),

    /// Required payload missing or malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Interaction failed in a way another attempt may fix
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Browser crashed: {0}")]
    BrowserCrash(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::ElementNotFound(_) | ActionError::ActionTimeout(_) | ActionError::Transient(_)
        )
    }

    /// The page behind the session can no longer be used.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ActionError::SessionLost(_) | ActionError::BrowserCrash(_))
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::Internal(_) | ActionError::BrowserCrash(_) | ActionError::SessionLost(_) => 3,
            ActionError::ActionTimeout(_) | ActionError::ValidationFailure { .. } => 2,
            ActionError::ElementNotFound(_) | ActionError::Transient(_) => 1,
            ActionError::UnsupportedAction(_) | ActionError::InvalidRequest(_) => 0,
        }
    }

    /// Short machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::ElementNotFound(_) => "element_not_found",
            ActionError::ActionTimeout(_) => "action_timeout",
            ActionError::ValidationFailure { .. } => "validation_failure",
            ActionError::UnsupportedAction(_) => "unsupported_action",
            ActionError::InvalidRequest(_) => "invalid_request",
            ActionError::Transient(_) => "transient",
            ActionError::SessionLost(_) => "session_lost",
            ActionError::BrowserCrash(_) => "browser_crash",
            ActionError::Internal(_) => "internal",
        }
    }
}

impl From<LocatorError> for ActionError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::ElementNotFound(detail) => ActionError::ElementNotFound(detail),
            LocatorError::InvalidSelector(detail) => ActionError::InvalidRequest(detail),
            LocatorError::SessionLost(detail) => ActionError::SessionLost(detail),
            LocatorError::Timeout(detail) => ActionError::ActionTimeout(detail),
            LocatorError::AmbiguousMatch(detail) | LocatorError::Internal(detail) => {
                ActionError::Internal(detail)
            }
        }
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::TargetNotFound | AdapterErrorKind::OptionNotFound => {
                ActionError::ElementNotFound(message)
            }
            AdapterErrorKind::NavTimeout => ActionError::ActionTimeout(message),
            AdapterErrorKind::NotInteractable | AdapterErrorKind::CdpIo => {
                ActionError::Transient(message)
            }
            AdapterErrorKind::TargetClosed => ActionError::SessionLost(message),
            AdapterErrorKind::BrowserCrash => ActionError::BrowserCrash(message),
            AdapterErrorKind::Internal => ActionError::Internal(message),
        }
    }
}
