//! Error types for the locator

use cdp_adapter::AdapterError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No tier produced a usable match
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Several candidates tied and no tie-break applied
    #[error("Multiple elements match: {0}")]
    AmbiguousMatch(String),

    /// Selector payload failed validation
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// The page closed underneath the resolution
    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Resolution timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LocatorError::ElementNotFound(_) | LocatorError::Timeout(_)
        )
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Internal(_) | LocatorError::SessionLost(_) => 3,
            LocatorError::Timeout(_) => 2,
            LocatorError::ElementNotFound(_) | LocatorError::AmbiguousMatch(_) => 1,
            LocatorError::InvalidSelector(_) => 0,
        }
    }
}

impl From<AdapterError> for LocatorError {
    fn from(err: AdapterError) -> Self {
        if err.is_fatal_for_page() {
            LocatorError::SessionLost(err.to_string())
        } else {
            LocatorError::Internal(err.to_string())
        }
    }
}
