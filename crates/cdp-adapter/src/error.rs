//! Adapter error model shared by every page implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by the adapter.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("navigation timed out")]
    NavTimeout,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("target element not found")]
    TargetNotFound,
    #[error("option not found")]
    OptionNotFound,
    #[error("element not interactable")]
    NotInteractable,
    #[error("page closed")]
    TargetClosed,
    #[error("browser crashed")]
    BrowserCrash,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to higher layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        let retriable = matches!(
            kind,
            AdapterErrorKind::CdpIo
                | AdapterErrorKind::NavTimeout
                | AdapterErrorKind::NotInteractable
        );
        Self {
            kind,
            hint: None,
            retriable,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn not_found(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::TargetNotFound).with_hint(hint)
    }

    pub fn closed(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::TargetClosed).with_hint(hint)
    }

    pub fn cdp(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::CdpIo).with_hint(hint)
    }

    pub fn internal(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Internal).with_hint(hint)
    }

    /// The page or browser behind this error can no longer serve commands.
    pub fn is_fatal_for_page(&self) -> bool {
        matches!(
            self.kind,
            AdapterErrorKind::TargetClosed | AdapterErrorKind::BrowserCrash
        )
    }
}
