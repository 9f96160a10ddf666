use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session not found: {0}")]
    NotFound(String),
    /// Every page slot stayed taken for the whole acquire timeout.
    #[error("page limit reached ({max_pages} pages)")]
    LimitReached { max_pages: usize },
    #[error("page creation failed: {0}")]
    PageCreation(String),
    /// The manager has been shut down.
    #[error("registry closed")]
    Closed,
}
