//! Automation pipeline
//!
//! Runs a request's actions in order against one session's page, retrying
//! retryable failures with linear backoff and reporting every step.

pub mod errors;
pub mod extractor;
pub mod retry;
pub mod runner;
pub mod types;

pub use errors::FlowError;
pub use extractor::{ContentExtractor, HtmlSnapshotExtractor};
pub use retry::{Attempted, RetryPolicy, RetryRunner};
pub use runner::AutomationRunner;
pub use types::{
    AutomationMetadata, AutomationOptions, StepReport, WebAutomationRequest, WebAutomationResult,
};
