//! The page handle seam consumed by the locator and the executor.

use crate::commands::{ClickMode, ElementRef, ElementSnapshot, QueryExpression, SelectState, WaitState};
use crate::error::AdapterError;
use async_trait::async_trait;
use serde_json::Value;
use soulpilot_core_types::PageId;
use std::sync::Arc;
use std::time::Duration;

/// Operations a single browser tab must support.
///
/// Element handles are never stored: every element-level call receives an
/// [`ElementRef`] and re-runs its query, so a re-rendered DOM surfaces as
/// `TargetNotFound` instead of a stale node.
#[async_trait]
pub trait Page: Send + Sync {
    fn id(&self) -> &PageId;

    /// Last committed URL.
    async fn url(&self) -> Result<String, AdapterError>;

    /// Navigate and wait for DOM content loaded, bounded by `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<String, AdapterError>;

    /// Count the nodes currently matching `expr`. A non-zero `wait` polls until
    /// at least one node appears or the wait elapses.
    async fn query(&self, expr: &QueryExpression, wait: Duration) -> Result<usize, AdapterError>;

    async fn describe(&self, element: &ElementRef) -> Result<ElementSnapshot, AdapterError>;

    async fn is_visible(&self, element: &ElementRef) -> Result<bool, AdapterError>;

    async fn click(
        &self,
        element: &ElementRef,
        mode: ClickMode,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    async fn hover(&self, element: &ElementRef) -> Result<(), AdapterError>;

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), AdapterError>;

    /// Set the value of an editable element, clearing it first when `clear`.
    async fn fill(&self, element: &ElementRef, text: &str, clear: bool) -> Result<(), AdapterError>;

    async fn input_value(&self, element: &ElementRef) -> Result<String, AdapterError>;

    async fn text_content(&self, element: &ElementRef) -> Result<String, AdapterError>;

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, AdapterError>;

    async fn select_state(&self, element: &ElementRef) -> Result<SelectState, AdapterError>;

    /// Choose the option whose value equals `wanted`, else whose label does.
    /// No matching option yields `OptionNotFound`.
    async fn select_option(
        &self,
        element: &ElementRef,
        wanted: &str,
    ) -> Result<SelectState, AdapterError>;

    async fn is_checked(&self, element: &ElementRef) -> Result<bool, AdapterError>;

    async fn set_checked(&self, element: &ElementRef, checked: bool) -> Result<(), AdapterError>;

    /// Poll until the first node matching `expr` satisfies `state`.
    async fn wait_for_state(
        &self,
        expr: &QueryExpression,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    async fn evaluate(&self, script: &str) -> Result<Value, AdapterError>;

    /// Serialized document HTML.
    async fn content(&self) -> Result<String, AdapterError>;

    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), AdapterError>;
}

pub type PageHandle = Arc<dyn Page>;

/// Source of fresh pages for the session manager.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn create_page(&self) -> Result<PageHandle, AdapterError>;
}
