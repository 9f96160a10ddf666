//! Page content extraction

use action_primitives::ActionError;
use async_trait::async_trait;
use cdp_adapter::Page;
use serde_json::{json, Value};

/// Turns the current page into a JSON payload for the result.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, page: &dyn Page) -> Result<Value, ActionError>;
}

/// `{ url, title, html }` of the current document.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSnapshotExtractor;

#[async_trait]
impl ContentExtractor for HtmlSnapshotExtractor {
    async fn extract(&self, page: &dyn Page) -> Result<Value, ActionError> {
        let url = page.url().await?;
        let title = match page.evaluate("document.title").await? {
            Value::String(title) => title,
            _ => String::new(),
        };
        let html = page.content().await?;
        Ok(json!({ "url": url, "title": title, "html": html }))
    }
}
