//! Read-only primitives

use crate::{
    errors::ActionError,
    executor::DefaultActionExecutor,
    types::{Action, ActionOutput, ExecCtx},
};
use action_locator::Selector;
use cdp_adapter::Page;
use serde_json::Value;
use tracing::info;

pub async fn execute_get_text(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    selector: &Selector,
) -> Result<ActionOutput, ActionError> {
    let (element, resolution) = executor.resolve(page, ctx, selector).await?;
    info!(action_id = %ctx.action_id, element = %element, "Executing get_text primitive");
    let text = page.text_content(&element).await?;
    Ok(ActionOutput::new(ctx, action)
        .unchanged()
        .with_value(text.trim().to_string())
        .with_resolution(resolution))
}

/// Absent attributes read as `null`.
pub async fn execute_get_attribute(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    selector: &Selector,
    attribute: &str,
) -> Result<ActionOutput, ActionError> {
    let (element, resolution) = executor.resolve(page, ctx, selector).await?;
    info!(action_id = %ctx.action_id, element = %element, attribute, "Executing get_attribute primitive");
    let value = page
        .attribute(&element, attribute)
        .await?
        .map(Value::String)
        .unwrap_or(Value::Null);
    Ok(ActionOutput::new(ctx, action)
        .unchanged()
        .with_value(value)
        .with_resolution(resolution))
}
