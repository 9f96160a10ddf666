//! Select and checkbox primitives. Both are idempotent: an element already in
//! the requested state is reported with `changed = false`.

use crate::{
    errors::ActionError,
    executor::DefaultActionExecutor,
    types::{Action, ActionOutput, ExecCtx},
};
use action_locator::Selector;
use cdp_adapter::{ElementRef, Page};
use serde_json::json;
use tracing::{debug, info};

/// Select by option value, falling back to the visible label.
pub async fn execute_select_option(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    selector: &Selector,
    value: &str,
) -> Result<ActionOutput, ActionError> {
    let (element, resolution) = executor.resolve(page, ctx, selector).await?;
    info!(action_id = %ctx.action_id, element = %element, value, "Executing select primitive");

    let current = page.select_state(&element).await?;
    let output = ActionOutput::new(ctx, action).with_resolution(resolution);
    if current.matches(value) {
        debug!(action_id = %ctx.action_id, "Option already selected");
        return Ok(output
            .unchanged()
            .with_value(json!({"value": current.value, "label": current.label})));
    }

    let selected = page.select_option(&element, value).await?;
    Ok(output.with_value(json!({"value": selected.value, "label": selected.label})))
}

pub async fn execute_set_checkbox(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    selector: &Selector,
    checked: bool,
) -> Result<ActionOutput, ActionError> {
    let (element, resolution) = executor.resolve(page, ctx, selector).await?;
    info!(action_id = %ctx.action_id, element = %element, checked, "Executing set_checkbox primitive");
    let changed = apply_checked(page, &element, checked).await?;
    let output = ActionOutput::new(ctx, action)
        .with_value(checked)
        .with_resolution(resolution);
    Ok(if changed { output } else { output.unchanged() })
}

/// Returns whether the state had to change.
pub(crate) async fn apply_checked(
    page: &dyn Page,
    element: &ElementRef,
    checked: bool,
) -> Result<bool, ActionError> {
    if page.is_checked(element).await? == checked {
        return Ok(false);
    }
    page.set_checked(element, checked).await?;
    Ok(true)
}
