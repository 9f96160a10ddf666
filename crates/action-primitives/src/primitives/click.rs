//! Click and hover primitives

use crate::{
    errors::ActionError,
    executor::DefaultActionExecutor,
    types::{Action, ActionOutput, ExecCtx},
};
use action_locator::Selector;
use cdp_adapter::{ClickMode, Page};
use tracing::{debug, info, warn};

/// Click with a trusted mouse event at the hit-tested center; if the page
/// rejects it, dispatch a DOM `click()` instead.
///
/// Both failing yields a retryable `Transient` error.
pub async fn execute_click(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    selector: &Selector,
) -> Result<ActionOutput, ActionError> {
    let (element, resolution) = executor.resolve(page, ctx, selector).await?;
    info!(
        action_id = %ctx.action_id,
        element = %element,
        strategy = %resolution.strategy,
        confidence = resolution.confidence,
        "Executing click primitive"
    );

    let normal = match page.click(&element, ClickMode::Normal, ctx.remaining_time()).await {
        Ok(()) => {
            return Ok(ActionOutput::new(ctx, action)
                .with_value("normal")
                .with_resolution(resolution))
        }
        Err(err) => ActionError::from(err),
    };
    if normal.is_session_fatal() {
        return Err(normal);
    }
    warn!(action_id = %ctx.action_id, error = %normal, "Normal click failed, forcing DOM click");

    match page.click(&element, ClickMode::Forced, ctx.remaining_time()).await {
        Ok(()) => {
            debug!(action_id = %ctx.action_id, "Forced click dispatched");
            Ok(ActionOutput::new(ctx, action)
                .with_value("forced")
                .with_resolution(resolution))
        }
        Err(err) => {
            let forced = ActionError::from(err);
            if forced.is_session_fatal() {
                return Err(forced);
            }
            Err(ActionError::Transient(format!(
                "click on {element} failed: {normal}; forced: {forced}"
            )))
        }
    }
}

/// Move the pointer over the element after scrolling it into view.
pub async fn execute_hover(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    selector: &Selector,
) -> Result<ActionOutput, ActionError> {
    let (element, resolution) = executor.resolve(page, ctx, selector).await?;
    info!(action_id = %ctx.action_id, element = %element, "Executing hover primitive");
    page.scroll_into_view(&element).await?;
    page.hover(&element).await?;
    Ok(ActionOutput::new(ctx, action).with_resolution(resolution))
}
