//! Scroll primitive

use crate::{
    errors::ActionError,
    executor::DefaultActionExecutor,
    types::{Action, ActionOutput, ExecCtx},
};
use action_locator::Selector;
use cdp_adapter::Page;
use tracing::info;

pub async fn execute_scroll(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    selector: &Selector,
) -> Result<ActionOutput, ActionError> {
    let (element, resolution) = executor.resolve(page, ctx, selector).await?;
    info!(action_id = %ctx.action_id, element = %element, "Executing scroll primitive");
    page.scroll_into_view(&element).await?;
    Ok(ActionOutput::new(ctx, action).with_resolution(resolution))
}
