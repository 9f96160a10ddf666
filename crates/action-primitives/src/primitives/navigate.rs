//! Navigate primitive

use crate::{
    errors::ActionError,
    types::{Action, ActionOutput, ExecCtx},
};
use cdp_adapter::Page;
use tracing::info;

/// Navigate and wait for DOM content loaded. The output value is the URL the
/// page settled on.
pub async fn execute_navigate(
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    url: &str,
) -> Result<ActionOutput, ActionError> {
    info!(action_id = %ctx.action_id, url, "Executing navigate primitive");
    let landed = page.navigate(url, ctx.remaining_time()).await?;
    if landed != url {
        info!(action_id = %ctx.action_id, requested = url, landed = %landed, "Navigation redirected");
    }
    Ok(ActionOutput::new(ctx, action).with_value(landed))
}
