//! Wait primitives

use crate::{
    errors::ActionError,
    types::{Action, ActionOutput, ExecCtx},
};
use action_locator::Selector;
use cdp_adapter::{AdapterErrorKind, Page, WaitState};
use serde_json::json;
use std::time::Duration;
use tracing::info;

/// Fixed sleep.
pub async fn execute_wait(
    ctx: &ExecCtx,
    action: &Action,
    duration: Duration,
) -> Result<ActionOutput, ActionError> {
    info!(action_id = %ctx.action_id, duration_ms = duration.as_millis() as u64, "Executing wait primitive");
    tokio::time::sleep(duration).await;
    Ok(ActionOutput::new(ctx, action).with_value(duration.as_millis() as u64))
}

/// Wait until the selector's primary expression reaches `state`.
///
/// Only the primary expression is watched; fallbacks describe where to find an
/// element, not when it appears.
pub async fn execute_wait_for_element(
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    selector: &Selector,
    state: WaitState,
) -> Result<ActionOutput, ActionError> {
    let expression = selector.primary_expression();
    info!(
        action_id = %ctx.action_id,
        expression = %expression,
        state = state.name(),
        "Executing wait_for_element primitive"
    );

    match page
        .wait_for_state(&expression, state, ctx.remaining_time())
        .await
    {
        Ok(()) => Ok(ActionOutput::new(ctx, action).with_value(json!({
            "state": state.name(),
            "expression": expression.to_string(),
        }))),
        Err(err) if err.kind == AdapterErrorKind::TargetNotFound => Err(ActionError::ActionTimeout(
            format!("{expression} did not become {}", state.name()),
        )),
        Err(err) => Err(err.into()),
    }
}
