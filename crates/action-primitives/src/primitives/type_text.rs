//! Type text primitive

use crate::{
    errors::ActionError,
    executor::DefaultActionExecutor,
    types::{Action, ActionOutput, ExecCtx},
};
use action_locator::Selector;
use cdp_adapter::Page;
use tracing::{debug, info};

/// Set an input's value, optionally clearing it first.
///
/// With `validate` the value is read back: it must equal `text` after a clear,
/// or end with `text` when appending.
#[allow(clippy::too_many_arguments)]
pub async fn execute_type(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    selector: &Selector,
    text: &str,
    clear: bool,
    validate: bool,
) -> Result<ActionOutput, ActionError> {
    let (element, resolution) = executor.resolve(page, ctx, selector).await?;
    info!(
        action_id = %ctx.action_id,
        element = %element,
        text_len = text.chars().count(),
        clear,
        validate,
        "Executing type primitive"
    );

    page.fill(&element, text, clear).await?;

    if validate {
        let actual = page.input_value(&element).await?;
        let matches = if clear {
            actual == text
        } else {
            actual.ends_with(text)
        };
        if !matches {
            return Err(ActionError::ValidationFailure {
                expected: text.to_string(),
                actual,
            });
        }
        debug!(action_id = %ctx.action_id, "Typed value validated");
    }

    Ok(ActionOutput::new(ctx, action)
        .with_value(text)
        .with_resolution(resolution))
}
