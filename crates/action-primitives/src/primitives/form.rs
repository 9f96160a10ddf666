//! Fill-form primitive

use crate::{
    errors::ActionError,
    executor::DefaultActionExecutor,
    primitives::select::apply_checked,
    types::{Action, ActionOutput, ExecCtx, FieldReport, FieldValue, FormEntry, ResolutionInfo},
};
use cdp_adapter::Page;
use serde_json::json;
use tracing::{info, warn};

/// Fill fields in order. With `stop_on_error` the first failure aborts the
/// action; otherwise it is recorded and the next field is tried. Losing the
/// page always aborts.
pub async fn execute_fill_form(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    action: &Action,
    fields: &[FormEntry],
    stop_on_error: bool,
) -> Result<ActionOutput, ActionError> {
    info!(
        action_id = %ctx.action_id,
        fields = fields.len(),
        stop_on_error,
        "Executing fill_form primitive"
    );

    let mut reports = Vec::with_capacity(fields.len());
    for field in fields {
        let mut resolution = None;
        let outcome = fill_field(executor, page, ctx, field, &mut resolution).await;
        match outcome {
            Ok(()) => reports.push(FieldReport {
                selector: field.label.clone(),
                ok: true,
                error: None,
                resolution,
            }),
            Err(err) if stop_on_error || err.is_session_fatal() => return Err(err),
            Err(err) => {
                warn!(action_id = %ctx.action_id, field = %field.label, error = %err, "Form field skipped");
                reports.push(FieldReport {
                    selector: field.label.clone(),
                    ok: false,
                    error: Some(err.to_string()),
                    resolution,
                });
            }
        }
    }

    let filled = reports.iter().filter(|report| report.ok).count();
    let mut output = ActionOutput::new(ctx, action).with_value(json!({
        "filled": filled,
        "failed": reports.len() - filled,
    }));
    output.fields = reports;
    Ok(output)
}

async fn fill_field(
    executor: &DefaultActionExecutor,
    page: &dyn Page,
    ctx: &ExecCtx,
    field: &FormEntry,
    resolution: &mut Option<ResolutionInfo>,
) -> Result<(), ActionError> {
    let (element, info) = executor.resolve(page, ctx, &field.selector).await?;
    *resolution = Some(info);
    match &field.value {
        FieldValue::Text(text) => page.fill(&element, text, true).await?,
        FieldValue::Checked(checked) => {
            apply_checked(page, &element, *checked).await?;
        }
    }
    Ok(())
}
