//! Action executor: runs one typed action against a page under its timeout.

use crate::errors::ActionError;
use crate::primitives;
use crate::types::{Action, ActionOutput, ExecCtx, ParsedAction, ResolutionInfo};
use action_locator::{DefaultElementResolver, ElementResolver, Selector};
use async_trait::async_trait;
use cdp_adapter::{ElementRef, Page};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Executes typed actions.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run `action` on `page`. The whole action, element resolution included,
    /// is bounded by the action's timeout or `default_timeout`.
    async fn execute(
        &self,
        page: &dyn Page,
        action: &ParsedAction,
        default_timeout: Duration,
    ) -> Result<ActionOutput, ActionError>;
}

/// Default executor backed by an element resolver.
#[derive(Clone)]
pub struct DefaultActionExecutor {
    resolver: Arc<dyn ElementResolver>,
}

impl Default for DefaultActionExecutor {
    fn default() -> Self {
        Self::new(Arc::new(DefaultElementResolver::default()))
    }
}

impl DefaultActionExecutor {
    pub fn new(resolver: Arc<dyn ElementResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve a selector within what is left of the action budget.
    pub(crate) async fn resolve(
        &self,
        page: &dyn Page,
        ctx: &ExecCtx,
        selector: &Selector,
    ) -> Result<(ElementRef, ResolutionInfo), ActionError> {
        let result = self
            .resolver
            .resolve(page, selector, ctx.remaining_time())
            .await?;
        let info = ResolutionInfo {
            strategy: result.strategy.clone(),
            confidence: result.confidence,
            expression: result.compiled_selector.clone(),
            arbitrated: result.arbitrated,
        };
        match result.element {
            Some(element) if result.found => {
                debug!(
                    action_id = %ctx.action_id,
                    element = %element,
                    strategy = %info.strategy,
                    confidence = info.confidence,
                    "Element resolved"
                );
                Ok((element, info))
            }
            _ => Err(ActionError::ElementNotFound(format!(
                "no element matched {}",
                info.expression
            ))),
        }
    }

    async fn dispatch(
        &self,
        page: &dyn Page,
        ctx: &ExecCtx,
        action: &Action,
    ) -> Result<ActionOutput, ActionError> {
        match action {
            Action::Navigate { url } => primitives::execute_navigate(page, ctx, action, url).await,
            Action::Click { selector } => {
                primitives::execute_click(self, page, ctx, action, selector).await
            }
            Action::Hover { selector } => {
                primitives::execute_hover(self, page, ctx, action, selector).await
            }
            Action::ScrollToElement { selector } => {
                primitives::execute_scroll(self, page, ctx, action, selector).await
            }
            Action::Type {
                selector,
                text,
                clear,
                validate,
            } => {
                primitives::execute_type(self, page, ctx, action, selector, text, *clear, *validate)
                    .await
            }
            Action::Wait { duration } => primitives::execute_wait(ctx, action, *duration).await,
            Action::WaitForElement { selector, state } => {
                primitives::execute_wait_for_element(page, ctx, action, selector, *state).await
            }
            Action::FillForm {
                fields,
                stop_on_error,
            } => primitives::execute_fill_form(self, page, ctx, action, fields, *stop_on_error).await,
            Action::GetText { selector } => {
                primitives::execute_get_text(self, page, ctx, action, selector).await
            }
            Action::GetAttribute {
                selector,
                attribute,
            } => primitives::execute_get_attribute(self, page, ctx, action, selector, attribute).await,
            Action::SelectOption { selector, value } => {
                primitives::execute_select_option(self, page, ctx, action, selector, value).await
            }
            Action::SetCheckbox { selector, checked } => {
                primitives::execute_set_checkbox(self, page, ctx, action, selector, *checked).await
            }
        }
    }
}

#[async_trait]
impl ActionExecutor for DefaultActionExecutor {
    async fn execute(
        &self,
        page: &dyn Page,
        action: &ParsedAction,
        default_timeout: Duration,
    ) -> Result<ActionOutput, ActionError> {
        let timeout = action.timeout_or(default_timeout);
        let ctx = ExecCtx::new(timeout);
        let name = action.action.name();
        info!(action_id = %ctx.action_id, action = name, timeout_ms = timeout.as_millis() as u64, "Executing action");

        let started = tokio::time::Instant::now();
        let outcome = match tokio::time::timeout(timeout, self.dispatch(page, &ctx, &action.action)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActionError::ActionTimeout(format!(
                "{name} exceeded {}ms",
                timeout.as_millis()
            ))),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(mut output) => {
                output.latency_ms = latency_ms;
                info!(
                    action_id = %ctx.action_id,
                    action = name,
                    latency_ms,
                    changed = output.changed,
                    "Action completed"
                );
                Ok(output)
            }
            Err(err) => {
                warn!(
                    action_id = %ctx.action_id,
                    action = name,
                    latency_ms,
                    error = %err,
                    "Action failed"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::MockPage;

    #[test]
    fn per_action_timeout_overrides_default() {
        let page = MockPage::new();
        let action = ParsedAction {
            action: Action::Navigate {
                url: "https://example.com/".into(),
            },
            timeout: Some(Duration::from_millis(250)),
        };
        let output = tokio_test::block_on(DefaultActionExecutor::default().execute(
            &page,
            &action,
            Duration::from_secs(30),
        ))
        .unwrap();
        assert_eq!(output.action, "navigate");
        assert_eq!(output.value, Some(serde_json::json!("https://example.com/")));
    }
}
