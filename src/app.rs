//! Command implementations shared by the binary and its tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use action_flow::{AutomationRunner, WebAutomationRequest, WebAutomationResult};
use action_locator::{
    planned_attempts, DefaultElementResolver, ElementResolver, ResolutionResult, Selector,
    SelectorInput,
};
use action_primitives::DefaultActionExecutor;
use anyhow::{bail, Context, Result};
use cdp_adapter::{Page, PageFactory, QueryExpression};
use serde::Serialize;
use serde_json::{Map, Value};
use soulpilot_core_types::SessionId;
use soulpilot_registry::{RegistryError, SessionManager};
use tokio::fs;
use tracing::{info, warn};

use crate::config::{ActionsConfig, Config};

/// Session manager plus runner wired from configuration.
pub struct Engine {
    sessions: Arc<SessionManager>,
    runner: AutomationRunner,
    resolver: Arc<DefaultElementResolver>,
}

impl Engine {
    pub fn new(factory: Arc<dyn PageFactory>, config: &Config) -> Self {
        let sessions = Arc::new(SessionManager::new(
            factory,
            config.sessions.manager_config(),
        ));
        let resolver = Arc::new(DefaultElementResolver::new(config.resolver.clone()));
        let executor = Arc::new(DefaultActionExecutor::new(resolver.clone()));
        let runner = AutomationRunner::new(Arc::clone(&sessions), executor);
        Self {
            sessions,
            runner,
            resolver,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub async fn run(
        &self,
        request: &WebAutomationRequest,
        session: Option<SessionId>,
    ) -> WebAutomationResult {
        self.runner.run(request, session).await
    }

    /// Open `url` in a throwaway session and resolve `selector` there.
    pub async fn resolve(
        &self,
        url: &str,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<ResolutionResult> {
        let id = SessionId::new();
        let outcome = self.resolve_in(&id, url, selector, timeout).await;
        match self.sessions.dispose(&id).await {
            Ok(()) | Err(RegistryError::NotFound(_)) => {}
            Err(err) => warn!(session = %id, %err, "Failed to dispose resolution session"),
        }
        outcome
    }

    async fn resolve_in(
        &self,
        id: &SessionId,
        url: &str,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<ResolutionResult> {
        let lease = self.sessions.acquire(id).await?;
        let page = lease.page();
        let landed = page
            .navigate(url, timeout)
            .await
            .with_context(|| format!("Failed to open {url}"))?;
        info!(url = %landed, "Page loaded for resolution");
        let result = self.resolver.resolve(page, selector, timeout).await?;
        Ok(result)
    }

    pub async fn shutdown(&self) {
        self.sessions.dispose_all().await;
    }
}

/// Parse a request document, filling options it leaves out from `defaults`.
pub fn parse_request(contents: &str, defaults: &ActionsConfig) -> Result<WebAutomationRequest> {
    let mut document: Value = serde_json::from_str(contents).context("Request is not valid JSON")?;
    let Some(root) = document.as_object_mut() else {
        bail!("Request must be a JSON object");
    };
    let options = root
        .entry("options")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(options) = options.as_object_mut() else {
        bail!("Request options must be a JSON object");
    };
    options
        .entry("timeoutMs")
        .or_insert_with(|| defaults.default_timeout_ms.into());
    options
        .entry("retryCount")
        .or_insert_with(|| defaults.retry_count.into());
    options
        .entry("retryBackoffMs")
        .or_insert_with(|| defaults.retry_backoff_ms.into());

    serde_json::from_value(document).context("Request does not match the expected shape")
}

pub async fn read_request(path: &Path, defaults: &ActionsConfig) -> Result<WebAutomationRequest> {
    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    parse_request(&contents, defaults)
}

/// `@path` reads the selector from a file; anything else is the selector itself.
pub async fn read_selector(arg: &str) -> Result<Selector> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read selector file {path}"))?,
        None => arg.to_string(),
    };
    parse_selector(&raw)
}

pub fn parse_selector(raw: &str) -> Result<Selector> {
    let input: SelectorInput = raw.parse()?;
    Ok(input.into_selector()?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAttempt {
    pub strategy: String,
    pub engine: &'static str,
    pub expression: String,
}

/// Every query the resolver would try for `selector`, in order.
pub fn compile_plan(selector: &Selector) -> Vec<PlannedAttempt> {
    planned_attempts(selector)
        .into_iter()
        .map(|(strategy, expr)| {
            let engine = match &expr {
                QueryExpression::XPath(_) => "xpath",
                QueryExpression::Css(_) => "css",
            };
            PlannedAttempt {
                strategy,
                engine,
                expression: expr.as_str().to_string(),
            }
        })
        .collect()
}

pub fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.context("Failed to serialize output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_come_from_config() {
        let defaults = ActionsConfig {
            default_timeout_ms: 5_000,
            retry_count: 1,
            retry_backoff_ms: 10,
        };
        let request = parse_request(
            r##"{"url": "https://example.com", "actions": [{"type": "click", "selector": "#go"}], "options": {"retryCount": 4}}"##,
            &defaults,
        )
        .unwrap();
        assert_eq!(request.options.timeout_ms, 5_000);
        assert_eq!(request.options.retry_count, 4);
        assert_eq!(request.options.retry_backoff_ms, 10);
        assert_eq!(request.actions.len(), 1);
    }

    #[test]
    fn non_object_request_is_rejected() {
        assert!(parse_request("[1, 2]", &ActionsConfig::default()).is_err());
        assert!(parse_request(r#"{"options": 3}"#, &ActionsConfig::default()).is_err());
    }

    #[test]
    fn raw_selector_plans_one_attempt() {
        let plan = compile_plan(&parse_selector("#login").unwrap());
        assert_eq!(
            plan,
            vec![PlannedAttempt {
                strategy: "primary".into(),
                engine: "css",
                expression: "#login".into(),
            }]
        );
    }

    #[test]
    fn model_plan_starts_with_primary_and_ends_relaxed() {
        let plan = compile_plan(
            &parse_selector(r#"{"type": "button", "identifier": {"text": "Submit"}}"#).unwrap(),
        );
        assert_eq!(plan[0].strategy, "primary");
        assert_eq!(plan[0].expression, "//button[normalize-space(.)='Submit']");
        assert_eq!(plan.last().unwrap().strategy, "relaxed:type");
        assert_eq!(plan.last().unwrap().expression, "//button");
    }

    #[test]
    fn empty_selector_is_invalid() {
        assert!(parse_selector("   ").is_err());
    }
}
