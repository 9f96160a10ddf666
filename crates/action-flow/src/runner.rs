//! Automation pipeline: session, navigation, ordered actions, extraction.

use crate::errors::FlowError;
use crate::extractor::{ContentExtractor, HtmlSnapshotExtractor};
use crate::retry::{Attempted, RetryPolicy, RetryRunner};
use crate::types::{AutomationMetadata, StepReport, WebAutomationRequest, WebAutomationResult};
use action_primitives::{Action, ActionExecutor, ActionOutput, ParsedAction};
use chrono::Utc;
use serde_json::Value;
use soulpilot_core_types::SessionId;
use soulpilot_registry::{RegistryError, SessionManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

pub struct AutomationRunner {
    sessions: Arc<SessionManager>,
    executor: Arc<dyn ActionExecutor>,
    extractor: Arc<dyn ContentExtractor>,
}

/// Mutable state gathered while a request runs.
#[derive(Default)]
struct RunState {
    steps: Vec<StepReport>,
    url: Option<String>,
    failed_step: Option<usize>,
}

impl AutomationRunner {
    pub fn new(sessions: Arc<SessionManager>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            sessions,
            executor,
            extractor: Arc::new(HtmlSnapshotExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Run a request. Without `session_id` an ephemeral session is used and
    /// disposed afterwards unless `keepSession` is set.
    pub async fn run(
        &self,
        request: &WebAutomationRequest,
        session_id: Option<SessionId>,
    ) -> WebAutomationResult {
        let started = Instant::now();
        let started_at = Utc::now();
        let ephemeral = session_id.is_none();
        let session_id = session_id.unwrap_or_default();
        info!(
            session = %session_id,
            url = %request.url,
            actions = request.actions.len(),
            ephemeral,
            "Automation run started"
        );

        let mut state = RunState::default();
        let outcome = match parse_actions(request, &mut state) {
            Ok(actions) => self.drive(&session_id, request, &actions, &mut state).await,
            Err(err) => Err(err),
        };

        let fatal = outcome.as_ref().err().map(FlowError::is_session_fatal).unwrap_or(false);
        if fatal || (ephemeral && !request.options.keep_session) {
            if fatal {
                warn!(session = %session_id, "Disposing session after fatal error");
            }
            match self.sessions.dispose(&session_id).await {
                Ok(()) | Err(RegistryError::NotFound(_)) => {}
                Err(err) => warn!(session = %session_id, %err, "Failed to dispose session"),
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let (success, page_content, error) = match outcome {
            Ok(content) => (true, content, None),
            Err(err) => (false, None, Some(describe_failure(&state, &err))),
        };
        info!(session = %session_id, success, duration_ms, "Automation run finished");

        WebAutomationResult {
            success,
            url: state.url,
            page_content,
            error,
            metadata: AutomationMetadata {
                session_id,
                steps: state.steps,
                started_at,
                duration_ms,
                failed_step: state.failed_step,
            },
        }
    }

    async fn drive(
        &self,
        session_id: &SessionId,
        request: &WebAutomationRequest,
        actions: &[ParsedAction],
        state: &mut RunState,
    ) -> Result<Option<Value>, FlowError> {
        let lease = self.sessions.acquire(session_id).await?;
        let page = lease.page();
        let options = &request.options;
        let retry = RetryRunner::new(RetryPolicy::new(
            options.retry_count,
            Duration::from_millis(options.retry_backoff_ms),
        ));
        let timeout = Duration::from_millis(options.timeout_ms);

        let navigation = (!request.url.trim().is_empty()).then(|| ParsedAction {
            action: Action::Navigate {
                url: request.url.trim().to_string(),
            },
            timeout: None,
        });

        for action in navigation.iter().chain(actions) {
            let index = state.steps.len();
            let step_started = Instant::now();
            let attempted = retry
                .run(action.action.name(), |_| {
                    self.executor.execute(page, action, timeout)
                })
                .await;
            let duration_ms = step_started.elapsed().as_millis() as u64;

            if let Ok(url) = page.url().await {
                state.url = Some(url);
            }
            let failed = attempted.result.is_err();
            let (report, result) = step_report(index, action, attempted, duration_ms);
            state.steps.push(report);
            if failed {
                state.failed_step = Some(index);
            }
            result?;
        }

        if !options.extract_content {
            return Ok(None);
        }
        match self.extractor.extract(page).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.is_session_fatal() => Err(err.into()),
            Err(err) => {
                warn!(session = %session_id, error = %err, "Content extraction failed");
                Ok(None)
            }
        }
    }
}

fn parse_actions(
    request: &WebAutomationRequest,
    state: &mut RunState,
) -> Result<Vec<ParsedAction>, FlowError> {
    let offset = usize::from(!request.url.trim().is_empty());
    request
        .actions
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            raw.parse().map_err(|err| {
                state.failed_step = Some(state.steps.len());
                state.steps.push(StepReport {
                    index: index + offset,
                    action_type: raw.action_type.clone(),
                    success: false,
                    attempts: 0,
                    duration_ms: 0,
                    output: None,
                    strategy: None,
                    confidence: None,
                    error: Some(err.to_string()),
                });
                FlowError::Action(err)
            })
        })
        .collect()
}

fn step_report(
    index: usize,
    action: &ParsedAction,
    attempted: Attempted<ActionOutput>,
    duration_ms: u64,
) -> (StepReport, Result<(), FlowError>) {
    let mut report = StepReport {
        index,
        action_type: action.action.name().to_string(),
        success: false,
        attempts: attempted.attempts,
        duration_ms,
        output: None,
        strategy: None,
        confidence: None,
        error: None,
    };
    match attempted.result {
        Ok(output) => {
            report.success = true;
            if let Some(resolution) = &output.resolution {
                report.strategy = Some(resolution.strategy.clone());
                report.confidence = Some(resolution.confidence);
            }
            report.output = Some(output);
            (report, Ok(()))
        }
        Err(err) => {
            report.error = Some(err.to_string());
            (report, Err(err))
        }
    }
}

fn describe_failure(state: &RunState, err: &FlowError) -> String {
    let step = state
        .failed_step
        .and_then(|index| state.steps.get(index));
    match step {
        Some(step) => format!("step {} ({}) failed: {err}", step.index, step.action_type),
        None => err.to_string(),
    }
}
