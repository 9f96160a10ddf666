//! Request and result types of the automation pipeline

use action_primitives::{ActionOutput, ActionRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use soulpilot_core_types::SessionId;

/// One automation job: open `url`, then run `actions` in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAutomationRequest {
    /// Skipped when blank; the actions then run on whatever the session shows.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub actions: Vec<ActionRequest>,
    #[serde(default)]
    pub options: AutomationOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomationOptions {
    /// Default per-action timeout.
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub retry_backoff_ms: u64,
    pub extract_content: bool,
    /// Keep an ephemeral session alive after the request.
    pub keep_session: bool,
}

impl Default for AutomationOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retry_count: 3,
            retry_backoff_ms: 1_000,
            extract_content: false,
            keep_session: false,
        }
    }
}

/// Report for one step: the initial navigation or one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    #[serde(rename = "type")]
    pub action_type: String,
    pub success: bool,
    pub attempts: u32,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ActionOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationMetadata {
    pub session_id: SessionId,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Index into `steps` of the step that stopped the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
}

/// Always returned, also on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAutomationResult {
    pub success: bool,
    /// Last URL the page was known to show.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: AutomationMetadata,
}
