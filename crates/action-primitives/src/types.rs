use crate::errors::ActionError;
use action_locator::{LocatorError, Selector, SelectorInput};
use cdp_adapter::WaitState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use soulpilot_core_types::ActionId;
use std::time::Duration;
use tokio::time::Instant;

/// Execution context handed to every primitive.
#[derive(Debug, Clone)]
pub struct ExecCtx {
    pub action_id: ActionId,
    pub deadline: Instant,
    pub started_at: DateTime<Utc>,
}

impl ExecCtx {
    pub fn new(timeout: Duration) -> Self {
        Self {
            action_id: ActionId::new(),
            deadline: Instant::now() + timeout,
            started_at: Utc::now(),
        }
    }

    /// Time left before the action deadline, zero once it has passed.
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_time().is_zero()
    }
}

/// Action request as it arrives on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<FormData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<WaitState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_on_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Form payload: either an ordered selector → value map, or an explicit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormData {
    List(Vec<FormField>),
    Map(serde_json::Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub selector: SelectorInput,
    pub value: Value,
}

/// What to put into one form field once it is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Checked(bool),
}

impl FieldValue {
    fn from_json(value: &Value) -> Result<Self, ActionError> {
        match value {
            Value::Bool(checked) => Ok(FieldValue::Checked(*checked)),
            Value::String(text) => Ok(FieldValue::Text(text.clone())),
            Value::Number(number) => Ok(FieldValue::Text(number.to_string())),
            other => Err(ActionError::InvalidRequest(format!(
                "unsupported form value {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormEntry {
    /// Label used in reports: the selector as the caller wrote it.
    pub label: String,
    pub selector: Selector,
    pub value: FieldValue,
}

/// Typed action, validated once before execution.
#[derive(Debug, Clone)]
pub enum Action {
    Navigate { url: String },
    Click { selector: Selector },
    Hover { selector: Selector },
    ScrollToElement { selector: Selector },
    Type {
        selector: Selector,
        text: String,
        clear: bool,
        validate: bool,
    },
    Wait { duration: Duration },
    WaitForElement { selector: Selector, state: WaitState },
    FillForm {
        fields: Vec<FormEntry>,
        stop_on_error: bool,
    },
    GetText { selector: Selector },
    GetAttribute { selector: Selector, attribute: String },
    SelectOption { selector: Selector, value: String },
    SetCheckbox { selector: Selector, checked: bool },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Click { .. } => "click",
            Action::Hover { .. } => "hover",
            Action::ScrollToElement { .. } => "scroll_to_element",
            Action::Type { .. } => "type",
            Action::Wait { .. } => "wait",
            Action::WaitForElement { .. } => "wait_for_element",
            Action::FillForm { .. } => "fill_form",
            Action::GetText { .. } => "get_text",
            Action::GetAttribute { .. } => "get_attribute",
            Action::SelectOption { .. } => "select_option",
            Action::SetCheckbox { .. } => "set_checkbox",
        }
    }
}

/// A typed action plus its own timeout override.
#[derive(Debug, Clone)]
pub struct ParsedAction {
    pub action: Action,
    pub timeout: Option<Duration>,
}

impl ParsedAction {
    /// Effective timeout: request override, then the selector's own option, then the default.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        if let Some(timeout) = self.timeout {
            return timeout;
        }
        let selector_timeout = match &self.action {
            Action::Click { selector }
            | Action::Hover { selector }
            | Action::ScrollToElement { selector }
            | Action::Type { selector, .. }
            | Action::WaitForElement { selector, .. }
            | Action::GetText { selector }
            | Action::GetAttribute { selector, .. }
            | Action::SelectOption { selector, .. }
            | Action::SetCheckbox { selector, .. } => match selector {
                Selector::Structured(model) => model.options.timeout,
                Selector::Raw(_) => None,
            },
            _ => None,
        };
        selector_timeout
            .map(Duration::from_millis)
            .unwrap_or(default)
    }
}

impl ActionRequest {
    /// Validate the wire request into a typed action.
    pub fn parse(&self) -> Result<ParsedAction, ActionError> {
        let kind = self.action_type.trim().to_ascii_lowercase();
        let action = match kind.as_str() {
            "navigate" => Action::Navigate {
                url: self.required_text(&self.url, "url")?,
            },
            "click" => Action::Click {
                selector: self.selector()?,
            },
            "hover" => Action::Hover {
                selector: self.selector()?,
            },
            "scroll_to_element" | "scroll" => Action::ScrollToElement {
                selector: self.selector()?,
            },
            "type" => Action::Type {
                selector: self.selector()?,
                text: self
                    .text
                    .clone()
                    .ok_or_else(|| missing("type", "text"))?,
                clear: self.clear.unwrap_or(true),
                validate: self.validate.unwrap_or(false),
            },
            "wait" => Action::Wait {
                duration: Duration::from_millis(
                    self.duration_ms.ok_or_else(|| missing("wait", "durationMs"))?,
                ),
            },
            "wait_for_element" => Action::WaitForElement {
                selector: self.selector()?,
                state: self.state.unwrap_or_default(),
            },
            "fill_form" => Action::FillForm {
                fields: self.form_entries()?,
                stop_on_error: self.stop_on_error.unwrap_or(false),
            },
            "get_text" => Action::GetText {
                selector: self.selector()?,
            },
            "get_attribute" => Action::GetAttribute {
                selector: self.selector()?,
                attribute: self.required_text(&self.attribute, "attribute")?,
            },
            "select_option" => Action::SelectOption {
                selector: self.selector()?,
                value: self.required_text(&self.value, "value")?,
            },
            "set_checkbox" => Action::SetCheckbox {
                selector: self.selector()?,
                checked: self.checked.unwrap_or(true),
            },
            _ => return Err(ActionError::UnsupportedAction(self.action_type.clone())),
        };
        Ok(ParsedAction {
            action,
            timeout: self.timeout_ms.map(Duration::from_millis),
        })
    }

    fn selector(&self) -> Result<Selector, ActionError> {
        let input = self
            .selector
            .clone()
            .ok_or_else(|| missing(&self.action_type, "selector"))?;
        into_selector(input)
    }

    fn required_text(&self, value: &Option<String>, field: &str) -> Result<String, ActionError> {
        match value.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(missing(&self.action_type, field)),
        }
    }

    fn form_entries(&self) -> Result<Vec<FormEntry>, ActionError> {
        let data = self
            .form_data
            .as_ref()
            .ok_or_else(|| missing("fill_form", "formData"))?;
        let entries = match data {
            FormData::List(fields) => fields
                .iter()
                .map(|field| {
                    Ok(FormEntry {
                        label: selector_label(&field.selector),
                        selector: into_selector(field.selector.clone())?,
                        value: FieldValue::from_json(&field.value)?,
                    })
                })
                .collect::<Result<Vec<_>, ActionError>>()?,
            FormData::Map(map) => map
                .iter()
                .map(|(selector, value)| {
                    let input: SelectorInput = selector
                        .parse()
                        .map_err(|err: LocatorError| ActionError::InvalidRequest(err.to_string()))?;
                    Ok(FormEntry {
                        label: selector.clone(),
                        selector: into_selector(input)?,
                        value: FieldValue::from_json(value)?,
                    })
                })
                .collect::<Result<Vec<_>, ActionError>>()?,
        };
        if entries.is_empty() {
            return Err(ActionError::InvalidRequest("fill_form needs at least one field".into()));
        }
        Ok(entries)
    }
}

fn into_selector(input: SelectorInput) -> Result<Selector, ActionError> {
    Ok(input.into_selector()?)
}

fn selector_label(input: &SelectorInput) -> String {
    match input {
        SelectorInput::Raw(raw) => raw.clone(),
        SelectorInput::Model(model) => serde_json::to_string(model).unwrap_or_default(),
    }
}

fn missing(action: &str, field: &str) -> ActionError {
    ActionError::InvalidRequest(format!("{action} requires {field}"))
}

/// Which resolution produced the element an action touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionInfo {
    pub strategy: String,
    pub confidence: u8,
    pub expression: String,
    pub arbitrated: bool,
}

/// Outcome of one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReport {
    pub selector: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionInfo>,
}

/// Result of one executed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutput {
    pub action_id: ActionId,
    pub action: String,
    pub started_at: DateTime<Utc>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// False when the page was already in the requested state.
    pub changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldReport>,
}

impl ActionOutput {
    pub(crate) fn new(ctx: &ExecCtx, action: &Action) -> Self {
        Self {
            action_id: ctx.action_id.clone(),
            action: action.name().to_string(),
            started_at: ctx.started_at,
            latency_ms: 0,
            value: None,
            changed: true,
            resolution: None,
            fields: Vec::new(),
        }
    }

    pub(crate) fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub(crate) fn with_resolution(mut self, resolution: ResolutionInfo) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub(crate) fn unchanged(mut self) -> Self {
        self.changed = false;
        self
    }
}
