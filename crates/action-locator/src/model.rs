//! Selector payloads accepted from upstream callers.

use crate::errors::LocatorError;
use cdp_adapter::QueryExpression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Value of an arbitrary attribute predicate. `true` means presence only,
/// `false` means the attribute must be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Text(String),
}

/// Element identity hints. Fields are optional; empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeValue>,
}

pub(crate) fn populated(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl AttributeSet {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn text_contains(text: impl Into<String>) -> Self {
        Self {
            text_contains: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn class_contains(class: impl Into<String>) -> Self {
        Self {
            class_contains: Some(class.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.text,
            &self.text_contains,
            &self.id,
            &self.name,
            &self.placeholder,
            &self.aria_label,
            &self.test_id,
            &self.class_name,
            &self.class_contains,
            &self.role,
            &self.href,
            &self.alt,
        ]
        .into_iter()
        .all(|field| populated(field).is_none())
            && self.attributes.is_empty()
    }

    /// Text the caller expects to see, exact before substring.
    pub fn intent_text(&self) -> Option<&str> {
        populated(&self.text).or_else(|| populated(&self.text_contains))
    }

    /// Number of populated fields.
    pub fn specificity(&self) -> usize {
        [
            &self.text,
            &self.text_contains,
            &self.id,
            &self.name,
            &self.placeholder,
            &self.aria_label,
            &self.test_id,
            &self.class_name,
            &self.class_contains,
            &self.role,
            &self.href,
            &self.alt,
        ]
        .into_iter()
        .filter(|field| populated(field).is_some())
        .count()
            + self.attributes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    First,
    Last,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorContext {
    /// Parent tag or named page region (`header`, `footer`, `sidebar`, `main`, `nav`, `form`, `dialog`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// 0-based index among all matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorOptions {
    /// Per-selector budget in milliseconds; overrides the action timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    pub visible: bool,
    pub exact: bool,
    pub case_sensitive: bool,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            visible: false,
            exact: true,
            case_sensitive: false,
        }
    }
}

/// Structured description of a desired element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorModel {
    #[serde(rename = "type", default)]
    pub element_type: String,
    pub identifier: AttributeSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<AttributeSet>,
    #[serde(default)]
    pub context: SelectorContext,
    #[serde(default)]
    pub options: SelectorOptions,
}

impl SelectorModel {
    pub fn new(element_type: impl Into<String>, identifier: AttributeSet) -> Self {
        Self {
            element_type: element_type.into(),
            identifier,
            fallbacks: Vec::new(),
            context: SelectorContext::default(),
            options: SelectorOptions::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: AttributeSet) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.identifier.is_empty() {
            return Err(LocatorError::InvalidSelector(
                "identifier must carry at least one populated field".to_string(),
            ));
        }
        if self.options.timeout == Some(0) {
            return Err(LocatorError::InvalidSelector(
                "options.timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Selector as received on the wire: a structured model or a string shorthand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorInput {
    Raw(String),
    Model(SelectorModel),
}

/// Validated selector ready for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Structured(SelectorModel),
    /// Raw expression; only the primary tier runs.
    Raw(QueryExpression),
}

impl SelectorInput {
    pub fn into_selector(self) -> Result<Selector, LocatorError> {
        match self {
            SelectorInput::Model(model) => {
                model.validate()?;
                Ok(Selector::Structured(model))
            }
            SelectorInput::Raw(raw) => parse_shorthand(&raw),
        }
    }
}

fn parse_shorthand(raw: &str) -> Result<Selector, LocatorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LocatorError::InvalidSelector("empty selector string".to_string()));
    }
    if let Some(xpath) = trimmed.strip_prefix("xpath=") {
        let xpath = xpath.trim();
        if xpath.is_empty() {
            return Err(LocatorError::InvalidSelector("empty xpath= selector".to_string()));
        }
        return Ok(Selector::Raw(QueryExpression::XPath(xpath.to_string())));
    }
    if trimmed.starts_with('/') || trimmed.starts_with('(') {
        return Ok(Selector::Raw(QueryExpression::XPath(trimmed.to_string())));
    }
    if let Some(text) = trimmed.strip_prefix("text=") {
        let text = text.trim().trim_matches('"');
        if text.is_empty() {
            return Err(LocatorError::InvalidSelector("empty text= selector".to_string()));
        }
        return Ok(Selector::Structured(SelectorModel::new(
            "*",
            AttributeSet::text(text),
        )));
    }
    Ok(Selector::Raw(QueryExpression::Css(trimmed.to_string())))
}

impl FromStr for SelectorInput {
    type Err = LocatorError;

    /// JSON objects parse as a model, anything else as a string shorthand.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('"') {
            serde_json::from_str(trimmed)
                .map_err(|err| LocatorError::InvalidSelector(format!("malformed selector json: {err}")))
        } else {
            Ok(SelectorInput::Raw(trimmed.to_string()))
        }
    }
}
