//! Command parameter types exposed by the page interface.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Expression handed to the page's DOM query engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "engine", content = "expression", rename_all = "lowercase")]
pub enum QueryExpression {
    /// XPath 1.0 evaluated with `document.evaluate`.
    XPath(String),
    /// CSS selector evaluated with `querySelectorAll`.
    Css(String),
}

impl QueryExpression {
    pub const WILDCARD: &'static str = "//*";

    pub fn wildcard() -> Self {
        QueryExpression::XPath(Self::WILDCARD.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, QueryExpression::XPath(expr) if expr == Self::WILDCARD)
    }

    pub fn as_str(&self) -> &str {
        match self {
            QueryExpression::XPath(expr) | QueryExpression::Css(expr) => expr,
        }
    }
}

impl fmt::Display for QueryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExpression::XPath(expr) => write!(f, "xpath:{}", expr),
            QueryExpression::Css(expr) => write!(f, "css:{}", expr),
        }
    }
}

/// Stateless reference to the `index`-th node (document order) matched by `query`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    pub query: QueryExpression,
    pub index: usize,
}

impl ElementRef {
    pub fn new(query: QueryExpression, index: usize) -> Self {
        Self { query, index }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.query, self.index)
    }
}

/// How a click is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickMode {
    /// Trusted mouse events at the element's center after a hit-test.
    Normal,
    /// DOM `click()` dispatched directly, bypassing visibility and overlays.
    Forced,
}

/// Element states a caller can wait for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    Attached,
    #[default]
    Visible,
    Hidden,
    Detached,
}

impl WaitState {
    pub fn name(&self) -> &'static str {
        match self {
            WaitState::Attached => "attached",
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Detached => "detached",
        }
    }

    /// Evaluate the state against an observation of the first matching node.
    /// `observed` is `None` when nothing matches, otherwise the node's visibility.
    pub fn is_satisfied(&self, observed: Option<bool>) -> bool {
        match (self, observed) {
            (WaitState::Attached, Some(_)) => true,
            (WaitState::Visible, Some(visible)) => visible,
            (WaitState::Hidden, None) => true,
            (WaitState::Hidden, Some(visible)) => !visible,
            (WaitState::Detached, None) => true,
            _ => false,
        }
    }
}

/// Current selection of a `<select>` element.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectState {
    pub value: Option<String>,
    pub label: Option<String>,
}

impl SelectState {
    pub fn matches(&self, wanted: &str) -> bool {
        self.value.as_deref() == Some(wanted) || self.label.as_deref() == Some(wanted)
    }
}

/// Layout box in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxModel {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoxModel {
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Structural facts about a node's parent and enclosing landmarks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentSnapshot {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub class_name: Option<String>,
    /// Nearest enclosing landmark (`form`, `nav`, `header`, `footer`, `aside`, `main`, `dialog`).
    pub region: Option<String>,
    pub in_form: bool,
}

/// Neighbouring text used for disambiguation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiblingSnapshot {
    pub previous_text: Option<String>,
    pub next_text: Option<String>,
    pub count: usize,
}

/// Raw per-field extraction of one element. Each field carries its own
/// outcome so one failing getter does not poison the rest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub text: Result<String, String>,
    pub tag: Result<String, String>,
    pub attributes: Result<BTreeMap<String, String>, String>,
    pub parent: Result<ParentSnapshot, String>,
    pub siblings: Result<SiblingSnapshot, String>,
    pub position: Result<BoxModel, String>,
}

impl ElementSnapshot {
    /// Snapshot where every field failed for the same reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            text: Err(reason.clone()),
            tag: Err(reason.clone()),
            attributes: Err(reason.clone()),
            parent: Err(reason.clone()),
            siblings: Err(reason.clone()),
            position: Err(reason),
        }
    }
}
