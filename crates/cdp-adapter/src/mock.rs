//! Scripted in-memory page for tests.
//!
//! A [`MockPage`] holds an arena of [`MockElement`]s and a routing table from
//! query expressions to element ids. Expressions without a route match nothing.

use crate::commands::{
    BoxModel, ClickMode, ElementRef, ElementSnapshot, ParentSnapshot, QueryExpression,
    SelectState, SiblingSnapshot, WaitState,
};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::page::{Page, PageFactory, PageHandle};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use soulpilot_core_types::PageId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Snapshot fields that can be made to fail individually.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotField {
    Text,
    Tag,
    Attributes,
    Parent,
    Siblings,
    Position,
}

#[derive(Clone, Debug, Default)]
pub struct MockElement {
    pub tag: String,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    pub visible: bool,
    pub value: String,
    pub checked: bool,
    pub options: Vec<(String, String)>,
    pub selected: Option<usize>,
    pub parent_tag: Option<String>,
    pub region: Option<String>,
    pub in_form: bool,
    pub ignores_input: bool,
    pub fail_normal_click: bool,
    pub fail_forced_click: bool,
    pub detached: bool,
    pub failing_fields: HashSet<SnapshotField>,
}

impl MockElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn option(mut self, value: &str, label: &str) -> Self {
        self.options.push((value.to_string(), label.to_string()));
        self
    }

    pub fn selected(mut self, index: usize) -> Self {
        self.selected = Some(index);
        self
    }

    /// Place the element inside a `<form>`.
    pub fn in_form(mut self) -> Self {
        self.in_form = true;
        self.region = Some("form".to_string());
        self.parent_tag.get_or_insert_with(|| "form".to_string());
        self
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn parent(mut self, tag: &str) -> Self {
        self.parent_tag = Some(tag.to_string());
        self
    }

    /// Accepts `fill` calls without changing its value.
    pub fn ignoring_input(mut self) -> Self {
        self.ignores_input = true;
        self
    }

    pub fn failing_normal_click(mut self) -> Self {
        self.fail_normal_click = true;
        self
    }

    pub fn failing_forced_click(mut self) -> Self {
        self.fail_forced_click = true;
        self
    }

    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn failing_field(mut self, field: SnapshotField) -> Self {
        self.failing_fields.insert(field);
        self
    }
}

#[derive(Default)]
struct MockState {
    url: String,
    html: String,
    elements: Vec<MockElement>,
    routes: HashMap<QueryExpression, Vec<usize>>,
    failing_queries: HashSet<QueryExpression>,
    query_delay: Option<Duration>,
    nav_failures: usize,
    eval_result: Value,
    calls: Vec<String>,
    closed: bool,
}

pub struct MockPage {
    id: PageId,
    state: Mutex<MockState>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    pub fn new() -> Self {
        Self {
            id: PageId::new(),
            state: Mutex::new(MockState {
                url: "about:blank".to_string(),
                ..Default::default()
            }),
        }
    }

    /// Add an element to the arena and return its id.
    pub fn add(&self, element: MockElement) -> usize {
        let mut state = self.state.lock();
        state.elements.push(element);
        state.elements.len() - 1
    }

    /// Make `expr` match `ids` in the given (document) order.
    pub fn route(&self, expr: QueryExpression, ids: &[usize]) {
        self.state.lock().routes.insert(expr, ids.to_vec());
    }

    pub fn route_xpath(&self, xpath: &str, ids: &[usize]) {
        self.route(QueryExpression::XPath(xpath.to_string()), ids);
    }

    pub fn route_css(&self, css: &str, ids: &[usize]) {
        self.route(QueryExpression::Css(css.to_string()), ids);
    }

    /// Queries for `expr` fail with a CDP error.
    pub fn fail_query(&self, expr: QueryExpression) {
        self.state.lock().failing_queries.insert(expr);
    }

    /// Every query sleeps for `delay` before answering.
    pub fn delay_queries(&self, delay: Duration) {
        self.state.lock().query_delay = Some(delay);
    }

    /// The next `count` navigations time out.
    pub fn fail_navigations(&self, count: usize) {
        self.state.lock().nav_failures = count;
    }

    pub fn set_html(&self, html: &str) {
        self.state.lock().html = html.to_string();
    }

    pub fn set_eval_result(&self, value: Value) {
        self.state.lock().eval_result = value;
    }

    pub fn update(&self, id: usize, edit: impl FnOnce(&mut MockElement)) {
        if let Some(element) = self.state.lock().elements.get_mut(id) {
            edit(element);
        }
    }

    pub fn element(&self, id: usize) -> Option<MockElement> {
        self.state.lock().elements.get(id).cloned()
    }

    pub fn mark_closed(&self) {
        self.state.lock().closed = true;
    }

    /// Interaction log: `navigate:<url>`, `click:<mode>:<id>`, `fill:<id>`, ...
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn query_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.starts_with("query:"))
            .count()
    }

    fn ensure_open(state: &MockState) -> Result<(), AdapterError> {
        if state.closed {
            Err(AdapterError::closed("mock page closed"))
        } else {
            Ok(())
        }
    }

    /// Resolve an element reference and apply `op` to it under the lock.
    fn with_element<T>(
        &self,
        element: &ElementRef,
        op: impl FnOnce(usize, &mut MockElement, &mut Vec<String>) -> Result<T, AdapterError>,
    ) -> Result<T, AdapterError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        let id = state
            .routes
            .get(&element.query)
            .and_then(|ids| ids.get(element.index))
            .copied()
            .ok_or_else(|| AdapterError::not_found(element.to_string()))?;
        let MockState {
            elements, calls, ..
        } = &mut *state;
        let target = elements
            .get_mut(id)
            .ok_or_else(|| AdapterError::not_found(element.to_string()))?;
        if target.detached {
            return Err(AdapterError::not_found(format!("{element} detached")));
        }
        op(id, target, calls)
    }

    fn observe(&self, expr: &QueryExpression) -> Result<Option<bool>, AdapterError> {
        let state = self.state.lock();
        Self::ensure_open(&state)?;
        Ok(state
            .routes
            .get(expr)
            .and_then(|ids| ids.first())
            .and_then(|id| state.elements.get(*id))
            .filter(|element| !element.detached)
            .map(|element| element.visible))
    }
}

fn not_interactable(what: &str) -> AdapterError {
    AdapterError::new(AdapterErrorKind::NotInteractable).with_hint(what.to_string())
}

fn field<T>(element: &MockElement, field: SnapshotField, value: T) -> Result<T, String> {
    if element.failing_fields.contains(&field) {
        Err(format!("{field:?} getter failed"))
    } else {
        Ok(value)
    }
}

#[async_trait]
impl Page for MockPage {
    fn id(&self) -> &PageId {
        &self.id
    }

    async fn url(&self) -> Result<String, AdapterError> {
        let state = self.state.lock();
        Self::ensure_open(&state)?;
        Ok(state.url.clone())
    }

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<String, AdapterError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.calls.push(format!("navigate:{url}"));
        if state.nav_failures > 0 {
            state.nav_failures -= 1;
            return Err(AdapterError::new(AdapterErrorKind::NavTimeout).with_hint(url.to_string()));
        }
        state.url = url.to_string();
        Ok(state.url.clone())
    }

    async fn query(&self, expr: &QueryExpression, _wait: Duration) -> Result<usize, AdapterError> {
        let delay = {
            let mut state = self.state.lock();
            Self::ensure_open(&state)?;
            state.calls.push(format!("query:{expr}"));
            if state.failing_queries.contains(expr) {
                return Err(AdapterError::cdp(format!("query {expr} failed")));
            }
            state.query_delay
        };
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let state = self.state.lock();
        Ok(state.routes.get(expr).map(Vec::len).unwrap_or(0))
    }

    async fn describe(&self, element: &ElementRef) -> Result<ElementSnapshot, AdapterError> {
        self.with_element(element, |id, el, _| {
            let mut attributes = el.attributes.clone();
            if !el.value.is_empty() {
                attributes
                    .entry("value".to_string())
                    .or_insert_with(|| el.value.clone());
            }
            let position = if el.visible {
                BoxModel {
                    x: 10.0,
                    y: 10.0 + 30.0 * id as f64,
                    width: 100.0,
                    height: 24.0,
                }
            } else {
                BoxModel::default()
            };
            Ok(ElementSnapshot {
                text: field(el, SnapshotField::Text, el.text.clone()),
                tag: field(el, SnapshotField::Tag, el.tag.clone()),
                attributes: field(el, SnapshotField::Attributes, attributes),
                parent: field(
                    el,
                    SnapshotField::Parent,
                    ParentSnapshot {
                        tag: el.parent_tag.clone(),
                        id: None,
                        class_name: None,
                        region: el.region.clone(),
                        in_form: el.in_form,
                    },
                ),
                siblings: field(el, SnapshotField::Siblings, SiblingSnapshot::default()),
                position: field(el, SnapshotField::Position, position),
            })
        })
    }

    async fn is_visible(&self, element: &ElementRef) -> Result<bool, AdapterError> {
        self.with_element(element, |id, el, calls| {
            calls.push(format!("visible:{id}"));
            Ok(el.visible)
        })
    }

    async fn click(
        &self,
        element: &ElementRef,
        mode: ClickMode,
        _timeout: Duration,
    ) -> Result<(), AdapterError> {
        self.with_element(element, |id, el, calls| match mode {
            ClickMode::Normal => {
                if !el.visible || el.fail_normal_click {
                    return Err(not_interactable("normal click rejected"));
                }
                calls.push(format!("click:normal:{id}"));
                Ok(())
            }
            ClickMode::Forced => {
                if el.fail_forced_click {
                    return Err(not_interactable("forced click rejected"));
                }
                calls.push(format!("click:forced:{id}"));
                Ok(())
            }
        })
    }

    async fn hover(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.with_element(element, |id, el, calls| {
            if !el.visible {
                return Err(not_interactable("hover target hidden"));
            }
            calls.push(format!("hover:{id}"));
            Ok(())
        })
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.with_element(element, |id, _, calls| {
            calls.push(format!("scroll:{id}"));
            Ok(())
        })
    }

    async fn fill(&self, element: &ElementRef, text: &str, clear: bool) -> Result<(), AdapterError> {
        self.with_element(element, |id, el, calls| {
            calls.push(format!("fill:{id}"));
            if el.ignores_input {
                return Ok(());
            }
            if clear {
                el.value = text.to_string();
            } else {
                el.value.push_str(text);
            }
            Ok(())
        })
    }

    async fn input_value(&self, element: &ElementRef) -> Result<String, AdapterError> {
        self.with_element(element, |_, el, _| Ok(el.value.clone()))
    }

    async fn text_content(&self, element: &ElementRef) -> Result<String, AdapterError> {
        self.with_element(element, |_, el, _| Ok(el.text.clone()))
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, AdapterError> {
        self.with_element(element, |_, el, _| Ok(el.attributes.get(name).cloned()))
    }

    async fn select_state(&self, element: &ElementRef) -> Result<SelectState, AdapterError> {
        self.with_element(element, |_, el, _| {
            if el.tag != "select" {
                return Err(not_interactable("not a select element"));
            }
            Ok(selection_of(el))
        })
    }

    async fn select_option(
        &self,
        element: &ElementRef,
        wanted: &str,
    ) -> Result<SelectState, AdapterError> {
        self.with_element(element, |id, el, calls| {
            if el.tag != "select" {
                return Err(not_interactable("not a select element"));
            }
            let index = el
                .options
                .iter()
                .position(|(value, _)| value == wanted)
                .or_else(|| el.options.iter().position(|(_, label)| label == wanted))
                .ok_or_else(|| {
                    AdapterError::new(AdapterErrorKind::OptionNotFound).with_hint(wanted.to_string())
                })?;
            calls.push(format!("select:{id}"));
            el.selected = Some(index);
            Ok(selection_of(el))
        })
    }

    async fn is_checked(&self, element: &ElementRef) -> Result<bool, AdapterError> {
        self.with_element(element, |_, el, _| Ok(el.checked))
    }

    async fn set_checked(&self, element: &ElementRef, checked: bool) -> Result<(), AdapterError> {
        self.with_element(element, |id, el, calls| {
            calls.push(format!("check:{id}:{checked}"));
            el.checked = checked;
            Ok(())
        })
    }

    async fn wait_for_state(
        &self,
        expr: &QueryExpression,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        let deadline = Instant::now() + timeout;
        loop {
            if state.is_satisfied(self.observe(expr)?) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::not_found(format!("{expr} not {}", state.name())));
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn evaluate(&self, _script: &str) -> Result<Value, AdapterError> {
        let state = self.state.lock();
        Self::ensure_open(&state)?;
        Ok(state.eval_result.clone())
    }

    async fn content(&self) -> Result<String, AdapterError> {
        let state = self.state.lock();
        Self::ensure_open(&state)?;
        Ok(state.html.clone())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    async fn close(&self) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.closed = true;
        state.calls.push("close".to_string());
        Ok(())
    }
}

fn selection_of(el: &MockElement) -> SelectState {
    match el.selected.and_then(|index| el.options.get(index)) {
        Some((value, label)) => SelectState {
            value: Some(value.clone()),
            label: Some(label.clone()),
        },
        None => SelectState::default(),
    }
}

type PageSetup = dyn Fn(&MockPage) + Send + Sync;

/// Factory producing fresh [`MockPage`]s, each prepared by an optional setup hook.
pub struct MockPageFactory {
    setup: Option<Box<PageSetup>>,
    created: Mutex<Vec<Arc<MockPage>>>,
    fail: Mutex<bool>,
}

impl Default for MockPageFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPageFactory {
    pub fn new() -> Self {
        Self {
            setup: None,
            created: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
        }
    }

    pub fn with_setup(setup: impl Fn(&MockPage) + Send + Sync + 'static) -> Self {
        Self {
            setup: Some(Box::new(setup)),
            ..Self::new()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn created(&self) -> Vec<Arc<MockPage>> {
        self.created.lock().clone()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

#[async_trait]
impl PageFactory for MockPageFactory {
    async fn create_page(&self) -> Result<PageHandle, AdapterError> {
        if *self.fail.lock() {
            return Err(AdapterError::new(AdapterErrorKind::BrowserCrash).with_hint("mock factory failing"));
        }
        let page = Arc::new(MockPage::new());
        if let Some(setup) = &self.setup {
            setup(&page);
        }
        self.created.lock().push(Arc::clone(&page));
        Ok(page)
    }
}
