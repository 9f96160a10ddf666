use action_primitives::{ActionError, ActionExecutor, ActionRequest, DefaultActionExecutor, ParsedAction};
use cdp_adapter::mock::{MockElement, MockPage};
use serde_json::{json, Value};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn parse(value: Value) -> ParsedAction {
    serde_json::from_value::<ActionRequest>(value)
        .unwrap()
        .parse()
        .unwrap()
}

async fn run(page: &MockPage, value: Value) -> Result<action_primitives::ActionOutput, ActionError> {
    DefaultActionExecutor::default()
        .execute(page, &parse(value), TIMEOUT)
        .await
}

#[tokio::test]
async fn navigate_reports_landing_url() {
    let page = MockPage::new();
    let output = run(&page, json!({"type": "navigate", "url": "https://example.com/"}))
        .await
        .unwrap();
    assert_eq!(output.value, Some(json!("https://example.com/")));
    assert_eq!(output.action, "navigate");
    assert!(page.calls().contains(&"navigate:https://example.com/".to_string()));
}

#[tokio::test]
async fn click_carries_resolution_provenance() {
    let page = MockPage::new();
    let go = page.add(MockElement::new("button").text("Go"));
    page.route_css("#go", &[go]);

    let output = run(&page, json!({"type": "click", "selector": "#go"})).await.unwrap();
    let resolution = output.resolution.unwrap();
    assert_eq!(resolution.strategy, "primary");
    assert_eq!(resolution.confidence, 95);
    assert_eq!(resolution.expression, "#go");
    assert_eq!(output.value, Some(json!("normal")));
    assert!(page.calls().contains(&format!("click:normal:{go}")));
}

#[tokio::test]
async fn rejected_click_falls_back_to_forced() {
    let page = MockPage::new();
    let covered = page.add(MockElement::new("button").text("Pay").failing_normal_click());
    page.route_css("#pay", &[covered]);

    let output = run(&page, json!({"type": "click", "selector": "#pay"})).await.unwrap();
    assert_eq!(output.value, Some(json!("forced")));
    assert!(page.calls().contains(&format!("click:forced:{covered}")));
}

#[tokio::test]
async fn click_failing_both_ways_is_transient() {
    let page = MockPage::new();
    let dead = page.add(
        MockElement::new("button")
            .failing_normal_click()
            .failing_forced_click(),
    );
    page.route_css("#dead", &[dead]);

    let err = run(&page, json!({"type": "click", "selector": "#dead"})).await.unwrap_err();
    assert!(matches!(err, ActionError::Transient(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn missing_element_is_element_not_found() {
    let page = MockPage::new();
    let err = run(&page, json!({"type": "click", "selector": "#nowhere"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::ElementNotFound(_)));
}

#[tokio::test]
async fn type_with_validation_on_ignoring_field_fails() {
    let page = MockPage::new();
    let stubborn = page.add(MockElement::new("input").ignoring_input());
    page.route_css("#email", &[stubborn]);

    let err = run(
        &page,
        json!({"type": "type", "selector": "#email", "text": "ada@example.com", "validate": true}),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err,
        ActionError::ValidationFailure {
            expected: "ada@example.com".into(),
            actual: String::new(),
        }
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn type_clears_by_default_and_can_append() {
    let page = MockPage::new();
    let input = page.add(MockElement::new("input").value("old"));
    page.route_css("#q", &[input]);

    run(&page, json!({"type": "type", "selector": "#q", "text": "new", "validate": true}))
        .await
        .unwrap();
    assert_eq!(page.element(input).unwrap().value, "new");

    run(
        &page,
        json!({"type": "type", "selector": "#q", "text": "er", "clear": false, "validate": true}),
    )
    .await
    .unwrap();
    assert_eq!(page.element(input).unwrap().value, "newer");
}

#[tokio::test]
async fn select_option_is_idempotent() {
    let page = MockPage::new();
    let country = page.add(
        MockElement::new("select")
            .option("us", "United States")
            .option("fr", "France")
            .selected(0),
    );
    page.route_css("#country", &[country]);

    let output = run(&page, json!({"type": "select_option", "selector": "#country", "value": "France"}))
        .await
        .unwrap();
    assert!(output.changed);
    assert_eq!(output.value.unwrap()["value"], "fr");

    let output = run(&page, json!({"type": "select_option", "selector": "#country", "value": "fr"}))
        .await
        .unwrap();
    assert!(!output.changed);
}

#[tokio::test]
async fn unknown_option_is_not_found() {
    let page = MockPage::new();
    let country = page.add(MockElement::new("select").option("us", "United States"));
    page.route_css("#country", &[country]);
    let err = run(&page, json!({"type": "select_option", "selector": "#country", "value": "mars"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::ElementNotFound(_)));
}

#[tokio::test]
async fn set_checkbox_defaults_to_checked_and_skips_noop() {
    let page = MockPage::new();
    let terms = page.add(MockElement::new("input").attr("type", "checkbox"));
    page.route_css("#terms", &[terms]);

    let output = run(&page, json!({"type": "set_checkbox", "selector": "#terms"})).await.unwrap();
    assert!(output.changed);
    assert!(page.element(terms).unwrap().checked);

    let output = run(&page, json!({"type": "set_checkbox", "selector": "#terms", "checked": true}))
        .await
        .unwrap();
    assert!(!output.changed);
    let toggles = page
        .calls()
        .iter()
        .filter(|call| call.starts_with("check:"))
        .count();
    assert_eq!(toggles, 1);
}

#[tokio::test]
async fn fill_form_records_failures_unless_stopping() {
    let page = MockPage::new();
    let name = page.add(MockElement::new("input"));
    let terms = page.add(MockElement::new("input").attr("type", "checkbox"));
    page.route_css("#name", &[name]);
    page.route_css("#terms", &[terms]);

    let output = run(
        &page,
        json!({
            "type": "fill_form",
            "formData": {"#name": "Ada", "#missing": "x", "#terms": true}
        }),
    )
    .await
    .unwrap();
    assert_eq!(output.fields.len(), 3);
    assert!(output.fields[0].ok);
    assert!(!output.fields[1].ok);
    assert!(output.fields[2].ok);
    assert_eq!(output.value, Some(json!({"filled": 2, "failed": 1})));
    assert_eq!(page.element(name).unwrap().value, "Ada");
    assert!(page.element(terms).unwrap().checked);

    let err = run(
        &page,
        json!({
            "type": "fill_form",
            "stopOnError": true,
            "formData": [
                {"selector": "#missing", "value": "x"},
                {"selector": "#name", "value": "Grace"}
            ]
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::ElementNotFound(_)));
    assert_eq!(page.element(name).unwrap().value, "Ada");
}

#[tokio::test]
async fn reads_text_and_attributes() {
    let page = MockPage::new();
    let link = page.add(MockElement::new("a").text("  Docs ").attr("href", "/docs"));
    page.route_css("a.docs", &[link]);

    let output = run(&page, json!({"type": "get_text", "selector": "a.docs"})).await.unwrap();
    assert_eq!(output.value, Some(json!("Docs")));
    assert!(!output.changed);

    let output = run(
        &page,
        json!({"type": "get_attribute", "selector": "a.docs", "attribute": "href"}),
    )
    .await
    .unwrap();
    assert_eq!(output.value, Some(json!("/docs")));

    let output = run(
        &page,
        json!({"type": "get_attribute", "selector": "a.docs", "attribute": "target"}),
    )
    .await
    .unwrap();
    assert_eq!(output.value, Some(Value::Null));
}

#[tokio::test]
async fn wait_for_element_times_out_when_state_never_holds() {
    let page = MockPage::new();
    let spinner = page.add(MockElement::new("div"));
    page.route_css(".spinner", &[spinner]);

    run(&page, json!({"type": "wait_for_element", "selector": ".spinner"}))
        .await
        .unwrap();

    let err = run(
        &page,
        json!({"type": "wait_for_element", "selector": ".spinner", "state": "detached", "timeoutMs": 100}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::ActionTimeout(_)));
}

#[tokio::test(start_paused = true)]
async fn whole_action_is_bounded_by_timeout() {
    let page = MockPage::new();
    let err = run(&page, json!({"type": "wait", "durationMs": 10_000, "timeoutMs": 500}))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::ActionTimeout(_)));

    let output = run(&page, json!({"type": "wait", "durationMs": 200})).await.unwrap();
    assert_eq!(output.value, Some(json!(200)));
}

#[tokio::test]
async fn closed_page_is_session_fatal() {
    let page = MockPage::new();
    page.mark_closed();
    let err = run(&page, json!({"type": "click", "selector": "#go"})).await.unwrap_err();
    assert!(err.is_session_fatal());
}
