use action_locator::{
    compile, Arbiter, AttributeSet, CandidateSummary, DefaultElementResolver, ElementResolver,
    LocatorError, Selector, SelectorContext, SelectorInput, SelectorModel, SelectorOptions, ResolverConfig,
    planned_attempts,
};
use async_trait::async_trait;
use cdp_adapter::mock::{MockElement, MockPage};
use cdp_adapter::QueryExpression;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const BUDGET: Duration = Duration::from_secs(5);

struct RecordingArbiter {
    calls: AtomicUsize,
    answer: Option<usize>,
}

impl RecordingArbiter {
    fn new(answer: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            answer,
        })
    }
}

#[async_trait]
impl Arbiter for RecordingArbiter {
    async fn arbitrate(&self, candidates: &[CandidateSummary], _intent: &AttributeSet) -> Option<usize> {
        assert!(candidates.len() > 1);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

fn primary(model: &SelectorModel) -> QueryExpression {
    compile(&model.element_type, &model.identifier, &model.context, &model.options)
}

#[tokio::test]
async fn submit_button_resolves_on_primary() {
    let page = MockPage::new();
    let _exit = page.add(MockElement::new("button").text("Exit"));
    let submit = page.add(MockElement::new("button").text("Submit").attr("type", "submit"));

    let model = SelectorModel::new("button", AttributeSet::text("Submit"));
    page.route(primary(&model), &[submit]);

    let resolver = DefaultElementResolver::default();
    let result = resolver
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();

    assert!(result.found);
    assert_eq!(result.strategy, "primary");
    assert!(result.confidence >= 85);
    assert_eq!(result.element.unwrap().index, 0);
    assert_eq!(result.compiled_selector, "//button[normalize-space(.)='Submit']");
}

#[tokio::test]
async fn duplicate_continue_buttons_pick_first_and_consult_arbiter() {
    let page = MockPage::new();
    let in_nav = page.add(MockElement::new("button").text("Continue").region("nav"));
    let in_form = page.add(MockElement::new("button").text("Continue").in_form());

    let model = SelectorModel::new("button", AttributeSet::text("Continue"));
    page.route(primary(&model), &[in_nav, in_form]);

    let arbiter = RecordingArbiter::new(None);
    let resolver = DefaultElementResolver::default().with_arbiter(arbiter.clone());
    let result = resolver
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();

    assert!(result.found);
    assert_eq!(result.element.as_ref().unwrap().index, 0);
    assert!(result.confidence <= 70);
    assert_eq!(result.confidence, 50);
    assert!(!result.arbitrated);
    assert_eq!(result.candidates.len(), 2);
    assert_eq!(arbiter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn arbiter_pick_is_honoured() {
    let page = MockPage::new();
    let a = page.add(MockElement::new("button").text("Continue"));
    let b = page.add(MockElement::new("button").text("Continue"));
    let model = SelectorModel::new("button", AttributeSet::text("Continue"));
    page.route(primary(&model), &[a, b]);

    let resolver = DefaultElementResolver::default().with_arbiter(RecordingArbiter::new(Some(1)));
    let result = resolver
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();
    assert!(result.arbitrated);
    assert_eq!(result.confidence, 75);
    assert_eq!(result.element.unwrap().index, 1);
}

#[tokio::test]
async fn out_of_range_arbiter_answer_falls_back_to_rule_winner() {
    let page = MockPage::new();
    let a = page.add(MockElement::new("a").text("More"));
    let b = page.add(MockElement::new("a").text("More"));
    let model = SelectorModel::new("a", AttributeSet::text("More"));
    page.route(primary(&model), &[a, b]);

    let config = ResolverConfig {
        ambiguous_floor: 40,
        ..Default::default()
    };
    let resolver = DefaultElementResolver::new(config).with_arbiter(RecordingArbiter::new(Some(9)));
    let result = resolver
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();
    assert!(!result.arbitrated);
    assert_eq!(result.element.unwrap().index, 0);
    assert_eq!(result.confidence, 45);
}

#[tokio::test]
async fn confident_multi_match_skips_arbiter() {
    let page = MockPage::new();
    let submit = page.add(
        MockElement::new("button")
            .text("Submit")
            .attr("type", "submit")
            .in_form(),
    );
    let exit = page.add(MockElement::new("button").text("Exit"));
    let model = SelectorModel::new("button", AttributeSet::text_contains("Submit"));
    page.route(primary(&model), &[exit, submit]);

    let arbiter = RecordingArbiter::new(Some(0));
    let resolver = DefaultElementResolver::default().with_arbiter(arbiter.clone());
    let result = resolver
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();
    assert_eq!(result.element.unwrap().index, 1);
    assert!(result.confidence >= 70);
    assert_eq!(arbiter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fallback_tier_used_when_primary_misses() {
    let page = MockPage::new();
    let save = page.add(MockElement::new("button").text("Save").attr("aria-label", "Save changes"));
    let fallback = AttributeSet {
        aria_label: Some("Save changes".into()),
        ..Default::default()
    };
    let model = SelectorModel::new("button", AttributeSet::text("Save now")).with_fallback(fallback.clone());
    page.route(
        compile("button", &fallback, &model.context, &model.options),
        &[save],
    );

    let result = DefaultElementResolver::default()
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();
    assert_eq!(result.strategy, "fallback_0");
    assert_eq!(result.confidence, 85);
}

#[tokio::test]
async fn failing_primary_query_counts_as_no_match() {
    let page = MockPage::new();
    let link = page.add(MockElement::new("a").text("Docs").attr("href", "/docs"));
    let fallback = AttributeSet {
        href: Some("/docs".into()),
        ..Default::default()
    };
    let model = SelectorModel::new("a", AttributeSet::text("Docs")).with_fallback(fallback.clone());
    page.fail_query(primary(&model));
    page.route(compile("a", &fallback, &model.context, &model.options), &[link]);

    let result = DefaultElementResolver::default()
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();
    assert!(result.found);
    assert_eq!(result.strategy, "fallback_0");
}

#[tokio::test]
async fn relaxed_tier_accepts_first_visible_match() {
    let page = MockPage::new();
    let hidden = page.add(MockElement::new("button").text("Checkout later").hidden());
    let shown = page.add(MockElement::new("button").text("Checkout"));
    let model = SelectorModel::new("button", AttributeSet::text("Checkout now"));
    let relaxed = compile(
        "button",
        &AttributeSet::text_contains("Checkout"),
        &SelectorContext::default(),
        &SelectorOptions::default(),
    );
    page.route(relaxed, &[hidden, shown]);

    let result = DefaultElementResolver::default()
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();
    assert_eq!(result.strategy, "relaxed:text");
    assert_eq!(result.confidence, 30);
    assert_eq!(result.element.unwrap().index, 1);
}

#[tokio::test]
async fn visible_option_filters_candidates() {
    let page = MockPage::new();
    let hidden = page.add(MockElement::new("button").text("Next").hidden());
    let shown = page.add(MockElement::new("button").text("Next"));
    let mut model = SelectorModel::new("button", AttributeSet::text("Next"));
    model.options.visible = true;
    page.route(primary(&model), &[hidden, shown]);

    let result = DefaultElementResolver::default()
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();
    assert_eq!(result.confidence, 95);
    assert_eq!(result.element.unwrap().index, 1);
}

#[tokio::test]
async fn miss_reports_last_expression_with_zero_confidence() {
    let page = MockPage::new();
    let model = SelectorModel::new("button", AttributeSet::text("Nowhere"));
    let result = DefaultElementResolver::default()
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();
    assert!(!result.found);
    assert_eq!(result.confidence, 0);
    assert_eq!(result.strategy, "relaxed:type");
    assert_eq!(result.compiled_selector, "//button");
    assert!(matches!(result.element(), Err(LocatorError::ElementNotFound(_))));
}

#[tokio::test]
async fn raw_selector_runs_primary_only() {
    let page = MockPage::new();
    let result = DefaultElementResolver::default()
        .resolve(&page, &Selector::Raw(QueryExpression::Css("#missing".into())), BUDGET)
        .await
        .unwrap();
    assert!(!result.found);
    assert_eq!(page.query_count(), 1);

    let go = page.add(MockElement::new("button").text("Go"));
    page.route_css("#go", &[go]);
    let result = DefaultElementResolver::default()
        .resolve(&page, &Selector::Raw(QueryExpression::Css("#go".into())), BUDGET)
        .await
        .unwrap();
    assert_eq!(result.strategy, "primary");
    assert_eq!(result.confidence, 95);
}

#[tokio::test]
async fn closed_page_aborts_with_session_lost() {
    let page = MockPage::new();
    page.mark_closed();
    let model = SelectorModel::new("button", AttributeSet::text("Submit"));
    let err = DefaultElementResolver::default()
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap_err();
    assert!(matches!(err, LocatorError::SessionLost(_)));
}

#[tokio::test(start_paused = true)]
async fn slow_queries_are_bounded_by_step_budget() {
    let page = MockPage::new();
    page.delay_queries(Duration::from_secs(60));
    let model = SelectorModel::new("button", AttributeSet::text("Submit"));
    let started = tokio::time::Instant::now();
    let result = DefaultElementResolver::default()
        .resolve(&page, &Selector::Structured(model), Duration::from_secs(2))
        .await
        .unwrap();
    assert!(!result.found);
    assert!(started.elapsed() < Duration::from_secs(3));
}

struct SlowArbiter;

#[async_trait]
impl Arbiter for SlowArbiter {
    async fn arbitrate(&self, _candidates: &[CandidateSummary], _intent: &AttributeSet) -> Option<usize> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Some(1)
    }
}

#[tokio::test]
async fn text_shorthand_targets_innermost_element() {
    let page = MockPage::new();
    let html = page.add(MockElement::new("html").text("Welcome Sign up Sign up now"));
    let main = page.add(MockElement::new("main").text("Sign up Sign up now"));
    let button = page.add(MockElement::new("button").text("Sign up now"));

    let selector = SelectorInput::Raw("text=Sign up now".into()).into_selector().unwrap();
    let attempts = planned_attempts(&selector);
    let (_, primary_expr) = &attempts[0];
    assert!(primary_expr.as_str().ends_with("[not(.//*[normalize-space(.)='Sign up now'])]"));
    let (relaxed, relaxed_expr) = attempts.last().unwrap();
    assert_eq!(relaxed, "relaxed:text");
    assert!(relaxed_expr.as_str().contains("[not(.//*["));

    // The unguarded wrapper chain never gets queried.
    page.route_xpath("//*[normalize-space(.)='Sign up now']", &[html, main, button]);
    page.route(primary_expr.clone(), &[button]);

    let result = DefaultElementResolver::default()
        .resolve(&page, &selector, BUDGET)
        .await
        .unwrap();
    assert_eq!(result.strategy, "primary");
    assert_eq!(result.confidence, 95);
    assert_eq!(page.element(button).unwrap().tag, "button");
    assert_eq!(result.element.unwrap().query, primary_expr.clone());
}

#[tokio::test]
async fn relaxed_tier_stops_at_first_visible_match() {
    let page = MockPage::new();
    let model = SelectorModel::new("div", AttributeSet::text("Nowhere"));
    let divs: Vec<usize> = (0..50).map(|_| page.add(MockElement::new("div"))).collect();
    page.route_xpath("//div", &divs);

    let result = DefaultElementResolver::default()
        .resolve(&page, &Selector::Structured(model), BUDGET)
        .await
        .unwrap();
    assert_eq!(result.strategy, "relaxed:type");
    assert_eq!(result.element.unwrap().index, 0);
    let visibility_checks = page
        .calls()
        .iter()
        .filter(|call| call.starts_with("visible:"))
        .count();
    assert_eq!(visibility_checks, 1);
}

#[tokio::test(start_paused = true)]
async fn slow_arbiter_is_cut_off_by_the_step_budget() {
    let page = MockPage::new();
    let a = page.add(MockElement::new("button").text("Continue"));
    let b = page.add(MockElement::new("button").text("Continue"));
    let model = SelectorModel::new("button", AttributeSet::text("Continue"));
    page.route(primary(&model), &[a, b]);

    let started = tokio::time::Instant::now();
    let result = DefaultElementResolver::default()
        .with_arbiter(Arc::new(SlowArbiter))
        .resolve(&page, &Selector::Structured(model), Duration::from_secs(1))
        .await
        .unwrap();
    assert!(started.elapsed() <= Duration::from_secs(1));
    assert!(result.found);
    assert!(!result.arbitrated);
    assert_eq!(result.confidence, 50);
    assert_eq!(result.element.unwrap().index, 0);
}
