//! Element resolver with tiered fallback orchestration

use crate::arbiter::{Arbiter, NoopArbiter};
use crate::builder::{compile, is_wildcard_type};
use crate::distiller::{distill, CandidateSummary};
use crate::errors::LocatorError;
use crate::metrics;
use crate::model::{populated, AttributeSet, Selector, SelectorContext, SelectorModel, SelectorOptions};
use crate::scorer::score;
use async_trait::async_trait;
use cdp_adapter::{ElementRef, Page, QueryExpression};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Tunables for the resolution state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Rule-based confidence at or above which a multi-match is accepted outright.
    pub accept_threshold: u8,
    /// Minimum confidence granted to an arbiter pick.
    pub arbiter_confidence: u8,
    /// Confidence floor for an ambiguous pick the arbiter did not settle.
    pub ambiguous_floor: u8,
    pub arbiter_timeout_ms: u64,
    pub min_step_budget_ms: u64,
    /// Upper bound on how long the primary query polls for a first match.
    pub primary_wait_ms: u64,
    pub relaxed_confidence: u8,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 70,
            arbiter_confidence: 75,
            ambiguous_floor: 50,
            arbiter_timeout_ms: 5_000,
            min_step_budget_ms: 200,
            primary_wait_ms: 2_000,
            relaxed_confidence: 30,
        }
    }
}

/// Outcome of one resolution. `found == false` implies `confidence == 0`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub element: Option<ElementRef>,
    pub strategy: String,
    pub compiled_selector: String,
    pub found: bool,
    pub confidence: u8,
    pub candidates: Vec<CandidateSummary>,
    pub arbitrated: bool,
}

impl ResolutionResult {
    fn not_found(strategy: &str, expr: &QueryExpression) -> Self {
        Self {
            element: None,
            strategy: strategy.to_string(),
            compiled_selector: expr.as_str().to_string(),
            found: false,
            confidence: 0,
            candidates: Vec::new(),
            arbitrated: false,
        }
    }

    fn found(strategy: &str, element: ElementRef, confidence: u8) -> Self {
        Self {
            compiled_selector: element.query.as_str().to_string(),
            element: Some(element),
            strategy: strategy.to_string(),
            found: true,
            confidence: confidence.min(100),
            candidates: Vec::new(),
            arbitrated: false,
        }
    }

    /// The resolved element, or `ElementNotFound` naming the last expression.
    pub fn element(&self) -> Result<&ElementRef, LocatorError> {
        self.element.as_ref().ok_or_else(|| {
            LocatorError::ElementNotFound(format!(
                "no element matched (last tried {} `{}`)",
                self.strategy, self.compiled_selector
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Primary,
    Fallback(usize),
    Relaxed,
}

impl Tier {
    fn label(&self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::Fallback(_) => "fallback",
            Tier::Relaxed => "relaxed",
        }
    }

    /// Confidence for a single unambiguous match.
    fn unique_confidence(&self, config: &ResolverConfig) -> u8 {
        match self {
            Tier::Primary => 95,
            Tier::Fallback(i) => 85u8.saturating_sub((10 * *i).min(85) as u8).max(50),
            Tier::Relaxed => config.relaxed_confidence,
        }
    }
}

#[derive(Debug, Clone)]
struct Attempt {
    tier: Tier,
    strategy: String,
    expr: QueryExpression,
    intent: AttributeSet,
}

fn plan_model(model: &SelectorModel) -> Vec<Attempt> {
    let mut plan = vec![Attempt {
        tier: Tier::Primary,
        strategy: "primary".to_string(),
        expr: compile(&model.element_type, &model.identifier, &model.context, &model.options),
        intent: model.identifier.clone(),
    }];

    for (i, fallback) in model.fallbacks.iter().enumerate() {
        if fallback.is_empty() {
            debug!(fallback = i, "skipping empty fallback");
            continue;
        }
        plan.push(Attempt {
            tier: Tier::Fallback(i),
            strategy: format!("fallback_{i}"),
            expr: compile(&model.element_type, fallback, &model.context, &model.options),
            intent: fallback.clone(),
        });
    }

    let loose_context = SelectorContext::default();
    let loose_options = SelectorOptions {
        case_sensitive: model.options.case_sensitive,
        ..SelectorOptions::default()
    };

    if let Some(word) = model
        .identifier
        .intent_text()
        .and_then(|text| text.split_whitespace().next())
    {
        let intent = AttributeSet::text_contains(word);
        plan.push(Attempt {
            tier: Tier::Relaxed,
            strategy: "relaxed:text".to_string(),
            expr: compile(&model.element_type, &intent, &loose_context, &loose_options),
            intent,
        });
    }

    if !is_wildcard_type(&model.element_type) {
        plan.push(Attempt {
            tier: Tier::Relaxed,
            strategy: "relaxed:type".to_string(),
            expr: compile(
                &model.element_type,
                &AttributeSet::default(),
                &loose_context,
                &loose_options,
            ),
            intent: AttributeSet::default(),
        });
    }

    if let Some(class) =
        populated(&model.identifier.class_contains).or_else(|| populated(&model.identifier.class_name))
    {
        let intent = AttributeSet::class_contains(class.trim());
        plan.push(Attempt {
            tier: Tier::Relaxed,
            strategy: "relaxed:class".to_string(),
            expr: compile("*", &intent, &loose_context, &loose_options),
            intent,
        });
    }

    let mut seen = Vec::new();
    plan.retain(|attempt| {
        if seen.contains(&attempt.expr) {
            false
        } else {
            seen.push(attempt.expr.clone());
            true
        }
    });
    plan
}

fn plan(selector: &Selector) -> Vec<Attempt> {
    match selector {
        Selector::Raw(expr) => vec![Attempt {
            tier: Tier::Primary,
            strategy: "primary".to_string(),
            expr: expr.clone(),
            intent: AttributeSet::default(),
        }],
        Selector::Structured(model) => plan_model(model),
    }
}

/// Strategy name and expression of every attempt, in the order they run.
pub fn planned_attempts(selector: &Selector) -> Vec<(String, QueryExpression)> {
    plan(selector)
        .into_iter()
        .map(|attempt| (attempt.strategy, attempt.expr))
        .collect()
}

fn options_of(selector: &Selector) -> SelectorOptions {
    match selector {
        Selector::Structured(model) => model.options.clone(),
        Selector::Raw(_) => SelectorOptions::default(),
    }
}

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Walk the tiers until a match is accepted. A miss is `Ok` with `found == false`.
    async fn resolve(
        &self,
        page: &dyn Page,
        selector: &Selector,
        budget: Duration,
    ) -> Result<ResolutionResult, LocatorError>;
}

/// Default element resolver implementation
pub struct DefaultElementResolver {
    config: ResolverConfig,
    arbiter: Arc<dyn Arbiter>,
}

impl Default for DefaultElementResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl DefaultElementResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            arbiter: Arc::new(NoopArbiter),
        }
    }

    pub fn with_arbiter(mut self, arbiter: Arc<dyn Arbiter>) -> Self {
        self.arbiter = arbiter;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Count matches for one attempt. Errors other than a lost page count as zero.
    async fn count(
        &self,
        page: &dyn Page,
        attempt: &Attempt,
        step: Duration,
    ) -> Result<usize, LocatorError> {
        let wait = match attempt.tier {
            Tier::Primary => (step / 2).min(Duration::from_millis(self.config.primary_wait_ms)),
            _ => Duration::ZERO,
        };
        match timeout(step, page.query(&attempt.expr, wait)).await {
            Ok(Ok(count)) => Ok(count),
            Ok(Err(err)) if err.is_fatal_for_page() => Err(LocatorError::SessionLost(err.to_string())),
            Ok(Err(err)) => {
                debug!(strategy = %attempt.strategy, error = %err, "query failed; treating as no match");
                Ok(0)
            }
            Err(_) => {
                debug!(strategy = %attempt.strategy, step_ms = step.as_millis() as u64, "query timed out");
                Ok(0)
            }
        }
    }

    /// Visible subset of `refs`, checked in document order. `first_only` stops
    /// at the first visible match.
    async fn visible_refs(
        &self,
        page: &dyn Page,
        refs: Vec<ElementRef>,
        first_only: bool,
    ) -> Result<Vec<ElementRef>, LocatorError> {
        let mut visible = Vec::new();
        for element in refs {
            match page.is_visible(&element).await {
                Ok(true) => {
                    visible.push(element);
                    if first_only {
                        break;
                    }
                }
                Ok(false) => {}
                Err(err) if err.is_fatal_for_page() => {
                    return Err(LocatorError::SessionLost(err.to_string()))
                }
                Err(err) => debug!(element = %element, error = %err, "visibility check failed"),
            }
        }
        Ok(visible)
    }

    /// Turn `count` matches of one attempt into a result, or `None` to move on.
    async fn settle(
        &self,
        page: &dyn Page,
        attempt: &Attempt,
        count: usize,
        options: &SelectorOptions,
        until: Instant,
    ) -> Result<Option<ResolutionResult>, LocatorError> {
        let refs: Vec<ElementRef> = (0..count)
            .map(|index| ElementRef::new(attempt.expr.clone(), index))
            .collect();

        if attempt.tier == Tier::Relaxed {
            let Some(element) = self.visible_refs(page, refs, true).await?.into_iter().next() else {
                return Ok(None);
            };
            return Ok(Some(ResolutionResult::found(
                &attempt.strategy,
                element,
                attempt.tier.unique_confidence(&self.config),
            )));
        }

        let refs = if options.visible {
            self.visible_refs(page, refs, false).await?
        } else {
            refs
        };
        let result = match refs.len() {
            0 => return Ok(None),
            1 => ResolutionResult::found(
                &attempt.strategy,
                refs[0].clone(),
                attempt.tier.unique_confidence(&self.config),
            ),
            _ => {
                self.disambiguate(page, attempt, &refs, options.case_sensitive, until)
                    .await?
            }
        };
        Ok(Some(result))
    }

    /// Disambiguate several matches of a primary or fallback attempt.
    async fn disambiguate(
        &self,
        page: &dyn Page,
        attempt: &Attempt,
        refs: &[ElementRef],
        case_sensitive: bool,
        until: Instant,
    ) -> Result<ResolutionResult, LocatorError> {
        let summaries = distill(page, refs).await?;
        let outcome = score(&summaries, &attempt.intent, case_sensitive).ok_or_else(|| {
            LocatorError::AmbiguousMatch(format!("{} produced no scorable candidates", attempt.strategy))
        })?;

        let rule_pick = outcome.best_index;
        let rule_confidence = outcome.confidence;
        let mut pick = rule_pick;
        let mut confidence = rule_confidence;
        let mut arbitrated = false;

        if rule_confidence < self.config.accept_threshold {
            let wait = Duration::from_millis(self.config.arbiter_timeout_ms)
                .min(until.saturating_duration_since(Instant::now()));
            match timeout(wait, self.arbiter.arbitrate(&summaries, &attempt.intent)).await {
                Ok(Some(choice)) if choice < summaries.len() => {
                    metrics::record_arbiter("picked");
                    pick = choice;
                    confidence = rule_confidence.max(self.config.arbiter_confidence);
                    arbitrated = true;
                }
                Ok(Some(choice)) => {
                    metrics::record_arbiter("invalid");
                    warn!(arbiter = self.arbiter.name(), choice, "arbiter answer out of range");
                    confidence = rule_confidence.max(self.config.ambiguous_floor);
                }
                Ok(None) => {
                    metrics::record_arbiter("deferred");
                    confidence = rule_confidence.max(self.config.ambiguous_floor);
                }
                Err(_) => {
                    metrics::record_arbiter("timeout");
                    warn!(arbiter = self.arbiter.name(), "arbiter timed out");
                    confidence = rule_confidence.max(self.config.ambiguous_floor);
                }
            }
        }

        let element_index = summaries
            .get(pick)
            .map(|summary| summary.index)
            .ok_or_else(|| LocatorError::Internal(format!("pick {pick} out of range")))?;
        let mut result = ResolutionResult::found(
            &attempt.strategy,
            ElementRef::new(attempt.expr.clone(), element_index),
            confidence,
        );
        result.candidates = summaries;
        result.arbitrated = arbitrated;
        debug!(
            strategy = %attempt.strategy,
            rule_pick,
            pick,
            rule_confidence,
            confidence,
            arbitrated,
            "multi-match disambiguated"
        );
        Ok(result)
    }
}

#[async_trait]
impl ElementResolver for DefaultElementResolver {
    async fn resolve(
        &self,
        page: &dyn Page,
        selector: &Selector,
        budget: Duration,
    ) -> Result<ResolutionResult, LocatorError> {
        let options = options_of(selector);
        let budget = options.timeout.map(Duration::from_millis).unwrap_or(budget);
        let attempts = plan(selector);
        let started = Instant::now();
        let deadline = started + budget;
        let min_step = Duration::from_millis(self.config.min_step_budget_ms);
        let step_budget = (budget / attempts.len().max(1) as u32).max(min_step);

        let mut last: Option<&Attempt> = None;
        for attempt in &attempts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() && last.is_some() {
                warn!(strategy = %attempt.strategy, "resolution budget exhausted");
                break;
            }
            last = Some(attempt);
            let step = step_budget.min(remaining.max(min_step));
            let step_deadline = Instant::now() + step;
            let count = self.count(page, attempt, step).await?;
            debug!(strategy = %attempt.strategy, expr = %attempt.expr, count, "tier attempted");
            if count == 0 {
                continue;
            }

            // Visibility checks and disambiguation share what is left of the step.
            let left = step_deadline
                .saturating_duration_since(Instant::now())
                .max(min_step);
            let until = Instant::now() + left;
            let result = match timeout(left, self.settle(page, attempt, count, &options, until)).await {
                Ok(Ok(Some(result))) => result,
                Ok(Ok(None)) => continue,
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    warn!(strategy = %attempt.strategy, step_ms = step.as_millis() as u64, "tier exceeded its step budget");
                    continue;
                }
            };

            metrics::record_resolution(attempt.tier.label(), "found");
            info!(
                strategy = %result.strategy,
                confidence = result.confidence,
                candidates = result.candidates.len(),
                arbitrated = result.arbitrated,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "element resolved"
            );
            return Ok(result);
        }

        let (strategy, expr) = match last {
            Some(attempt) => (attempt.strategy.as_str(), attempt.expr.clone()),
            None => ("primary", selector.primary_expression()),
        };
        metrics::record_resolution("all", "not_found");
        warn!(last_strategy = strategy, expr = %expr, "element not found");
        Ok(ResolutionResult::not_found(strategy, &expr))
    }
}
