//! Rule-based disambiguation among distilled candidates.

use crate::distiller::CandidateSummary;
use crate::model::{populated, AttributeSet};
use serde::Serialize;
use tracing::debug;

const NEGATIVE_ACTIONS: &[&str] = &["exit", "cancel", "close", "back", "delete", "discard", "previous"];
const PRIMARY_CLASS_HINTS: &[&str] = &["primary", "main", "submit"];
const SECONDARY_CLASS_HINTS: &[&str] = &["secondary", "cancel", "danger"];
const TEST_ID_ATTRIBUTES: &[&str] = &["data-testid", "data-test-id", "data-test"];

/// Positive action implied by the caller's intent text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositiveAction {
    Submit,
    Save,
    Continue,
}

impl PositiveAction {
    fn from_tokens(tokens: &[String]) -> Option<Self> {
        tokens.iter().find_map(|token| match token.as_str() {
            "submit" => Some(PositiveAction::Submit),
            "save" => Some(PositiveAction::Save),
            "continue" | "next" => Some(PositiveAction::Continue),
            _ => None,
        })
    }

    fn conflict_penalty(&self) -> f64 {
        match self {
            PositiveAction::Submit => -50.0,
            PositiveAction::Save | PositiveAction::Continue => -30.0,
        }
    }
}

/// Per-candidate score components.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub index: usize,
    pub text: f64,
    pub semantic: f64,
    pub attributes: f64,
    pub structure: f64,
    pub class_hints: f64,
    pub visibility: f64,
    pub richness: f64,
    pub total: f64,
    #[serde(skip)]
    exact_text: bool,
    #[serde(skip)]
    substring_text: bool,
    #[serde(skip)]
    exact_identity: bool,
    #[serde(skip)]
    exact_name: bool,
    #[serde(skip)]
    submit_button: bool,
    #[serde(skip)]
    conflicting_negative: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreOutcome {
    /// Position of the winner within the scored slice.
    pub best_index: usize,
    pub confidence: u8,
    pub breakdowns: Vec<ScoreBreakdown>,
}

fn tokens(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn fold(value: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        value.trim().to_string()
    } else {
        value.trim().to_lowercase()
    }
}

/// Human-facing label: trimmed text, else `value`, `aria-label`, `title`.
pub fn label_of(candidate: &CandidateSummary) -> String {
    let text = candidate.text_content.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    ["value", "aria-label", "title"]
        .iter()
        .filter_map(|name| candidate.attribute(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn is_button_like(candidate: &CandidateSummary) -> bool {
    match candidate.tag_name.as_str() {
        "button" => true,
        "input" => matches!(candidate.attribute("type"), Some("submit") | Some("button")),
        _ => candidate.attribute("role") == Some("button"),
    }
}

fn score_candidate(
    candidate: &CandidateSummary,
    intent: &AttributeSet,
    intent_action: Option<PositiveAction>,
    case_sensitive: bool,
) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown {
        index: candidate.index,
        ..Default::default()
    };
    let label = label_of(candidate);
    let folded_label = fold(&label, case_sensitive);

    if let Some(wanted) = intent.intent_text() {
        let wanted = fold(wanted, case_sensitive);
        if !wanted.is_empty() && folded_label.contains(&wanted) {
            breakdown.text += 10.0;
            breakdown.substring_text = true;
            if folded_label == wanted {
                breakdown.text += 25.0;
                breakdown.exact_text = true;
            }
        }
    }

    if let Some(action) = intent_action {
        let mut candidate_tokens = tokens(&label);
        for name in ["id", "name"] {
            if let Some(value) = candidate.attribute(name) {
                candidate_tokens.extend(tokens(value));
            }
        }
        if PositiveAction::from_tokens(&candidate_tokens) == Some(action) {
            breakdown.semantic += 20.0;
        }
        if candidate_tokens
            .iter()
            .any(|token| NEGATIVE_ACTIONS.contains(&token.as_str()))
        {
            breakdown.semantic += action.conflict_penalty();
            breakdown.conflicting_negative = true;
        }
    }

    if let Some(id) = populated(&intent.id) {
        if candidate.attribute("id") == Some(id) {
            breakdown.attributes += 15.0;
            breakdown.exact_identity = true;
        }
    }
    if let Some(name) = populated(&intent.name) {
        if candidate.attribute("name") == Some(name) {
            breakdown.attributes += 12.0;
            breakdown.exact_name = true;
        }
    }
    if let Some(test_id) = populated(&intent.test_id) {
        if TEST_ID_ATTRIBUTES
            .iter()
            .any(|attr| candidate.attribute(attr) == Some(test_id))
        {
            breakdown.attributes += 15.0;
            breakdown.exact_identity = true;
        }
    }
    let class_attr = candidate.attribute("class").unwrap_or_default();
    if let Some(class) = populated(&intent.class_name) {
        if class_attr.split_whitespace().any(|token| token == class.trim()) {
            breakdown.attributes += 8.0;
        } else if class_attr.contains(class.trim()) {
            breakdown.attributes += 6.0;
        }
    } else if let Some(class) = populated(&intent.class_contains) {
        if class_attr.contains(class.trim()) {
            breakdown.attributes += 6.0;
        }
    }
    if let Some(placeholder) = populated(&intent.placeholder) {
        if candidate.attribute("placeholder") == Some(placeholder) {
            breakdown.attributes += 10.0;
        }
    }
    if let Some(aria) = populated(&intent.aria_label) {
        if candidate.attribute("aria-label") == Some(aria) {
            breakdown.attributes += 10.0;
        }
    }

    if intent_action == Some(PositiveAction::Submit) {
        if is_button_like(candidate) && candidate.attribute("type") == Some("submit") {
            breakdown.structure += 15.0;
            breakdown.submit_button = true;
        }
        if is_button_like(candidate) && candidate.parent_info.in_form {
            breakdown.structure += 10.0;
        }
    }

    let class_lower = class_attr.to_lowercase();
    if PRIMARY_CLASS_HINTS.iter().any(|hint| class_lower.contains(hint)) {
        breakdown.class_hints += 8.0;
    }
    if SECONDARY_CLASS_HINTS.iter().any(|hint| class_lower.contains(hint)) {
        breakdown.class_hints -= 5.0;
    }

    if candidate.is_visible() {
        breakdown.visibility = 2.0;
    }
    breakdown.richness = (candidate.attributes.len() as f64 * 0.5).min(3.0);

    breakdown.total = breakdown.text
        + breakdown.semantic
        + breakdown.attributes
        + breakdown.structure
        + breakdown.class_hints
        + breakdown.visibility
        + breakdown.richness;
    breakdown
}

fn confidence_for(winner: &ScoreBreakdown, runner_up: Option<&ScoreBreakdown>) -> u8 {
    let mut confidence: f64 = 50.0;
    if winner.exact_text {
        confidence += 25.0;
    } else if winner.substring_text {
        confidence += 10.0;
    }
    if winner.exact_identity {
        confidence += 15.0;
    }
    if winner.exact_name {
        confidence += 10.0;
    }
    if winner.submit_button {
        confidence += 10.0;
    }
    if winner.conflicting_negative {
        confidence -= 40.0;
    }
    if let Some(runner_up) = runner_up {
        let margin = winner.total - runner_up.total;
        if margin.abs() < f64::EPSILON {
            confidence -= 30.0;
        } else if margin < 10.0 {
            confidence -= 15.0;
        }
    }
    confidence.clamp(0.0, 100.0).round() as u8
}

/// Score every candidate against `intent`. Ties go to the earliest candidate.
/// Returns `None` for an empty slice.
pub fn score(
    candidates: &[CandidateSummary],
    intent: &AttributeSet,
    case_sensitive: bool,
) -> Option<ScoreOutcome> {
    let intent_action = intent
        .intent_text()
        .map(tokens)
        .and_then(|tokens| PositiveAction::from_tokens(&tokens));

    let breakdowns: Vec<ScoreBreakdown> = candidates
        .iter()
        .map(|candidate| score_candidate(candidate, intent, intent_action, case_sensitive))
        .collect();

    let mut best_index = 0;
    for (position, breakdown) in breakdowns.iter().enumerate().skip(1) {
        if breakdown.total > breakdowns.get(best_index)?.total {
            best_index = position;
        }
    }
    let winner = breakdowns.get(best_index)?;
    let runner_up = breakdowns
        .iter()
        .enumerate()
        .filter(|(position, _)| *position != best_index)
        .map(|(_, breakdown)| breakdown)
        .max_by(|a, b| a.total.total_cmp(&b.total));
    let confidence = confidence_for(winner, runner_up);

    for breakdown in &breakdowns {
        debug!(
            candidate = breakdown.index,
            text = breakdown.text,
            semantic = breakdown.semantic,
            attributes = breakdown.attributes,
            structure = breakdown.structure,
            class_hints = breakdown.class_hints,
            visibility = breakdown.visibility,
            richness = breakdown.richness,
            total = breakdown.total,
            "candidate score"
        );
    }
    debug!(best = winner.index, confidence, action = ?intent_action, "scoring complete");

    Some(ScoreOutcome {
        best_index,
        confidence,
        breakdowns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::{BoxModel, ParentSnapshot};
    use std::collections::BTreeMap;

    fn candidate(index: usize, tag: &str, text: &str, attrs: &[(&str, &str)]) -> CandidateSummary {
        CandidateSummary {
            index,
            text_content: text.to_string(),
            tag_name: tag.to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            parent_info: ParentSnapshot::default(),
            sibling_info: Default::default(),
            screen_position: Some(BoxModel {
                x: 0.0,
                y: 0.0,
                width: 80.0,
                height: 20.0,
            }),
            field_errors: BTreeMap::new(),
        }
    }

    #[test]
    fn submit_beats_richer_exit() {
        let exit = candidate(
            0,
            "button",
            "Exit",
            &[
                ("id", "exit"),
                ("class", "btn btn-primary main"),
                ("name", "exit"),
                ("title", "Leave"),
                ("aria-label", "Exit"),
                ("data-track", "x"),
            ],
        );
        let submit = candidate(1, "button", "Submit", &[]);
        let outcome = score(&[exit, submit], &AttributeSet::text("Submit"), false).unwrap();
        assert_eq!(outcome.best_index, 1);
        assert!(outcome.breakdowns[0].semantic <= -50.0);
    }

    #[test]
    fn tie_goes_to_first_and_lowers_confidence() {
        let first = candidate(0, "button", "Continue", &[]);
        let second = candidate(1, "button", "Continue", &[]);
        let outcome = score(&[first, second], &AttributeSet::text("Continue"), false).unwrap();
        assert_eq!(outcome.best_index, 0);
        assert!(outcome.confidence <= 70);
        assert_eq!(outcome.confidence, 45);
    }

    #[test]
    fn submit_typed_button_in_form_gets_structure_bonus() {
        let mut submit = candidate(0, "button", "Submit", &[("type", "submit")]);
        submit.parent_info.in_form = true;
        let other = candidate(1, "a", "Help", &[]);
        let outcome = score(&[submit, other], &AttributeSet::text("Submit"), false).unwrap();
        assert_eq!(outcome.best_index, 0);
        assert_eq!(outcome.breakdowns[0].structure, 25.0);
        assert_eq!(outcome.confidence, 85);
    }

    #[test]
    fn label_falls_back_to_value_then_aria() {
        let input = candidate(0, "input", " ", &[("value", "Save"), ("type", "submit")]);
        assert_eq!(label_of(&input), "Save");
        let icon = candidate(1, "button", "", &[("aria-label", "Close dialog")]);
        assert_eq!(label_of(&icon), "Close dialog");
    }

    #[test]
    fn confidence_is_clamped() {
        let cancel = candidate(0, "button", "Cancel", &[]);
        let back = candidate(1, "button", "Back", &[]);
        let outcome = score(&[cancel, back], &AttributeSet::text("Save"), false).unwrap();
        assert!(outcome.confidence <= 100);
        assert_eq!(outcome.confidence, 0);
    }

    #[test]
    fn case_sensitive_text_matching() {
        let lower = candidate(0, "a", "docs", &[]);
        let upper = candidate(1, "a", "Docs", &[]);
        let outcome = score(&[lower, upper], &AttributeSet::text("Docs"), true).unwrap();
        assert_eq!(outcome.best_index, 1);
    }

    fn single(candidate: CandidateSummary, intent: AttributeSet) -> ScoreBreakdown {
        let mut outcome = score(&[candidate], &intent, false).unwrap();
        outcome.breakdowns.remove(0)
    }

    #[test]
    fn non_button_in_form_gets_no_form_bonus() {
        let mut field = candidate(0, "input", "", &[("type", "text")]);
        field.parent_info.in_form = true;
        let mut link = candidate(1, "a", "Submit feedback", &[]);
        link.parent_info.in_form = true;
        let mut cancel = candidate(2, "button", "Cancel", &[]);
        cancel.parent_info.in_form = true;
        let outcome = score(&[field, link, cancel], &AttributeSet::text("Submit"), false).unwrap();
        assert_eq!(outcome.breakdowns[0].structure, 0.0);
        assert_eq!(outcome.breakdowns[1].structure, 0.0);
        assert_eq!(outcome.breakdowns[2].structure, 10.0);
    }

    #[test]
    fn identity_attributes_add_their_weights() {
        let intent = AttributeSet {
            id: Some("email".into()),
            ..Default::default()
        };
        let hit = single(candidate(0, "input", "", &[("id", "email")]), intent.clone());
        assert_eq!(hit.attributes, 15.0);
        let miss = single(candidate(0, "input", "", &[("id", "email2")]), intent);
        assert_eq!(miss.attributes, 0.0);

        let intent = AttributeSet {
            name: Some("q".into()),
            ..Default::default()
        };
        assert_eq!(single(candidate(0, "input", "", &[("name", "q")]), intent).attributes, 12.0);

        for attr in ["data-testid", "data-test-id", "data-test"] {
            let intent = AttributeSet {
                test_id: Some("checkout".into()),
                ..Default::default()
            };
            let breakdown = single(candidate(0, "div", "", &[(attr, "checkout")]), intent);
            assert_eq!(breakdown.attributes, 15.0, "{attr}");
        }
    }

    #[test]
    fn class_match_is_exact_token_or_partial() {
        let intent = AttributeSet {
            class_name: Some("cta".into()),
            ..Default::default()
        };
        let exact = single(candidate(0, "a", "", &[("class", "link cta")]), intent.clone());
        assert_eq!(exact.attributes, 8.0);
        let partial = single(candidate(0, "a", "", &[("class", "link cta-large")]), intent);
        assert_eq!(partial.attributes, 6.0);

        let intent = AttributeSet {
            class_contains: Some("cta".into()),
            ..Default::default()
        };
        let contains = single(candidate(0, "a", "", &[("class", "link cta")]), intent);
        assert_eq!(contains.attributes, 6.0);
    }

    #[test]
    fn placeholder_and_aria_label_add_ten_each() {
        let intent = AttributeSet {
            placeholder: Some("Search".into()),
            aria_label: Some("Site search".into()),
            ..Default::default()
        };
        let both = single(
            candidate(0, "input", "", &[("placeholder", "Search"), ("aria-label", "Site search")]),
            intent.clone(),
        );
        assert_eq!(both.attributes, 20.0);
        let placeholder_only = single(candidate(0, "input", "", &[("placeholder", "Search")]), intent);
        assert_eq!(placeholder_only.attributes, 10.0);
    }

    #[test]
    fn save_and_continue_penalize_opposing_actions() {
        let delete = single(candidate(0, "button", "Delete", &[]), AttributeSet::text("Save"));
        assert_eq!(delete.semantic, -30.0);
        assert_eq!(delete.text, 0.0);

        let back = single(candidate(0, "button", "Back", &[]), AttributeSet::text("Continue"));
        assert_eq!(back.semantic, -30.0);

        let save = single(
            candidate(0, "button", "Store", &[("id", "save-draft")]),
            AttributeSet::text("Save"),
        );
        assert_eq!(save.semantic, 20.0);

        let next = single(candidate(0, "button", "Next step", &[]), AttributeSet::text("Continue"));
        assert_eq!(next.semantic, 20.0);
    }

    #[test]
    fn class_hints_reward_primary_and_penalize_secondary() {
        let intent = AttributeSet::text("Go");
        let primary = single(candidate(0, "button", "Go", &[("class", "btn btn-primary")]), intent.clone());
        assert_eq!(primary.class_hints, 8.0);
        let secondary = single(candidate(0, "button", "Go", &[("class", "btn secondary")]), intent.clone());
        assert_eq!(secondary.class_hints, -5.0);
        let plain = single(candidate(0, "button", "Go", &[("class", "btn")]), intent);
        assert_eq!(plain.class_hints, 0.0);
    }

    #[test]
    fn richness_is_capped_at_three() {
        let intent = AttributeSet::text("Go");
        let two = single(candidate(0, "a", "Go", &[("href", "/"), ("rel", "next")]), intent.clone());
        assert_eq!(two.richness, 1.0);
        let many = single(
            candidate(
                0,
                "a",
                "Go",
                &[
                    ("a1", "1"),
                    ("a2", "2"),
                    ("a3", "3"),
                    ("a4", "4"),
                    ("a5", "5"),
                    ("a6", "6"),
                    ("a7", "7"),
                    ("a8", "8"),
                ],
            ),
            intent,
        );
        assert_eq!(many.richness, 3.0);
        assert_eq!(many.visibility, 2.0);
        assert_eq!(many.total, 35.0 + 3.0 + 2.0);
    }

    #[test]
    fn empty_slice_yields_none() {
        assert!(score(&[], &AttributeSet::text("x"), false).is_none());
    }
}
