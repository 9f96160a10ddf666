//! Candidate distillation: compact summaries of every match, gathered as a batch.

use crate::errors::LocatorError;
use cdp_adapter::{BoxModel, ElementRef, ElementSnapshot, Page, ParentSnapshot, SiblingSnapshot};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const MAX_TEXT_CHARS: usize = 100;
pub const UNKNOWN_TAG: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    /// Index of the node among the query's matches.
    pub index: usize,
    pub text_content: String,
    pub tag_name: String,
    pub attributes: BTreeMap<String, String>,
    pub parent_info: ParentSnapshot,
    pub sibling_info: SiblingSnapshot,
    pub screen_position: Option<BoxModel>,
    /// Field name → extraction failure.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub field_errors: BTreeMap<String, String>,
}

impl CandidateSummary {
    pub fn is_visible(&self) -> bool {
        self.screen_position
            .map(|position| position.is_visible())
            .unwrap_or(false)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Aggregate a raw snapshot, replacing failed fields with sentinels.
    pub fn from_snapshot(index: usize, snapshot: ElementSnapshot) -> Self {
        let mut field_errors = BTreeMap::new();
        let errors = &mut field_errors;

        let text_content = take(errors, "textContent", snapshot.text)
            .map(|text| truncate_chars(text.trim(), MAX_TEXT_CHARS))
            .unwrap_or_default();
        let tag_name = take(errors, "tagName", snapshot.tag)
            .map(|tag| tag.to_ascii_lowercase())
            .unwrap_or_else(|| UNKNOWN_TAG.to_string());
        let attributes = take(errors, "attributes", snapshot.attributes).unwrap_or_default();
        let parent_info = take(errors, "parentInfo", snapshot.parent).unwrap_or_default();
        let sibling_info = take(errors, "siblingInfo", snapshot.siblings).unwrap_or_default();
        let screen_position = take(errors, "screenPosition", snapshot.position);

        Self {
            index,
            text_content,
            tag_name,
            attributes,
            parent_info,
            sibling_info,
            screen_position,
            field_errors,
        }
    }
}

fn take<T>(
    errors: &mut BTreeMap<String, String>,
    name: &str,
    result: Result<T, String>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            errors.insert(name.to_string(), err);
            None
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Distill every candidate before scoring. Order follows `candidates`.
/// A detached node still yields a summary with every field failed; a closed
/// page aborts with `SessionLost`.
pub async fn distill(
    page: &dyn Page,
    candidates: &[ElementRef],
) -> Result<Vec<CandidateSummary>, LocatorError> {
    let snapshots = join_all(candidates.iter().map(|candidate| page.describe(candidate))).await;

    let mut summaries = Vec::with_capacity(candidates.len());
    for (candidate, snapshot) in candidates.iter().zip(snapshots) {
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_fatal_for_page() => {
                return Err(LocatorError::SessionLost(err.to_string()))
            }
            Err(err) => {
                debug!(candidate = %candidate, error = %err, "candidate extraction failed");
                ElementSnapshot::failed(err.to_string())
            }
        };
        summaries.push(CandidateSummary::from_snapshot(candidate.index, snapshot));
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::{MockElement, MockPage, SnapshotField};
    use cdp_adapter::QueryExpression;

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(150);
        let cut = truncate_chars(&text, MAX_TEXT_CHARS);
        assert_eq!(cut.chars().count(), 100);
    }

    #[tokio::test]
    async fn failures_become_sentinels() {
        let page = MockPage::new();
        let ok = page.add(MockElement::new("button").text("Save").attr("id", "save"));
        let partial = page.add(
            MockElement::new("button")
                .text("Later")
                .failing_field(SnapshotField::Tag)
                .failing_field(SnapshotField::Position),
        );
        let gone = page.add(MockElement::new("button").detached());
        page.route_xpath("//button", &[ok, partial, gone]);

        let expr = QueryExpression::XPath("//button".into());
        let refs: Vec<_> = (0..3).map(|i| ElementRef::new(expr.clone(), i)).collect();
        let summaries = distill(&page, &refs).await.unwrap();

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].tag_name, "button");
        assert!(summaries[0].field_errors.is_empty());
        assert!(summaries[0].is_visible());

        assert_eq!(summaries[1].tag_name, UNKNOWN_TAG);
        assert_eq!(summaries[1].text_content, "Later");
        assert!(summaries[1].screen_position.is_none());
        assert_eq!(summaries[1].field_errors.len(), 2);

        assert_eq!(summaries[2].index, 2);
        assert_eq!(summaries[2].field_errors.len(), 6);
        assert!(summaries[2].text_content.is_empty());
    }

    #[tokio::test]
    async fn closed_page_is_session_lost() {
        let page = MockPage::new();
        page.mark_closed();
        let refs = vec![ElementRef::new(QueryExpression::wildcard(), 0)];
        assert!(matches!(
            distill(&page, &refs).await,
            Err(LocatorError::SessionLost(_))
        ));
    }
}
