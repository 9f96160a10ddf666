//! Compiles selector models into XPath 1.0.
//!
//! Step order is fixed: element-type tag, structural context (ancestor step),
//! attribute predicates, text predicates, then the positional wrapper.

use crate::model::{
    populated, AttributeSet, AttributeValue, Position, Selector, SelectorContext, SelectorOptions,
};
use cdp_adapter::QueryExpression;

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// Compile a description into an XPath expression. Pure and deterministic.
pub fn compile(
    element_type: &str,
    attrs: &AttributeSet,
    context: &SelectorContext,
    options: &SelectorOptions,
) -> QueryExpression {
    let node = node_test(element_type);
    let prefix = context
        .parent
        .as_deref()
        .and_then(ancestor_step)
        .map(|step| format!("//{step}"))
        .unwrap_or_default();

    let mut predicates = attribute_predicates(attrs);
    let text = text_predicates(attrs, options);
    if node == "*" {
        // Every ancestor of a text node shares its normalized text; keep the innermost.
        let innermost: Vec<String> = text.iter().map(|p| format!("not(.//*[{p}])")).collect();
        predicates.extend(text);
        predicates.extend(innermost);
    } else {
        predicates.extend(text);
    }

    let mut expr = format!("{prefix}//{node}");
    for predicate in &predicates {
        expr.push('[');
        expr.push_str(predicate);
        expr.push(']');
    }

    if let Some(index) = context.index {
        expr = format!("({expr})[{}]", index + 1);
    } else if let Some(position) = context.position {
        expr = match position {
            Position::First => format!("({expr})[1]"),
            Position::Last => format!("({expr})[last()]"),
        };
    }

    QueryExpression::XPath(expr)
}

impl Selector {
    /// Expression of the primary tier.
    pub fn primary_expression(&self) -> QueryExpression {
        match self {
            Selector::Raw(expr) => expr.clone(),
            Selector::Structured(model) => compile(
                &model.element_type,
                &model.identifier,
                &model.context,
                &model.options,
            ),
        }
    }
}

/// Whether the element type constrains the tag at all.
pub fn is_wildcard_type(element_type: &str) -> bool {
    node_test(element_type) == "*"
}

/// Tag test for the element-type alias table.
fn node_test(element_type: &str) -> String {
    let normalized = element_type.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" | "*" | "any" | "element" => "*".to_string(),
        "link" => "a".to_string(),
        "image" => "img".to_string(),
        "checkbox" => "input[@type='checkbox']".to_string(),
        "radio" => "input[@type='radio']".to_string(),
        "heading" => "*[self::h1 or self::h2 or self::h3 or self::h4 or self::h5 or self::h6]".to_string(),
        "textbox" => "*[self::input or self::textarea]".to_string(),
        other if is_tag_name(other) => other.to_string(),
        _ => "*".to_string(),
    }
}

fn ancestor_step(parent: &str) -> Option<String> {
    let normalized = parent.trim().to_ascii_lowercase();
    let step = match normalized.as_str() {
        "header" => "*[self::header or @role='banner']",
        "footer" => "*[self::footer or @role='contentinfo']",
        "sidebar" | "aside" => "*[self::aside or @role='complementary']",
        "main" => "*[self::main or @role='main']",
        "nav" | "navigation" => "*[self::nav or @role='navigation']",
        "form" => "form",
        "dialog" | "modal" => "*[self::dialog or @role='dialog']",
        other if is_tag_name(other) => return Some(other.to_string()),
        _ => return None,
    };
    Some(step.to_string())
}

fn is_tag_name(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// XML-name-safe attribute names only; anything else is dropped.
fn is_attribute_name(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

fn attribute_predicates(attrs: &AttributeSet) -> Vec<String> {
    let mut predicates = Vec::new();
    if let Some(id) = populated(&attrs.id) {
        predicates.push(format!("@id={}", literal(id)));
    }
    if let Some(name) = populated(&attrs.name) {
        predicates.push(format!("@name={}", literal(name)));
    }
    if let Some(class) = populated(&attrs.class_name) {
        predicates.push(format!(
            "contains(concat(' ', normalize-space(@class), ' '), {})",
            literal(&format!(" {} ", class.trim()))
        ));
    } else if let Some(class) = populated(&attrs.class_contains) {
        predicates.push(format!("contains(@class, {})", literal(class)));
    }
    if let Some(placeholder) = populated(&attrs.placeholder) {
        predicates.push(format!("@placeholder={}", literal(placeholder)));
    }
    if let Some(label) = populated(&attrs.aria_label) {
        predicates.push(format!("@aria-label={}", literal(label)));
    }
    if let Some(test_id) = populated(&attrs.test_id) {
        let value = literal(test_id);
        predicates.push(format!(
            "@data-testid={value} or @data-test-id={value} or @data-test={value}"
        ));
    }
    if let Some(role) = populated(&attrs.role) {
        predicates.push(format!("@role={}", literal(role)));
    }
    if let Some(href) = populated(&attrs.href) {
        predicates.push(format!("@href={}", literal(href)));
    }
    if let Some(alt) = populated(&attrs.alt) {
        predicates.push(format!("@alt={}", literal(alt)));
    }
    for (name, value) in &attrs.attributes {
        if !is_attribute_name(name) {
            continue;
        }
        predicates.push(match value {
            AttributeValue::Flag(true) => format!("@{name}"),
            AttributeValue::Flag(false) => format!("not(@{name})"),
            AttributeValue::Text(text) => format!("@{name}={}", literal(text)),
        });
    }
    predicates
}

fn text_predicates(attrs: &AttributeSet, options: &SelectorOptions) -> Vec<String> {
    if let Some(text) = populated(&attrs.text) {
        let text = text.trim();
        if options.exact {
            return vec![format!("normalize-space(.)={}", literal(text))];
        }
        return vec![contains_text(text, options.case_sensitive)];
    }
    if let Some(text) = populated(&attrs.text_contains) {
        return vec![contains_text(text.trim(), options.case_sensitive)];
    }
    Vec::new()
}

fn contains_text(needle: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        format!("contains(normalize-space(.), {})", literal(needle))
    } else {
        format!(
            "contains(translate(normalize-space(.), '{UPPER}', '{LOWER}'), {})",
            literal(&needle.to_lowercase())
        )
    }
}

/// Quote a string as an XPath literal, using `concat()` when it holds both quote kinds.
pub fn literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn xpath(expr: QueryExpression) -> String {
        match expr {
            QueryExpression::XPath(x) => x,
            QueryExpression::Css(c) => panic!("unexpected css {c}"),
        }
    }

    fn build(element_type: &str, attrs: AttributeSet) -> String {
        xpath(compile(
            element_type,
            &attrs,
            &SelectorContext::default(),
            &SelectorOptions::default(),
        ))
    }

    #[test]
    fn exact_text_button() {
        assert_eq!(
            build("button", AttributeSet::text("Submit")),
            "//button[normalize-space(.)='Submit']"
        );
    }

    #[test]
    fn empty_input_degrades_to_wildcard() {
        assert_eq!(build("", AttributeSet::default()), "//*");
        assert_eq!(build("not a tag!", AttributeSet::default()), "//*");
    }

    #[test]
    fn attribute_order_and_precedence() {
        let mut attributes = BTreeMap::new();
        attributes.insert("required".to_string(), AttributeValue::Flag(true));
        attributes.insert("disabled".to_string(), AttributeValue::Flag(false));
        attributes.insert("bad name".to_string(), AttributeValue::Text("x".into()));
        let attrs = AttributeSet {
            id: Some("email".into()),
            class_name: Some("field".into()),
            class_contains: Some("ignored".into()),
            text: Some("Email".into()),
            text_contains: Some("ignored".into()),
            attributes,
            ..Default::default()
        };
        assert_eq!(
            build("input", attrs),
            "//input[@id='email'][contains(concat(' ', normalize-space(@class), ' '), ' field ')][not(@disabled)][@required][normalize-space(.)='Email']"
        );
    }

    #[test]
    fn text_contains_is_case_insensitive_by_default() {
        let expr = build("a", AttributeSet::text_contains("Sign In"));
        assert_eq!(
            expr,
            format!("//a[contains(translate(normalize-space(.), '{UPPER}', '{LOWER}'), 'sign in')]")
        );

        let options = SelectorOptions {
            case_sensitive: true,
            exact: false,
            ..Default::default()
        };
        let expr = xpath(compile(
            "a",
            &AttributeSet::text("Sign In"),
            &SelectorContext::default(),
            &options,
        ));
        assert_eq!(expr, "//a[contains(normalize-space(.), 'Sign In')]");
    }

    #[test]
    fn context_region_and_index() {
        let context = SelectorContext {
            parent: Some("nav".into()),
            index: Some(1),
            position: Some(Position::Last),
        };
        let expr = xpath(compile(
            "link",
            &AttributeSet::text("Docs"),
            &context,
            &SelectorOptions::default(),
        ));
        assert_eq!(
            expr,
            "(//*[self::nav or @role='navigation']//a[normalize-space(.)='Docs'])[2]"
        );

        let last = SelectorContext {
            position: Some(Position::Last),
            ..Default::default()
        };
        let expr = xpath(compile("li", &AttributeSet::class_contains("item"), &last, &SelectorOptions::default()));
        assert_eq!(expr, "(//li[contains(@class, 'item')])[last()]");
    }

    #[test]
    fn type_aliases() {
        let attrs = AttributeSet {
            name: Some("agree".into()),
            ..Default::default()
        };
        assert_eq!(build("checkbox", attrs), "//input[@type='checkbox'][@name='agree']");
        assert_eq!(
            build("textbox", AttributeSet { placeholder: Some("Search".into()), ..Default::default() }),
            "//*[self::input or self::textarea][@placeholder='Search']"
        );
    }

    #[test]
    fn test_id_matches_any_convention() {
        let attrs = AttributeSet {
            test_id: Some("save".into()),
            ..Default::default()
        };
        assert_eq!(
            build("*", attrs),
            "//*[@data-testid='save' or @data-test-id='save' or @data-test='save']"
        );
    }

    #[test]
    fn wildcard_text_selects_innermost_match() {
        assert_eq!(
            build("*", AttributeSet::text("Sign up now")),
            "//*[normalize-space(.)='Sign up now'][not(.//*[normalize-space(.)='Sign up now'])]"
        );
        let expr = build("element", AttributeSet::text_contains("Sign"));
        let predicate = format!("contains(translate(normalize-space(.), '{UPPER}', '{LOWER}'), 'sign')");
        assert_eq!(expr, format!("//*[{predicate}][not(.//*[{predicate}])]"));
    }

    #[test]
    fn tagged_text_keeps_descendant_text() {
        // <button><span>Submit</span></button> must still match the button.
        assert!(!build("button", AttributeSet::text("Submit")).contains("not("));
    }

    #[test]
    fn literal_escaping() {
        assert_eq!(literal("plain"), "'plain'");
        assert_eq!(literal("it's"), "\"it's\"");
        assert_eq!(literal(r#"say "it's""#), r#"concat('say "it', "'", 's"')"#);
    }
}
