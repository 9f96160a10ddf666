//! In-page JavaScript snippets evaluated by the Chromium driver.
//!
//! Every snippet is a self-invoking function returning `{ status, value?, message? }`.
//! `status` is `ok`, `missing` (the element reference no longer resolves) or
//! a command-specific failure tag.

use crate::commands::{ElementRef, QueryExpression};
use crate::error::AdapterError;
use serde::Deserialize;
use serde_json::Value;

/// Decoded envelope of a snippet result.
#[derive(Debug, Deserialize)]
pub struct ScriptOutcome {
    pub status: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub message: Option<String>,
}

const VISIBLE_FN: &str = r#"const __visible = (n) => {
    if (!n || !n.isConnected) { return false; }
    const style = window.getComputedStyle(n);
    if (style.visibility === 'hidden' || style.display === 'none') { return false; }
    const rect = n.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  };"#;

fn literal<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, AdapterError> {
    serde_json::to_string(value).map_err(|err| AdapterError::internal(err.to_string()))
}

/// Expression yielding the array of nodes matched by `expr`.
fn nodes_expression(expr: &QueryExpression) -> Result<String, AdapterError> {
    Ok(match expr {
        QueryExpression::XPath(xpath) => format!(
            "(() => {{ const snap = document.evaluate({xpath}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; for (let i = 0; i < snap.snapshotLength; i++) {{ out.push(snap.snapshotItem(i)); }} return out; }})()",
            xpath = literal(xpath)?
        ),
        QueryExpression::Css(css) => format!(
            "Array.from(document.querySelectorAll({css}))",
            css = literal(css)?
        ),
    })
}

fn element_expression(element: &ElementRef) -> Result<String, AdapterError> {
    Ok(match &element.query {
        QueryExpression::XPath(xpath) => format!(
            "document.evaluate({xpath}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotItem({index})",
            xpath = literal(xpath)?,
            index = element.index
        ),
        QueryExpression::Css(css) => format!(
            "(document.querySelectorAll({css})[{index}] || null)",
            css = literal(css)?,
            index = element.index
        ),
    })
}

/// Wrap `body` so it runs with `el` bound to the referenced node.
fn with_element(element: &ElementRef, body: &str) -> Result<String, AdapterError> {
    Ok(format!(
        r#"(() => {{
  {visible}
  let el;
  try {{ el = {locate}; }} catch (e) {{ return {{ status: 'error', message: String(e) }}; }}
  if (!el) {{ return {{ status: 'missing' }}; }}
  {body}
}})()"#,
        visible = VISIBLE_FN,
        locate = element_expression(element)?,
        body = body
    ))
}

pub fn count(expr: &QueryExpression) -> Result<String, AdapterError> {
    Ok(format!(
        "(() => {{ try {{ return {{ status: 'ok', value: {nodes}.length }}; }} catch (e) {{ return {{ status: 'error', message: String(e) }}; }} }})()",
        nodes = nodes_expression(expr)?
    ))
}

/// `value` is `null` when nothing matches, else the first node's visibility.
pub fn observe(expr: &QueryExpression) -> Result<String, AdapterError> {
    Ok(format!(
        r#"(() => {{
  {visible}
  try {{
    const nodes = {nodes};
    return {{ status: 'ok', value: nodes.length ? __visible(nodes[0]) : null }};
  }} catch (e) {{ return {{ status: 'error', message: String(e) }}; }}
}})()"#,
        visible = VISIBLE_FN,
        nodes = nodes_expression(expr)?
    ))
}

pub fn describe(element: &ElementRef) -> Result<String, AdapterError> {
    with_element(
        element,
        r#"const field = (fn) => { try { return { Ok: fn() }; } catch (e) { return { Err: String(e) }; } };
  const ownText = (n) => n ? (n.innerText || n.textContent || '').trim().slice(0, 100) || null : null;
  const regionOf = (n) => {
    const landmark = n.closest('form,nav,header,footer,aside,main,dialog,[role=dialog]');
    return landmark ? landmark.tagName.toLowerCase() : null;
  };
  return { status: 'ok', value: {
    text: field(() => (el.innerText || el.textContent || '').trim()),
    tag: field(() => el.tagName.toLowerCase()),
    attributes: field(() => {
      const out = {};
      for (const attr of Array.from(el.attributes)) { out[attr.name] = attr.value; }
      if (typeof el.value === 'string' && el.value && !('value' in out)) { out.value = el.value; }
      return out;
    }),
    parent: field(() => {
      const p = el.parentElement;
      return {
        tag: p ? p.tagName.toLowerCase() : null,
        id: p && p.id ? p.id : null,
        className: p && typeof p.className === 'string' && p.className ? p.className : null,
        region: regionOf(el),
        inForm: !!el.closest('form'),
      };
    }),
    siblings: field(() => ({
      previousText: ownText(el.previousElementSibling),
      nextText: ownText(el.nextElementSibling),
      count: el.parentElement ? el.parentElement.children.length - 1 : 0,
    })),
    position: field(() => {
      const r = el.getBoundingClientRect();
      return { x: r.x, y: r.y, width: r.width, height: r.height };
    }),
  } };"#,
    )
}

pub fn visible(element: &ElementRef) -> Result<String, AdapterError> {
    with_element(element, "return { status: 'ok', value: __visible(el) };")
}

/// Scroll into view and return the center point, hit-tested when `hit_test`.
pub fn pointer_target(element: &ElementRef, hit_test: bool) -> Result<String, AdapterError> {
    let body = format!(
        r#"el.scrollIntoView({{ block: 'center', inline: 'center' }});
  if (!__visible(el)) {{ return {{ status: 'hidden' }}; }}
  const r = el.getBoundingClientRect();
  const x = r.x + r.width / 2;
  const y = r.y + r.height / 2;
  if ({hit_test}) {{
    const top = document.elementFromPoint(x, y);
    if (!top || !(top === el || el.contains(top))) {{ return {{ status: 'obscured' }}; }}
  }}
  return {{ status: 'ok', value: {{ x, y }} }};"#,
        hit_test = hit_test
    );
    with_element(element, &body)
}

pub fn forced_click(element: &ElementRef) -> Result<String, AdapterError> {
    with_element(element, "el.click(); return { status: 'ok' };")
}

pub fn scroll_into_view(element: &ElementRef) -> Result<String, AdapterError> {
    with_element(
        element,
        "el.scrollIntoView({ block: 'center', inline: 'center' }); return { status: 'ok' };",
    )
}

pub fn fill(element: &ElementRef, text: &str, clear: bool) -> Result<String, AdapterError> {
    let body = format!(
        r#"const text = {text};
  el.focus();
  if (el.isContentEditable) {{
    el.textContent = {clear} ? text : (el.textContent || '') + text;
  }} else if ('value' in el) {{
    const proto = Object.getPrototypeOf(el);
    const desc = Object.getOwnPropertyDescriptor(proto, 'value');
    const next = {clear} ? text : (el.value || '') + text;
    if (desc && desc.set) {{ desc.set.call(el, next); }} else {{ el.value = next; }}
  }} else {{
    return {{ status: 'not-editable' }};
  }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ status: 'ok' }};"#,
        text = literal(text)?,
        clear = clear
    );
    with_element(element, &body)
}

pub fn input_value(element: &ElementRef) -> Result<String, AdapterError> {
    with_element(
        element,
        "return { status: 'ok', value: el.isContentEditable ? (el.textContent || '') : String(el.value ?? '') };",
    )
}

pub fn text_content(element: &ElementRef) -> Result<String, AdapterError> {
    with_element(
        element,
        "return { status: 'ok', value: (el.innerText || el.textContent || '').trim() };",
    )
}

pub fn attribute(element: &ElementRef, name: &str) -> Result<String, AdapterError> {
    let body = format!(
        "return {{ status: 'ok', value: el.getAttribute({name}) }};",
        name = literal(name)?
    );
    with_element(element, &body)
}

pub fn select_state(element: &ElementRef) -> Result<String, AdapterError> {
    with_element(
        element,
        r#"if (!el.options) { return { status: 'not-select' }; }
  const opt = el.options[el.selectedIndex];
  return { status: 'ok', value: { value: opt ? opt.value : null, label: opt ? opt.text : null } };"#,
    )
}

pub fn select_option(element: &ElementRef, wanted: &str) -> Result<String, AdapterError> {
    let body = format!(
        r#"if (!el.options) {{ return {{ status: 'not-select' }}; }}
  const wanted = {wanted};
  const options = Array.from(el.options);
  const option = options.find(o => o.value === wanted) || options.find(o => o.text.trim() === wanted);
  if (!option) {{ return {{ status: 'option-missing' }}; }}
  el.value = option.value;
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ status: 'ok', value: {{ value: option.value, label: option.text }} }};"#,
        wanted = literal(wanted)?
    );
    with_element(element, &body)
}

pub fn is_checked(element: &ElementRef) -> Result<String, AdapterError> {
    with_element(element, "return { status: 'ok', value: !!el.checked };")
}

pub fn set_checked(element: &ElementRef, checked: bool) -> Result<String, AdapterError> {
    let body = format!(
        r#"if (!('checked' in el)) {{ return {{ status: 'not-checkable' }}; }}
  if (el.checked !== {checked}) {{ el.click(); }}
  if (el.checked !== {checked}) {{
    el.checked = {checked};
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  }}
  return {{ status: 'ok' }};"#,
        checked = checked
    );
    with_element(element, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xpath_literal_is_json_quoted() {
        let element = ElementRef::new(
            QueryExpression::XPath("//button[normalize-space(.)=\"Go\"]".into()),
            2,
        );
        let script = visible(&element).unwrap();
        assert!(script.contains(r#""//button[normalize-space(.)=\"Go\"]""#));
        assert!(script.contains("snapshotItem(2)"));
    }

    #[test]
    fn css_queries_use_query_selector_all() {
        let script = count(&QueryExpression::Css("form > button".into())).unwrap();
        assert!(script.contains(r#"querySelectorAll("form > button")"#));
    }

    #[test]
    fn fill_text_cannot_break_out_of_literal() {
        let element = ElementRef::new(QueryExpression::Css("input".into()), 0);
        let script = fill(&element, "'); alert(1); ('", true).unwrap();
        assert!(script.contains(r#"const text = "'); alert(1); ('";"#));
    }
}
