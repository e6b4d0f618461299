//! Page-context scripts backing the primitives.
//!
//! Click scripts return a status string instead of a boolean so the
//! caller can tell "missing" from "hidden" from "disabled" and raise the
//! right error.

fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

const VISIBLE_FN: &str = r#"
const visible = (el) => {
  if (!el || !el.getBoundingClientRect) return false;
  const r = el.getBoundingClientRect();
  const s = getComputedStyle(el);
  return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
};
const enabled = (el) => !(el.disabled || el.hasAttribute('disabled') || el.getAttribute('aria-disabled') === 'true');
"#;

/// Click an element by selector. Returns "missing", "hidden",
/// "disabled" or "ok".
pub fn click_status(selector: &str) -> String {
    format!(
        r#"(function() {{
{VISIBLE_FN}
  let el = null;
  try {{ el = document.querySelector({sel}); }} catch (e) {{ return 'missing'; }}
  if (!el) return 'missing';
  if (!visible(el)) return 'hidden';
  if (!enabled(el)) return 'disabled';
  el.click();
  return 'ok';
}})()"#,
        sel = js_str(selector),
    )
}

/// Click the first clickable element whose trimmed text matches. Exact
/// match is preferred over containment so "OK" cannot hit "Invoke OK
/// dialog".
pub fn click_by_text_status(text: &str, tags: &[&str]) -> String {
    format!(
        r#"(function() {{
{VISIBLE_FN}
  const want = {text}.trim();
  const candidates = Array.from(document.querySelectorAll({tags}));
  const textOf = (el) => (el.textContent || '').trim();
  let el = candidates.find((c) => textOf(c) === want);
  if (!el) el = candidates.find((c) => textOf(c).includes(want));
  if (!el) return 'missing';
  if (!visible(el)) return 'hidden';
  if (!enabled(el)) return 'disabled';
  el.click();
  return 'ok';
}})()"#,
        text = js_str(text),
        tags = js_str(&tags.join(", ")),
    )
}

/// Visibility poll used by wait_for_visible.
pub fn is_visible(selector: &str) -> String {
    format!(
        r#"(function() {{
{VISIBLE_FN}
  let el = null;
  try {{ el = document.querySelector({sel}); }} catch (e) {{ return false; }}
  return !!el && visible(el);
}})()"#,
        sel = js_str(selector),
    )
}

/// Trimmed text content, or null when the element is absent.
pub fn text_of(selector: &str) -> String {
    format!(
        r#"(function() {{
  const el = document.querySelector({sel});
  return el ? (el.textContent || '').trim() : null;
}})()"#,
        sel = js_str(selector),
    )
}

/// Attribute value, or null when absent (element or attribute).
pub fn attr_of(selector: &str, name: &str) -> String {
    format!(
        r#"(function() {{
  const el = document.querySelector({sel});
  return el ? el.getAttribute({name}) : null;
}})()"#,
        sel = js_str(selector),
        name = js_str(name),
    )
}

/// Attribute of an element inside a component's shadow root.
pub fn shadow_attr_of(selector: &str, inner: &str, name: &str) -> String {
    format!(
        r#"(function() {{
  const host = document.querySelector({sel});
  if (!host || !host.shadowRoot) return null;
  const el = host.shadowRoot.querySelector({inner});
  return el ? el.getAttribute({name}) : null;
}})()"#,
        sel = js_str(selector),
        inner = js_str(inner),
        name = js_str(name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_status_covers_all_states() {
        let script = click_status("#btnLogin");
        for status in ["'missing'", "'hidden'", "'disabled'", "'ok'"] {
            assert!(script.contains(status), "missing {status}");
        }
    }

    #[test]
    fn click_by_text_prefers_exact_match() {
        let script = click_by_text_status("OK", &["vaadin-button", "button"]);
        let exact = script.find("=== want").unwrap();
        let contains = script.find(".includes(want)").unwrap();
        assert!(exact < contains);
    }

    #[test]
    fn selectors_are_json_escaped() {
        let script = attr_of("input[title=\"x\"]", "title");
        assert!(script.contains(r#""input[title=\"x\"]""#));
    }
}
