//! Probe and write scripts evaluated inside the page.
//!
//! All DOM and shadow-root walking happens in page context; only a
//! selector string (or null) crosses back. Elements without an id get a
//! `data-autot1-marker` attribute stamped so they can be re-found later.
//! String arguments are embedded as JSON literals, which is also valid
//! JavaScript, so no hand escaping happens here.

/// Shared helper functions injected at the top of every probe.
const HELPERS: &str = r#"
const visible = (el) => {
  if (!el || !el.getBoundingClientRect) return false;
  const r = el.getBoundingClientRect();
  const s = getComputedStyle(el);
  return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
};
const mark = (el, marker) => {
  if (el.id) return '#' + CSS.escape(el.id);
  el.setAttribute('data-autot1-marker', marker);
  return '[data-autot1-marker="' + marker + '"]';
};
"#;

fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn tags_selector(tags: &[&str]) -> String {
    js_str(&tags.join(", "))
}

/// Walk HTML `<label>` elements whose text contains `label` and chase
/// their associated control (`for` attribute, sibling, then parent scan).
pub fn probe_by_label(label: &str, tags: &[&str], marker: &str) -> String {
    format!(
        r#"(function() {{
{helpers}
  const want = {label}.toLowerCase();
  const tagSel = {tags};
  for (const lab of document.querySelectorAll('label')) {{
    const text = (lab.textContent || '').trim().toLowerCase();
    if (!text || !text.includes(want)) continue;
    let field = null;
    const forId = lab.getAttribute('for');
    if (forId) field = document.getElementById(forId);
    if (!field) field = lab.nextElementSibling;
    if (!field && lab.parentElement) field = lab.parentElement.querySelector(tagSel);
    if (field && field.matches && !field.matches(tagSel)) {{
      const inner = field.querySelector ? field.querySelector(tagSel) : null;
      if (inner) field = inner;
    }}
    if (field && visible(field)) return mark(field, {marker});
  }}
  return null;
}})()"#,
        helpers = HELPERS,
        label = js_str(label),
        tags = tags_selector(tags),
        marker = js_str(marker),
    )
}

/// Try each known id selector in order; first visible match wins.
pub fn probe_by_ids(ids: &[String]) -> String {
    let ids = serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(function() {{
{helpers}
  for (const sel of {ids}) {{
    let el = null;
    try {{ el = document.querySelector(sel); }} catch (e) {{ continue; }}
    if (el && visible(el)) return sel;
  }}
  return null;
}})()"#,
        helpers = HELPERS,
        ids = ids,
    )
}

/// Inspect candidate components for a `label` attribute or a label node
/// inside their shadow root.
pub fn probe_by_component_label(label: &str, tags: &[&str], marker: &str) -> String {
    format!(
        r#"(function() {{
{helpers}
  const want = {label}.toLowerCase();
  for (const el of document.querySelectorAll({tags})) {{
    if (!visible(el)) continue;
    const attr = (el.getAttribute('label') || '').toLowerCase();
    let shadowLabel = '';
    if (el.shadowRoot) {{
      const l = el.shadowRoot.querySelector('label, [part="label"]');
      if (l) shadowLabel = (l.textContent || '').trim().toLowerCase();
    }}
    if ((attr && attr.includes(want)) || (shadowLabel && shadowLabel.includes(want))) {{
      return mark(el, {marker});
    }}
  }}
  return null;
}})()"#,
        helpers = HELPERS,
        label = js_str(label),
        tags = tags_selector(tags),
        marker = js_str(marker),
    )
}

/// Match on placeholder text, on the host or on the input inside its
/// shadow root.
pub fn probe_by_placeholder(placeholder: &str, tags: &[&str], marker: &str) -> String {
    format!(
        r#"(function() {{
{helpers}
  const want = {placeholder}.toLowerCase();
  for (const el of document.querySelectorAll({tags})) {{
    if (!visible(el)) continue;
    let ph = el.placeholder || el.getAttribute('placeholder') || '';
    if (!ph && el.shadowRoot) {{
      const input = el.shadowRoot.querySelector('input, textarea');
      if (input) ph = input.placeholder || '';
    }}
    if (ph && ph.toLowerCase().includes(want)) return mark(el, {marker});
  }}
  return null;
}})()"#,
        helpers = HELPERS,
        placeholder = js_str(placeholder),
        tags = tags_selector(tags),
        marker = js_str(marker),
    )
}

/// Last resort: the first visible, enabled control of the wanted kind.
pub fn probe_first_visible(tags: &[&str], marker: &str) -> String {
    format!(
        r#"(function() {{
{helpers}
  for (const el of document.querySelectorAll({tags})) {{
    if (!visible(el)) continue;
    if (el.disabled || el.hasAttribute('disabled') || el.hasAttribute('readonly')) continue;
    return mark(el, {marker});
  }}
  return null;
}})()"#,
        helpers = HELPERS,
        tags = tags_selector(tags),
        marker = js_str(marker),
    )
}

/// Write `value` into both the host component and the native input
/// inside its shadow root, fire the events the framework listens for,
/// and read the value back for verification.
pub fn dual_write(selector: &str, value: &str) -> String {
    format!(
        r#"(function() {{
  const el = document.querySelector({selector});
  if (!el) return {{ found: false, actual: null }};
  const value = {value};
  el.value = value;
  let input = null;
  if (el.shadowRoot) {{
    input = el.shadowRoot.querySelector('input, textarea');
    if (input) input.value = value;
  }}
  const opts = {{ bubbles: true, composed: true }};
  const notify = input || el;
  notify.dispatchEvent(new Event('input', opts));
  notify.dispatchEvent(new Event('change', opts));
  notify.dispatchEvent(new Event('blur', opts));
  let actual = el.value;
  if (input && input.value !== undefined) actual = input.value;
  return {{ found: true, actual: actual === undefined ? null : String(actual) }};
}})()"#,
        selector = js_str(selector),
        value = js_str(value),
    )
}
