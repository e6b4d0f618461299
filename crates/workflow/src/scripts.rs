//! Page scripts specific to the declaration forms.
//!
//! These cover the components the generic dual write cannot handle: the
//! combined date/time picker (which splits its value across two child
//! pickers in its shadow root), plain component value sets that must
//! fire `value-changed`, the filtering combo box, and the read-only
//! destination office field that is verified by presence.

fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Set a component's `value` property and notify the framework. Used
/// for date pickers whose display value is formatted, so read-back
/// compares the property, not the shadow input.
pub fn set_component_value(selector: &str, value: &str) -> String {
    format!(
        r#"(function() {{
  const el = document.querySelector({sel});
  if (!el) return {{ found: false, actual: null }};
  const value = {value};
  el.value = value;
  el.dispatchEvent(new Event('change', {{ bubbles: true, composed: true }}));
  el.dispatchEvent(new Event('value-changed', {{ bubbles: true, composed: true }}));
  return {{ found: true, actual: el.value === undefined ? null : String(el.value) }};
}})()"#,
        sel = js_str(selector),
        value = js_str(value),
    )
}

/// Fill the arrival date/time picker. Direct value set first; if the
/// component does not take it, split the ISO value across the date and
/// time children in the shadow root.
pub fn fill_arrival_datetime(picker_selector: &str, iso_value: &str) -> String {
    format!(
        r#"(function() {{
  const picker = document.querySelector({sel});
  if (!picker) return {{ found: false, actual: null }};
  const value = {value};
  const opts = {{ bubbles: true, composed: true }};

  picker.value = value;
  picker.dispatchEvent(new Event('change', opts));
  picker.dispatchEvent(new Event('value-changed', opts));
  if (picker.value === value) {{
    return {{ found: true, actual: picker.value }};
  }}

  const datePicker = picker.querySelector('[slot="date-picker"]') ||
    (picker.shadowRoot && picker.shadowRoot.querySelector('vaadin-date-picker'));
  const timePicker = picker.querySelector('[slot="time-picker"]') ||
    (picker.shadowRoot && picker.shadowRoot.querySelector('vaadin-time-picker'));
  if (!datePicker && !timePicker) {{
    return {{ found: true, actual: picker.value === undefined ? null : String(picker.value) }};
  }}
  const parts = value.split('T');
  if (datePicker) {{
    datePicker.value = parts[0];
    datePicker.dispatchEvent(new Event('change', {{ bubbles: true }}));
  }}
  if (timePicker) {{
    timePicker.value = parts[1];
    timePicker.dispatchEvent(new Event('change', {{ bubbles: true }}));
  }}
  picker.value = value;
  picker.dispatchEvent(new Event('change', opts));
  picker.dispatchEvent(new Event('blur', {{ bubbles: true }}));
  return {{ found: true, actual: picker.value === undefined ? null : String(picker.value) }};
}})()"#,
        sel = js_str(picker_selector),
        value = js_str(iso_value),
    )
}

/// The destination office field is read-only; finding its shadow input
/// by customs-office title is the confirmation that the office is set.
pub fn destination_office_present(title: &str) -> String {
    format!(
        r#"(function() {{
  for (const field of document.querySelectorAll('vaadin-text-field')) {{
    if (!field.shadowRoot) continue;
    if (field.shadowRoot.querySelector('input[title=' + JSON.stringify({title}) + ']')) {{
      return true;
    }}
  }}
  return false;
}})()"#,
        title = js_str(title),
    )
}

/// Fill the filtering combo box through its inner input and confirm
/// with Enter. Returns the input's value afterwards so the caller can
/// apply its own (prefix-tolerant) comparison.
pub fn fill_combo_box(combo_selector: &str, value: &str) -> String {
    format!(
        r#"(function() {{
  const combo = document.querySelector({sel});
  if (!combo) return {{ found: false, actual: null }};
  const value = {value};
  combo.click();
  let input = combo.querySelector('input');
  if (!input && combo.shadowRoot) input = combo.shadowRoot.querySelector('input');
  if (!input) return {{ found: false, actual: null }};
  input.focus();
  input.value = value;
  input.dispatchEvent(new Event('input', {{ bubbles: true, composed: true }}));
  input.dispatchEvent(new KeyboardEvent('keydown', {{ key: 'Enter', bubbles: true, composed: true }}));
  input.dispatchEvent(new Event('change', {{ bubbles: true, composed: true }}));
  return {{ found: true, actual: input.value === undefined ? null : String(input.value) }};
}})()"#,
        sel = js_str(combo_selector),
        value = js_str(value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_fill_tries_direct_then_shadow_split() {
        let script = fill_arrival_datetime("vaadin-date-time-picker", "2024-03-15T09:00");
        let direct = script.find("picker.value === value").unwrap();
        let shadow = script.find("slot=\"date-picker\"").unwrap();
        assert!(direct < shadow);
        assert!(script.contains("2024-03-15T09:00"));
    }

    #[test]
    fn destination_probe_embeds_the_title() {
        let script = destination_office_present("Ufficio delle Dogane di MALPENSA");
        assert!(script.contains("Ufficio delle Dogane di MALPENSA"));
        assert!(script.contains("shadowRoot"));
    }

    #[test]
    fn combo_fill_confirms_with_enter() {
        let script = fill_combo_box("#publicComboBox[label=\"Public Layout\"]", "STANDARD ST");
        assert!(script.contains("'Enter'"));
        assert!(script.contains("STANDARD ST"));
    }
}
