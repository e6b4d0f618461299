//! Resolution vocabulary: what we look for and what we get back.

use std::fmt;

/// Kind of form control being hunted, used by strategies that scan the
/// page rather than follow an exact hint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlKind {
    TextInput,
    ComboBox,
    DateTimeInput,
}

impl ControlKind {
    /// Host element tag names to consider, most specific first. Custom
    /// component tags come before bare `input` so the component wrapper
    /// wins when both are present.
    pub fn host_tags(&self) -> &'static [&'static str] {
        match self {
            ControlKind::TextInput => &["vaadin-text-field", "vaadin-text-area", "input"],
            ControlKind::ComboBox => &["vaadin-combo-box", "vaadin-select", "select"],
            ControlKind::DateTimeInput => &[
                "vaadin-date-time-picker",
                "vaadin-date-picker",
                "input[type=datetime-local]",
            ],
        }
    }
}

/// A semantic description of one field: every hint we have about it.
/// Strategies consume the hints they understand and skip when their hint
/// is absent, so one target drives the whole fallback chain.
#[derive(Clone, Debug)]
pub struct SemanticTarget {
    /// Human description for logs and error text, e.g. "MRN field".
    pub description: String,
    pub kind: ControlKind,
    /// Visible label text to match (exact or containment).
    pub label: Option<String>,
    /// Known-id candidates, tried in order, `#` prefix included.
    pub id_guesses: Vec<String>,
    /// Placeholder text fragment.
    pub placeholder: Option<String>,
}

impl SemanticTarget {
    pub fn new(description: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            description: description.into(),
            kind,
            label: None,
            id_guesses: Vec::new(),
            placeholder: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_id_guesses<I, S>(mut self, guesses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_guesses = guesses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }
}

impl fmt::Display for SemanticTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// A re-findable reference to a resolved element. Elements without an id
/// get a marker attribute stamped by the probe so the selector stays
/// valid as long as the element lives.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ElementHandle {
    pub selector: String,
}

impl ElementHandle {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

/// Successful resolution: the handle plus the name of the strategy that
/// produced it. The winning strategy is recorded exactly, never the
/// first one configured.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub handle: ElementHandle,
    pub method: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_builder_collects_hints() {
        let target = SemanticTarget::new("MRN field", ControlKind::TextInput)
            .with_label("MRN")
            .with_id_guesses(["#ucr", "#mrnField"])
            .with_placeholder("MRN");
        assert_eq!(target.label.as_deref(), Some("MRN"));
        assert_eq!(target.id_guesses.len(), 2);
        assert_eq!(target.to_string(), "MRN field");
    }

    #[test]
    fn host_tags_prefer_components_over_native() {
        let tags = ControlKind::TextInput.host_tags();
        assert_eq!(tags[0], "vaadin-text-field");
        assert_eq!(*tags.last().unwrap(), "input");
    }
}
