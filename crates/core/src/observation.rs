//! Per-cycle page snapshots.
//!
//! Both types are rebuilt from scratch every polling cycle and never mutated
//! afterwards.

use serde::{Deserialize, Serialize};

/// Immutable snapshot of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    /// Inferred challenge number; `None` means "keep the last known one".
    pub ordinal: Option<u32>,

    /// First level-1/level-2 heading, if any.
    pub title: Option<String>,

    /// Visible text truncated to a fixed character budget.
    pub description_excerpt: String,

    pub success_signal: bool,
    pub error_signal: bool,
    pub completion_signal: bool,

    /// Progress phrasing as shown on the page, e.g. "4 of 30".
    pub progress_label: Option<String>,

    /// Code read from a designated data attribute when the page presents the
    /// hidden-attribute challenge archetype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_code: Option<String>,
}

impl ObservedState {
    /// One-line challenge description used in prompts and logs.
    pub fn challenge_line(&self) -> String {
        let mut line = match self.ordinal {
            Some(n) => format!("Challenge #{n}"),
            None => "Unknown challenge".to_string(),
        };
        if let Some(title) = &self.title {
            line.push_str(": ");
            line.push_str(title);
        }
        line
    }
}

/// One interactive element found on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub tag: String,
    pub visible_text: String,
    pub placeholder: String,
    pub id: String,
    pub css_class: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub disabled: bool,
    pub selector_hint: String,
}

/// Build a selector hint for an element.
///
/// Preference order: id, short visible text, first class, bare tag.
pub fn selector_hint(tag: &str, id: &str, css_class: &str, text: &str) -> String {
    if !id.is_empty() {
        return format!("#{id}");
    }
    let text = text.trim();
    if !text.is_empty() && text.chars().count() < 50 {
        let short = crate::text::truncate_chars(text, 30);
        return format!("{tag}:has-text(\"{short}\")");
    }
    if let Some(first) = css_class.split_whitespace().next() {
        return format!("{tag}.{first}");
    }
    tag.to_string()
}
