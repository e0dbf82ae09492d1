//! Environment trait — the abstraction over the page being driven.
//!
//! Every interaction is a single bounded call: it either completes within the
//! caller-supplied timeout or returns an [`EnvironmentError`]. Nothing here
//! retries; fallback ladders live in the agent crate.
//!
//! Implementations: Chromium over CDP (`gauntlet-browser`), scripted pages in
//! tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EnvironmentError;
use crate::observation::InteractiveElement;

type EnvResult<T> = std::result::Result<T, EnvironmentError>;

/// How an [`ElementQuery`] constrains an element's visible text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "text", rename_all = "snake_case")]
pub enum TextMatch {
    /// Visible text contains the needle.
    Contains(String),
    /// Trimmed visible text equals the needle.
    Exact(String),
}

/// An engine-neutral element query: a CSS selector plus optional text
/// predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementQuery {
    pub css: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextMatch>,
    /// Reject elements whose visible text contains any of these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_text: Vec<String>,
}

impl ElementQuery {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
            exclude_text: Vec::new(),
        }
    }

    pub fn containing(mut self, text: impl Into<String>) -> Self {
        self.text = Some(TextMatch::Contains(text.into()));
        self
    }

    pub fn exact(mut self, text: impl Into<String>) -> Self {
        self.text = Some(TextMatch::Exact(text.into()));
        self
    }

    pub fn excluding(mut self, text: impl Into<String>) -> Self {
        self.exclude_text.push(text.into());
        self
    }

    /// Apply the text predicates to an element's visible text.
    pub fn text_matches(&self, visible_text: &str) -> bool {
        let text_ok = match &self.text {
            None => true,
            Some(TextMatch::Contains(needle)) => visible_text.contains(needle.as_str()),
            Some(TextMatch::Exact(needle)) => visible_text.trim() == needle,
        };
        text_ok
            && !self
                .exclude_text
                .iter()
                .any(|ex| visible_text.contains(ex.as_str()))
    }
}

impl std::fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.css)?;
        match &self.text {
            Some(TextMatch::Contains(t)) => write!(f, " ~ \"{t}\"")?,
            Some(TextMatch::Exact(t)) => write!(f, " = \"{t}\"")?,
            None => {}
        }
        for ex in &self.exclude_text {
            write!(f, " !~ \"{ex}\"")?;
        }
        Ok(())
    }
}

/// The page the agent drives.
///
/// Read-only introspection plus action primitives. Owned by the progression
/// controller for the whole run and lent by reference to each component.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Load `url` and wait until the load settles.
    async fn navigate(&self, url: &str, timeout: Duration) -> EnvResult<()>;

    /// Visible text of the document body.
    async fn visible_text(&self) -> EnvResult<String>;

    /// Serialized markup of the document body.
    async fn markup(&self) -> EnvResult<String>;

    /// Buttons, inputs, links and other interactive elements.
    async fn interactive_elements(&self) -> EnvResult<Vec<InteractiveElement>>;

    /// PNG snapshot of the current viewport.
    async fn snapshot_png(&self) -> EnvResult<Vec<u8>>;

    /// Wait until the document content stops changing. Returns `false` when
    /// the timeout elapsed while content was still changing.
    async fn wait_for_stable(&self, timeout: Duration) -> EnvResult<bool>;

    /// Wait until no visible element matches `selector`.
    async fn wait_for_hidden(&self, selector: &str, timeout: Duration) -> EnvResult<()>;

    async fn click(&self, selector: &str, timeout: Duration) -> EnvResult<()>;

    /// Click the first element whose visible text contains `text`.
    async fn click_text(&self, text: &str, timeout: Duration) -> EnvResult<()>;

    /// Click the element with accessible `role` and `name`.
    async fn click_role(&self, role: &str, name: &str, timeout: Duration) -> EnvResult<()>;

    /// Click the first visible element matching `query`, bypassing any
    /// overlay stacked on top of it. Returns `false` if nothing matched.
    async fn click_first_visible(&self, query: &ElementQuery, timeout: Duration) -> EnvResult<bool>;

    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> EnvResult<()>;

    async fn fill_by_placeholder(&self, placeholder: &str, value: &str, timeout: Duration) -> EnvResult<()>;

    /// Fill the first visible input or textarea.
    async fn fill_first_visible(&self, value: &str, timeout: Duration) -> EnvResult<()>;

    /// Select a `<select>` option by its value.
    async fn select_option(&self, selector: &str, value: &str, timeout: Duration) -> EnvResult<()>;

    /// Select a `<select>` option by its visible label.
    async fn select_option_by_label(&self, selector: &str, label: &str, timeout: Duration) -> EnvResult<()>;

    /// Press a named key ("Enter", "Tab", "Escape", or a single character).
    async fn press_key(&self, key: &str) -> EnvResult<()>;

    async fn scroll_by(&self, pixels: i64) -> EnvResult<()>;

    async fn scroll_to_bottom(&self) -> EnvResult<()>;
}
