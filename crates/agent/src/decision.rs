//! DecisionEngine — asks the reasoning oracle for the next action.
//!
//! Two entry points share one instruction contract: [`DecisionEngine::decide_text`]
//! sends a bounded text digest of the page, [`DecisionEngine::decide_vision`]
//! sends a rendered snapshot with a shorter prompt. Parsing and the degraded
//! fallback are separate pure functions ([`parse_action`], [`degraded_action`]).
//!
//! Transport failures are returned to the caller; a malformed reply never is.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use gauntlet_core::action::{Action, ActionKind};
use gauntlet_core::error::ProviderError;
use gauntlet_core::message::{ImageAttachment, Message};
use gauntlet_core::observation::{InteractiveElement, ObservedState};
use gauntlet_core::provider::{Provider, ProviderRequest};
use gauntlet_core::text::truncate_chars;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Characters of visible text sent in a text-mode payload.
pub const PAGE_TEXT_CHARS: usize = 2000;
/// Interactive elements listed in a text-mode payload.
pub const MAX_ELEMENTS: usize = 30;
/// Characters of each element's visible text.
pub const ELEMENT_TEXT_CHARS: usize = 50;
/// Recent actions included in the failure context.
pub const RECENT_ACTIONS: usize = 5;

pub const SYSTEM_PROMPT: &str = r##"You drive a web browser through a sequence of interactive challenges.

Each turn you receive the visible page text, a numbered list of interactive elements, and what is known about the current challenge. Choose exactly ONE next action.

Reply with a single JSON object and nothing else:
{
    "action": "click" | "type" | "select" | "press_key" | "scroll" | "wait" | "done",
    "selector": "CSS selector or visible text of the target",
    "value": "text to type, option to select, key to press, or pixels to scroll",
    "reasoning": "one short sentence"
}

Actions:
- click: press a button or link. Selectors like "button:has-text('Submit')" or "#submit" both work.
- type: fill an input with value. Enter is pressed for you afterwards.
- select: choose value in a dropdown.
- press_key: press a key such as "Enter", "Tab" or "Escape" (put it in value).
- scroll: scroll down by value pixels, or "bottom" for the end of the page.
- wait: let the page update. Use sparingly.
- done: the challenge is solved and the page should move on.

Hints:
- "Scroll to reveal" means scroll by the stated distance.
- A code revealed by one step is usually typed in the next.
- After success or "correct", look for Advance, Next, Continue or Proceed, or answer done.
- Codes kept in HTML attributes (for example data-challenge-code) are not in the visible text. Type any six digit code into the code field; the runner reads the attribute itself.

Be precise. Output valid JSON only."##;

const VISION_PROMPT: &str = r#"This screenshot shows a browser challenge that text-only analysis has failed to solve several times.

Find the control that moves the challenge forward: buttons, input fields, dropdowns, or a visual pattern that needs a click.

Reply with JSON only: {"action": "click"|"type"|"select", "selector": "visible text or CSS selector", "value": "if needed", "reasoning": "what you see"}"#;

/// Outcome of one executed action, as shown to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub summary: String,
    pub succeeded: bool,
}

impl ActionOutcome {
    pub fn new(action: &Action, succeeded: bool) -> Self {
        Self {
            summary: action.summary(),
            succeeded,
        }
    }
}

/// What the oracle should know about the current challenge's history.
#[derive(Debug, Clone, Default)]
pub struct FailureContext {
    pub consecutive_failures: u32,
    /// Oldest first; only the last [`RECENT_ACTIONS`] are rendered.
    pub recent: Vec<ActionOutcome>,
}

/// Why a reply could not be read as an action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no JSON object in reply")]
    NoObject,

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("{0}")]
    UnknownKind(String),
}

/// Wire shape of a reply. Values may arrive as numbers (`"value": 500`).
#[derive(Debug, Deserialize)]
struct WireAction {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    selector: Option<Value>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    reasoning: Option<String>,
}

fn scalar(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl TryFrom<WireAction> for Action {
    type Error = ParseError;

    fn try_from(wire: WireAction) -> Result<Self, Self::Error> {
        let kind = match wire.action.as_deref() {
            None => ActionKind::Wait,
            Some(name) => name.parse().map_err(ParseError::UnknownKind)?,
        };
        Ok(Action {
            kind,
            target: scalar(wire.selector).filter(|s| !s.trim().is_empty()),
            value: scalar(wire.value).filter(|s| !s.trim().is_empty()),
            rationale: wire.reasoning.unwrap_or_default(),
        })
    }
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn object_slice(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Read a reply as an action: direct parse, then without code fences, then the
/// outermost `{...}` slice. A missing `action` field means wait.
pub fn parse_action(raw: &str) -> Result<Action, ParseError> {
    let attempt = |candidate: &str| -> Result<Action, ParseError> {
        let wire: WireAction =
            serde_json::from_str(candidate).map_err(|e| ParseError::Json(e.to_string()))?;
        Action::try_from(wire)
    };

    let direct = attempt(raw.trim());
    if let Err(ParseError::Json(_)) = &direct {
        let unfenced = strip_fences(raw);
        if let Ok(action) = attempt(unfenced) {
            return Ok(action);
        }
        return match object_slice(unfenced) {
            Some(slice) => attempt(slice),
            None => Err(ParseError::NoObject),
        };
    }
    direct
}

/// Heuristic used when a text-mode reply cannot be parsed.
pub fn degraded_action(raw: &str, error: &ParseError) -> Action {
    if raw.to_lowercase().contains("click") {
        Action::click("button").because(format!("unparseable reply, attempting click: {error}"))
    } else {
        Action::wait(format!("unparseable reply: {error}"))
    }
}

/// Render the element list the way the oracle sees it.
pub fn format_elements(elements: &[InteractiveElement]) -> String {
    if elements.is_empty() {
        return "No interactive elements found".into();
    }
    elements
        .iter()
        .take(MAX_ELEMENTS)
        .enumerate()
        .map(|(i, el)| {
            let mut parts = vec![format!("{}. <{}>", i + 1, el.tag)];
            if !el.visible_text.is_empty() {
                parts.push(format!(
                    "text=\"{}\"",
                    truncate_chars(&el.visible_text, ELEMENT_TEXT_CHARS)
                ));
            }
            if !el.placeholder.is_empty() {
                parts.push(format!("placeholder=\"{}\"", el.placeholder));
            }
            if !el.id.is_empty() {
                parts.push(format!("id=\"{}\"", el.id));
            }
            if !el.input_type.is_empty() {
                parts.push(format!("type=\"{}\"", el.input_type));
            }
            if el.disabled {
                parts.push("(disabled)".into());
            }
            parts.push(format!("selector=\"{}\"", el.selector_hint));
            parts.join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the text-mode user payload.
pub fn build_text_payload(
    state: &ObservedState,
    page_text: &str,
    elements: &[InteractiveElement],
    context: &FailureContext,
) -> String {
    let mut info = state.challenge_line();
    if let Some(progress) = &state.progress_label {
        info.push_str(&format!("\nProgress: {progress}"));
    }
    if context.consecutive_failures > 0 {
        info.push_str(&format!(
            "\nConsecutive failed actions on this challenge: {}",
            context.consecutive_failures
        ));
    }
    let skip = context.recent.len().saturating_sub(RECENT_ACTIONS);
    let recent: Vec<String> = context.recent[skip..]
        .iter()
        .map(|o| {
            let mark = if o.succeeded { "ok" } else { "FAILED" };
            format!("- {} -> {mark}", o.summary)
        })
        .collect();
    if !recent.is_empty() {
        info.push_str("\nRecent actions:\n");
        info.push_str(&recent.join("\n"));
    }

    format!(
        "Current page state:\n\nVISIBLE TEXT:\n{}\n\nINTERACTIVE ELEMENTS:\n{}\n\nCHALLENGE INFO:\n{}\n\nWhat single action should I take next? Respond with JSON only.",
        truncate_chars(page_text, PAGE_TEXT_CHARS),
        format_elements(elements),
        info,
    )
}

/// The oracle-facing half of the control core.
pub struct DecisionEngine {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl DecisionEngine {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: Some(1024),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn ask(&self, user: Message) -> Result<String, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(SYSTEM_PROMPT), user],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let response = self.provider.complete(request).await?;
        Ok(response.message.content)
    }

    /// Text mode: page digest in, one action out.
    pub async fn decide_text(
        &self,
        state: &ObservedState,
        page_text: &str,
        elements: &[InteractiveElement],
        context: &FailureContext,
    ) -> Result<Action, ProviderError> {
        let payload = build_text_payload(state, page_text, elements, context);
        let reply = self.ask(Message::user(payload)).await?;
        Ok(parse_action(&reply).unwrap_or_else(|e| {
            warn!(error = %e, "Could not parse oracle reply; degrading");
            debug!(reply = %truncate_chars(&reply, 200), "Unparseable reply");
            degraded_action(&reply, &e)
        }))
    }

    /// Vision mode: a PNG snapshot in, one action out. Never falls back to
    /// text mode; anything unreadable becomes a wait.
    pub async fn decide_vision(
        &self,
        state: &ObservedState,
        png: &[u8],
    ) -> Result<Action, ProviderError> {
        if !self.provider.supports_vision() {
            return Ok(Action::wait(format!(
                "vision fallback unavailable: provider '{}' does not accept images",
                self.provider.name()
            )));
        }
        let prompt = format!("{VISION_PROMPT}\n\n{}", state.challenge_line());
        let image = ImageAttachment::png(STANDARD.encode(png));
        let reply = self.ask(Message::user(prompt).with_image(image)).await?;
        Ok(parse_action(&reply).unwrap_or_else(|e| {
            warn!(error = %e, "Vision reply unreadable");
            Action::wait(format!("vision fallback failed: {e}"))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;

    fn element(tag: &str, text: &str, hint: &str) -> InteractiveElement {
        InteractiveElement {
            tag: tag.into(),
            visible_text: text.into(),
            selector_hint: hint.into(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_plain_json() {
        let action =
            parse_action(r##"{"action":"click","selector":"#go","reasoning":"start"}"##).unwrap();
        assert_eq!(action.kind, ActionKind::Click);
        assert_eq!(action.target.as_deref(), Some("#go"));
        assert_eq!(action.rationale, "start");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"action\": \"type\", \"selector\": \"#code\", \"value\": \"123456\"}\n```";
        let action = parse_action(raw).unwrap();
        assert_eq!(action.kind, ActionKind::Type);
        assert_eq!(action.target.as_deref(), Some("#code"));
        assert_eq!(action.value.as_deref(), Some("123456"));
    }

    #[test]
    fn parses_object_embedded_in_prose() {
        let raw = "Sure! Here you go: {\"action\":\"scroll\",\"value\":500} Good luck.";
        let action = parse_action(raw).unwrap();
        assert_eq!(action.kind, ActionKind::Scroll);
        assert_eq!(action.value.as_deref(), Some("500"));
    }

    #[test]
    fn missing_action_means_wait() {
        let action = parse_action(r#"{"reasoning":"nothing to do"}"#).unwrap();
        assert_eq!(action.kind, ActionKind::Wait);
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let err = parse_action(r##"{"action":"hover","selector":"#x"}"##).unwrap_err();
        assert!(matches!(err, ParseError::UnknownKind(_)));
    }

    #[test]
    fn garbage_has_no_object() {
        assert_eq!(parse_action("I think we should click it"), Err(ParseError::NoObject));
    }

    #[test]
    fn degrade_prefers_click_when_mentioned() {
        let err = ParseError::NoObject;
        let action = degraded_action("You should CLICK the big button", &err);
        assert_eq!(action.kind, ActionKind::Click);
        assert_eq!(action.target.as_deref(), Some("button"));

        let action = degraded_action("no idea", &err);
        assert_eq!(action.kind, ActionKind::Wait);
        assert!(action.rationale.contains("unparseable"));
    }

    #[test]
    fn element_list_is_bounded() {
        let long = "y".repeat(80);
        let mut elements: Vec<_> = (0..40).map(|i| element("button", &long, &format!("#b{i}"))).collect();
        elements[0].disabled = true;
        elements[0].input_type = "submit".into();
        let rendered = format_elements(&elements);
        assert_eq!(rendered.lines().count(), MAX_ELEMENTS);
        let first = rendered.lines().next().unwrap();
        assert!(first.starts_with("1. <button> text=\""));
        assert!(first.contains(&"y".repeat(ELEMENT_TEXT_CHARS)));
        assert!(!first.contains(&"y".repeat(ELEMENT_TEXT_CHARS + 1)));
        assert!(first.contains("type=\"submit\" (disabled) selector=\"#b0\""));
        assert_eq!(format_elements(&[]), "No interactive elements found");
    }

    #[test]
    fn payload_carries_failure_context() {
        let state = ObservedState {
            ordinal: Some(4),
            title: Some("Scroll Reveal".into()),
            progress_label: Some("4 of 30".into()),
            ..Default::default()
        };
        let context = FailureContext {
            consecutive_failures: 2,
            recent: (0..7)
                .map(|i| ActionOutcome::new(&Action::click(format!("#b{i}")), i % 2 == 0))
                .collect(),
        };
        let text = "z".repeat(PAGE_TEXT_CHARS + 100);
        let payload = build_text_payload(&state, &text, &[], &context);

        assert!(payload.contains("Challenge #4: Scroll Reveal"));
        assert!(payload.contains("Progress: 4 of 30"));
        assert!(payload.contains("Consecutive failed actions on this challenge: 2"));
        assert!(!payload.contains("#b1 "));
        assert!(payload.contains("- click | #b6 |  -> ok"));
        assert!(payload.contains("- click | #b5 |  -> FAILED"));
        assert!(!payload.contains(&"z".repeat(PAGE_TEXT_CHARS + 1)));
    }

    #[tokio::test]
    async fn text_mode_round_trip() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r##"{"action":"click","selector":"#start"}"##,
        ]));
        let engine = DecisionEngine::new(provider.clone(), "mock-model");
        let action = engine
            .decide_text(&ObservedState::default(), "Press start", &[], &FailureContext::default())
            .await
            .unwrap();
        assert_eq!(action, Action::click("#start"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].content, SYSTEM_PROMPT);
        assert!(requests[0].messages[1].content.contains("Press start"));
        assert!(!requests[0].has_images());
    }

    #[tokio::test]
    async fn text_mode_degrades_instead_of_failing() {
        let provider = Arc::new(SequentialMockProvider::texts(&["just click somewhere"]));
        let engine = DecisionEngine::new(provider, "mock-model");
        let action = engine
            .decide_text(&ObservedState::default(), "", &[], &FailureContext::default())
            .await
            .unwrap();
        assert_eq!(action.kind, ActionKind::Click);
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let provider = Arc::new(SequentialMockProvider::failing(ProviderError::Network(
            "connection refused".into(),
        )));
        let engine = DecisionEngine::new(provider, "mock-model");
        let result = engine
            .decide_text(&ObservedState::default(), "", &[], &FailureContext::default())
            .await;
        assert!(matches!(result, Err(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn vision_mode_sends_png() {
        let provider = Arc::new(
            SequentialMockProvider::texts(&[r#"{"action":"click","selector":"Next"}"#]).with_vision(),
        );
        let engine = DecisionEngine::new(provider.clone(), "mock-model");
        let action = engine
            .decide_vision(&ObservedState::default(), &[0x89, b'P', b'N', b'G'])
            .await
            .unwrap();
        assert_eq!(action.target.as_deref(), Some("Next"));

        let request = &provider.requests()[0];
        let image = &request.messages[1].attachments[0];
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.data, "iVBORw==");
    }

    #[tokio::test]
    async fn vision_parse_failure_waits() {
        let provider = Arc::new(SequentialMockProvider::texts(&["click the thing"]).with_vision());
        let engine = DecisionEngine::new(provider, "mock-model");
        let action = engine.decide_vision(&ObservedState::default(), b"png").await.unwrap();
        assert_eq!(action.kind, ActionKind::Wait);
        assert!(action.rationale.starts_with("vision fallback failed"));
    }

    #[tokio::test]
    async fn vision_without_support_waits_without_calling() {
        let provider = Arc::new(SequentialMockProvider::texts(&[]));
        let engine = DecisionEngine::new(provider.clone(), "mock-model");
        let action = engine.decide_vision(&ObservedState::default(), b"png").await.unwrap();
        assert_eq!(action.kind, ActionKind::Wait);
        assert!(action.rationale.contains("does not accept images"));
        assert_eq!(provider.call_count(), 0);
    }
}
