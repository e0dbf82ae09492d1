//! The single action produced per decision cycle.

use serde::{Deserialize, Serialize};

/// What kind of interaction an [`Action`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Type,
    Select,
    PressKey,
    Scroll,
    Wait,
    /// The oracle believes the challenge is solved; no page interaction.
    Done,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Click,
        ActionKind::Type,
        ActionKind::Select,
        ActionKind::PressKey,
        ActionKind::Scroll,
        ActionKind::Wait,
        ActionKind::Done,
    ];

    /// Wire name used in the oracle contract.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Select => "select",
            ActionKind::PressKey => "press_key",
            ActionKind::Scroll => "scroll",
            ActionKind::Wait => "wait",
            ActionKind::Done => "done",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ActionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown action kind '{s}'"))
    }
}

/// One decision: produced once by the decision engine, consumed once by the
/// executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,

    /// Selector or text hint identifying the element to act on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Text to type, option to select, key to press, or scroll distance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    pub rationale: String,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            target: None,
            value: None,
            rationale: String::new(),
        }
    }

    pub fn wait(rationale: impl Into<String>) -> Self {
        Self::new(ActionKind::Wait).because(rationale)
    }

    pub fn click(target: impl Into<String>) -> Self {
        Self::new(ActionKind::Click).on(target)
    }

    pub fn type_into(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ActionKind::Type).on(target).with_value(value)
    }

    pub fn on(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn because(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn is_done(&self) -> bool {
        self.kind == ActionKind::Done
    }

    /// Short human-readable form for logs: `kind | target-or-value | rationale…`.
    pub fn summary(&self) -> String {
        let subject = self
            .target
            .as_deref()
            .or(self.value.as_deref())
            .unwrap_or("");
        let why = crate::text::truncate_chars(&self.rationale, 50);
        format!("{} | {} | {}", self.kind, subject, why)
    }
}
