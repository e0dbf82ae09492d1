//! Turns the current page into an [`ObservedState`].
//!
//! Observation is read-only and never fails: an introspection error degrades
//! to an empty snapshot (`ordinal = None`, every signal false) and the cycle
//! carries on with the last known ordinal.

use std::sync::LazyLock;

use gauntlet_core::environment::Environment;
use gauntlet_core::observation::ObservedState;
use gauntlet_core::text::{contains_any, truncate_chars};
use regex_lite::Regex;
use tracing::debug;

/// Characters of visible text kept in [`ObservedState::description_excerpt`].
pub const EXCERPT_CHARS: usize = 500;

const SUCCESS_WORDS: &[&str] = &["correct", "success", "well done", "great job", "✓", "✔", "passed"];
const ERROR_WORDS: &[&str] = &["incorrect", "wrong", "try again", "error", "✗", "✘", "failed"];
const COMPLETION_WORDS: &[&str] = &["completed", "all challenges", "congratulations", "finished all"];

/// Marker attribute carrying the answer of the hidden-attribute challenge.
pub const HIDDEN_CODE_ATTRIBUTE: &str = "data-challenge-code";

static STEP_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)step\s+(\d+)\s+of\s+(\d+)").expect("step regex"));
static LEADING_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^(\d+)\s*(?:of|/)\s*(\d+)").expect("progress regex"));
static NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:challenge|task|level|question)\s*[#:]?\s*(\d+)").expect("named regex")
});
static PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\s*(?:of|/)\s*\d+)").expect("progress label regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h[12][^>]*>([^<]+)</h[12]>").expect("heading regex"));
static HIDDEN_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-challenge-code\s*=\s*["']([^"']+)["']"#).expect("hidden code regex")
});

/// What one observation produced: the snapshot plus the full visible text,
/// which the decision payload needs beyond the excerpt.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub state: ObservedState,
    pub visible_text: String,
}

/// Reads challenge state from page content.
#[derive(Debug, Clone)]
pub struct StateObserver {
    total: u32,
}

impl StateObserver {
    /// `total` is the number of challenges in the sequence; ordinal phrasing
    /// such as "step 4 of 30" only counts when its denominator matches.
    pub fn new(total: u32) -> Self {
        Self { total }
    }

    pub async fn observe(&self, env: &dyn Environment) -> Observation {
        let visible_text = match env.visible_text().await {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "Visible text unavailable; using empty observation");
                return Observation::default();
            }
        };
        let markup = env.markup().await.unwrap_or_else(|e| {
            debug!(error = %e, "Markup unavailable");
            String::new()
        });
        Observation {
            state: self.from_content(&visible_text, &markup),
            visible_text,
        }
    }

    /// Pure classification of already-fetched page content.
    pub fn from_content(&self, text: &str, markup: &str) -> ObservedState {
        let lower = text.to_lowercase();
        // "incorrect" and "unsuccessful" would otherwise read as success.
        let success_scope = lower.replace("incorrect", "").replace("unsuccessful", "");
        let terminal = [
            format!("{0}/{0}", self.total),
            format!("{0} of {0}", self.total),
        ];

        ObservedState {
            ordinal: self.detect_ordinal(text),
            title: HEADING
                .captures(markup)
                .map(|c| c[1].trim().to_string())
                .filter(|t| !t.is_empty()),
            description_excerpt: truncate_chars(text, EXCERPT_CHARS).to_string(),
            success_signal: contains_any(&success_scope, SUCCESS_WORDS),
            error_signal: contains_any(&lower, ERROR_WORDS),
            completion_signal: contains_any(&lower, COMPLETION_WORDS)
                || terminal.iter().any(|t| lower.contains(t.as_str())),
            progress_label: PROGRESS.captures(text).map(|c| c[1].to_string()),
            hidden_code: hidden_code(text, markup),
        }
    }

    /// First match wins: "step N of T", then a line starting "N of T" or
    /// "N/T", then "challenge #N" and friends.
    fn detect_ordinal(&self, text: &str) -> Option<u32> {
        ordinal_with_total(&STEP_OF, text, self.total)
            .or_else(|| ordinal_with_total(&LEADING_OF, text, self.total))
            .or_else(|| NAMED.captures(text).and_then(|c| c[1].parse().ok()))
            .filter(|n| *n >= 1)
    }
}

/// First `N` from an `N ... T` pattern whose `T` equals `total`.
fn ordinal_with_total(re: &Regex, text: &str, total: u32) -> Option<u32> {
    re.captures_iter(text).find_map(|c| {
        let found: u32 = c[2].parse().ok()?;
        if found == total { c[1].parse().ok() } else { None }
    })
}

/// The hidden-attribute code, when the page presents that archetype and the
/// attribute is actually in the markup.
fn hidden_code(text: &str, markup: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if !(lower.contains("hidden dom") || lower.contains(HIDDEN_CODE_ATTRIBUTE)) {
        return None;
    }
    HIDDEN_CODE
        .captures(markup)
        .map(|c| c[1].trim().to_string())
        .filter(|code| !code.is_empty())
}
