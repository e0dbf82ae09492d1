//! ActionExecutor — applies one [`Action`] to the page.
//!
//! Click, type and select are fallback ladders: an ordered list of independent
//! strategies, each a boxed future that only runs when reached. The first one
//! that succeeds wins. Nothing here raises; every outcome is folded into the
//! returned `bool`.

use std::time::Duration;

use futures::future::BoxFuture;
use gauntlet_core::action::{Action, ActionKind};
use gauntlet_core::environment::Environment;
use gauntlet_core::error::EnvironmentError;
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Selectors for loading indicators the executor and the controller wait out.
pub const LOADING_INDICATORS: &[&str] = &[
    ".loading",
    ".spinner",
    "[class*='load']",
    "[class*='spin']",
    "[aria-busy='true']",
    ".skeleton",
    "[class*='skeleton']",
];

pub fn loading_selector() -> String {
    LOADING_INDICATORS.join(", ")
}

/// Scroll distance used when the action carries no usable number.
pub const DEFAULT_SCROLL_PX: i64 = 500;

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("quoted hint regex"));

/// The quoted text inside a selector such as `button:has-text("Submit")`.
pub fn text_hint(selector: &str) -> Option<String> {
    QUOTED
        .captures(selector)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

type Strategy<'a> = (&'static str, BoxFuture<'a, Result<(), EnvironmentError>>);

/// Run strategies in order until one succeeds.
async fn first_success(what: &str, strategies: Vec<Strategy<'_>>) -> bool {
    for (name, attempt) in strategies {
        match attempt.await {
            Ok(()) => {
                debug!(strategy = name, "{what} succeeded");
                return true;
            }
            Err(e) => debug!(strategy = name, error = %e, "{what} strategy failed"),
        }
    }
    false
}

/// Timeouts and settle delays used while executing actions.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    pub interaction_timeout: Duration,
    pub scroll_settle: Duration,
    pub stable_timeout: Duration,
    pub loading_timeout: Duration,
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self {
            interaction_timeout: Duration::from_millis(3000),
            scroll_settle: Duration::from_millis(300),
            stable_timeout: Duration::from_millis(1000),
            loading_timeout: Duration::from_millis(2000),
        }
    }
}

impl ActionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `action`. `true` means some strategy completed without error.
    pub async fn execute(&self, env: &dyn Environment, action: &Action) -> bool {
        let target = action.target.as_deref();
        let value = action.value.as_deref();
        match action.kind {
            ActionKind::Click => match target {
                Some(selector) => self.click(env, selector).await,
                None => true,
            },
            ActionKind::Type => match (target, value) {
                (Some(selector), Some(value)) => self.type_into(env, selector, value).await,
                _ => true,
            },
            ActionKind::Select => match (target, value) {
                (Some(selector), Some(value)) => self.select(env, selector, value).await,
                _ => true,
            },
            ActionKind::PressKey => {
                if let Some(key) = value
                    && let Err(e) = env.press_key(key).await
                {
                    debug!(key, error = %e, "Key press failed");
                }
                true
            }
            ActionKind::Scroll => self.scroll(env, value).await,
            ActionKind::Wait => {
                self.wait(env).await;
                true
            }
            ActionKind::Done => true,
        }
    }

    async fn click(&self, env: &dyn Environment, selector: &str) -> bool {
        let t = self.interaction_timeout;
        let mut ladder: Vec<Strategy<'_>> = vec![("selector", env.click(selector, t))];
        if let Some(hint) = text_hint(selector) {
            let role_name = hint.clone();
            ladder.push(("text", Box::pin(async move { env.click_text(&hint, t).await })));
            ladder.push((
                "role",
                Box::pin(async move { env.click_role("button", &role_name, t).await }),
            ));
        }
        let ok = first_success("click", ladder).await;
        if !ok {
            warn!(selector, "Every click strategy failed");
        }
        ok
    }

    async fn type_into(&self, env: &dyn Environment, selector: &str, value: &str) -> bool {
        let t = self.interaction_timeout;
        let mut ladder: Vec<Strategy<'_>> = vec![("selector", env.fill(selector, value, t))];
        if !selector.starts_with('#') && !selector.starts_with('.') {
            ladder.push(("placeholder", env.fill_by_placeholder(selector, value, t)));
        }
        ladder.push(("first input", env.fill_first_visible(value, t)));

        if !first_success("fill", ladder).await {
            warn!(selector, "Every fill strategy failed");
            return false;
        }
        if let Err(e) = env.press_key("Enter").await {
            debug!(error = %e, "Enter after fill failed; ignoring");
        }
        true
    }

    async fn select(&self, env: &dyn Environment, selector: &str, value: &str) -> bool {
        let t = self.interaction_timeout;
        first_success(
            "select",
            vec![
                ("value", env.select_option(selector, value, t)),
                ("label", env.select_option_by_label(selector, value, t)),
            ],
        )
        .await
    }

    async fn scroll(&self, env: &dyn Environment, value: Option<&str>) -> bool {
        let result = match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("bottom") => env.scroll_to_bottom().await,
            Some(v) => env.scroll_by(v.parse().unwrap_or(DEFAULT_SCROLL_PX)).await,
            None => env.scroll_by(DEFAULT_SCROLL_PX).await,
        };
        tokio::time::sleep(self.scroll_settle).await;
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Scroll failed");
                false
            }
        }
    }

    /// Let the page settle, then wait out loading indicators. Best effort.
    pub async fn wait(&self, env: &dyn Environment) {
        if let Err(e) = env.wait_for_stable(self.stable_timeout).await {
            debug!(error = %e, "Stability wait failed");
        }
        if let Err(e) = env
            .wait_for_hidden(&loading_selector(), self.loading_timeout)
            .await
        {
            debug!(error = %e, "Loading indicators still visible");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedPage;

    fn executor() -> ActionExecutor {
        ActionExecutor::new()
    }

    #[test]
    fn text_hint_extraction() {
        assert_eq!(text_hint(r#"button:has-text("Submit")"#).as_deref(), Some("Submit"));
        assert_eq!(text_hint("button:has-text('Go On')").as_deref(), Some("Go On"));
        assert_eq!(text_hint("#submit"), None);
    }

    #[tokio::test]
    async fn click_uses_selector_first() {
        let page = ScriptedPage::new("");
        assert!(executor().execute(&page, &Action::click("#go")).await);
        assert_eq!(page.calls(), vec!["click #go"]);
    }

    #[tokio::test]
    async fn click_falls_back_to_text_then_role() {
        let page = ScriptedPage::new("")
            .failing(r#"button:has-text("Reveal")"#)
            .failing("text:Reveal");
        let action = Action::click(r#"button:has-text("Reveal")"#);
        assert!(executor().execute(&page, &action).await);
        assert_eq!(
            page.calls(),
            vec![
                r#"click button:has-text("Reveal")"#,
                "click_text Reveal",
                "click_role button Reveal",
            ]
        );
    }

    #[tokio::test]
    async fn click_without_hint_has_one_strategy() {
        let page = ScriptedPage::new("").failing("#gone");
        assert!(!executor().execute(&page, &Action::click("#gone")).await);
        assert_eq!(page.calls(), vec!["click #gone"]);
    }

    #[tokio::test]
    async fn click_without_target_is_a_no_op() {
        let page = ScriptedPage::new("");
        assert!(executor().execute(&page, &Action::new(ActionKind::Click)).await);
        assert!(page.calls().is_empty());
    }

    #[tokio::test]
    async fn type_fills_then_presses_enter() {
        let page = ScriptedPage::new("");
        assert!(executor().execute(&page, &Action::type_into("#code", "123456")).await);
        assert_eq!(page.calls(), vec!["fill #code=123456", "press Enter"]);
    }

    #[tokio::test]
    async fn id_selector_skips_placeholder_lookup() {
        let page = ScriptedPage::new("").failing("#code").failing("input");
        assert!(!executor().execute(&page, &Action::type_into("#code", "123456")).await);
        assert_eq!(
            page.calls(),
            vec!["fill #code=123456", "fill_first_visible 123456"]
        );
    }

    #[tokio::test]
    async fn placeholder_lookup_for_plain_text_selector() {
        let page = ScriptedPage::new("").failing("Enter code");
        assert!(
            executor()
                .execute(&page, &Action::type_into("Enter code", "XYZ"))
                .await
        );
        assert_eq!(
            page.calls(),
            vec![
                "fill Enter code=XYZ",
                "fill_by_placeholder Enter code=XYZ",
                "press Enter",
            ]
        );
    }

    #[tokio::test]
    async fn failed_enter_does_not_fail_typing() {
        let page = ScriptedPage::new("").failing("key:Enter");
        assert!(executor().execute(&page, &Action::type_into("#code", "1")).await);
    }

    #[tokio::test]
    async fn select_retries_by_label() {
        let page = ScriptedPage::new("").failing("option:Blue");
        let action = Action::new(ActionKind::Select).on("#color").with_value("Blue");
        assert!(executor().execute(&page, &action).await);
        assert_eq!(
            page.calls(),
            vec!["select #color=Blue", "select_label #color=Blue"]
        );
    }

    #[tokio::test]
    async fn press_key_always_succeeds() {
        let page = ScriptedPage::new("").failing("key:F13");
        let action = Action::new(ActionKind::PressKey).with_value("F13");
        assert!(executor().execute(&page, &action).await);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_values() {
        let page = ScriptedPage::new("");
        let exec = executor();
        let scroll = |v: Option<&str>| {
            let mut a = Action::new(ActionKind::Scroll);
            a.value = v.map(String::from);
            a
        };
        assert!(exec.execute(&page, &scroll(Some("bottom"))).await);
        assert!(exec.execute(&page, &scroll(Some("750"))).await);
        assert!(exec.execute(&page, &scroll(Some("a lot"))).await);
        assert!(exec.execute(&page, &scroll(None)).await);
        assert_eq!(
            page.calls(),
            vec!["scroll_to_bottom", "scroll_by 750", "scroll_by 500", "scroll_by 500"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_checks_stability_and_spinners() {
        let page = ScriptedPage::new("");
        assert!(executor().execute(&page, &Action::wait("page loading")).await);
        let calls = page.calls();
        assert_eq!(calls[0], "wait_for_stable");
        assert!(calls[1].starts_with("wait_for_hidden .loading, .spinner"));
    }

    #[tokio::test]
    async fn done_touches_nothing() {
        let page = ScriptedPage::new("");
        assert!(executor().execute(&page, &Action::new(ActionKind::Done)).await);
        assert!(page.calls().is_empty());
    }
}
