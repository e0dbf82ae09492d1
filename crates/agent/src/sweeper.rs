//! Dismisses banners and modals before each observation.

use std::time::Duration;

use gauntlet_core::environment::{ElementQuery, Environment};
use tracing::{debug, info};

/// Dismiss controls in descending specificity. Bare glyph buttons come last
/// and exclude step labels that happen to contain an "X".
pub fn dismiss_controls() -> Vec<ElementQuery> {
    let positioned = "button[style*='position: absolute'][style*='top'][style*='right']";
    let cornered = "button[class*='top-'][class*='right']";
    vec![
        ElementQuery::css("button.modal-close"),
        ElementQuery::css("button[class*='close']").containing("×"),
        ElementQuery::css("button[class*='close']").containing("X"),
        ElementQuery::css("button[aria-label*='close' i]"),
        ElementQuery::css("button[aria-label*='dismiss' i]"),
        ElementQuery::css(positioned).containing("×"),
        ElementQuery::css(positioned).containing("✕"),
        ElementQuery::css(positioned).containing("X"),
        ElementQuery::css("button.absolute").containing("×"),
        ElementQuery::css("button.absolute").containing("✕"),
        ElementQuery::css("button.absolute").containing("✖"),
        ElementQuery::css(cornered).containing("×"),
        ElementQuery::css(cornered).containing("X"),
        ElementQuery::css("button")
            .containing("×")
            .excluding("Step")
            .excluding("Challenge"),
        ElementQuery::css("button")
            .containing("✕")
            .excluding("Step")
            .excluding("Challenge"),
        ElementQuery::css("button").exact("×"),
        ElementQuery::css("button").exact("X"),
    ]
}

pub fn consent_control() -> ElementQuery {
    ElementQuery::css("button").containing("Accept")
}

#[derive(Debug, Clone)]
pub struct ObstructionSweeper {
    pub rounds: usize,
    pub click_timeout: Duration,
    pub consent_settle: Duration,
    pub dismiss_settle: Duration,
    controls: Vec<ElementQuery>,
}

impl Default for ObstructionSweeper {
    fn default() -> Self {
        Self {
            rounds: 3,
            click_timeout: Duration::from_millis(1000),
            consent_settle: Duration::from_millis(500),
            dismiss_settle: Duration::from_millis(300),
            controls: dismiss_controls(),
        }
    }
}

impl ObstructionSweeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dismiss what can be dismissed; returns how many overlays went away.
    /// A round that finds nothing ends the sweep.
    pub async fn sweep(&self, env: &dyn Environment) -> usize {
        let mut total = 0;
        for round in 0..self.rounds {
            let dismissed = self.round(env).await;
            total += dismissed;
            if dismissed == 0 {
                break;
            }
            debug!(round, dismissed, "Sweep round cleared overlays");
        }
        if total > 0 {
            info!(dismissed = total, "Dismissed overlays");
        }
        total
    }

    async fn round(&self, env: &dyn Environment) -> usize {
        let mut dismissed = 0;

        // Consent banners sit above everything else, so they go first.
        if self.try_click(env, &consent_control()).await {
            dismissed += 1;
            tokio::time::sleep(self.consent_settle).await;
        }

        for control in &self.controls {
            if self.try_click(env, control).await {
                dismissed += 1;
                tokio::time::sleep(self.dismiss_settle).await;
            }
        }
        dismissed
    }

    async fn try_click(&self, env: &dyn Environment, query: &ElementQuery) -> bool {
        match env.click_first_visible(query, self.click_timeout).await {
            Ok(clicked) => {
                if clicked {
                    debug!(control = %query, "Dismissed");
                }
                clicked
            }
            Err(e) => {
                debug!(control = %query, error = %e, "Dismiss attempt failed");
                false
            }
        }
    }
}
