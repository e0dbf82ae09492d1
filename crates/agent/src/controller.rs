//! ProgressionController — drives one run from page load to the last ordinal.
//!
//! ```text
//! LOADING ──► SOLVING ◄──► TRANSITIONING
//!                │
//!                ├──► COMPLETE   (completion signal at the last ordinal)
//!                └──► EXHAUSTED  (ordinals ran out without a completion signal)
//! any state ──► ABORTED          (deadline or fatal error)
//! ```
//!
//! Each SOLVING iteration runs strictly in order: deadline check, settle,
//! sweep, observe, ordinal bookkeeping, hidden-code shortcut, success
//! auto-advance, completion check, decide, execute, escalation.

use std::time::Duration;

use gauntlet_config::RunConfig;
use gauntlet_core::action::Action;
use gauntlet_core::environment::Environment;
use gauntlet_core::error::{Error, Result};
use gauntlet_core::observation::ObservedState;
use gauntlet_core::session::{ChallengeOutcome, RunSession, StallCounters};
use gauntlet_core::text::truncate_chars;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::decision::{ActionOutcome, DecisionEngine, FailureContext};
use crate::executor::{ActionExecutor, loading_selector};
use crate::observer::{Observation, StateObserver};
use crate::sweeper::ObstructionSweeper;

/// Tried when a success signal shows up, before deciding.
pub const SUCCESS_ADVANCE: &[&str] = &[
    "Advance",
    "Next Section",
    "Move On",
    "Keep Going",
    "Proceed",
    "Next",
    "Continue",
];

/// Tried when the oracle answers `done`.
pub const DONE_ADVANCE: &[&str] = &[
    "Advance",
    "Next Section",
    "Move On",
    "Keep Going",
    "Proceed",
    "Next",
    "Continue",
    "Submit",
    "OK",
    "Go",
    "Forward",
];

/// Tried before a forced advance.
pub const EMERGENCY_ADVANCE: &[&str] = &["Next", "Advance", "Skip", "Continue", "Proceed"];

/// Label of the control that starts the sequence on a fresh session.
pub const START_LABEL: &str = "START";

/// Field the hidden-attribute code is typed into.
pub const HIDDEN_CODE_INPUT: &str = "input[placeholder*='code' i]";

pub const TIME_LIMIT_REASON: &str = "time limit exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Solving,
    Transitioning,
    Complete,
    Exhausted,
    Aborted,
}

/// Settle delays between steps. Defaults follow the pacing of the target
/// site; tests may shorten them.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub iteration_settle: Duration,
    pub after_action: Duration,
    pub after_forced_advance: Duration,
    pub after_shortcut: Duration,
    pub success_click: Duration,
    pub done_click: Duration,
    pub emergency_click: Duration,
    pub start_click: Duration,
    pub stable_wait: Duration,
    pub loading_wait: Duration,
    pub navigation: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            iteration_settle: Duration::from_millis(500),
            after_action: Duration::from_millis(300),
            after_forced_advance: Duration::from_millis(1000),
            after_shortcut: Duration::from_millis(500),
            success_click: Duration::from_millis(500),
            done_click: Duration::from_millis(1000),
            emergency_click: Duration::from_millis(1000),
            start_click: Duration::from_millis(5000),
            stable_wait: Duration::from_millis(2000),
            loading_wait: Duration::from_millis(5000),
            navigation: Duration::from_millis(30_000),
        }
    }
}

/// Owns the run: session bookkeeping, stall counters and the page handle.
pub struct ProgressionController<'a> {
    env: &'a dyn Environment,
    engine: DecisionEngine,
    observer: StateObserver,
    executor: ActionExecutor,
    sweeper: ObstructionSweeper,
    config: RunConfig,
    pacing: Pacing,
    session: RunSession,
    phase: Phase,
    ordinal: u32,
    last_seen: Option<u32>,
    counters: StallCounters,
    history: Vec<ActionOutcome>,
}

impl<'a> ProgressionController<'a> {
    pub fn new(env: &'a dyn Environment, engine: DecisionEngine, config: RunConfig) -> Self {
        Self {
            env,
            engine,
            observer: StateObserver::new(config.max_challenges),
            executor: ActionExecutor::new(),
            sweeper: ObstructionSweeper::new(),
            session: RunSession::new(config.max_challenges),
            config,
            pacing: Pacing::default(),
            phase: Phase::Loading,
            ordinal: 1,
            last_seen: None,
            counters: StallCounters::new(),
            history: Vec::new(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.pacing.navigation = timeout;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn session(&self) -> &RunSession {
        &self.session
    }

    pub fn into_session(self) -> RunSession {
        self.session
    }

    /// Run to completion, deadline or fatal error. The session is finalized
    /// exactly once on every path; fatal errors are returned after that.
    pub async fn run(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.timeout();
        info!(
            target_url = %self.config.target_url,
            timeout_secs = self.config.timeout_secs,
            "Starting run"
        );

        let result = self.drive(deadline).await;
        if let Err(e) = &result {
            warn!(error = %e, "Run aborted by fatal error");
            self.abort(e.to_string());
        }
        info!(status = %self.session.status_line(), "Run finished");
        result
    }

    async fn drive(&mut self, deadline: Instant) -> Result<()> {
        self.load().await?;
        self.phase = Phase::Solving;

        while self.ordinal <= self.config.max_challenges {
            if Instant::now() >= deadline {
                warn!(ordinal = self.ordinal, "Time limit exceeded");
                self.abort(TIME_LIMIT_REASON.into());
                return Ok(());
            }
            if self.iterate().await? {
                return Ok(());
            }
        }

        info!(ordinal = self.ordinal, "Ran out of challenges without a completion screen");
        self.session.finalize(None);
        self.phase = Phase::Exhausted;
        Ok(())
    }

    async fn load(&mut self) -> Result<()> {
        let url = self.config.target_url.clone();
        info!(url = %url, "Navigating");
        self.env.navigate(&url, self.pacing.navigation).await?;
        self.settle_until_stable(self.pacing.stable_wait).await;
        if let Err(e) = self
            .env
            .wait_for_hidden(&loading_selector(), self.pacing.loading_wait)
            .await
        {
            debug!(error = %e, "Loading indicators still visible after load");
        }

        if self.sweeper.sweep(self.env).await > 0 {
            sleep(Duration::from_millis(500)).await;
        }

        match self.env.click_text(START_LABEL, self.pacing.start_click).await {
            Ok(()) => {
                info!("Clicked start; challenges beginning");
                self.settle_until_stable(self.pacing.stable_wait).await;
                sleep(Duration::from_millis(1000)).await;
            }
            Err(e) => debug!(error = %e, "No start control; assuming the sequence is underway"),
        }
        Ok(())
    }

    /// One SOLVING iteration. Returns `true` once the run is over.
    async fn iterate(&mut self) -> Result<bool> {
        self.settle_until_stable(self.pacing.iteration_settle).await;
        self.sweeper.sweep(self.env).await;

        let observation = self.observer.observe(self.env).await;
        let state = &observation.state;
        self.track_ordinal(state);

        if self.try_hidden_code(state).await {
            if let Some(reason) = self.stall_reason() {
                self.force_advance(reason).await;
                return Ok(false);
            }
            sleep(self.pacing.after_shortcut).await;
            return Ok(false);
        }

        if state.success_signal {
            info!(ordinal = self.ordinal, "Success signal");
            if self.config.auto_advance_on_success
                && let Some(label) = self.click_first(SUCCESS_ADVANCE, self.pacing.success_click).await
            {
                debug!(label, "Auto-advanced after success");
                self.settle_until_stable(Duration::from_millis(500)).await;
            }
        }
        if state.error_signal {
            warn!(ordinal = self.ordinal, "Error signal; the last answer may be wrong");
        }

        if state.completion_signal && self.ordinal >= self.config.max_challenges {
            info!("All challenges completed");
            self.session.close_current(ChallengeOutcome::Succeeded);
            self.session.finalize(None);
            self.phase = Phase::Complete;
            return Ok(true);
        }

        let action = self.decide(&observation).await?;
        debug!(
            ordinal = self.ordinal,
            action = %action.kind,
            subject = action.target.as_deref().or(action.value.as_deref()).unwrap_or(""),
            why = truncate_chars(&action.rationale, 50),
            "Decided"
        );

        if action.is_done() {
            self.transition().await;
        } else {
            let ok = self.executor.execute(self.env, &action).await;
            self.session.record_action();
            self.counters.record_outcome(ok);
            self.history.push(ActionOutcome::new(&action, ok));
            if !ok {
                warn!(
                    ordinal = self.ordinal,
                    consecutive = self.counters.consecutive_failures,
                    "Action failed"
                );
            }
        }

        if let Some(reason) = self.stall_reason() {
            self.force_advance(reason).await;
            return Ok(false);
        }

        sleep(self.pacing.after_action).await;
        Ok(false)
    }

    /// Fold a detected ordinal into the current one. Never moves backwards.
    fn track_ordinal(&mut self, state: &ObservedState) {
        let effective = state.ordinal.map_or(self.ordinal, |n| n.max(self.ordinal));
        if self.last_seen == Some(effective) {
            return;
        }
        if let Some(previous) = self.last_seen
            && self.session.close_current(ChallengeOutcome::Succeeded)
        {
            info!(ordinal = previous, "Challenge completed");
        }
        self.begin(effective);
        match &state.progress_label {
            Some(progress) => info!(ordinal = effective, progress = %progress, "Starting challenge"),
            None => info!(ordinal = effective, "Starting challenge"),
        }
    }

    fn begin(&mut self, ordinal: u32) {
        self.ordinal = ordinal;
        self.last_seen = Some(ordinal);
        self.session.open_challenge(ordinal);
        self.counters = StallCounters::new();
        self.history.clear();
        self.phase = Phase::Solving;
    }

    /// Type the attribute code straight into the code field, once per
    /// challenge. Returns whether it was entered.
    async fn try_hidden_code(&mut self, state: &ObservedState) -> bool {
        let Some(code) = state.hidden_code.as_deref() else {
            return false;
        };
        if self.counters.hidden_shortcut_tried {
            return false;
        }
        self.counters.hidden_shortcut_tried = true;
        info!(ordinal = self.ordinal, "Hidden attribute code found; entering it directly");

        let action = Action::type_into(HIDDEN_CODE_INPUT, code).because("hidden attribute code");
        let t = self.executor.interaction_timeout;
        let filled = match self.env.fill(HIDDEN_CODE_INPUT, code, t).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Code field not found; trying the first input");
                self.env.fill_first_visible(code, t).await.is_ok()
            }
        };
        if !filled {
            warn!(ordinal = self.ordinal, "Could not enter hidden code; asking the oracle");
            return false;
        }
        if let Err(e) = self.env.press_key("Enter").await {
            debug!(error = %e, "Enter after hidden code failed");
        }
        self.session.record_action();
        self.counters.actions_this_challenge += 1;
        self.history.push(ActionOutcome::new(&action, true));
        true
    }

    async fn decide(&mut self, observation: &Observation) -> Result<Action> {
        let state = &observation.state;
        let vision = self.config.use_vision_fallback
            && self.counters.text_failure_streak >= self.config.vision_fallback_threshold;

        let action = if vision {
            info!(
                ordinal = self.ordinal,
                streak = self.counters.text_failure_streak,
                "Using vision fallback"
            );
            match self.env.snapshot_png().await {
                Ok(png) => self.engine.decide_vision(state, &png).await?,
                Err(e) => {
                    warn!(error = %e, "Snapshot failed");
                    Action::wait(format!("snapshot capture failed: {e}"))
                }
            }
        } else {
            let elements = self.env.interactive_elements().await.unwrap_or_else(|e| {
                debug!(error = %e, "Element listing failed");
                Vec::new()
            });
            let context = FailureContext {
                consecutive_failures: self.counters.consecutive_failures,
                recent: self.history.clone(),
            };
            self.engine
                .decide_text(state, &observation.visible_text, &elements, &context)
                .await
                .map_err(Error::from)?
        };
        self.session.record_decision();
        Ok(action)
    }

    async fn transition(&mut self) {
        self.phase = Phase::Transitioning;
        if let Some(label) = self.click_first(DONE_ADVANCE, self.pacing.done_click).await {
            debug!(label, "Clicked to advance");
        }
        self.settle_until_stable(self.pacing.stable_wait).await;
        self.phase = Phase::Solving;
    }

    fn stall_reason(&self) -> Option<String> {
        let c = &self.counters;
        if c.consecutive_failures >= self.config.max_consecutive_failures {
            return Some("max consecutive failures".into());
        }
        if c.actions_this_challenge >= self.config.max_actions_per_challenge {
            return Some("max actions per challenge".into());
        }
        if self.ordinal == 1 && c.elapsed() > self.config.first_challenge_stall() {
            return Some(format!(
                "stalled on first challenge for {}s",
                c.elapsed().as_secs()
            ));
        }
        None
    }

    /// Mark the challenge failed, try to move the page on, and step the
    /// ordinal by exactly one.
    async fn force_advance(&mut self, reason: String) {
        warn!(ordinal = self.ordinal, reason = %reason, "Forcing advance");
        self.session.close_current(ChallengeOutcome::Failed(reason));
        if let Some(label) = self.click_first(EMERGENCY_ADVANCE, self.pacing.emergency_click).await {
            debug!(label, "Emergency click");
        }

        let next = self.ordinal + 1;
        if next <= self.config.max_challenges {
            self.begin(next);
        } else {
            self.ordinal = next;
            self.last_seen = Some(next);
        }
        sleep(self.pacing.after_forced_advance).await;
    }

    /// Click the first label that exists; `None` when none did.
    async fn click_first(&self, labels: &[&'static str], timeout: Duration) -> Option<&'static str> {
        for label in labels {
            if self.env.click_text(label, timeout).await.is_ok() {
                return Some(*label);
            }
        }
        None
    }

    async fn settle_until_stable(&self, timeout: Duration) {
        if let Err(e) = self.env.wait_for_stable(timeout).await {
            debug!(error = %e, "Stability wait failed");
        }
    }

    fn abort(&mut self, reason: String) {
        if self.session.finalize(Some(reason)) {
            self.phase = Phase::Aborted;
        }
    }
}
