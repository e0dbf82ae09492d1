//! Run bookkeeping: one [`RunSession`] per invocation, one
//! [`ChallengeRecord`] per challenge ordinal seen, and the per-challenge
//! [`StallCounters`] that drive escalation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

/// How a challenge ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ChallengeOutcome {
    Pending,
    Succeeded,
    Failed(String),
}

/// Bookkeeping for one challenge ordinal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub ordinal: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub actions_taken: u32,
    pub decision_calls: u32,
    pub outcome: ChallengeOutcome,
}

impl ChallengeRecord {
    fn open(ordinal: u32) -> Self {
        Self {
            ordinal,
            started_at: Utc::now(),
            ended_at: None,
            actions_taken: 0,
            decision_calls: 0,
            outcome: ChallengeOutcome::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == ChallengeOutcome::Pending
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == ChallengeOutcome::Succeeded
    }

    /// Failure reason, if the challenge failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ChallengeOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Wall-clock duration in milliseconds; 0 while still pending.
    pub fn duration_ms(&self) -> i64 {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or(0)
    }
}

/// Process-scoped record of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSession {
    pub id: String,
    /// Number of challenges the run is expected to clear.
    pub target: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub challenges: Vec<ChallengeRecord>,
    pub completed_count: u32,
    pub aborted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl RunSession {
    pub fn new(target: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target,
            started_at: Utc::now(),
            ended_at: None,
            challenges: Vec::new(),
            completed_count: 0,
            aborted: false,
            abort_reason: None,
        }
    }

    /// The pending record, if any. At most one record is pending at a time.
    pub fn current(&self) -> Option<&ChallengeRecord> {
        self.challenges.last().filter(|r| r.is_pending())
    }

    pub fn current_mut(&mut self) -> Option<&mut ChallengeRecord> {
        self.challenges.last_mut().filter(|r| r.is_pending())
    }

    /// Open a record for `ordinal`. Any record still pending is closed as
    /// failed first so at most one record is ever pending.
    pub fn open_challenge(&mut self, ordinal: u32) -> &mut ChallengeRecord {
        if let Some(stale) = self.current().map(|r| r.ordinal) {
            warn!(ordinal = stale, "Opening a new challenge while one is pending");
            self.close_current(ChallengeOutcome::Failed("superseded".into()));
        }
        self.challenges.push(ChallengeRecord::open(ordinal));
        let last = self.challenges.len() - 1;
        &mut self.challenges[last]
    }

    /// Close the pending record with `outcome`. Returns `false` when nothing
    /// was pending. `completed_count` only moves on `Succeeded`.
    pub fn close_current(&mut self, outcome: ChallengeOutcome) -> bool {
        if outcome == ChallengeOutcome::Pending {
            return false;
        }
        let Some(record) = self.current_mut() else {
            return false;
        };
        record.ended_at = Some(Utc::now());
        let succeeded = outcome == ChallengeOutcome::Succeeded;
        record.outcome = outcome;
        if succeeded {
            self.completed_count += 1;
        }
        true
    }

    pub fn record_decision(&mut self) {
        if let Some(record) = self.current_mut() {
            record.decision_calls += 1;
        }
    }

    pub fn record_action(&mut self) {
        if let Some(record) = self.current_mut() {
            record.actions_taken += 1;
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Finalize the run exactly once. `abort_reason = Some(..)` marks the run
    /// aborted. A pending record is closed as failed. Later calls are ignored
    /// and return `false`.
    pub fn finalize(&mut self, abort_reason: Option<String>) -> bool {
        if self.is_finalized() {
            return false;
        }
        let pending_reason = abort_reason.clone().unwrap_or_else(|| "run ended".into());
        self.close_current(ChallengeOutcome::Failed(pending_reason));
        self.ended_at = Some(Utc::now());
        self.aborted = abort_reason.is_some();
        self.abort_reason = abort_reason;
        true
    }

    /// Number of challenges with a record.
    pub fn attempted(&self) -> usize {
        self.challenges.len()
    }

    pub fn duration_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }

    /// "completed N of target" or "aborted: reason".
    pub fn status_line(&self) -> String {
        match (&self.aborted, &self.abort_reason) {
            (true, Some(reason)) => format!(
                "aborted: {reason} (completed {} of {})",
                self.completed_count, self.target
            ),
            _ => format!("completed {} of {}", self.completed_count, self.target),
        }
    }
}

/// Per-challenge stall tracking. Replaced wholesale on every ordinal change.
#[derive(Debug, Clone)]
pub struct StallCounters {
    pub consecutive_failures: u32,
    /// Distrust of the text modality; decays by one per success.
    pub text_failure_streak: u32,
    pub actions_this_challenge: u32,
    pub challenge_started_at: Instant,
    pub hidden_shortcut_tried: bool,
}

impl StallCounters {
    pub fn new() -> Self {
        Self {
            consecutive_failures: 0,
            text_failure_streak: 0,
            actions_this_challenge: 0,
            challenge_started_at: Instant::now(),
            hidden_shortcut_tried: false,
        }
    }

    /// Fold one execution result into the counters.
    pub fn record_outcome(&mut self, success: bool) {
        self.actions_this_challenge += 1;
        if success {
            self.consecutive_failures = 0;
            self.text_failure_streak = self.text_failure_streak.saturating_sub(1);
        } else {
            self.consecutive_failures += 1;
            self.text_failure_streak += 1;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.challenge_started_at.elapsed()
    }
}

impl Default for StallCounters {
    fn default() -> Self {
        Self::new()
    }
}
