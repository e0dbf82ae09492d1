//! The run report: a JSON document for later analysis and a printable
//! summary for the terminal.

use std::fmt::Write as _;
use std::path::Path;

use gauntlet_core::session::{ChallengeRecord, RunSession};
use gauntlet_telemetry::LlmStats;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-challenge line of the report.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeSummary {
    pub challenge: u32,
    pub duration_ms: i64,
    pub actions_taken: u32,
    pub llm_calls: u32,
    pub success: bool,
    pub error: Option<String>,
}

impl From<&ChallengeRecord> for ChallengeSummary {
    fn from(record: &ChallengeRecord) -> Self {
        Self {
            challenge: record.ordinal,
            duration_ms: record.duration_ms(),
            actions_taken: record.actions_taken,
            llm_calls: record.decision_calls,
            success: record.succeeded(),
            error: record.error().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_timestamp: String,
    pub total_duration_seconds: f64,
    pub total_duration_ms: i64,
    pub challenges_completed: u32,
    pub challenges_attempted: usize,
    pub aborted: bool,
    pub abort_reason: Option<String>,
    pub llm_stats: LlmStats,
    pub challenges: Vec<ChallengeSummary>,
    #[serde(skip)]
    target: u32,
}

impl RunReport {
    pub fn new(session: &RunSession, llm_stats: LlmStats) -> Self {
        let duration_ms = session.duration_ms();
        Self {
            run_timestamp: session.started_at.to_rfc3339(),
            total_duration_seconds: (duration_ms as f64 / 10.0).round() / 100.0,
            total_duration_ms: duration_ms,
            challenges_completed: session.completed_count,
            challenges_attempted: session.attempted(),
            aborted: session.aborted,
            abort_reason: session.abort_reason.clone(),
            llm_stats,
            challenges: session.challenges.iter().map(ChallengeSummary::from).collect(),
            target: session.target,
        }
    }

    /// 2 when aborted, 1 when short of the target, 0 on full success.
    pub fn exit_code(&self) -> i32 {
        if self.aborted {
            2
        } else if self.challenges_completed < self.target {
            1
        } else {
            0
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Human-readable summary: totals, status, usage, per-challenge lines and
    /// the five slowest challenges.
    pub fn render_summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "\n{rule}\nRUN SUMMARY\n{rule}");
        let _ = writeln!(
            out,
            "Total Time:        {:.2}s ({}ms)",
            self.total_duration_seconds, self.total_duration_ms
        );
        let _ = writeln!(
            out,
            "Challenges:        {}/{} completed",
            self.challenges_completed, self.challenges_attempted
        );
        let status = match (&self.aborted, &self.abort_reason) {
            (true, Some(reason)) => format!("ABORTED - {reason}"),
            (true, None) => "ABORTED".to_string(),
            _ => "FINISHED".to_string(),
        };
        let _ = writeln!(out, "Status:            {status}");

        let stats = &self.llm_stats;
        if stats.total_calls > 0 {
            let _ = writeln!(out, "\nLLM Usage:");
            let _ = writeln!(out, "  Total Calls:     {}", stats.total_calls);
            if stats.vision_calls > 0 {
                let _ = writeln!(out, "  Vision Calls:    {}", stats.vision_calls);
            }
            let _ = writeln!(out, "  Input Tokens:    {}", thousands(stats.total_input_tokens));
            let _ = writeln!(out, "  Output Tokens:   {}", thousands(stats.total_output_tokens));
            let _ = writeln!(out, "  Estimated Cost:  ${:.4}", stats.total_cost);
            if let Some(per) = stats.cost_per_challenge(self.challenges_completed) {
                let _ = writeln!(out, "  Cost/Challenge:  ${per:.4}");
            }
        }

        let _ = writeln!(out, "\nPer-Challenge Breakdown:");
        for c in &self.challenges {
            let mark = if c.success { "✓" } else { "✗" };
            let _ = writeln!(
                out,
                "  {mark} Challenge {}: {}ms, {} actions, {} LLM calls",
                c.challenge, c.duration_ms, c.actions_taken, c.llm_calls
            );
        }

        if !self.challenges.is_empty() {
            let mut slowest: Vec<&ChallengeSummary> = self.challenges.iter().collect();
            slowest.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));
            let _ = writeln!(out, "\nSlowest Challenges:");
            for c in slowest.iter().take(5) {
                let _ = writeln!(out, "  Challenge {}: {}ms", c.challenge, c.duration_ms);
            }
        }
        let _ = write!(out, "{rule}");
        out
    }
}

fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::session::ChallengeOutcome;

    fn session() -> RunSession {
        let mut session = RunSession::new(30);
        session.open_challenge(1);
        session.close_current(ChallengeOutcome::Succeeded);
        session.open_challenge(2);
        session.close_current(ChallengeOutcome::Failed("max consecutive failures".into()));
        session.open_challenge(3);
        session
    }

    #[test]
    fn json_shape() {
        let mut s = session();
        s.finalize(Some("time limit exceeded".into()));
        let report = RunReport::new(&s, LlmStats::default());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["challenges_completed"], 1);
        assert_eq!(json["challenges_attempted"], 3);
        assert_eq!(json["aborted"], true);
        assert_eq!(json["abort_reason"], "time limit exceeded");
        assert_eq!(json["challenges"][1]["error"], "max consecutive failures");
        assert_eq!(json["challenges"][0]["success"], true);
        assert_eq!(json["challenges"][0]["error"], serde_json::Value::Null);
        assert_eq!(json["challenges"][2]["error"], "time limit exceeded");
        assert!(json["llm_stats"]["total_calls"].is_number());
        assert!(json.get("target").is_none());
    }

    #[test]
    fn exit_codes() {
        let mut aborted = session();
        aborted.finalize(Some("boom".into()));
        assert_eq!(RunReport::new(&aborted, LlmStats::default()).exit_code(), 2);

        let mut partial = session();
        partial.finalize(None);
        assert_eq!(RunReport::new(&partial, LlmStats::default()).exit_code(), 1);

        let mut full = RunSession::new(1);
        full.open_challenge(1);
        full.close_current(ChallengeOutcome::Succeeded);
        full.finalize(None);
        assert_eq!(RunReport::new(&full, LlmStats::default()).exit_code(), 0);
    }

    #[test]
    fn summary_lines() {
        let mut s = session();
        s.finalize(None);
        let stats = LlmStats {
            total_calls: 4,
            total_input_tokens: 12_345,
            total_output_tokens: 678,
            total_cost: 0.02,
            ..Default::default()
        };
        let text = RunReport::new(&s, stats).render_summary();

        assert!(text.contains("RUN SUMMARY"));
        assert!(text.contains("Challenges:        1/3 completed"));
        assert!(text.contains("Status:            FINISHED"));
        assert!(text.contains("Input Tokens:    12,345"));
        assert!(text.contains("Cost/Challenge:  $0.0200"));
        assert!(text.contains("✓ Challenge 1:"));
        assert!(text.contains("✗ Challenge 2:"));
        assert!(text.contains("Slowest Challenges:"));
        assert!(!text.contains("Vision Calls"));
    }

    #[test]
    fn aborted_status_line() {
        let mut s = session();
        s.finalize(Some("time limit exceeded".into()));
        let text = RunReport::new(&s, LlmStats::default()).render_summary();
        assert!(text.contains("ABORTED - time limit exceeded"));
        assert!(!text.contains("LLM Usage"));
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }
}
