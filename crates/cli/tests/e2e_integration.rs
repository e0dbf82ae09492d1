//! End-to-end tests for a gauntlet run.
//!
//! A small in-memory challenge site stands in for the browser and a scripted
//! oracle stands in for the model. Each test drives the real controller,
//! meters the oracle through the usage ledger and checks the resulting run
//! report and exit code.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gauntlet_agent::{DecisionEngine, Phase, ProgressionController, RunReport};
use gauntlet_config::RunConfig;
use gauntlet_core::environment::{ElementQuery, Environment};
use gauntlet_core::error::{EnvironmentError, ProviderError};
use gauntlet_core::message::Message;
use gauntlet_core::observation::InteractiveElement;
use gauntlet_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use gauntlet_telemetry::{MeteredProvider, UsageLedger};

type EnvResult<T> = Result<T, EnvironmentError>;

// ── Challenge site ───────────────────────────────────────────────────────

struct SiteState {
    started: bool,
    step: usize,
    typed: Option<String>,
    wrong_attempts: u32,
}

/// A three-step site: START, then each step asks for a code typed into
/// `#answer` and confirmed with `#submit`.
struct ChallengeSite {
    codes: Vec<&'static str>,
    state: Mutex<SiteState>,
}

impl ChallengeSite {
    fn new(codes: &[&'static str]) -> Self {
        Self {
            codes: codes.to_vec(),
            state: Mutex::new(SiteState {
                started: false,
                step: 0,
                typed: None,
                wrong_attempts: 0,
            }),
        }
    }

    fn page_text(&self) -> String {
        let s = self.state.lock().unwrap();
        if !s.started {
            return "Welcome to the gauntlet\nSTART".into();
        }
        if s.step >= self.codes.len() {
            return "Congratulations! All challenges completed.".into();
        }
        let mut text = format!(
            "Challenge {}: type the code {} and press submit",
            s.step + 1,
            self.codes[s.step]
        );
        if s.wrong_attempts > 0 {
            text.push_str("\nWrong code, try again");
        }
        text
    }

    fn wrong_attempts(&self) -> u32 {
        self.state.lock().unwrap().wrong_attempts
    }
}

fn missing(what: &str) -> EnvironmentError {
    EnvironmentError::ElementNotFound(what.to_string())
}

#[async_trait::async_trait]
impl Environment for ChallengeSite {
    async fn navigate(&self, _url: &str, _timeout: Duration) -> EnvResult<()> {
        Ok(())
    }

    async fn visible_text(&self) -> EnvResult<String> {
        Ok(self.page_text())
    }

    async fn markup(&self) -> EnvResult<String> {
        Ok(format!("<h1>Gauntlet</h1><p>{}</p>", self.page_text()))
    }

    async fn interactive_elements(&self) -> EnvResult<Vec<InteractiveElement>> {
        Ok(vec![
            InteractiveElement {
                tag: "input".into(),
                id: "answer".into(),
                placeholder: "Code".into(),
                selector_hint: "#answer".into(),
                ..Default::default()
            },
            InteractiveElement {
                tag: "button".into(),
                id: "submit".into(),
                visible_text: "Submit".into(),
                selector_hint: "#submit".into(),
                ..Default::default()
            },
        ])
    }

    async fn snapshot_png(&self) -> EnvResult<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn wait_for_stable(&self, _timeout: Duration) -> EnvResult<bool> {
        Ok(true)
    }

    async fn wait_for_hidden(&self, _selector: &str, _timeout: Duration) -> EnvResult<()> {
        Ok(())
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> EnvResult<()> {
        if selector != "#submit" {
            return Err(missing(selector));
        }
        let mut s = self.state.lock().unwrap();
        if !s.started || s.step >= self.codes.len() {
            return Err(missing(selector));
        }
        if s.typed.as_deref() == Some(self.codes[s.step]) {
            s.step += 1;
            s.wrong_attempts = 0;
        } else {
            s.wrong_attempts += 1;
        }
        s.typed = None;
        Ok(())
    }

    async fn click_text(&self, text: &str, _timeout: Duration) -> EnvResult<()> {
        let mut s = self.state.lock().unwrap();
        if text == "START" && !s.started {
            s.started = true;
            return Ok(());
        }
        Err(missing(text))
    }

    async fn click_role(&self, _role: &str, name: &str, _timeout: Duration) -> EnvResult<()> {
        Err(missing(name))
    }

    async fn click_first_visible(&self, _query: &ElementQuery, _timeout: Duration) -> EnvResult<bool> {
        Ok(false)
    }

    async fn fill(&self, selector: &str, value: &str, _timeout: Duration) -> EnvResult<()> {
        if selector != "#answer" {
            return Err(missing(selector));
        }
        self.state.lock().unwrap().typed = Some(value.to_string());
        Ok(())
    }

    async fn fill_by_placeholder(&self, placeholder: &str, _value: &str, _timeout: Duration) -> EnvResult<()> {
        Err(missing(placeholder))
    }

    async fn fill_first_visible(&self, value: &str, _timeout: Duration) -> EnvResult<()> {
        self.state.lock().unwrap().typed = Some(value.to_string());
        Ok(())
    }

    async fn select_option(&self, selector: &str, _value: &str, _timeout: Duration) -> EnvResult<()> {
        Err(missing(selector))
    }

    async fn select_option_by_label(&self, selector: &str, _label: &str, _timeout: Duration) -> EnvResult<()> {
        Err(missing(selector))
    }

    async fn press_key(&self, _key: &str) -> EnvResult<()> {
        Ok(())
    }

    async fn scroll_by(&self, _pixels: i64) -> EnvResult<()> {
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> EnvResult<()> {
        Ok(())
    }
}

// ── Scripted oracle ──────────────────────────────────────────────────────

/// Replies in order; the last reply repeats once the script runs out.
struct ScriptedOracle {
    replies: Vec<&'static str>,
    calls: Mutex<usize>,
}

impl ScriptedOracle {
    fn new(replies: &[&'static str]) -> Self {
        Self {
            replies: replies.to_vec(),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedOracle {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        let reply = self.replies[(*calls).min(self.replies.len() - 1)];
        *calls += 1;
        Ok(ProviderResponse {
            message: Message::assistant(reply),
            usage: Some(Usage {
                prompt_tokens: 1000,
                completion_tokens: 100,
                total_tokens: 1100,
            }),
            model: "claude-3-5-haiku-20241022".into(),
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

fn run_config(total: u32) -> RunConfig {
    RunConfig {
        target_url: "http://challenges.test".into(),
        max_challenges: total,
        ..RunConfig::default()
    }
}

struct Outcome {
    phase: Phase,
    result: gauntlet_core::Result<()>,
    report: RunReport,
}

async fn drive(site: &ChallengeSite, oracle: Arc<ScriptedOracle>, config: RunConfig) -> Outcome {
    let ledger = Arc::new(UsageLedger::new());
    let provider: Arc<dyn Provider> = Arc::new(MeteredProvider::new(oracle, ledger.clone()));
    let engine = DecisionEngine::new(provider, "claude-3-5-haiku-20241022");

    let mut controller = ProgressionController::new(site, engine, config);
    let result = controller.run().await;
    let phase = controller.phase();
    let session = controller.into_session();
    Outcome {
        phase,
        result,
        report: RunReport::new(&session, ledger.summary()),
    }
}

const SOLVE_ALL: &[&str] = &[
    r##"{"action":"type","selector":"#answer","value":"ALPHA","reasoning":"code is shown"}"##,
    r##"{"action":"click","selector":"#submit","reasoning":"submit"}"##,
    r##"{"action":"type","selector":"#answer","value":"BRAVO"}"##,
    r##"{"action":"click","selector":"#submit"}"##,
    r##"```json
{"action":"type","selector":"#answer","value":"CHARLIE"}
```"##,
    r##"Sure: {"action":"click","selector":"#submit"}"##,
];

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn full_run_completes_every_challenge() {
    let site = ChallengeSite::new(&["ALPHA", "BRAVO", "CHARLIE"]);
    let oracle = Arc::new(ScriptedOracle::new(SOLVE_ALL));

    let out = drive(&site, oracle.clone(), run_config(3)).await;

    assert!(out.result.is_ok());
    assert_eq!(out.phase, Phase::Complete);
    assert_eq!(oracle.calls(), 6);

    let report = out.report;
    assert_eq!(report.challenges_completed, 3);
    assert_eq!(report.challenges_attempted, 3);
    assert!(!report.aborted);
    assert_eq!(report.exit_code(), 0);
    assert!(report.challenges.iter().all(|c| c.success && c.error.is_none()));
    assert!(report.challenges.iter().all(|c| c.llm_calls == 2 && c.actions_taken == 2));

    assert_eq!(report.llm_stats.total_calls, 6);
    assert_eq!(report.llm_stats.total_input_tokens, 6000);
    assert_eq!(report.llm_stats.total_output_tokens, 600);
    assert!(report.llm_stats.total_cost > 0.0);
}

#[tokio::test(start_paused = true)]
async fn report_is_saved_as_json() {
    let site = ChallengeSite::new(&["ALPHA", "BRAVO", "CHARLIE"]);
    let oracle = Arc::new(ScriptedOracle::new(SOLVE_ALL));
    let out = drive(&site, oracle, run_config(3)).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_stats.json");
    out.report.save(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    for key in [
        "run_timestamp",
        "total_duration_seconds",
        "total_duration_ms",
        "challenges_completed",
        "challenges_attempted",
        "aborted",
        "abort_reason",
        "llm_stats",
        "challenges",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["challenges"].as_array().unwrap().len(), 3);
    assert_eq!(json["challenges"][0]["challenge"], 1);
    assert_eq!(json["abort_reason"], serde_json::Value::Null);
}

#[tokio::test(start_paused = true)]
async fn wrong_answers_retry_then_recover() {
    let site = ChallengeSite::new(&["ALPHA"]);
    let oracle = Arc::new(ScriptedOracle::new(&[
        r##"{"action":"type","selector":"#answer","value":"ALHPA"}"##,
        r##"{"action":"click","selector":"#submit"}"##,
        r##"{"action":"type","selector":"#answer","value":"ALPHA"}"##,
        r##"{"action":"click","selector":"#submit"}"##,
    ]));

    let out = drive(&site, oracle, run_config(1)).await;

    assert_eq!(out.phase, Phase::Complete);
    assert_eq!(site.wrong_attempts(), 0);
    assert_eq!(out.report.challenges_completed, 1);
    assert_eq!(out.report.challenges[0].actions_taken, 4);
    assert_eq!(out.report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn stuck_run_force_advances_and_exits_one() {
    let site = ChallengeSite::new(&["ALPHA", "BRAVO", "CHARLIE"]);
    let oracle = Arc::new(ScriptedOracle::new(&[
        r##"{"action":"click","selector":"#nowhere"}"##,
    ]));

    let out = drive(&site, oracle.clone(), run_config(3)).await;

    assert!(out.result.is_ok());
    assert_eq!(out.phase, Phase::Exhausted);
    assert_eq!(oracle.calls(), 9);

    let report = out.report;
    assert!(!report.aborted);
    assert_eq!(report.challenges_completed, 0);
    assert_eq!(report.challenges_attempted, 3);
    assert!(
        report
            .challenges
            .iter()
            .all(|c| c.error.as_deref() == Some("max consecutive failures"))
    );
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_aborts_and_exits_two() {
    let site = ChallengeSite::new(&["ALPHA", "BRAVO", "CHARLIE"]);
    let oracle = Arc::new(ScriptedOracle::new(&[r#"{"action":"wait","reasoning":"thinking"}"#]));
    let config = RunConfig {
        timeout_secs: 5,
        ..run_config(3)
    };

    let out = drive(&site, oracle, config).await;

    assert!(out.result.is_ok());
    assert_eq!(out.phase, Phase::Aborted);
    let report = out.report;
    assert!(report.aborted);
    assert_eq!(report.abort_reason.as_deref(), Some("time limit exceeded"));
    assert_eq!(report.exit_code(), 2);
    assert!(report.render_summary().contains("ABORTED - time limit exceeded"));
}

#[tokio::test(start_paused = true)]
async fn unreadable_replies_degrade_instead_of_aborting() {
    let site = ChallengeSite::new(&["ALPHA"]);
    let oracle = Arc::new(ScriptedOracle::new(&[
        "I think you should press the submit button.",
        r##"{"action":"type","selector":"#answer","value":"ALPHA"}"##,
        r##"{"action":"click","selector":"#submit"}"##,
    ]));

    let out = drive(&site, oracle, run_config(1)).await;

    assert!(out.result.is_ok());
    assert_eq!(out.phase, Phase::Complete);
    assert_eq!(out.report.exit_code(), 0);
}
