//! Shared test doubles: a scripted page and a sequential mock oracle.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use gauntlet_core::environment::{ElementQuery, Environment};
use gauntlet_core::error::{EnvironmentError, ProviderError};
use gauntlet_core::message::Message;
use gauntlet_core::observation::InteractiveElement;
use gauntlet_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

type EnvResult<T> = Result<T, EnvironmentError>;

#[derive(Default)]
struct PageState {
    text: String,
    markup: String,
    elements: Vec<InteractiveElement>,
    failing: HashSet<String>,
    /// Call line -> page text after that call succeeds.
    transitions: HashMap<String, String>,
    overlays: Vec<(String, String)>,
    broken: bool,
    calls: Vec<String>,
}

/// An [`Environment`] whose content and failures are scripted.
///
/// Every interaction is logged as a line (`"click #go"`, `"fill #code=1"`,
/// `"press Enter"`, ...). Keys passed to [`ScriptedPage::failing`] make the
/// matching call fail: a selector, `text:<t>`, `role:<name>`, `placeholder:<p>`,
/// `option:<v>`, `key:<k>`, `input` (first visible input) or `navigate`.
/// `click_text` also fails when the text is not on the page.
pub struct ScriptedPage {
    state: Mutex<PageState>,
}

impl ScriptedPage {
    pub fn new(text: &str) -> Self {
        Self {
            state: Mutex::new(PageState {
                text: text.into(),
                ..Default::default()
            }),
        }
    }

    pub fn with_markup(self, markup: &str) -> Self {
        self.state.lock().unwrap().markup = markup.into();
        self
    }

    pub fn with_elements(self, elements: Vec<InteractiveElement>) -> Self {
        self.state.lock().unwrap().elements = elements;
        self
    }

    pub fn failing(self, key: &str) -> Self {
        self.state.lock().unwrap().failing.insert(key.into());
        self
    }

    /// After a successful call logged as `call`, the page shows `text`.
    pub fn after(self, call: &str, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .transitions
            .insert(call.into(), text.into());
        self
    }

    pub fn with_overlay(self, css: &str, text: &str) -> Self {
        self.push_overlay(css, text);
        self
    }

    pub fn push_overlay(&self, css: &str, text: &str) {
        self.state
            .lock()
            .unwrap()
            .overlays
            .push((css.into(), text.into()));
    }

    /// Every introspection call fails.
    pub fn with_broken_introspection(self) -> Self {
        self.state.lock().unwrap().broken = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn overlay_count(&self) -> usize {
        self.state.lock().unwrap().overlays.len()
    }

    /// Log `line`; fail if any of `keys` is scripted to fail, otherwise
    /// apply the transition registered for `line`.
    fn interact(&self, line: String, keys: &[&str]) -> EnvResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(line.clone());
        if let Some(key) = keys.iter().find(|k| state.failing.contains(**k)) {
            return Err(EnvironmentError::ElementNotFound((*key).to_string()));
        }
        if let Some(next) = state.transitions.get(&line).cloned() {
            state.text = next;
        }
        Ok(())
    }

    fn introspect<T>(&self, read: impl FnOnce(&PageState) -> T) -> EnvResult<T> {
        let state = self.state.lock().unwrap();
        if state.broken {
            return Err(EnvironmentError::Closed("scripted".into()));
        }
        Ok(read(&state))
    }
}

#[async_trait::async_trait]
impl Environment for ScriptedPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> EnvResult<()> {
        self.interact(format!("navigate {url}"), &["navigate"])
            .map_err(|_| EnvironmentError::Navigation {
                url: url.into(),
                reason: "scripted failure".into(),
            })
    }

    async fn visible_text(&self) -> EnvResult<String> {
        self.introspect(|s| s.text.clone())
    }

    async fn markup(&self) -> EnvResult<String> {
        self.introspect(|s| s.markup.clone())
    }

    async fn interactive_elements(&self) -> EnvResult<Vec<InteractiveElement>> {
        self.introspect(|s| s.elements.clone())
    }

    async fn snapshot_png(&self) -> EnvResult<Vec<u8>> {
        self.introspect(|_| vec![0x89, b'P', b'N', b'G'])
    }

    async fn wait_for_stable(&self, _timeout: Duration) -> EnvResult<bool> {
        self.interact("wait_for_stable".into(), &[])?;
        Ok(true)
    }

    async fn wait_for_hidden(&self, selector: &str, _timeout: Duration) -> EnvResult<()> {
        self.interact(format!("wait_for_hidden {selector}"), &[])
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> EnvResult<()> {
        self.interact(format!("click {selector}"), &[selector])
    }

    async fn click_text(&self, text: &str, _timeout: Duration) -> EnvResult<()> {
        let key = format!("text:{text}");
        let line = format!("click_text {text}");
        {
            let mut state = self.state.lock().unwrap();
            if !state.text.contains(text) {
                state.calls.push(line);
                return Err(EnvironmentError::ElementNotFound(key));
            }
        }
        self.interact(line, &[&key])
    }

    async fn click_role(&self, role: &str, name: &str, _timeout: Duration) -> EnvResult<()> {
        let key = format!("role:{name}");
        self.interact(format!("click_role {role} {name}"), &[&key])
    }

    async fn click_first_visible(&self, query: &ElementQuery, _timeout: Duration) -> EnvResult<bool> {
        let mut state = self.state.lock().unwrap();
        let hit = state
            .overlays
            .iter()
            .position(|(css, text)| *css == query.css && query.text_matches(text));
        match hit {
            Some(idx) => {
                state.overlays.remove(idx);
                state.calls.push(format!("dismiss {query}"));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn fill(&self, selector: &str, value: &str, _timeout: Duration) -> EnvResult<()> {
        self.interact(format!("fill {selector}={value}"), &[selector])
    }

    async fn fill_by_placeholder(&self, placeholder: &str, value: &str, _timeout: Duration) -> EnvResult<()> {
        let key = format!("placeholder:{placeholder}");
        self.interact(format!("fill_by_placeholder {placeholder}={value}"), &[&key])
    }

    async fn fill_first_visible(&self, value: &str, _timeout: Duration) -> EnvResult<()> {
        self.interact(format!("fill_first_visible {value}"), &["input"])
    }

    async fn select_option(&self, selector: &str, value: &str, _timeout: Duration) -> EnvResult<()> {
        let key = format!("option:{value}");
        self.interact(format!("select {selector}={value}"), &[selector, &key])
    }

    async fn select_option_by_label(&self, selector: &str, label: &str, _timeout: Duration) -> EnvResult<()> {
        self.interact(format!("select_label {selector}={label}"), &[selector])
    }

    async fn press_key(&self, key: &str) -> EnvResult<()> {
        let fail_key = format!("key:{key}");
        self.interact(format!("press {key}"), &[&fail_key])
    }

    async fn scroll_by(&self, pixels: i64) -> EnvResult<()> {
        self.interact(format!("scroll_by {pixels}"), &[])
    }

    async fn scroll_to_bottom(&self) -> EnvResult<()> {
        self.interact("scroll_to_bottom".into(), &[])
    }
}

/// A mock oracle that answers from a script.
///
/// Each call to `complete` returns the next scripted reply; once the script
/// runs out the last reply repeats. An empty script panics when called.
pub struct SequentialMockProvider {
    replies: Vec<Result<ProviderResponse, ProviderError>>,
    vision: bool,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(replies: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            replies,
            vision: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn with_vision(mut self) -> Self {
        self.vision = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let idx = requests.len().min(self.replies.len().saturating_sub(1));
        requests.push(request);
        match self.replies.get(idx) {
            Some(reply) => reply.clone(),
            None => panic!("SequentialMockProvider: no replies scripted"),
        }
    }
}

/// A plain text reply with fixed token usage.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}
