//! [`Environment`] implementation over a live Chromium page.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use gauntlet_core::environment::{ElementQuery, Environment};
use gauntlet_core::error::EnvironmentError;
use gauntlet_core::observation::{selector_hint, InteractiveElement};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{map_cdp, BrowserError};
use crate::keys;
use crate::scripts::{self, ClickTarget, FillTarget, Probe, ProbeStatus, RawElement};

type EnvResult<T> = std::result::Result<T, EnvironmentError>;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const STABILITY_INTERVAL: Duration = Duration::from_millis(200);
const POST_NAVIGATION_SETTLE: Duration = Duration::from_secs(2);

/// A launched Chromium instance with one page.
pub struct ChromiumEnvironment {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumEnvironment {
    /// Launch Chromium with the given settings and open a blank page.
    pub async fn launch(config: &gauntlet_config::BrowserConfig) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.window_width, config.window_height)
            .viewport(Viewport {
                width: config.window_width,
                height: config.window_height,
                ..Viewport::default()
            })
            .request_timeout(config.navigation_timeout())
            .args([
                "--disable-dev-shm-usage",
                "--disable-popup-blocking",
                "--no-first-run",
                "--no-default-browser-check",
                "--mute-audio",
            ]);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(BrowserError::Config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "devtools handler event error");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        info!(
            headless = config.headless,
            width = config.window_width,
            height = config.window_height,
            "Chromium launched"
        );

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Close the browser and stop the protocol handler.
    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "browser did not close cleanly");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }

    async fn eval<T: DeserializeOwned>(&self, script: impl Into<String>) -> EnvResult<T> {
        let result = self
            .page
            .evaluate(script.into())
            .await
            .map_err(|e| map_cdp("evaluate", e))?;
        result
            .into_value::<T>()
            .map_err(|e| EnvironmentError::Script(e.to_string()))
    }

    /// Re-run `script` until it reports a settled status or `timeout` runs out.
    async fn probe_until(&self, operation: &str, script: &str, timeout: Duration) -> EnvResult<Probe> {
        let deadline = Instant::now() + timeout;
        loop {
            let probe: Probe = self.eval(script).await?;
            if !probe.status.is_transient() {
                return settled(operation, probe);
            }
            if Instant::now() + POLL_INTERVAL > deadline {
                return Err(unsettled(operation, &probe, timeout));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn click_target(&self, target: ClickTarget<'_>, timeout: Duration) -> EnvResult<()> {
        let operation = match &target {
            ClickTarget::Selector(s) => format!("click {s}"),
            ClickTarget::Text(t) => format!("click text {t:?}"),
            ClickTarget::Role { role, name } => format!("click {role} {name:?}"),
        };
        let probe = self
            .probe_until(&operation, &scripts::locate(&target), timeout)
            .await?;
        let (Some(x), Some(y)) = (probe.x, probe.y) else {
            return Err(EnvironmentError::Script(format!("{operation}: no click point")));
        };
        self.page
            .click(Point { x, y })
            .await
            .map_err(|e| map_cdp(&operation, e))?;
        Ok(())
    }

    async fn fill_target(&self, target: FillTarget<'_>, value: &str, timeout: Duration) -> EnvResult<()> {
        let operation = match &target {
            FillTarget::Selector(s) => format!("fill {s}"),
            FillTarget::Placeholder(p) => format!("fill placeholder {p:?}"),
            FillTarget::FirstInput => "fill first input".to_string(),
        };
        self.probe_until(&operation, &scripts::fill(&target, value), timeout)
            .await
            .map(|_| ())
    }

    async fn select_by(&self, selector: &str, choice: &str, by_label: bool, timeout: Duration) -> EnvResult<()> {
        let operation = format!("select {choice:?} in {selector}");
        self.probe_until(&operation, &scripts::select(selector, choice, by_label), timeout)
            .await
            .map(|_| ())
    }

    async fn dispatch_key(&self, event: DispatchKeyEventParams) -> EnvResult<()> {
        self.page
            .execute(event)
            .await
            .map_err(|e| map_cdp("press_key", e))?;
        Ok(())
    }
}

fn settled(operation: &str, probe: Probe) -> EnvResult<Probe> {
    match probe.status {
        ProbeStatus::Ok => Ok(probe),
        ProbeStatus::Unfillable => Err(EnvironmentError::ElementNotFound(format!(
            "{operation}: {} does not take a value",
            probe.detail.as_deref().unwrap_or("element")
        ))),
        ProbeStatus::NoOption => Err(EnvironmentError::ElementNotFound(format!(
            "{operation}: no such option"
        ))),
        _ => Err(unsettled(operation, &probe, Duration::ZERO)),
    }
}

fn unsettled(operation: &str, probe: &Probe, timeout: Duration) -> EnvironmentError {
    match probe.status {
        ProbeStatus::None => EnvironmentError::ElementNotFound(operation.to_string()),
        status => {
            let detail = probe
                .detail
                .as_deref()
                .map(|d| format!(" by {d}"))
                .unwrap_or_default();
            EnvironmentError::Timeout {
                operation: format!("{operation} ({}{detail})", status.label()),
                timeout_ms: timeout.as_millis() as u64,
            }
        }
    }
}

#[async_trait]
impl Environment for ChromiumEnvironment {
    async fn navigate(&self, url: &str, timeout: Duration) -> EnvResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                return Err(EnvironmentError::Navigation {
                    url: url.to_string(),
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                return Err(EnvironmentError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                });
            }
        }
        if !self.wait_for_stable(POST_NAVIGATION_SETTLE).await.unwrap_or(false) {
            debug!(url, "page still changing after navigation");
        }
        Ok(())
    }

    async fn visible_text(&self) -> EnvResult<String> {
        self.eval(scripts::VISIBLE_TEXT).await
    }

    async fn markup(&self) -> EnvResult<String> {
        self.page.content().await.map_err(|e| map_cdp("markup", e))
    }

    async fn interactive_elements(&self) -> EnvResult<Vec<InteractiveElement>> {
        let raw: Vec<RawElement> = self.eval(scripts::interactive_elements()).await?;
        Ok(raw
            .into_iter()
            .map(|el| InteractiveElement {
                selector_hint: selector_hint(&el.tag, &el.id, &el.css_class, &el.text),
                tag: el.tag,
                visible_text: el.text,
                placeholder: el.placeholder,
                id: el.id,
                css_class: el.css_class,
                input_type: el.input_type,
                disabled: el.disabled,
            })
            .collect())
    }

    async fn snapshot_png(&self) -> EnvResult<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| EnvironmentError::Capture(e.to_string()))
    }

    async fn wait_for_stable(&self, timeout: Duration) -> EnvResult<bool> {
        let deadline = Instant::now() + timeout;
        let mut last: Option<String> = None;
        loop {
            let current = self.markup().await?;
            if last.as_deref() == Some(current.as_str()) {
                return Ok(true);
            }
            last = Some(current);
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(STABILITY_INTERVAL).await;
        }
    }

    async fn wait_for_hidden(&self, selector: &str, timeout: Duration) -> EnvResult<()> {
        let deadline = Instant::now() + timeout;
        let script = scripts::count_visible(selector);
        loop {
            let count: u64 = self.eval(script.as_str()).await?;
            if count == 0 {
                return Ok(());
            }
            if Instant::now() + POLL_INTERVAL > deadline {
                return Err(EnvironmentError::Timeout {
                    operation: format!("wait for {selector} to hide ({count} visible)"),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, selector: &str, timeout: Duration) -> EnvResult<()> {
        self.click_target(ClickTarget::Selector(selector), timeout).await
    }

    async fn click_text(&self, text: &str, timeout: Duration) -> EnvResult<()> {
        self.click_target(ClickTarget::Text(text), timeout).await
    }

    async fn click_role(&self, role: &str, name: &str, timeout: Duration) -> EnvResult<()> {
        self.click_target(ClickTarget::Role { role, name }, timeout).await
    }

    async fn click_first_visible(&self, query: &ElementQuery, timeout: Duration) -> EnvResult<bool> {
        let script = scripts::force_click(query);
        match tokio::time::timeout(timeout, self.eval::<bool>(script)).await {
            Ok(result) => result,
            Err(_) => Err(EnvironmentError::Timeout {
                operation: format!("click first visible {query}"),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> EnvResult<()> {
        self.fill_target(FillTarget::Selector(selector), value, timeout).await
    }

    async fn fill_by_placeholder(&self, placeholder: &str, value: &str, timeout: Duration) -> EnvResult<()> {
        self.fill_target(FillTarget::Placeholder(placeholder), value, timeout).await
    }

    async fn fill_first_visible(&self, value: &str, timeout: Duration) -> EnvResult<()> {
        self.fill_target(FillTarget::FirstInput, value, timeout).await
    }

    async fn select_option(&self, selector: &str, value: &str, timeout: Duration) -> EnvResult<()> {
        self.select_by(selector, value, false, timeout).await
    }

    async fn select_option_by_label(&self, selector: &str, label: &str, timeout: Duration) -> EnvResult<()> {
        self.select_by(selector, label, true, timeout).await
    }

    async fn press_key(&self, key: &str) -> EnvResult<()> {
        let def = keys::definition(key);

        let mut down = DispatchKeyEventParams::builder()
            .r#type(if def.text.is_some() {
                DispatchKeyEventType::KeyDown
            } else {
                DispatchKeyEventType::RawKeyDown
            })
            .key(def.key.clone())
            .code(def.code.clone())
            .windows_virtual_key_code(def.key_code)
            .native_virtual_key_code(def.key_code);
        if let Some(text) = &def.text {
            down = down.text(text.clone()).unmodified_text(text.clone());
        }
        self.dispatch_key(down.build().map_err(EnvironmentError::Script)?)
            .await?;

        let up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key(def.key)
            .code(def.code)
            .windows_virtual_key_code(def.key_code)
            .native_virtual_key_code(def.key_code)
            .build()
            .map_err(EnvironmentError::Script)?;
        self.dispatch_key(up).await
    }

    async fn scroll_by(&self, pixels: i64) -> EnvResult<()> {
        self.eval::<bool>(scripts::scroll_by(pixels)).await.map(|_| ())
    }

    async fn scroll_to_bottom(&self) -> EnvResult<()> {
        self.eval::<bool>(scripts::SCROLL_TO_BOTTOM).await.map(|_| ())
    }
}
