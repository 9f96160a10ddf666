//! Chromium driver backed by chromiumoxide.

use crate::commands::{
    ClickMode, ElementRef, ElementSnapshot, QueryExpression, SelectState, WaitState,
};
use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::page::{Page, PageFactory, PageHandle};
use crate::scripts::{self, ScriptOutcome};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::layout::Point;
use chromiumoxide::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use soulpilot_core_types::PageId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn map_cdp_error(err: CdpError) -> AdapterError {
    match &err {
        CdpError::Timeout => AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint("cdp request timed out"),
        CdpError::NoResponse | CdpError::ChannelSendError(_) => {
            AdapterError::closed(err.to_string())
        }
        _ => AdapterError::cdp(err.to_string()),
    }
}

/// One Chromium process and the task draining its CDP handler.
pub struct ChromiumBrowser {
    browser: Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
    crashed: Arc<AtomicBool>,
}

impl ChromiumBrowser {
    pub async fn launch(config: &CdpConfig) -> Result<Self, AdapterError> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.window_width, config.window_height)
            .request_timeout(Duration::from_millis(config.request_timeout_ms));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        for arg in &config.args {
            builder = builder.arg(arg.as_str());
        }
        let browser_config = builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::BrowserCrash)
                .with_hint(format!("invalid browser config: {err}"))
                .retriable(false)
        })?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::BrowserCrash)
                .with_hint(format!("failed to launch chromium: {err}"))
                .retriable(false)
        })?;

        let crashed = Arc::new(AtomicBool::new(false));
        let crashed_flag = Arc::clone(&crashed);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "cdp handler event error");
                }
            }
            crashed_flag.store(true, Ordering::SeqCst);
            warn!("cdp handler stream ended");
        });

        info!(
            headless = config.headless,
            executable = ?config.executable,
            "chromium launched"
        );

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler_task,
            crashed,
        })
    }

    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(err) = browser.close().await {
                warn!(error = %err, "browser close failed");
            }
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        info!("chromium shut down");
    }
}

#[async_trait]
impl PageFactory for ChromiumBrowser {
    async fn create_page(&self) -> Result<PageHandle, AdapterError> {
        if self.crashed.load(Ordering::SeqCst) {
            return Err(AdapterError::new(AdapterErrorKind::BrowserCrash)
                .with_hint("cdp connection lost")
                .retriable(false));
        }
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::BrowserCrash).with_hint("browser shut down"))?;
        let page = browser.new_page("about:blank").await.map_err(map_cdp_error)?;
        let handle = ChromiumPage::new(page, Arc::clone(&self.crashed));
        debug!(page = %handle.id, "page created");
        Ok(Arc::new(handle))
    }
}

#[derive(Deserialize)]
struct PointValue {
    x: f64,
    y: f64,
}

/// A single Chromium tab.
pub struct ChromiumPage {
    id: PageId,
    page: CdpPage,
    closed: AtomicBool,
    browser_crashed: Arc<AtomicBool>,
}

impl ChromiumPage {
    fn new(page: CdpPage, browser_crashed: Arc<AtomicBool>) -> Self {
        Self {
            id: PageId::new(),
            page,
            closed: AtomicBool::new(false),
            browser_crashed,
        }
    }

    fn guard_open(&self) -> Result<(), AdapterError> {
        if self.browser_crashed.load(Ordering::SeqCst) {
            return Err(AdapterError::new(AdapterErrorKind::BrowserCrash).retriable(false));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(AdapterError::closed(format!("page {} closed", self.id)));
        }
        Ok(())
    }

    fn observe_error(&self, err: AdapterError) -> AdapterError {
        if err.kind == AdapterErrorKind::TargetClosed {
            self.closed.store(true, Ordering::SeqCst);
        }
        err
    }

    async fn run(&self, script: String) -> Result<ScriptOutcome, AdapterError> {
        self.guard_open()?;
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|err| self.observe_error(map_cdp_error(err)))?;
        result
            .into_value::<ScriptOutcome>()
            .map_err(|err| AdapterError::internal(format!("malformed script result: {err}")))
    }

    /// Run an element script and decode its `value` on `ok`.
    async fn run_for<T: DeserializeOwned>(
        &self,
        element: &ElementRef,
        script: String,
        action: &str,
    ) -> Result<T, AdapterError> {
        let outcome = self.run(script).await?;
        match outcome.status.as_str() {
            "ok" => serde_json::from_value(outcome.value)
                .map_err(|err| AdapterError::internal(format!("{action}: {err}"))),
            "missing" => Err(AdapterError::not_found(format!("{action}: {element}"))),
            "hidden" | "obscured" | "not-editable" | "not-checkable" | "not-select" => {
                Err(AdapterError::new(AdapterErrorKind::NotInteractable)
                    .with_hint(format!("{action}: element {}", outcome.status)))
            }
            "option-missing" => Err(AdapterError::new(AdapterErrorKind::OptionNotFound)
                .with_hint(format!("{action}: no matching option"))),
            other => Err(AdapterError::cdp(format!(
                "{action} failed ({other}): {}",
                outcome.message.unwrap_or_default()
            ))),
        }
    }

    async fn run_unit(
        &self,
        element: &ElementRef,
        script: String,
        action: &str,
    ) -> Result<(), AdapterError> {
        let _: Value = self.run_for(element, script, action).await?;
        Ok(())
    }

    async fn count_once(&self, expr: &QueryExpression) -> Result<usize, AdapterError> {
        let outcome = self.run(scripts::count(expr)?).await?;
        match outcome.status.as_str() {
            "ok" => serde_json::from_value(outcome.value)
                .map_err(|err| AdapterError::internal(format!("query count: {err}"))),
            _ => Err(AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!(
                    "query {expr} rejected: {}",
                    outcome.message.unwrap_or_default()
                ))
                .retriable(false)),
        }
    }
}

#[async_trait]
impl Page for ChromiumPage {
    fn id(&self) -> &PageId {
        &self.id
    }

    async fn url(&self) -> Result<String, AdapterError> {
        self.guard_open()?;
        let url = self
            .page
            .url()
            .await
            .map_err(|err| self.observe_error(map_cdp_error(err)))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn navigate(&self, url: &str, deadline: Duration) -> Result<String, AdapterError> {
        self.guard_open()?;
        match timeout(deadline, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => return Err(self.observe_error(map_cdp_error(err))),
            Err(_) => {
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint(format!("{url} did not load within {}ms", deadline.as_millis())))
            }
        }
        self.url().await
    }

    async fn query(&self, expr: &QueryExpression, wait: Duration) -> Result<usize, AdapterError> {
        let deadline = Instant::now() + wait;
        loop {
            let count = self.count_once(expr).await?;
            if count > 0 || Instant::now() >= deadline {
                return Ok(count);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn describe(&self, element: &ElementRef) -> Result<ElementSnapshot, AdapterError> {
        self.run_for(element, scripts::describe(element)?, "describe")
            .await
    }

    async fn is_visible(&self, element: &ElementRef) -> Result<bool, AdapterError> {
        self.run_for(element, scripts::visible(element)?, "visibility")
            .await
    }

    async fn click(
        &self,
        element: &ElementRef,
        mode: ClickMode,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        let attempt = async {
            match mode {
                ClickMode::Normal => {
                    let point: PointValue = self
                        .run_for(element, scripts::pointer_target(element, true)?, "click")
                        .await?;
                    self.page
                        .click(Point::new(point.x, point.y))
                        .await
                        .map_err(|err| self.observe_error(map_cdp_error(err)))?;
                    Ok(())
                }
                ClickMode::Forced => {
                    self.run_unit(element, scripts::forced_click(element)?, "forced click")
                        .await
                }
            }
        };
        timeout(deadline, attempt).await.map_err(|_| {
            AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("click on {element} timed out"))
        })?
    }

    async fn hover(&self, element: &ElementRef) -> Result<(), AdapterError> {
        let point: PointValue = self
            .run_for(element, scripts::pointer_target(element, false)?, "hover")
            .await?;
        self.page
            .move_mouse(Point::new(point.x, point.y))
            .await
            .map_err(|err| self.observe_error(map_cdp_error(err)))?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.run_unit(element, scripts::scroll_into_view(element)?, "scroll")
            .await
    }

    async fn fill(&self, element: &ElementRef, text: &str, clear: bool) -> Result<(), AdapterError> {
        self.run_unit(element, scripts::fill(element, text, clear)?, "fill")
            .await
    }

    async fn input_value(&self, element: &ElementRef) -> Result<String, AdapterError> {
        self.run_for(element, scripts::input_value(element)?, "read value")
            .await
    }

    async fn text_content(&self, element: &ElementRef) -> Result<String, AdapterError> {
        self.run_for(element, scripts::text_content(element)?, "read text")
            .await
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, AdapterError> {
        self.run_for(element, scripts::attribute(element, name)?, "read attribute")
            .await
    }

    async fn select_state(&self, element: &ElementRef) -> Result<SelectState, AdapterError> {
        self.run_for(element, scripts::select_state(element)?, "read selection")
            .await
    }

    async fn select_option(
        &self,
        element: &ElementRef,
        wanted: &str,
    ) -> Result<SelectState, AdapterError> {
        self.run_for(element, scripts::select_option(element, wanted)?, "select option")
            .await
    }

    async fn is_checked(&self, element: &ElementRef) -> Result<bool, AdapterError> {
        self.run_for(element, scripts::is_checked(element)?, "read checked")
            .await
    }

    async fn set_checked(&self, element: &ElementRef, checked: bool) -> Result<(), AdapterError> {
        self.run_unit(element, scripts::set_checked(element, checked)?, "set checked")
            .await
    }

    async fn wait_for_state(
        &self,
        expr: &QueryExpression,
        state: WaitState,
        wait: Duration,
    ) -> Result<(), AdapterError> {
        let deadline = Instant::now() + wait;
        let script = scripts::observe(expr)?;
        loop {
            let outcome = self.run(script.clone()).await?;
            if outcome.status != "ok" {
                return Err(AdapterError::cdp(format!(
                    "wait on {expr} failed: {}",
                    outcome.message.unwrap_or_default()
                )));
            }
            let observed = outcome.value.as_bool();
            if state.is_satisfied(observed) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::not_found(format!(
                    "{expr} not {} within {}ms",
                    state.name(),
                    wait.as_millis()
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value, AdapterError> {
        self.guard_open()?;
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|err| self.observe_error(map_cdp_error(err)))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn content(&self) -> Result<String, AdapterError> {
        self.guard_open()?;
        self.page
            .content()
            .await
            .map_err(|err| self.observe_error(map_cdp_error(err)))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.browser_crashed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), AdapterError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.page.clone().close().await.map_err(map_cdp_error)?;
        debug!(page = %self.id, "page closed");
        Ok(())
    }
}
