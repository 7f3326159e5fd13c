//! Chromium-backed browser session (CDP via chromiumoxide)
//!
//! Each session launches its own browser process with a throwaway profile
//! directory, so concurrently running tasks never share cookies, cache or a
//! profile lock. Frames are entered by resolving the frame element to its
//! frame id and evaluating in that frame's execution context.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::DescribeNodeParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::automation::{
    is_truthy, AutomationError, AutomationResult, BrowserSession, SessionConfig, SessionFactory,
    HIDE_WEBDRIVER_SCRIPT,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches one Chromium process per session
#[derive(Debug, Clone, Default)]
pub struct ChromiumSessionFactory;

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self, config: &SessionConfig) -> AutomationResult<Box<dyn BrowserSession>> {
        let session = ChromiumSession::launch(config).await?;
        Ok(Box::new(session))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    context: Option<ExecutionContextId>,
    frame_selector: Option<String>,
    profile_dir: PathBuf,
    page_load_timeout: Duration,
}

impl ChromiumSession {
    pub async fn launch(config: &SessionConfig) -> AutomationResult<Self> {
        let profile_dir = std::env::temp_dir().join(format!("place-harvester-{}", Uuid::new_v4()));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&profile_dir)
            .arg(format!("--user-agent={}", config.user_agent))
            .args(config.extra_args.iter().cloned());
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        let browser_config = builder.build().map_err(AutomationError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AutomationError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                abandon_launch(&mut browser, handler, &profile_dir).await;
                return Err(AutomationError::Launch(e.to_string()));
            }
        };

        if config.hide_webdriver {
            let injected = page
                .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER_SCRIPT))
                .await;
            if let Err(e) = injected {
                abandon_launch(&mut browser, handler, &profile_dir).await;
                return Err(AutomationError::Launch(e.to_string()));
            }
        }

        debug!("🌐 Browser session launched (profile {:?})", profile_dir);

        Ok(Self {
            browser,
            page,
            handler,
            context: None,
            frame_selector: None,
            profile_dir,
            page_load_timeout: config.page_load_timeout(),
        })
    }

    async fn evaluate(&self, expression: &str, context: Option<ExecutionContextId>) -> AutomationResult<Value> {
        let mut builder = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true);
        if let Some(context) = context {
            builder = builder.context_id(context);
        }
        let params = builder.build().map_err(AutomationError::Script)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| AutomationError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Execution context of the frame owned by `selector`, if attached yet
    async fn frame_context(&self, selector: &str) -> AutomationResult<Option<ExecutionContextId>> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(None);
        };

        let described = self
            .page
            .execute(
                DescribeNodeParams::builder()
                    .backend_node_id(element.backend_node_id)
                    .build(),
            )
            .await
            .map_err(|e| AutomationError::Script(e.to_string()))?;
        let Some(frame_id) = described.result.node.frame_id.clone() else {
            return Ok(None);
        };

        self.page
            .frame_execution_context(frame_id)
            .await
            .map_err(|e| AutomationError::Script(e.to_string()))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> AutomationResult<()> {
        self.context = None;
        self.frame_selector = None;
        match tokio::time::timeout(self.page_load_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AutomationError::Navigation(e.to_string())),
            Err(_) => Err(AutomationError::timeout(url, self.page_load_timeout)),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> AutomationResult<()> {
        let expression = format!("!!document.querySelector({})", js_string(selector));
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if is_truthy(&self.run_script(&expression).await?) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::timeout(selector, timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn switch_frame(&mut self, selector: &str, timeout: Duration) -> AutomationResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(context) = self.frame_context(selector).await? {
                self.context = Some(context);
                self.frame_selector = Some(selector.to_string());
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::timeout(selector, timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn switch_default(&mut self) -> AutomationResult<()> {
        self.context = None;
        self.frame_selector = None;
        Ok(())
    }

    async fn entry_texts(
        &mut self,
        entries: &str,
        child: &str,
        limit: usize,
    ) -> AutomationResult<Vec<Option<String>>> {
        let expression = format!(
            "Array.from(document.querySelectorAll({entries})).slice(0, {limit}).map(el => {{ \
               const c = el.querySelector({child}); return c ? c.innerText : null; }})",
            entries = js_string(entries),
            child = js_string(child),
        );
        let value = self.run_script(&expression).await?;
        serde_json::from_value(value).map_err(|e| AutomationError::Script(e.to_string()))
    }

    async fn click_entry(&mut self, entries: &str, index: usize, child: &str) -> AutomationResult<bool> {
        let expression = format!(
            "(() => {{ const el = document.querySelectorAll({entries})[{index}]; \
               const link = el && el.querySelector({child}); \
               if (!link) return false; link.click(); return true; }})()",
            entries = js_string(entries),
            child = js_string(child),
        );
        Ok(is_truthy(&self.run_script(&expression).await?))
    }

    async fn run_script(&mut self, expression: &str) -> AutomationResult<Value> {
        let first = self.evaluate(expression, self.context.clone()).await;
        if first.is_ok() {
            return first;
        }
        let Some(selector) = self.frame_selector.clone() else {
            return first;
        };

        // 프레임이 다시 로드되면 실행 컨텍스트가 바뀐다
        match self.frame_context(&selector).await? {
            Some(context) if Some(&context) != self.context.as_ref() => {
                debug!("Frame {} has a new execution context, retrying", selector);
                self.context = Some(context.clone());
                self.evaluate(expression, Some(context)).await
            }
            _ => first,
        }
    }

    async fn close(self: Box<Self>) -> AutomationResult<()> {
        let Self {
            mut browser,
            page,
            handler,
            profile_dir,
            ..
        } = *self;

        if let Err(e) = page.close().await {
            debug!("Page close failed (browser is shutting down anyway): {}", e);
        }
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            warn!("Browser process did not exit cleanly: {}", e);
        }
        handler.abort();

        if let Err(e) = tokio::fs::remove_dir_all(&profile_dir).await {
            debug!("Profile directory cleanup skipped {:?}: {}", profile_dir, e);
        }

        closed
            .map(|_| ())
            .map_err(|e| AutomationError::Launch(format!("browser close failed: {e}")))
    }
}

/// Release a half-launched browser: process, event handler and profile directory
async fn abandon_launch(browser: &mut Browser, handler: JoinHandle<()>, profile_dir: &Path) {
    if let Err(e) = browser.close().await {
        debug!("Browser close after failed launch: {}", e);
    }
    if let Err(e) = browser.wait().await {
        warn!("Browser process did not exit cleanly: {}", e);
    }
    handler.abort();

    if let Err(e) = tokio::fs::remove_dir_all(profile_dir).await {
        debug!("Profile directory cleanup skipped {:?}: {}", profile_dir, e);
    }
}

/// Quote `text` as a JavaScript string literal
fn js_string(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
