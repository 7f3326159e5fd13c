//! Browser automation boundary
//!
//! The worker drives a browser only through [`BrowserSession`], so the
//! navigation state machine can run against a real Chromium
//! ([`super::chromium_session`]) or a scripted fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Hides the automation flag most bot checks look at first
pub const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutomationError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Timed out after {after:?} waiting for {target}")]
    Timeout { target: String, after: Duration },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Session already closed")]
    Closed,
}

impl AutomationError {
    pub fn timeout(target: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            target: target.into(),
            after,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type AutomationResult<T> = Result<T, AutomationError>;

/// Everything needed to open one automation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub headless: bool,
    pub user_agent: String,

    /// Extra Chromium command line switches
    pub extra_args: Vec<String>,

    /// Inject [`HIDE_WEBDRIVER_SCRIPT`] into every new document
    pub hide_webdriver: bool,

    /// Chromium binary; auto-detected when unset
    pub chrome_executable: Option<String>,

    /// Upper bound for a single page load
    pub page_load_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extra_args: vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
                "--disable-blink-features=AutomationControlled".to_string(),
            ],
            hide_webdriver: true,
            chrome_executable: None,
            page_load_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }
}

/// One live browser session
///
/// Selectors passed to [`BrowserSession::switch_frame`] are resolved against
/// the top-level document; every other operation runs in the current
/// browsing context (top-level or the frame last switched into).
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> AutomationResult<()>;

    /// Wait until an element matching `selector` is attached
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> AutomationResult<()>;

    /// Wait for the frame element to attach, then make its document current
    async fn switch_frame(&mut self, selector: &str, timeout: Duration) -> AutomationResult<()>;

    async fn switch_default(&mut self) -> AutomationResult<()>;

    /// Text of `child` inside each of the first `limit` `entries`, `None` when missing
    async fn entry_texts(
        &mut self,
        entries: &str,
        child: &str,
        limit: usize,
    ) -> AutomationResult<Vec<Option<String>>>;

    /// Click `child` inside the entry at `index`; `false` when it does not exist
    async fn click_entry(&mut self, entries: &str, index: usize, child: &str) -> AutomationResult<bool>;

    /// Evaluate an expression in the current context and return its JSON value
    async fn run_script(&mut self, expression: &str) -> AutomationResult<Value>;

    async fn close(self: Box<Self>) -> AutomationResult<()>;
}

/// Launches sessions, one per harvest task
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, config: &SessionConfig) -> AutomationResult<Box<dyn BrowserSession>>;
}

/// Poll `expression` until it evaluates truthy or `timeout` elapses
///
/// A script error while polling counts as "not yet": the execution context of
/// a frame that is still navigating disappears between polls.
pub async fn wait_until_truthy(
    session: &mut dyn BrowserSession,
    expression: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> AutomationResult<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match session.run_script(expression).await {
            Ok(value) if is_truthy(&value) => return Ok(()),
            Ok(_) => {}
            Err(AutomationError::Script(message)) => debug!("Readiness poll failed, retrying: {}", message),
            Err(e) => return Err(e),
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(AutomationError::timeout(expression, timeout));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
