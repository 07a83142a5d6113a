//! Headless browser automation
//!
//! The pipeline only needs four capabilities from a browser: navigate, wait for
//! an element, evaluate a script and read the cookie jar. `BrowserDriver`
//! captures exactly that, so the session bootstrapper can run against a
//! scripted fake in tests. `ChromiumLauncher` is the production driver
//! (chromiumoxide over CDP).

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::SessionCookie;
use crate::infrastructure::config::BrowserConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("timed out after {timeout:?} waiting for {selector}")]
    WaitTimeout { selector: String, timeout: Duration },

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("cookie retrieval failed: {0}")]
    Cookies(String),

    #[error("browser is already closed")]
    Closed,
}

/// When a selector counts as ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// In the DOM. Hidden inputs qualify.
    Present,
    /// In the DOM with a layout box.
    Visible,
}

/// Script that evaluates to `true` once `selector` is ready under `mode`.
pub fn readiness_script(selector: &str, mode: WaitMode) -> Result<String, BrowserError> {
    let selector_literal =
        serde_json::to_string(selector).map_err(|e| BrowserError::Evaluation(e.to_string()))?;
    Ok(match mode {
        WaitMode::Present => format!("document.querySelector({selector_literal}) !== null"),
        WaitMode::Visible => format!(
            "(() => {{ const el = document.querySelector({selector_literal}); \
             return !!el && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length); }})()"
        ),
    })
}

/// One running browser instance with a single tab.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Bounded wait; an element that never becomes ready is an error, never a hang.
    async fn wait_for(&mut self, selector: &str, mode: WaitMode, timeout: Duration) -> Result<(), BrowserError>;

    async fn evaluate(&mut self, script: &str) -> Result<Value, BrowserError>;

    async fn get_cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError>;

    /// Terminates the browser process. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Starts isolated browser processes.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Driver: BrowserDriver + 'static;

    async fn launch(&self) -> Result<Self::Driver, BrowserError>;
}

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// chromiumoxide 기반 launcher
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    config: BrowserConfig,
    user_agent: String,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn new(config: BrowserConfig, user_agent: impl Into<String>) -> Self {
        Self {
            config,
            user_agent: user_agent.into(),
        }
    }

    fn cdp_config(&self) -> Result<CdpBrowserConfig, BrowserError> {
        // headless is the chromiumoxide default
        let mut builder = CdpBrowserConfig::builder()
            .arg("--blink-settings=imagesEnabled=false")
            .arg("--disable-background-networking")
            .arg("--disable-default-apps")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--disable-gpu")
            .arg("--mute-audio")
            .arg(format!("--user-agent={}", self.user_agent))
            .request_timeout(Duration::from_secs(self.config.wait_timeout_seconds.max(1)));
        if let Some(executable) = &self.config.executable {
            builder = builder.chrome_executable(executable);
        }
        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Driver = ChromiumDriver;

    async fn launch(&self) -> Result<ChromiumDriver, BrowserError> {
        let config = self.cdp_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                // the process is already running; do not leak it
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(BrowserError::Launch(e.to_string()));
            }
        };

        debug!("🧭 Chromium launched");
        Ok(ChromiumDriver {
            browser: Some(browser),
            page: Some(page),
            handler_task: Some(handler_task),
        })
    }
}

pub struct ChromiumDriver {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
}

impl ChromiumDriver {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::Closed)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let page = self.page()?;
        let navigation_error = |e: chromiumoxide::error::CdpError| BrowserError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };
        page.goto(url).await.map_err(navigation_error)?;
        page.wait_for_navigation().await.map_err(navigation_error)?;
        debug!("🧭 navigated: {}", url);
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, mode: WaitMode, timeout: Duration) -> Result<(), BrowserError> {
        let script = readiness_script(selector, mode)?;

        let poll = async {
            loop {
                if self.evaluate(&script).await? == Value::Bool(true) {
                    return Ok::<(), BrowserError>(());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BrowserError::WaitTimeout {
                selector: selector.to_string(),
                timeout,
            })?
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, BrowserError> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn get_cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        let cookies = self
            .page()?
            .get_cookies()
            .await
            .map_err(|e| BrowserError::Cookies(e.to_string()))?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie::new(c.name, c.value, c.domain, c.path))
            .collect())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.page = None;
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let result = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Launch(e.to_string()));
        if let Err(e) = browser.wait().await {
            warn!("⚠️ waiting for browser exit failed: {}", e);
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        debug!("🧭 Chromium closed");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launcher_builds_config_with_executable_override() {
        let config = BrowserConfig {
            executable: Some("/usr/bin/chromium".into()),
            ..BrowserConfig::default()
        };
        let launcher = ChromiumLauncher::new(config, "UA");
        assert!(launcher.cdp_config().is_ok());
    }

    #[test]
    fn presence_check_ignores_layout() {
        let script = readiness_script(r#"input[name="_csrf"]"#, WaitMode::Present).unwrap();
        assert_eq!(script, r#"document.querySelector("input[name=\"_csrf\"]") !== null"#);
        assert!(!script.contains("offsetWidth"));

        let script = readiness_script("#tbody_opnList", WaitMode::Visible).unwrap();
        assert!(script.contains(r##"document.querySelector("#tbody_opnList")"##));
        assert!(script.contains("getClientRects"));
    }

    #[test]
    fn wait_timeout_error_names_the_selector() {
        let err = BrowserError::WaitTimeout {
            selector: "#tbody_opnList".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(err.to_string().contains("#tbody_opnList"));
    }
}
