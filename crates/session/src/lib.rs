//! The single browser session a batch runs inside.
//!
//! Owns the chromiumoxide [`Browser`], its event handler task and the one
//! [`Page`] all workflows drive. The session is created once per batch,
//! injected as `Arc<Session>` into every collaborator, and closed by the
//! orchestrator when the batch finishes. Nothing here retries: timeouts
//! and failures are reported upward and the caller decides.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

mod capture;
mod errors;

pub use capture::Capture;
pub use errors::SessionError;

/// Launch-time knobs. Timeouts are per operation, not per batch.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub chrome_executable: Option<PathBuf>,
    pub screenshot_dir: PathBuf,
    pub nav_timeout_ms: u64,
    pub script_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1600, 1000),
            chrome_executable: None,
            screenshot_dir: PathBuf::from("screenshots"),
            nav_timeout_ms: 30_000,
            script_timeout_ms: 10_000,
        }
    }
}

pub struct Session {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    capture: Capture,
    open: AtomicBool,
    nav_timeout: Duration,
    script_timeout: Duration,
}

impl Session {
    /// Launch a fresh browser and open the working page.
    pub async fn launch(config: SessionConfig) -> Result<Self, SessionError> {
        let capture = Capture::new(&config.screenshot_dir)
            .map_err(|err| SessionError::Launch(format!("screenshot dir: {err}")))?;

        let mut builder = BrowserConfig::builder()
            .window_size(config.window_size.0, config.window_size.1)
            .request_timeout(Duration::from_millis(config.nav_timeout_ms))
            .launch_timeout(Duration::from_secs(20));
        if !config.headless {
            builder = builder.with_head();
        }
        let mut args = vec![
            "--disable-background-networking",
            "--disable-default-apps",
            "--disable-extensions",
            "--disable-sync",
            "--no-first-run",
            "--no-default-browser-check",
        ];
        if config.headless {
            args.push("--headless=new");
            args.push("--hide-scrollbars");
            args.push("--mute-audio");
        }
        builder = builder.args(args);
        if let Some(exe) = &config.chrome_executable {
            builder = builder.chrome_executable(exe.clone());
        }
        let browser_config = builder
            .build()
            .map_err(|err| SessionError::Launch(format!("browser config: {err}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| SessionError::Launch(err.to_string()))?;

        // The handler stream must be drained for the connection to make
        // progress; it ends when the browser process goes away.
        let handler_task = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(err) = result {
                    warn!(error = %err, "browser handler stopped");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| SessionError::Launch(format!("initial page: {err}")))?;

        info!(headless = config.headless, "browser session launched");
        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler_task,
            capture,
            open: AtomicBool::new(true),
            nav_timeout: Duration::from_millis(config.nav_timeout_ms),
            script_timeout: Duration::from_millis(config.script_timeout_ms),
        })
    }

    /// Fast-fail guard every operation runs first.
    pub fn ensure_open(&self) -> Result<(), SessionError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SessionError::NotReady)
        }
    }

    /// Navigate the working page and wait for the load to settle.
    pub async fn goto(&self, url: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        debug!(url, "navigating");
        let nav = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match timeout(self.nav_timeout, nav).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(SessionError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Err(SessionError::Timeout {
                what: format!("navigation to {url}"),
                ms: self.nav_timeout.as_millis() as u64,
            }),
        }
    }

    /// Evaluate a script on the working page and deserialize its return
    /// value. The script runs inside the page, so all shadow-root walking
    /// happens there and only JSON-shaped results cross back.
    pub async fn evaluate<T: DeserializeOwned>(
        &self,
        script: impl Into<String>,
    ) -> Result<T, SessionError> {
        self.ensure_open()?;
        let script = script.into();
        match timeout(self.script_timeout, self.page.evaluate(script)).await {
            Ok(Ok(result)) => result
                .into_value::<T>()
                .map_err(|err| SessionError::Script(format!("result deserialization: {err}"))),
            Ok(Err(err)) => Err(SessionError::Script(err.to_string())),
            Err(_) => Err(SessionError::Timeout {
                what: "script evaluation".to_string(),
                ms: self.script_timeout.as_millis() as u64,
            }),
        }
    }

    /// Evaluate a script whose result the caller only inspects loosely.
    pub async fn evaluate_value(
        &self,
        script: impl Into<String>,
    ) -> Result<serde_json::Value, SessionError> {
        self.evaluate(script).await
    }

    pub async fn current_url(&self) -> Result<String, SessionError> {
        self.ensure_open()?;
        let url = self
            .page
            .url()
            .await
            .map_err(|err| SessionError::Script(format!("url query: {err}")))?;
        Ok(url.unwrap_or_default())
    }

    /// Capture a tagged screenshot of the working page.
    pub async fn capture(&self, tag: &str) -> Result<PathBuf, SessionError> {
        self.ensure_open()?;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();
        let png = self
            .page
            .screenshot(params)
            .await
            .map_err(|err| SessionError::Screenshot(err.to_string()))?;
        self.capture
            .write(tag, &png)
            .map_err(|err| SessionError::Screenshot(err.to_string()))
    }

    /// Capture on a failure path: never lets the screenshot error mask
    /// the error that triggered it.
    pub async fn capture_quiet(&self, tag: &str) {
        if let Err(err) = self.capture(tag).await {
            warn!(tag, error = %err, "diagnostic capture failed");
        }
    }

    /// Close the browser and stop the handler task. The session refuses
    /// all further operations afterwards.
    pub async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let mut browser = self.browser.lock().await;
            if let Err(err) = browser.close().await {
                warn!(error = %err, "browser close failed");
            }
            if let Err(err) = browser.wait().await {
                warn!(error = %err, "browser did not exit cleanly");
            }
            self.handler_task.abort();
            info!("browser session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_headless_with_sane_timeouts() {
        let config = SessionConfig::default();
        assert!(config.headless);
        assert!(config.nav_timeout_ms >= 10_000);
        assert!(config.script_timeout_ms >= 1_000);
    }
}
