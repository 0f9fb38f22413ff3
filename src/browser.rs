//! Browser lifecycle: Chrome discovery, launch, and teardown.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::config::BrowserSettings;

const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// A launched browser with its single page and CDP handler task.
///
/// Owned exclusively by one orchestrator run; `close` consumes the session
/// so teardown can only happen once.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chrome and open a blank page.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let chrome_path = match &settings.chrome_executable {
            Some(path) => path.display().to_string(),
            None => find_chrome().context(
                "Chrome/Chromium not found. Install Chrome or set browser.chrome_executable.",
            )?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .viewport(None)
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        if !settings.headless {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to configure browser: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;

        tracing::info!(headless = settings.headless, "Browser launched");

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Tear the browser down. Consumes the session.
    pub fn close(self) {
        drop(self.browser);
        self.handler_task.abort();
        tracing::info!("Browser closed");
    }
}

/// Poll for a selector until it appears or the timeout elapses.
pub async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> Option<Element> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Some(element);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(SELECTOR_POLL).await;
    }
}

/// Find a Chrome/Chromium executable.
fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "chromium"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/run/current-system/sw/bin/google-chrome",
        "/run/current-system/sw/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    candidates
        .into_iter()
        .find(|candidate| Path::new(candidate).exists())
        .map(|s| s.to_string())
}
