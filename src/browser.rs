//! Headless Chrome session management via chromiumoxide

use anyhow::{anyhow, Context, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Interval between HTML snapshots while waiting for content to settle
const SETTLE_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub user_agent: String,
    /// Concurrent tabs allowed on this session
    pub tabs: usize,
}

/// One Chrome process plus its CDP event handler
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    semaphore: Arc<Semaphore>,
    user_agent: String,
}

impl BrowserSession {
    /// Whether a Chrome/Chromium executable can be found on this machine
    pub fn probe() -> bool {
        BrowserConfig::builder().build().is_ok()
    }

    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow!("Browser config error: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch Chrome. Is Chrome/Chromium installed?")?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self {
            browser,
            handler,
            semaphore: Arc::new(Semaphore::new(options.tabs.max(1))),
            user_agent: options.user_agent.clone(),
        })
    }

    /// Tab permits, shared so callers can wait without holding the session
    pub fn permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.semaphore)
    }

    /// Open a blank tab with the configured user agent
    pub async fn new_page(&self, permit: OwnedSemaphorePermit) -> Result<BrowserPage> {
        let page = self.browser.new_page("about:blank").await?;

        page.execute(
            chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams::new(
                &self.user_agent,
            ),
        )
        .await?;

        Ok(BrowserPage {
            page,
            _permit: permit,
        })
    }

    pub async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        closed?;
        Ok(())
    }
}

/// A tab holding one of the session's permits until closed
pub struct BrowserPage {
    page: Page,
    _permit: OwnedSemaphorePermit,
}

impl BrowserPage {
    /// Navigate, wait for the DOM to settle, and return the rendered HTML
    pub async fn render(&self, url: &str, timeout: Duration, settle: Duration) -> Result<String> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                let msg = e.to_string();
                return Err(anyhow!("{}: {}", classify_error(&msg), msg));
            }
            Err(_) => return Err(anyhow!("Navigation timeout after {}ms", timeout.as_millis())),
        }

        if let Some(status) = self.error_status().await {
            return Err(anyhow!("HTTP {} error page", status));
        }

        self.settled_content(settle).await
    }

    /// Poll until two consecutive snapshots match or the ceiling is hit
    async fn settled_content(&self, settle: Duration) -> Result<String> {
        let deadline = Instant::now() + settle;
        let mut last_len = None;
        loop {
            let html = self
                .page
                .content()
                .await
                .context("Failed to get page content")?;
            if last_len == Some(html.len()) || Instant::now() >= deadline {
                return Ok(html);
            }
            last_len = Some(html.len());
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }

    // chromiumoxide doesn't expose the HTTP status, so read it off the title
    async fn error_status(&self) -> Option<u16> {
        let title = self.page.get_title().await.ok().flatten()?;
        status_from_title(&title)
    }

    pub async fn close(self) {
        let _ = self.page.close().await;
    }
}

/// Only the start of the title counts; doc pages may mention status codes
fn status_from_title(title: &str) -> Option<u16> {
    let t = title.trim().to_lowercase();
    let starts = |prefixes: &[&str]| prefixes.iter().any(|p| t.starts_with(p));
    if starts(&["404", "not found", "page not found"]) {
        Some(404)
    } else if starts(&["403", "forbidden", "access denied"]) {
        Some(403)
    } else if starts(&["500", "internal server error"]) {
        Some(500)
    } else {
        None
    }
}

fn classify_error(error: &str) -> &'static str {
    if error.contains("ERR_NAME_NOT_RESOLVED") {
        "DNS_FAILED"
    } else if error.contains("ERR_CONNECTION_REFUSED") {
        "CONNECTION_REFUSED"
    } else if error.contains("ERR_CONNECTION_TIMED_OUT") {
        "TIMEOUT"
    } else if error.contains("ERR_CERT") || error.contains("SSL") {
        "SSL_ERROR"
    } else {
        "NETWORK_ERROR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error() {
        assert_eq!(classify_error("net::ERR_NAME_NOT_RESOLVED"), "DNS_FAILED");
        assert_eq!(classify_error("ERR_CONNECTION_REFUSED"), "CONNECTION_REFUSED");
        assert_eq!(classify_error("random error"), "NETWORK_ERROR");
    }

    #[test]
    fn test_status_from_title() {
        assert_eq!(status_from_title("404 - Page Not Found"), Some(404));
        assert_eq!(status_from_title("Access Denied"), Some(403));
        assert_eq!(status_from_title("Overview | rei-2/Amalgam | DeepWiki"), None);
        assert_eq!(status_from_title("Handling 404 responses | DeepWiki"), None);
    }
}
