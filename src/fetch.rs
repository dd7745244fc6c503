//! Page fetching: headless browser first, plain HTTP as fallback
//!
//! Each path gets its own retry budget with exponential backoff. A browser
//! that cannot be launched is marked unavailable for the rest of the
//! fetcher's life so later pages go straight to the fallback.

use crate::browser::{BrowserOptions, BrowserSession};
use crate::config::{RetryPolicy, ScraperConfig};
use crate::error::{Result, ScrapeError};
use crate::schema::Via;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Why a single source attempt failed
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source cannot serve any request (no browser, launch failed)
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Render(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A way of turning a URL into HTML
#[async_trait]
pub trait PageSource: Send + Sync {
    fn via(&self) -> Via;

    fn is_available(&self) -> bool {
        true
    }

    async fn render(&self, url: &str) -> std::result::Result<String, SourceError>;

    /// Drop any session state; the next render starts a new one
    async fn release(&self) {}

    /// A fresh source with the same settings and no shared session
    fn fork(&self) -> Box<dyn PageSource>;
}

/// Internal outcome of a fetch across both paths
#[derive(Debug)]
pub(crate) enum FetchOutcome {
    Rendered { html: String, via: Via },
    Failure { reason: String, attempts: u32 },
}

/// Browser path: one lazily-launched session, reused until released
pub struct BrowserSource {
    options: BrowserOptions,
    timeout: Duration,
    settle: Duration,
    session: Mutex<Option<BrowserSession>>,
    launch_failed: AtomicBool,
}

impl BrowserSource {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            options: BrowserOptions {
                headless: config.headless,
                user_agent: config.user_agent.clone(),
                tabs: config.page_concurrency,
            },
            timeout: config.timeout(),
            settle: config.settle(),
            session: Mutex::new(None),
            launch_failed: AtomicBool::new(false),
        }
    }

    async fn open_page(&self) -> std::result::Result<crate::browser::BrowserPage, SourceError> {
        let permits = {
            let mut guard = self.session.lock().await;
            if guard.is_none() {
                info!(headless = self.options.headless, "launching browser session");
                match BrowserSession::launch(&self.options).await {
                    Ok(session) => *guard = Some(session),
                    Err(e) => {
                        self.launch_failed.store(true, Ordering::SeqCst);
                        return Err(SourceError::Unavailable(format!("{:#}", e)));
                    }
                }
            }
            match guard.as_ref() {
                Some(session) => session.permits(),
                None => return Err(SourceError::Unavailable("browser session closed".into())),
            }
        };

        let permit = permits
            .acquire_owned()
            .await
            .map_err(|e| SourceError::Render(e.to_string()))?;

        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| SourceError::Render("browser session closed".into()))?;
        session
            .new_page(permit)
            .await
            .map_err(|e| SourceError::Render(format!("{:#}", e)))
    }
}

#[async_trait]
impl PageSource for BrowserSource {
    fn via(&self) -> Via {
        Via::Browser
    }

    fn is_available(&self) -> bool {
        !self.launch_failed.load(Ordering::SeqCst)
    }

    async fn render(&self, url: &str) -> std::result::Result<String, SourceError> {
        let page = self.open_page().await?;
        let result = page.render(url, self.timeout, self.settle).await;
        page.close().await;
        result.map_err(|e| SourceError::Render(format!("{:#}", e)))
    }

    async fn release(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            debug!("closing browser session");
            if let Err(e) = session.close().await {
                warn!("error closing browser: {:#}", e);
            }
        }
    }

    fn fork(&self) -> Box<dyn PageSource> {
        Box::new(Self {
            options: self.options.clone(),
            timeout: self.timeout,
            settle: self.settle,
            session: Mutex::new(None),
            launch_failed: AtomicBool::new(self.launch_failed.load(Ordering::SeqCst)),
        })
    }
}

/// Fallback path: a direct GET, HTML used as served
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ScrapeError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    fn via(&self) -> Via {
        Via::Fallback
    }

    async fn render(&self, url: &str) -> std::result::Result<String, SourceError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    fn fork(&self) -> Box<dyn PageSource> {
        Box::new(self.clone())
    }
}

/// Retrieves rendered HTML through the primary source, then the fallback
pub struct PageFetcher {
    primary: Option<Box<dyn PageSource>>,
    fallback: Option<Box<dyn PageSource>>,
    retry: RetryPolicy,
}

impl PageFetcher {
    /// Build the standard browser + HTTP pair, probing for Chrome once
    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        let primary: Option<Box<dyn PageSource>> = if !config.use_browser {
            info!("browser disabled, using HTTP fetches only");
            None
        } else if !BrowserSession::probe() {
            warn!("no Chrome/Chromium executable found, using HTTP fallback");
            None
        } else {
            Some(Box::new(BrowserSource::new(config)))
        };
        let fallback: Box<dyn PageSource> = Box::new(HttpSource::new(config)?);
        Ok(Self::from_sources(primary, Some(fallback), config.retry))
    }

    pub fn from_sources(
        primary: Option<Box<dyn PageSource>>,
        fallback: Option<Box<dyn PageSource>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            fallback,
            retry,
        }
    }

    pub fn has_browser(&self) -> bool {
        self.primary.as_ref().is_some_and(|p| p.is_available())
    }

    pub(crate) async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut attempts = 0;
        let mut reasons = Vec::new();

        for (source, is_primary) in [(&self.primary, true), (&self.fallback, false)] {
            let Some(source) = source else { continue };
            if !source.is_available() {
                continue;
            }
            match self.try_source(&**source, url, &mut attempts).await {
                Ok(html) => {
                    return FetchOutcome::Rendered {
                        html,
                        via: source.via(),
                    }
                }
                Err(reason) => {
                    if is_primary {
                        // next browser fetch relaunches lazily
                        source.release().await;
                        if self.fallback.is_some() {
                            warn!(url, "browser path failed ({}), falling back to HTTP", reason);
                        }
                    }
                    reasons.push(format!("{}: {}", source.via(), reason));
                }
            }
        }

        if reasons.is_empty() {
            reasons.push("no fetch source available".to_string());
        }
        FetchOutcome::Failure {
            reason: reasons.join("; "),
            attempts,
        }
    }

    async fn try_source(
        &self,
        source: &dyn PageSource,
        url: &str,
        attempts: &mut u32,
    ) -> std::result::Result<String, String> {
        let mut last = String::new();
        for attempt in 1..=self.retry.max_attempts {
            *attempts += 1;
            match source.render(url).await {
                Ok(html) => {
                    debug!(url, via = %source.via(), attempt, "fetched");
                    return Ok(html);
                }
                Err(SourceError::Unavailable(reason)) => {
                    warn!(url, "{} unavailable: {}", source.via(), reason);
                    return Err(reason);
                }
                Err(e) => {
                    warn!(url, via = %source.via(), attempt, "fetch attempt failed: {}", e);
                    last = e.to_string();
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }
        Err(last)
    }

    pub fn fork(&self) -> Self {
        Self {
            primary: self.primary.as_ref().map(|p| p.fork()),
            fallback: self.fallback.as_ref().map(|f| f.fork()),
            retry: self.retry,
        }
    }

    /// Release the browser session; safe to call repeatedly
    pub async fn close(&self) {
        if let Some(primary) = &self.primary {
            primary.release().await;
        }
        if let Some(fallback) = &self.fallback {
            fallback.release().await;
        }
    }
}
