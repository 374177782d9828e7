// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::BrowserSettings;
use crate::engines::identity::USER_AGENTS;
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const SCROLL_SCRIPT: &str = "window.scrollBy(0, window.innerHeight)";

/// 浏览器自动化错误
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("Browser operation failed: {0}")]
    Operation(String),
    #[error("Browser operation timed out after {0:?}")]
    Timeout(Duration),
}

/// 一个已打开的浏览器会话（单页面）
#[async_trait]
pub trait BrowserSession: Send {
    /// 打开地址并等待加载
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// 向下滚动一屏，触发懒加载
    async fn scroll(&mut self) -> Result<(), BrowserError>;

    /// 当前渲染后的 HTML
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// 关闭浏览器，消费会话
    async fn close(self: Box<Self>);
}

/// 浏览器启动器，每次级联调用最多启动一次
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// 基于 chromiumoxide 的无头 Chrome 启动器
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.settings.timeout_ms)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .request_timeout(self.timeout())
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Drive CDP events until the browser goes away.
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let session = ChromiumSession {
                    browser,
                    page: None,
                    events,
                    timeout: self.timeout(),
                };
                Box::new(session).close().await;
                return Err(BrowserError::Launch(e.to_string()));
            }
        };
        if let Err(e) = page.set_user_agent(USER_AGENTS[0]).await {
            debug!("Could not override browser user agent: {}", e);
        }

        Ok(Box::new(ChromiumSession {
            browser,
            page: Some(page),
            events,
            timeout: self.timeout(),
        }))
    }
}

/// chromiumoxide 会话
pub struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    events: JoinHandle<()>,
    timeout: Duration,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Operation("page is closed".to_string()))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        let page = self.page()?;
        match tokio::time::timeout(self.timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout(self.timeout)),
        }
    }

    async fn scroll(&mut self) -> Result<(), BrowserError> {
        self.page()?
            .evaluate(SCROLL_SCRIPT)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Operation(e.to_string()))
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        let page = self.page()?;
        match tokio::time::timeout(self.timeout, page.content()).await {
            Ok(result) => result.map_err(|e| BrowserError::Operation(e.to_string())),
            Err(_) => Err(BrowserError::Timeout(self.timeout)),
        }
    }

    async fn close(self: Box<Self>) {
        let mut session = *self;
        session.page = None;
        if let Err(e) = session.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = session.browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        session.events.abort();
    }
}
