// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::settings::FetcherSettings;
use crate::domain::models::run_stats::CaptchaLog;
use crate::domain::services::captcha_detector::classify_response;
use crate::engines::identity::{IdentityRotator, USER_AGENTS};
use crate::engines::traits::{CaptchaSolver, FetchError, FetchedPage, HeadProbe, NoopSolver};
use crate::utils::retry_policy::RetryPolicy;
use reqwest::header::{HeaderValue, CONTENT_TYPE, REFERER};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 具备重试、退避、403 换身份和验证码拦截的抓取器
///
/// 整个抓取流程唯一的网络出口。普通请求共享一个保存 Cookie 的会话。
pub struct ResilientFetcher {
    client: Client,
    identity: IdentityRotator,
    solver: Arc<dyn CaptchaSolver>,
    settings: FetcherSettings,
}

impl ResilientFetcher {
    /// 创建抓取器，默认使用 [`NoopSolver`]
    pub fn new(settings: &FetcherSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client()?,
            identity: IdentityRotator::new(),
            solver: Arc::new(NoopSolver),
            settings: settings.clone(),
        })
    }

    /// 注入验证码求解器
    pub fn with_solver(mut self, solver: Arc<dyn CaptchaSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn settings(&self) -> &FetcherSettings {
        &self.settings
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = self.identity.next_identity();
        if let Ok(referer) = HeaderValue::from_str(&self.settings.referer) {
            headers.insert(REFERER, referer);
        }
        headers
    }

    /// 使用配置中的超时与尝试次数抓取页面
    pub async fn get(&self, url: &str, captcha_log: &mut CaptchaLog) -> Result<FetchedPage, FetchError> {
        self.fetch(url, self.settings.timeout(), self.settings.retries, captcha_log)
            .await
    }

    /// 抓取页面
    ///
    /// 每次尝试都换身份并带上来自搜索引擎的 Referer：
    /// - 200：检查验证码，未检测到即返回
    /// - 检测到验证码：先交给求解器，失败则较长退避后重试
    /// - 403：换身份短退避后重试
    /// - 其他状态：立即失败
    /// - 超时/连接错误：短退避后重试，用尽后返回 `NoResponse`
    ///
    /// # 参数
    ///
    /// * `url` - 目标地址
    /// * `timeout` - 单次请求超时
    /// * `attempts` - 最大尝试次数
    /// * `captcha_log` - 验证码事件日志
    pub async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        attempts: u32,
        captcha_log: &mut CaptchaLog,
    ) -> Result<FetchedPage, FetchError> {
        let transient = RetryPolicy::fixed(attempts, self.settings.retry_backoff());
        let challenged = RetryPolicy::fixed(attempts, self.settings.captcha_backoff());
        let forbidden = RetryPolicy::fixed(attempts, self.settings.forbidden_backoff());
        let mut last_error = FetchError::NoResponse(url.to_string());

        for attempt in 1..=transient.max_attempts {
            let sent = self
                .client
                .get(url)
                .headers(self.headers())
                .timeout(timeout)
                .send()
                .await;

            let page = match sent {
                Ok(response) => read_page(response).await,
                Err(e) => Err(e),
            };
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    debug!("Attempt {} for {} failed: {}", attempt, url, e);
                    last_error = FetchError::NoResponse(url.to_string());
                    if transient.should_retry(attempt) {
                        tokio::time::sleep(transient.calculate_backoff(attempt)).await;
                    }
                    continue;
                }
            };

            if let Some(kind) = classify_response(page.status, page.header("server"), &page.body) {
                captcha_log.record(url, kind);
                match self.solver.solve(url, kind, &page).await {
                    Ok(Some(solved)) => return Ok(solved),
                    Ok(None) => {}
                    Err(e) => warn!("CAPTCHA solver {} failed: {}", self.solver.name(), e),
                }
                last_error = FetchError::Challenge {
                    url: url.to_string(),
                    kind,
                };
                if challenged.should_retry(attempt) {
                    tokio::time::sleep(challenged.calculate_backoff(attempt)).await;
                }
                continue;
            }

            match page.status {
                200 => return Ok(page),
                403 => {
                    debug!("403 from {}, rotating identity", url);
                    last_error = FetchError::PageFailed {
                        url: url.to_string(),
                        status: 403,
                    };
                    if forbidden.should_retry(attempt) {
                        tokio::time::sleep(forbidden.calculate_backoff(attempt)).await;
                    }
                }
                status => {
                    return Err(FetchError::PageFailed {
                        url: url.to_string(),
                        status,
                    })
                }
            }
        }

        Err(last_error)
    }

    /// HEAD 探测，单次尝试
    pub async fn head(&self, url: &str) -> Result<HeadProbe, FetchError> {
        let response = self
            .client
            .head(url)
            .headers(self.headers())
            .timeout(self.settings.head_timeout())
            .send()
            .await?;

        Ok(HeadProbe {
            status: response.status().as_u16(),
            content_type: content_type_of(&response),
        })
    }

    /// 下载图片到目标路径，返回写入的字节数
    ///
    /// 响应内容类型必须包含 `image`
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(self.headers())
            .timeout(self.settings.download_timeout())
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(FetchError::PageFailed {
                url: url.to_string(),
                status,
            });
        }

        let content_type = content_type_of(&response);
        if !content_type.to_lowercase().contains("image") {
            return Err(FetchError::NotAnImage {
                url: url.to_string(),
                content_type,
            });
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    /// 预热后检索
    ///
    /// 用独立的 Cookie 会话先访问首页获取会话状态，等待后再请求检索页。
    /// 用于反爬严格的零售商，首页请求失败不影响后续检索。
    pub async fn warmed_fetch(
        &self,
        homepage: &str,
        search_url: &str,
        wait: Duration,
        captcha_log: &mut CaptchaLog,
    ) -> Result<FetchedPage, FetchError> {
        let client = build_client()?;
        let mut headers = IdentityRotator::identity_for(USER_AGENTS[0]);
        if let Ok(referer) = HeaderValue::from_str(&self.settings.referer) {
            headers.insert(REFERER, referer);
        }

        if let Err(e) = client
            .get(homepage)
            .headers(headers.clone())
            .timeout(self.settings.timeout())
            .send()
            .await
        {
            debug!("Warm-up request to {} failed: {}", homepage, e);
        }
        tokio::time::sleep(wait).await;

        let response = client
            .get(search_url)
            .headers(headers)
            .timeout(self.settings.timeout())
            .send()
            .await
            .map_err(|_| FetchError::NoResponse(search_url.to_string()))?;
        let page = read_page(response)
            .await
            .map_err(|_| FetchError::NoResponse(search_url.to_string()))?;

        if let Some(kind) = classify_response(page.status, page.header("server"), &page.body) {
            captcha_log.record(search_url, kind);
            return Err(FetchError::Challenge {
                url: search_url.to_string(),
                kind,
            });
        }
        if page.status != 200 {
            return Err(FetchError::PageFailed {
                url: search_url.to_string(),
                status: page.status,
            });
        }
        Ok(page)
    }
}

fn build_client() -> Result<Client, FetchError> {
    Ok(Client::builder().cookie_store(true).build()?)
}

fn content_type_of(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn read_page(response: Response) -> Result<FetchedPage, reqwest::Error> {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let content_type = content_type_of(&response);
    let mut headers = HashMap::new();
    for (k, v) in response.headers() {
        if let Ok(v_str) = v.to_str() {
            headers.insert(k.as_str().to_string(), v_str.to_string());
        }
    }
    let body = response.text().await?;

    Ok(FetchedPage {
        url,
        status,
        content_type,
        headers,
        body,
    })
}

#[cfg(test)]
#[path = "fetcher_test.rs"]
mod tests;
