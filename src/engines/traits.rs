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

use crate::domain::services::captcha_detector::CaptchaKind;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// 抓取错误类型
///
/// 对调用方而言，所有变体都等同于“该来源没有结果”
#[derive(Error, Debug)]
pub enum FetchError {
    /// 超时或连接错误，重试后仍无响应
    #[error("No response from {0}")]
    NoResponse(String),
    /// 非 200 状态码
    #[error("Page failed with status {status}: {url}")]
    PageFailed { url: String, status: u16 },
    /// 验证码/拦截页，且求解器未能处理
    #[error("Challenge page ({kind}) at {url}")]
    Challenge { url: String, kind: CaptchaKind },
    /// 响应不是图片
    #[error("Not an image ({content_type}): {url}")]
    NotAnImage { url: String, content_type: String },
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 写入文件失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 抓取到的页面
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// 跟随重定向后的最终地址
    pub url: String,
    /// HTTP状态码
    pub status: u16,
    /// 内容类型
    pub content_type: String,
    /// 响应头（小写键）
    pub headers: HashMap<String, String>,
    /// 响应内容
    pub body: String,
}

impl FetchedPage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// HEAD 探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadProbe {
    pub status: u16,
    pub content_type: String,
}

impl HeadProbe {
    /// 200 且内容类型为图片
    pub fn is_live_image(&self) -> bool {
        self.status == 200 && self.content_type.to_lowercase().contains("image")
    }
}

/// 验证码求解器
///
/// 在构造抓取器时注入；默认实现 [`NoopSolver`] 从不求解
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// 尝试求解，返回可用的页面或 `None`
    async fn solve(
        &self,
        url: &str,
        kind: CaptchaKind,
        challenge: &FetchedPage,
    ) -> Result<Option<FetchedPage>, FetchError>;

    /// 求解器名称
    fn name(&self) -> &'static str;
}

/// 不做任何事的求解器
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSolver;

#[async_trait]
impl CaptchaSolver for NoopSolver {
    async fn solve(
        &self,
        _url: &str,
        _kind: CaptchaKind,
        _challenge: &FetchedPage,
    ) -> Result<Option<FetchedPage>, FetchError> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
