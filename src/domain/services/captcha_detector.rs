// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 只检查正文开头这么多字符
const SCAN_WINDOW: usize = 5000;

/// 短错误页长度上限（字节）
const SHORT_ERROR_PAGE: usize = 2000;

/// 页面正文中常见的验证码/拦截特征
pub const CAPTCHA_SIGNATURES: &[&str] = &[
    "captcha",
    "recaptcha",
    "hcaptcha",
    "g-recaptcha",
    "cf-challenge",
    "cf-turnstile",
    "challenge-platform",
    "please verify you are a human",
    "please verify you are not a robot",
    "are you a robot",
    "prove you are human",
    "human verification",
    "bot detection",
    "automated access",
    "unusual traffic",
    "sorry, we just need to make sure you're not a robot",
    "one more step",
    "checking your browser",
    "access denied",
    "automated queries",
    "distilcaptchebody",
    "px-captcha",
    "datadome",
];

const EDGE_WAF_SERVERS: &[&str] = &["cloudflare", "ddos-guard"];

/// 验证码/拦截页类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptchaKind {
    #[serde(rename = "reCAPTCHA")]
    ReCaptcha,
    #[serde(rename = "hCaptcha")]
    HCaptcha,
    #[serde(rename = "Cloudflare")]
    Cloudflare,
    #[serde(rename = "PerimeterX")]
    PerimeterX,
    #[serde(rename = "DataDome")]
    DataDome,
    #[serde(rename = "Distil")]
    Distil,
    #[serde(rename = "element-detected")]
    ElementDetected,
    #[serde(rename = "generic")]
    Generic,
    #[serde(rename = "WAF-block")]
    WafBlock,
}

impl CaptchaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptchaKind::ReCaptcha => "reCAPTCHA",
            CaptchaKind::HCaptcha => "hCaptcha",
            CaptchaKind::Cloudflare => "Cloudflare",
            CaptchaKind::PerimeterX => "PerimeterX",
            CaptchaKind::DataDome => "DataDome",
            CaptchaKind::Distil => "Distil",
            CaptchaKind::ElementDetected => "element-detected",
            CaptchaKind::Generic => "generic",
            CaptchaKind::WafBlock => "WAF-block",
        }
    }
}

impl fmt::Display for CaptchaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static VENDOR_SELECTORS: Lazy<Vec<(Selector, CaptchaKind)>> = Lazy::new(|| {
    [
        (
            ".g-recaptcha, [data-sitekey*=\"recaptcha\"]",
            CaptchaKind::ReCaptcha,
        ),
        (".h-captcha", CaptchaKind::HCaptcha),
        (".cf-turnstile", CaptchaKind::Cloudflare),
        ("#px-captcha", CaptchaKind::PerimeterX),
        ("#distilCaptchaForm", CaptchaKind::Distil),
        (
            "#captcha, .captcha, [data-sitekey]",
            CaptchaKind::ElementDetected,
        ),
    ]
    .into_iter()
    .map(|(css, kind)| (Selector::parse(css).unwrap(), kind))
    .collect()
});

fn scan_window(text: &str) -> String {
    let end = text
        .char_indices()
        .nth(SCAN_WINDOW)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    text[..end].to_lowercase()
}

fn has_signature(text: &str) -> bool {
    CAPTCHA_SIGNATURES.iter().any(|sig| text.contains(sig))
}

/// 原始响应模式
///
/// 检查正文前 5KB 的特征列表；403/429/503 且不足 2KB、由已知边缘 WAF
/// 返回的短错误页即使没有特征也视为拦截。
///
/// # 参数
///
/// * `status` - HTTP 状态码
/// * `server` - `Server` 响应头
/// * `body` - 响应正文
///
/// # 返回值
///
/// 检测到时返回验证码类型，否则返回 `None`
pub fn classify_response(status: u16, server: Option<&str>, body: &str) -> Option<CaptchaKind> {
    let content = scan_window(body);

    if has_signature(&content) {
        let kind = if content.contains("recaptcha") {
            CaptchaKind::ReCaptcha
        } else if content.contains("hcaptcha") {
            CaptchaKind::HCaptcha
        } else if content.contains("cf-challenge") || content.contains("cf-turnstile") {
            CaptchaKind::Cloudflare
        } else if content.contains("px-captcha") {
            CaptchaKind::PerimeterX
        } else if content.contains("datadome") {
            CaptchaKind::DataDome
        } else if content.contains("distilcaptchebody") {
            CaptchaKind::Distil
        } else {
            CaptchaKind::Generic
        };
        return Some(kind);
    }

    if matches!(status, 403 | 429 | 503) && body.len() < SHORT_ERROR_PAGE {
        let server = server.unwrap_or_default().to_lowercase();
        if EDGE_WAF_SERVERS.iter().any(|waf| server.contains(waf)) {
            return Some(CaptchaKind::WafBlock);
        }
    }

    None
}

/// 已解析页面模式
///
/// 先查已知验证码厂商的元素（结构信号比文本更可靠），再退回文本扫描
pub fn classify_document(document: &Html) -> Option<CaptchaKind> {
    for (selector, kind) in VENDOR_SELECTORS.iter() {
        if document.select(selector).next().is_some() {
            return Some(*kind);
        }
    }

    let text = document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let content = scan_window(&text);

    if !has_signature(&content) {
        return None;
    }

    let kind = if content.contains("recaptcha") {
        CaptchaKind::ReCaptcha
    } else if content.contains("hcaptcha") {
        CaptchaKind::HCaptcha
    } else if content.contains("cloudflare") || content.contains("cf-challenge") {
        CaptchaKind::Cloudflare
    } else if content.contains("px-captcha") {
        CaptchaKind::PerimeterX
    } else if content.contains("datadome") {
        CaptchaKind::DataDome
    } else {
        CaptchaKind::Generic
    };
    Some(kind)
}
