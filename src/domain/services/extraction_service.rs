// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::{CandidateImage, ImageSignature};
use crate::domain::services::captcha_detector::{classify_document, CaptchaKind};
use crate::domain::services::retailer_extractors::{ExtractorRegistry, RawImage};
use crate::domain::services::url_upgrade::upgrade_image_url;
use crate::utils::url_utils::absolutize;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// 常见的高分辨率图片属性
pub const HIGHRES_ATTRIBUTES: &[&str] = &[
    "data-full",
    "data-zoom",
    "data-highres",
    "data-zoom-image",
    "data-large",
    "data-original",
    "data-hi-res",
    "data-full-size",
    "data-old-hires",
    "data-a-hires",
    "data-src-zoom",
];

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static IMG_SRCSET: Lazy<Selector> = Lazy::new(|| Selector::parse("img[srcset]").unwrap());
static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[property=\"og:image\"]").unwrap());
static TWITTER_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[name=\"twitter:image\"]").unwrap());
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[type=\"application/ld+json\"]").unwrap());
static HIGHRES_SELECTORS: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    HIGHRES_ATTRIBUTES
        .iter()
        .map(|attr| (Selector::parse(&format!("[{}]", attr)).unwrap(), *attr))
        .collect()
});

/// 页面抽取错误
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Challenge page at {url}: {kind}")]
    Challenge { url: String, kind: CaptchaKind },
    #[error("Invalid page URL: {0}")]
    InvalidPageUrl(String),
}

/// 抽取出的一张图片：绝对地址与页面上下文
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    pub url: String,
    pub alt_text: Option<String>,
    pub surrounding_text: Option<String>,
}

/// 单个页面的抽取结果
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub page_url: String,
    pub page_title: Option<String>,
    /// 按签名去重、高分辨率来源在前
    pub images: Vec<ExtractedImage>,
    /// 被升级规则改写过的地址数量
    pub upgraded: usize,
}

impl PageExtraction {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// 转成候选图片，最多 `limit` 张
    pub fn into_candidates(self, source_name: &str, limit: usize) -> Vec<CandidateImage> {
        let page_url = self.page_url;
        let page_title = self.page_title;
        self.images
            .into_iter()
            .take(limit)
            .map(|image| {
                CandidateImage::new(image.url, source_name, page_url.clone())
                    .with_page_title(page_title.clone())
                    .with_alt_text(image.alt_text)
                    .with_surrounding_text(image.surrounding_text)
            })
            .collect()
    }
}

/// 从 srcset 中选出宽度描述最大的候选
///
/// 没有 `w` 描述的候选按宽度 0 处理；宽度相同时保留靠前的
pub fn largest_srcset_candidate(srcset: &str) -> Option<&str> {
    let mut best: Option<(&str, u32)> = None;
    for entry in srcset.split(',') {
        let mut parts = entry.split_whitespace();
        let Some(url) = parts.next() else {
            continue;
        };
        let width = parts
            .next()
            .and_then(|descriptor| descriptor.strip_suffix('w'))
            .and_then(|w| w.parse::<u32>().ok())
            .unwrap_or(0);
        if best.is_none_or(|(_, current)| width > current) {
            best = Some((url, width));
        }
    }
    best.map(|(url, _)| url)
}

/// 收集 JSON-LD 中的 `image` 字段
///
/// 支持字符串、字符串列表、带 `url`/`contentUrl` 的对象（或对象列表），
/// 以及顶层列表和 `@graph` 容器
pub fn json_ld_images(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| json_ld_images(item, out)),
        Value::Object(map) => {
            if let Some(image) = map.get("image") {
                collect_image_field(image, out);
            }
            if let Some(graph) = map.get("@graph") {
                json_ld_images(graph, out);
            }
        }
        _ => {}
    }
}

fn collect_image_field(image: &Value, out: &mut Vec<String>) {
    match image {
        Value::String(url) => push_http(url, out),
        Value::Array(items) => items.iter().for_each(|item| collect_image_field(item, out)),
        Value::Object(map) => {
            if let Some(Value::String(url)) = map.get("url").or_else(|| map.get("contentUrl")) {
                push_http(url, out);
            }
        }
        _ => {}
    }
}

fn push_http(url: &str, out: &mut Vec<String>) {
    if url.starts_with("http") {
        out.push(url.to_string());
    }
}

/// 高分辨率来源，按优先级：srcset 最大候选、高分辨率属性、
/// og:image / twitter:image、JSON-LD
pub fn highres_images(document: &Html) -> Vec<RawImage> {
    let mut images = Vec::new();

    for img in document.select(&IMG_SRCSET) {
        if let Some(best) = img.value().attr("srcset").and_then(largest_srcset_candidate) {
            images.push(RawImage::from_element(best, &img));
        }
    }

    for (selector, attr) in HIGHRES_SELECTORS.iter() {
        for element in document.select(selector) {
            if let Some(src) = element.value().attr(attr).map(str::trim).filter(|s| !s.is_empty()) {
                images.push(RawImage::from_element(src, &element));
            }
        }
    }

    for meta in document.select(&OG_IMAGE).chain(document.select(&TWITTER_IMAGE)) {
        if let Some(content) = meta.value().attr("content").filter(|c| c.starts_with("http")) {
            images.push(RawImage::bare(content));
        }
    }

    let mut structured = Vec::new();
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        // Malformed blocks carry no signal.
        if let Ok(value) = serde_json::from_str::<Value>(&raw) {
            json_ld_images(&value, &mut structured);
        }
    }
    images.extend(structured.into_iter().map(RawImage::bare));

    images
}

fn page_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// 页面图片抽取器
///
/// 先取高分辨率来源，再交给按地址匹配的零售商抽取器或通用抽取器；
/// 地址统一解析为绝对地址、经过升级改写，并按签名去重
pub struct PageExtractor {
    registry: ExtractorRegistry,
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new(ExtractorRegistry::default())
    }
}

impl PageExtractor {
    pub fn new(registry: ExtractorRegistry) -> Self {
        Self { registry }
    }

    /// 完整抽取：高分辨率来源 + 零售商/通用抽取器
    ///
    /// # 参数
    ///
    /// * `page_url` - 页面地址，用于解析相对地址和选择抽取器
    /// * `html` - 页面正文
    ///
    /// # 返回值
    ///
    /// * `Err(ExtractError::Challenge)` - 页面是验证码/拦截页，不产出任何图片
    pub fn extract(&self, page_url: &str, html: &str) -> Result<PageExtraction, ExtractError> {
        let base = Url::parse(page_url).map_err(|_| ExtractError::InvalidPageUrl(page_url.to_string()))?;
        let document = Html::parse_document(html);
        reject_challenge(page_url, &document)?;

        let mut raw = highres_images(&document);
        raw.extend(self.registry.for_page(page_url).extract(&document));
        Ok(finish(&base, &document, raw))
    }

    /// 仅取结构化数据与高分辨率来源
    pub fn extract_highres(&self, page_url: &str, html: &str) -> Result<PageExtraction, ExtractError> {
        let base = Url::parse(page_url).map_err(|_| ExtractError::InvalidPageUrl(page_url.to_string()))?;
        let document = Html::parse_document(html);
        reject_challenge(page_url, &document)?;

        let raw = highres_images(&document);
        Ok(finish(&base, &document, raw))
    }

    /// 仅使用通用抽取器
    pub fn extract_generic(&self, page_url: &str, html: &str) -> Result<PageExtraction, ExtractError> {
        let base = Url::parse(page_url).map_err(|_| ExtractError::InvalidPageUrl(page_url.to_string()))?;
        let document = Html::parse_document(html);
        reject_challenge(page_url, &document)?;

        let raw = self.registry.generic().extract(&document);
        Ok(finish(&base, &document, raw))
    }
}

fn reject_challenge(page_url: &str, document: &Html) -> Result<(), ExtractError> {
    match classify_document(document) {
        Some(kind) => Err(ExtractError::Challenge {
            url: page_url.to_string(),
            kind,
        }),
        None => Ok(()),
    }
}

fn finish(base: &Url, document: &Html, raw: Vec<RawImage>) -> PageExtraction {
    let mut seen = HashSet::new();
    let mut upgraded = 0;
    let mut images = Vec::new();

    for image in raw {
        let Some(absolute) = absolutize(base, &image.src) else {
            continue;
        };
        let url = upgrade_image_url(&absolute);
        if !seen.insert(ImageSignature::from_url(&url)) {
            continue;
        }
        if url != absolute {
            upgraded += 1;
        }
        images.push(ExtractedImage {
            url,
            alt_text: image.alt,
            surrounding_text: image.context,
        });
    }

    PageExtraction {
        page_url: base.to_string(),
        page_title: page_title(document),
        images,
        upgraded,
    }
}

#[cfg(test)]
#[path = "extraction_service_test.rs"]
mod tests;
