// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{Html, Selector};
use once_cell::sync::Lazy;
use tracing::debug;

/// 购物模式最多返回的图片数
pub const SHOPPING_RESULT_CAP: usize = 15;

/// 图片模式最多返回的图片数
pub const IMAGES_RESULT_CAP: usize = 10;

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static DIV_DATA_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("div[data-src]").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// 检索模式，对应 `tbm` 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// 购物检索 `tbm=shop`
    Shopping,
    /// 图片检索 `tbm=isch`
    Images,
    /// 普通网页检索
    Web,
}

impl SearchMode {
    fn tbm(&self) -> Option<&'static str> {
        match self {
            SearchMode::Shopping => Some("shop"),
            SearchMode::Images => Some("isch"),
            SearchMode::Web => None,
        }
    }
}

/// 聚合搜索引擎（Google 兼容）的检索地址与结果页解析
///
/// 只负责构造地址和解析 HTML，请求由抓取器完成
#[derive(Debug, Clone)]
pub struct GoogleSearchEngine {
    base_url: String,
}

impl Default for GoogleSearchEngine {
    fn default() -> Self {
        Self::new("https://www.google.com")
    }
}

impl GoogleSearchEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 构造检索地址
    pub fn search_url(&self, query: &str, mode: SearchMode) -> String {
        let mut url = format!("{}/search?q={}", self.base_url, urlencoding::encode(query));
        if let Some(tbm) = mode.tbm() {
            url.push_str("&tbm=");
            url.push_str(tbm);
        }
        url
    }

    /// 解析购物结果页
    ///
    /// 收集不由搜索引擎自身托管的 `img` 地址，再加上 `imgurl=` 深链中的原图地址
    pub fn parse_shopping(html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut urls: Vec<String> = document
            .select(&IMG)
            .filter_map(|img| img_source(&img))
            .filter(|src| src.starts_with("http") && !src.contains("google"))
            .collect();

        for link in document.select(&LINK) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if let Some(target) = unwrap_param(href, "imgurl=") {
                if target.starts_with("http") {
                    urls.push(target);
                }
            }
        }

        debug!("Shopping page yielded {} image URLs", urls.len());
        urls.truncate(SHOPPING_RESULT_CAP);
        urls
    }

    /// 解析图片结果页：`img` 的 `src`/`data-src` 与 `div[data-src]`
    pub fn parse_images(html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut urls: Vec<String> = document
            .select(&IMG)
            .filter_map(|img| img_source(&img))
            .filter(|src| src.starts_with("http"))
            .collect();

        urls.extend(
            document
                .select(&DIV_DATA_SRC)
                .filter_map(|div| div.value().attr("data-src"))
                .filter(|src| src.starts_with("http"))
                .map(str::to_string),
        );

        urls.truncate(IMAGES_RESULT_CAP);
        urls
    }

    /// 解析网页结果页中的外部链接
    ///
    /// `/url?q=` 跳转链接会被还原；非 http 链接和搜索引擎自身的链接被跳过
    pub fn parse_result_links(html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut links: Vec<String> = Vec::new();
        for link in document.select(&LINK) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let target = if href.contains("/url?q=") {
                match unwrap_param(href, "/url?q=") {
                    Some(target) => target,
                    None => continue,
                }
            } else {
                href.to_string()
            };
            if !target.starts_with("http") || target.contains("google") {
                continue;
            }
            if !links.contains(&target) {
                links.push(target);
            }
        }
        links
    }
}

fn img_source(img: &scraper::ElementRef) -> Option<String> {
    img.value()
        .attr("src")
        .filter(|src| !src.is_empty())
        .or_else(|| img.value().attr("data-src"))
        .map(str::to_string)
}

/// 取出 `marker` 之后、下一个 `&` 之前的值并做 URL 解码
fn unwrap_param(href: &str, marker: &str) -> Option<String> {
    let (_, rest) = href.split_once(marker)?;
    let raw = rest.split('&').next().unwrap_or_default();
    urlencoding::decode(raw).ok().map(|decoded| decoded.into_owned())
}
