// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// 抽取器从页面上拿到的原始图片
///
/// 地址尚未解析为绝对地址，也未经过升级改写
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub src: String,
    pub alt: Option<String>,
    pub context: Option<String>,
}

impl RawImage {
    pub fn bare(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: None,
            context: None,
        }
    }

    pub fn from_element(src: &str, element: &ElementRef) -> Self {
        Self {
            src: src.to_string(),
            alt: element
                .value()
                .attr("alt")
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .map(str::to_string),
            context: surrounding_text(element),
        }
    }
}

/// 周边文本最多保留的字符数
const SURROUNDING_TEXT_LIMIT: usize = 300;

/// 最多向上查找的祖先层数
const SURROUNDING_TEXT_DEPTH: usize = 3;

/// 图片元素附近的可见文本
///
/// 图片本身没有文本，逐级向上找到第一个有文本的祖先元素
pub fn surrounding_text(element: &ElementRef) -> Option<String> {
    let mut current = element.parent().and_then(ElementRef::wrap);
    for _ in 0..SURROUNDING_TEXT_DEPTH {
        let node = current?;
        let text = node
            .text()
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            return Some(text.chars().take(SURROUNDING_TEXT_LIMIT).collect());
        }
        current = node.parent().and_then(ElementRef::wrap);
    }
    None
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

fn class_matches(element: &ElementRef, pattern: &Regex) -> bool {
    element.value().classes().any(|class| pattern.is_match(class))
}

fn first_attr<'a>(element: &'a ElementRef, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| element.value().attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

static IMG: Lazy<Selector> = Lazy::new(|| selector("img"));
static PICTURE_SOURCE: Lazy<Selector> = Lazy::new(|| selector("picture source[srcset]"));
static PICTURE_IMG: Lazy<Selector> = Lazy::new(|| selector("picture img"));
static IMG_DATA_SRC: Lazy<Selector> = Lazy::new(|| selector("img[data-src]"));
static IMG_ITEMPROP: Lazy<Selector> = Lazy::new(|| selector("img[itemprop=\"image\"]"));
static IMG_ZOOM: Lazy<Selector> = Lazy::new(|| selector("img[data-zoom-image]"));
static IMG_OLD_HIRES: Lazy<Selector> = Lazy::new(|| selector("img[data-old-hires]"));
static IMG_A_HIRES: Lazy<Selector> = Lazy::new(|| selector("img[data-a-hires]"));

static TJX_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)product.*image|slide.*image").unwrap());
static MACYS_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)productImage|mainImage").unwrap());
static AMAZON_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)product|main").unwrap());
static PRODUCT_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)product.*image").unwrap());
static GALLERY_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)gallery.*image").unwrap());
static ZOOM_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)zoom.*image").unwrap());

/// 通用抽取兜底时认为"足够大"的边长
const MIN_FALLBACK_EDGE: u32 = 200;

/// 零售商专用的图片抽取器
pub trait RetailerExtractor: Send + Sync {
    /// 抽取器名称
    fn name(&self) -> &'static str;

    /// 页面地址（小写）是否归本抽取器处理
    fn matches(&self, page_url: &str) -> bool;

    /// 从已解析页面抽取原始图片
    fn extract(&self, document: &Html) -> Vec<RawImage>;
}

/// TJ Maxx / Marshalls
pub struct TjxExtractor;

impl RetailerExtractor for TjxExtractor {
    fn name(&self) -> &'static str {
        "tjx"
    }

    fn matches(&self, page_url: &str) -> bool {
        page_url.contains("tjmaxx") || page_url.contains("marshalls")
    }

    fn extract(&self, document: &Html) -> Vec<RawImage> {
        let images: Vec<RawImage> = document
            .select(&IMG)
            .filter(|img| class_matches(img, &TJX_CLASS))
            .filter_map(|img| {
                let src = first_attr(&img, &["src", "data-src"])?;
                let large = src.replace("_small", "_large").replace("_thumb", "_large");
                Some(RawImage::from_element(&large, &img))
            })
            .collect();
        if !images.is_empty() {
            return images;
        }

        document
            .select(&IMG)
            .filter(|img| img.value().classes().any(|c| c.to_lowercase().contains("product")))
            .filter_map(|img| {
                let src = first_attr(&img, &["src", "data-src"])?;
                src.starts_with("http")
                    .then(|| RawImage::from_element(src, &img))
            })
            .collect()
    }
}

/// Nordstrom：`<picture>` 的 srcset 末项，加上懒加载的 `data-src`
pub struct NordstromExtractor;

impl RetailerExtractor for NordstromExtractor {
    fn name(&self) -> &'static str {
        "nordstrom"
    }

    fn matches(&self, page_url: &str) -> bool {
        page_url.contains("nordstrom")
    }

    fn extract(&self, document: &Html) -> Vec<RawImage> {
        let mut images: Vec<RawImage> = document
            .select(&PICTURE_SOURCE)
            .filter_map(|source| {
                let srcset = source.value().attr("srcset")?;
                let last = srcset
                    .split(',')
                    .filter_map(|entry| entry.split_whitespace().next())
                    .last()?;
                Some(RawImage::bare(last))
            })
            .collect();

        images.extend(document.select(&IMG_DATA_SRC).filter_map(|img| {
            first_attr(&img, &["data-src"]).map(|src| RawImage::from_element(src, &img))
        }));
        images
    }
}

/// Macy's：`_fpx.tif` 图片请求 1200 宽
pub struct MacysExtractor;

impl RetailerExtractor for MacysExtractor {
    fn name(&self) -> &'static str {
        "macys"
    }

    fn matches(&self, page_url: &str) -> bool {
        page_url.contains("macys")
    }

    fn extract(&self, document: &Html) -> Vec<RawImage> {
        document
            .select(&IMG)
            .filter(|img| class_matches(img, &MACYS_CLASS))
            .filter_map(|img| {
                let src = first_attr(&img, &["src", "data-src"])?;
                let large = src.replace("_fpx.tif", "_fpx.tif?wid=1200");
                Some(RawImage::from_element(&large, &img))
            })
            .collect()
    }
}

pub struct ZapposExtractor;

impl RetailerExtractor for ZapposExtractor {
    fn name(&self) -> &'static str {
        "zappos"
    }

    fn matches(&self, page_url: &str) -> bool {
        page_url.contains("zappos")
    }

    fn extract(&self, document: &Html) -> Vec<RawImage> {
        let mut images: Vec<RawImage> = document
            .select(&IMG_ITEMPROP)
            .filter_map(|img| first_attr(&img, &["src"]).map(|src| RawImage::from_element(src, &img)))
            .collect();
        images.extend(document.select(&IMG_ZOOM).filter_map(|img| {
            first_attr(&img, &["data-zoom-image"]).map(|src| RawImage::from_element(src, &img))
        }));
        images
    }
}

pub struct AmazonExtractor;

impl RetailerExtractor for AmazonExtractor {
    fn name(&self) -> &'static str {
        "amazon"
    }

    fn matches(&self, page_url: &str) -> bool {
        page_url.contains("amazon")
    }

    fn extract(&self, document: &Html) -> Vec<RawImage> {
        let mut images: Vec<RawImage> = Vec::new();
        for (selector, attr) in [(&IMG_OLD_HIRES, "data-old-hires"), (&IMG_A_HIRES, "data-a-hires")] {
            images.extend(document.select(selector).filter_map(|img| {
                first_attr(&img, &[attr]).map(|src| RawImage::from_element(src, &img))
            }));
        }
        if !images.is_empty() {
            return images;
        }

        document
            .select(&IMG)
            .filter(|img| class_matches(img, &AMAZON_CLASS))
            .filter_map(|img| {
                let src = first_attr(&img, &["src"])?;
                src.contains("images-amazon")
                    .then(|| RawImage::from_element(src, &img))
            })
            .collect()
    }
}

/// Nike：`<picture>` 内的 `<img>`
pub struct NikeExtractor;

impl RetailerExtractor for NikeExtractor {
    fn name(&self) -> &'static str {
        "nike"
    }

    fn matches(&self, page_url: &str) -> bool {
        page_url.contains("nike")
    }

    fn extract(&self, document: &Html) -> Vec<RawImage> {
        document
            .select(&PICTURE_IMG)
            .filter_map(|img| first_attr(&img, &["src"]).map(|src| RawImage::from_element(src, &img)))
            .collect()
    }
}

/// 通用抽取器
///
/// 先按固定的属性/类名/id 模式找商品图，一张都没有时退回
/// "任何宽高都超过 200px 或尺寸未知的 http 图片"。
pub struct GenericExtractor;

impl GenericExtractor {
    fn pattern_matches(img: &ElementRef) -> bool {
        let element = img.value();
        element.attr("itemprop") == Some("image")
            || class_matches(img, &PRODUCT_IMAGE)
            || class_matches(img, &GALLERY_IMAGE)
            || class_matches(img, &ZOOM_IMAGE)
            || element.id().is_some_and(|id| PRODUCT_IMAGE.is_match(id))
    }

    fn large_enough(img: &ElementRef) -> bool {
        let dimension = |name: &str| img.value().attr(name).map(|v| v.trim().parse::<u32>());
        match (dimension("width"), dimension("height")) {
            (Some(Ok(width)), Some(Ok(height))) => {
                width > MIN_FALLBACK_EDGE && height > MIN_FALLBACK_EDGE
            }
            // Unparseable or missing sizes count as unknown.
            _ => true,
        }
    }
}

impl RetailerExtractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn matches(&self, _page_url: &str) -> bool {
        true
    }

    fn extract(&self, document: &Html) -> Vec<RawImage> {
        let images: Vec<RawImage> = document
            .select(&IMG)
            .filter(Self::pattern_matches)
            .filter_map(|img| {
                first_attr(&img, &["src", "data-src", "data-zoom-image"])
                    .map(|src| RawImage::from_element(src, &img))
            })
            .collect();
        if !images.is_empty() {
            return images;
        }

        document
            .select(&IMG)
            .filter_map(|img| {
                let src = first_attr(&img, &["src"])?;
                (src.starts_with("http") && Self::large_enough(&img))
                    .then(|| RawImage::from_element(src, &img))
            })
            .collect()
    }
}

/// 按顺序匹配的抽取器注册表，保证有通用兜底
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn RetailerExtractor>>,
    fallback: GenericExtractor,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self {
            extractors: vec![
                Box::new(TjxExtractor),
                Box::new(NordstromExtractor),
                Box::new(MacysExtractor),
                Box::new(ZapposExtractor),
                Box::new(AmazonExtractor),
                Box::new(NikeExtractor),
            ],
            fallback: GenericExtractor,
        }
    }
}

impl ExtractorRegistry {
    /// 只有通用抽取器的注册表
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
            fallback: GenericExtractor,
        }
    }

    /// 追加一个抽取器，排在已有抽取器之后
    pub fn register(mut self, extractor: Box<dyn RetailerExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// 选出第一个匹配页面地址的抽取器
    pub fn for_page(&self, page_url: &str) -> &dyn RetailerExtractor {
        let lower = page_url.to_lowercase();
        self.extractors
            .iter()
            .find(|extractor| extractor.matches(&lower))
            .map(|extractor| extractor.as_ref())
            .unwrap_or(&self.fallback)
    }

    pub fn generic(&self) -> &dyn RetailerExtractor {
        &self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srcs(images: &[RawImage]) -> Vec<&str> {
        images.iter().map(|image| image.src.as_str()).collect()
    }

    #[test]
    fn test_registry_dispatches_by_url_substring() {
        let registry = ExtractorRegistry::default();
        assert_eq!(registry.for_page("https://www.TJMaxx.tjx.com/store/p/1").name(), "tjx");
        assert_eq!(registry.for_page("https://www.zappos.com/p/1").name(), "zappos");
        assert_eq!(registry.for_page("https://shop.example.com/p/1").name(), "generic");
    }

    struct Boutique;

    impl RetailerExtractor for Boutique {
        fn name(&self) -> &'static str {
            "boutique"
        }

        fn matches(&self, page_url: &str) -> bool {
            page_url.contains("boutique.test")
        }

        fn extract(&self, document: &Html) -> Vec<RawImage> {
            document
                .select(&IMG)
                .filter_map(|img| img.value().attr("data-photo"))
                .map(RawImage::bare)
                .collect()
        }
    }

    #[test]
    fn test_registered_extractor_is_matched_case_insensitively() {
        let registry = ExtractorRegistry::empty().register(Box::new(Boutique));

        assert_eq!(registry.for_page("https://Boutique.TEST/item/9").name(), "boutique");
        assert_eq!(registry.for_page("https://www.zappos.com/p/1").name(), "generic");

        let html = Html::parse_document(r#"<img data-photo="https://boutique.test/big.jpg" src="x.jpg">"#);
        let images = registry.for_page("https://boutique.test/item/9").extract(&html);
        assert_eq!(srcs(&images), vec!["https://boutique.test/big.jpg"]);
    }

    #[test]
    fn test_tjx_upgrades_small_to_large() {
        let html = Html::parse_document(
            r#"<img class="product-image" src="https://img.tjx.com/a_small.jpg">
               <img class="hero" src="https://img.tjx.com/banner.jpg">"#,
        );
        assert_eq!(
            srcs(&TjxExtractor.extract(&html)),
            vec!["https://img.tjx.com/a_large.jpg"]
        );
    }

    #[test]
    fn test_nordstrom_takes_last_srcset_entry() {
        let html = Html::parse_document(
            r#"<picture><source srcset="https://n.com/a-200.jpg 200w, https://n.com/a-800.jpg 800w"></picture>
               <img data-src="https://n.com/lazy.jpg">"#,
        );
        assert_eq!(
            srcs(&NordstromExtractor.extract(&html)),
            vec!["https://n.com/a-800.jpg", "https://n.com/lazy.jpg"]
        );
    }

    #[test]
    fn test_macys_requests_wide_rendition() {
        let html = Html::parse_document(
            r#"<img class="mainImage" src="https://slimages.macysassets.com/is/image/MCY/1_fpx.tif">"#,
        );
        assert_eq!(
            srcs(&MacysExtractor.extract(&html)),
            vec!["https://slimages.macysassets.com/is/image/MCY/1_fpx.tif?wid=1200"]
        );
    }

    #[test]
    fn test_amazon_prefers_hires_attributes() {
        let html = Html::parse_document(
            r#"<img class="main" src="https://images-amazon.com/low.jpg" data-old-hires="https://m.media-amazon.com/hi.jpg">"#,
        );
        assert_eq!(
            srcs(&AmazonExtractor.extract(&html)),
            vec!["https://m.media-amazon.com/hi.jpg"]
        );

        let fallback = Html::parse_document(
            r#"<img class="main" src="https://images-amazon.com/low.jpg">
               <img class="main" src="https://other.cdn/low.jpg">"#,
        );
        assert_eq!(
            srcs(&AmazonExtractor.extract(&fallback)),
            vec!["https://images-amazon.com/low.jpg"]
        );
    }

    #[test]
    fn test_generic_patterns_capture_alt_and_context() {
        let html = Html::parse_document(
            r#"<div><h2>Air Max 270 Black</h2><figure><img itemprop="image" alt="Nike Air Max" src="/a.jpg"></figure></div>"#,
        );
        let images = GenericExtractor.extract(&html);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].src, "/a.jpg");
        assert_eq!(images[0].alt.as_deref(), Some("Nike Air Max"));
        assert_eq!(images[0].context.as_deref(), Some("Air Max 270 Black"));
    }

    #[test]
    fn test_generic_fallback_skips_small_images() {
        let html = Html::parse_document(
            r#"<img src="https://x.com/icon.png" width="32" height="32">
               <img src="https://x.com/big.jpg" width="800" height="600">
               <img src="https://x.com/unknown.jpg">
               <img src="/relative.jpg">"#,
        );
        assert_eq!(
            srcs(&GenericExtractor.extract(&html)),
            vec!["https://x.com/big.jpg", "https://x.com/unknown.jpg"]
        );
    }
}
