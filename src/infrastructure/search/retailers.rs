// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::url_utils::absolutize;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

/// 检索模板中的查询占位符
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// 零售商检索结果页中常见的商品链接模式
pub const PRODUCT_LINK_PATTERNS: &[&str] = &["/product/", "/p/", "/item/", "/dp/", "/pd/"];

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// 单个零售商的检索模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetailerTemplate {
    pub name: String,
    /// 含 `{query}` 占位符的检索地址
    pub search_template: String,
    /// 品牌直营站：查询里出现该品牌时才加入
    pub brand_trigger: Option<String>,
}

impl RetailerTemplate {
    pub fn new(name: impl Into<String>, search_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            search_template: search_template.into(),
            brand_trigger: None,
        }
    }

    pub fn brand_direct(
        name: impl Into<String>,
        search_template: impl Into<String>,
        brand: impl Into<String>,
    ) -> Self {
        Self {
            brand_trigger: Some(brand.into().to_lowercase()),
            ..Self::new(name, search_template)
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        self.search_template
            .replace(QUERY_PLACEHOLDER, &urlencoding::encode(query))
    }

    fn applies_to(&self, query_lower: &str) -> bool {
        self.brand_trigger
            .as_deref()
            .is_none_or(|brand| query_lower.contains(brand))
    }
}

/// 需要预热会话的反爬零售商
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupRetailer {
    pub name: String,
    pub homepage: String,
    pub search_template: String,
    /// 商品链接模式
    pub product_patterns: Vec<String>,
    pub max_products: usize,
}

impl WarmupRetailer {
    pub fn search_url(&self, query: &str) -> String {
        self.search_template
            .replace(QUERY_PLACEHOLDER, &urlencoding::encode(query))
    }

    /// 从检索结果页收集商品链接
    pub fn product_links(&self, page_url: &str, html: &str) -> Vec<String> {
        let patterns: Vec<&str> = self.product_patterns.iter().map(String::as_str).collect();
        matching_links(page_url, html, &patterns, self.max_products)
    }
}

/// 零售商面板
///
/// 固定顺序的检索模板，外加一个走预热流程的反爬零售商
#[derive(Debug, Clone)]
pub struct RetailerPanel {
    retailers: Vec<RetailerTemplate>,
    warmup: Option<WarmupRetailer>,
}

impl RetailerPanel {
    pub fn new(retailers: Vec<RetailerTemplate>, warmup: Option<WarmupRetailer>) -> Self {
        Self { retailers, warmup }
    }

    pub fn warmup(&self) -> Option<&WarmupRetailer> {
        self.warmup.as_ref()
    }

    /// 查询适用的 `(零售商名, 检索地址)`，按面板顺序
    pub fn search_urls(&self, query: &str) -> Vec<(String, String)> {
        let lower = query.to_lowercase();
        self.retailers
            .iter()
            .filter(|retailer| retailer.applies_to(&lower))
            .map(|retailer| (retailer.name.clone(), retailer.search_url(query)))
            .collect()
    }
}

impl Default for RetailerPanel {
    fn default() -> Self {
        let general = [
            ("Zappos", "https://www.zappos.com/search?term={query}"),
            ("DSW", "https://www.dsw.com/en/us/search?q={query}"),
            ("Amazon", "https://www.amazon.com/s?k={query}"),
            ("eBay", "https://www.ebay.com/sch/i.html?_nkw={query}"),
            ("Belk", "https://www.belk.com/search/?q={query}"),
            ("Forever 21", "https://www.forever21.com/us/search?q={query}"),
            ("Lord & Taylor", "https://www.lordandtaylor.com/search?q={query}"),
            ("ModeSens", "https://modesens.com/search/?q={query}"),
            ("Clothbase", "https://clothbase.com/search?q={query}"),
            ("Editorialist", "https://editorialist.com/search?q={query}"),
            ("Brands Gateway", "https://brandsgateway.com/search?q={query}"),
            ("Hello Luxy", "https://www.helloluxy.com/search?q={query}"),
            ("Banter", "https://www.banter.com/search?q={query}"),
            ("Level Shoes", "https://us.levelshoes.com/search?q={query}"),
            ("Beyond Style", "https://www.beyondstyle.us/search?q={query}"),
            ("YOOX", "https://www.yoox.com/us/search?q={query}"),
            ("The BS", "https://www.thebs.com/search?q={query}"),
            ("Fetching", "https://fetching.co.kr/search?q={query}"),
        ];
        let brand_direct = [
            ("Nike", "https://www.nike.com/w?q={query}", "nike"),
            ("Adidas", "https://www.adidas.com/us/search?q={query}", "adidas"),
            ("Puma", "https://us.puma.com/us/en/search?q={query}", "puma"),
            ("New Balance", "https://www.newbalance.com/search/?q={query}", "new balance"),
            ("Converse", "https://www.converse.com/shop?q={query}", "converse"),
            ("Vans", "https://www.vans.com/shop/search?q={query}", "vans"),
            ("Stuart Weitzman", "https://www.stuartweitzman.com/search/?q={query}", "stuart weitzman"),
            ("Sam Edelman", "https://www.samedelman.com/search?q={query}", "sam edelman"),
            ("Steve Madden", "https://www.stevemadden.com/search?q={query}", "steve madden"),
        ];
        let mass_market = [
            ("Walmart", "https://www.walmart.com/search?q={query}"),
            ("Target", "https://www.target.com/s?searchTerm={query}"),
            ("6pm", "https://www.6pm.com/search?term={query}"),
        ];

        let mut retailers: Vec<RetailerTemplate> = general
            .into_iter()
            .map(|(name, template)| RetailerTemplate::new(name, template))
            .collect();
        retailers.extend(
            brand_direct
                .into_iter()
                .map(|(name, template, brand)| RetailerTemplate::brand_direct(name, template, brand)),
        );
        retailers.extend(
            mass_market
                .into_iter()
                .map(|(name, template)| RetailerTemplate::new(name, template)),
        );

        let warmup = WarmupRetailer {
            name: "Reversible".to_string(),
            homepage: "https://www.reversible.com".to_string(),
            search_template: "https://www.reversible.com/search?q={query}".to_string(),
            product_patterns: vec!["/products/".to_string(), "/items/".to_string()],
            max_products: 3,
        };

        Self::new(retailers, Some(warmup))
    }
}

/// 页面中前 `limit` 个匹配任一模式的链接（绝对地址、去重）
pub fn matching_links(page_url: &str, html: &str, patterns: &[&str], limit: usize) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for anchor in document.select(&LINK) {
        if links.len() >= limit {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let lower = href.to_lowercase();
        if !patterns.iter().any(|pattern| lower.contains(pattern)) {
            continue;
        }
        if let Some(absolute) = absolutize(&base, href) {
            if !links.contains(&absolute) {
                links.push(absolute);
            }
        }
    }
    links
}

/// 零售商检索结果页中的第一个商品链接
pub fn find_product_link(page_url: &str, html: &str) -> Option<String> {
    matching_links(page_url, html, PRODUCT_LINK_PATTERNS, 1)
        .into_iter()
        .next()
}
