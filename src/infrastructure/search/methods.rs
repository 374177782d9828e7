// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::{CandidateImage, ImageSignature};
use crate::domain::search::engine::{AcquisitionMethod, CascadeState, MethodScope, SearchError};
use crate::domain::services::url_upgrade::upgrade_image_url;
use crate::engines::browser_engine::{BrowserLauncher, BrowserSession};
use crate::infrastructure::search::cascade::SearchToolkit;
use crate::infrastructure::search::google::{GoogleSearchEngine, SearchMode};
use crate::infrastructure::search::retailers::find_product_link;
use crate::utils::url_utils::{amp_variant, mobile_variant};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// 结构化数据检索使用的站点过滤条件数
const STRUCTURED_DATA_SITES: usize = 3;
/// 站内检索使用的查询数
const SITE_SEARCH_QUERIES: usize = 2;
/// 站内检索最多新增的候选数
const SITE_SEARCH_CAP: usize = 3;
/// 移动/AMP 探测的来源页数
const MOBILE_PAGES: usize = 3;
/// 每个移动/AMP 变体最多取的图片数
const MOBILE_IMAGES_PER_VARIANT: usize = 2;
/// 地址改写检查的候选数
const UPGRADE_CANDIDATES: usize = 10;
/// 浏览器兜底使用的查询数
const BROWSER_QUERIES: usize = 2;
/// 浏览器兜底最多新增的候选数
const BROWSER_CAP: usize = 5;
/// 检索结果页上扫描的链接数
const BROWSER_LINK_SCAN: usize = 20;
/// 每个查询最多访问的零售商页面数
const BROWSER_PRODUCT_PAGES: usize = 3;
/// 浏览器判定为图标的最小边长
const BROWSER_MIN_SIDE: u32 = 100;

const SKIPPED_EXTENSIONS: &[&str] = &[".svg", ".gif", ".ico"];
const PRODUCT_IMAGE_ATTRIBUTES: &[&str] = &["data-src", "data-zoom-image", "data-highres"];

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// 方法 1：聚合购物检索
pub struct ShoppingSearch {
    toolkit: Arc<SearchToolkit>,
}

impl ShoppingSearch {
    pub fn new(toolkit: Arc<SearchToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl AcquisitionMethod for ShoppingSearch {
    fn name(&self) -> &'static str {
        "google_shopping"
    }

    fn scope(&self) -> MethodScope {
        MethodScope::PerQuery
    }

    async fn acquire(&self, queries: &[String], state: &mut CascadeState) -> Result<usize, SearchError> {
        let Some(query) = queries.first() else {
            return Ok(0);
        };
        let search_url = self.toolkit.engine.search_url(query, SearchMode::Shopping);
        let page = self
            .toolkit
            .fetcher
            .get(&search_url, &mut state.recorder.captcha)
            .await?;

        let urls = GoogleSearchEngine::parse_shopping(&page.body);
        debug!("Shopping search returned {} image URLs", urls.len());
        Ok(state.candidates.extend(
            urls.into_iter()
                .map(|url| CandidateImage::new(url, "Google Shopping", search_url.clone())),
        ))
    }
}

/// 方法 2：聚合图片检索
pub struct ImageSearch {
    toolkit: Arc<SearchToolkit>,
}

impl ImageSearch {
    pub fn new(toolkit: Arc<SearchToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl AcquisitionMethod for ImageSearch {
    fn name(&self) -> &'static str {
        "google_images"
    }

    fn scope(&self) -> MethodScope {
        MethodScope::PerQuery
    }

    async fn acquire(&self, queries: &[String], state: &mut CascadeState) -> Result<usize, SearchError> {
        let Some(query) = queries.first() else {
            return Ok(0);
        };
        let search_url = self.toolkit.engine.search_url(query, SearchMode::Images);
        let page = self
            .toolkit
            .fetcher
            .get(&search_url, &mut state.recorder.captcha)
            .await?;

        let urls = GoogleSearchEngine::parse_images(&page.body);
        Ok(state.candidates.extend(
            urls.into_iter()
                .map(|url| CandidateImage::new(url, "Google Images", search_url.clone())),
        ))
    }
}

/// 方法 3：零售商页面抓取
///
/// 先走反爬零售商的预热流程，再按面板顺序探测各零售商检索页，
/// 每个零售商取第一个商品链接；命中数达到上限后停止探测，
/// 然后逐个商品页抽取图片。
pub struct RetailerScraping {
    toolkit: Arc<SearchToolkit>,
}

impl RetailerScraping {
    pub fn new(toolkit: Arc<SearchToolkit>) -> Self {
        Self { toolkit }
    }

    async fn product_pages(&self, query: &str, state: &mut CascadeState) -> Vec<(String, String)> {
        let toolkit = &self.toolkit;
        let cap = toolkit.settings.retailer_hit_cap;
        let mut products = Vec::new();

        if let Some(warmup) = toolkit.panel.warmup() {
            let search_url = warmup.search_url(query);
            match toolkit
                .fetcher
                .warmed_fetch(
                    &warmup.homepage,
                    &search_url,
                    toolkit.settings.warmup_delay(),
                    &mut state.recorder.captcha,
                )
                .await
            {
                Ok(page) => {
                    for link in warmup.product_links(&page.url, &page.body) {
                        products.push((warmup.name.clone(), link));
                    }
                    debug!("{} yielded {} product links", warmup.name, products.len());
                }
                Err(e) => debug!("{} warm-up search failed: {}", warmup.name, e),
            }
        }

        for (name, search_url) in toolkit.panel.search_urls(query) {
            if products.len() >= cap {
                break;
            }
            if let Some(page) = toolkit.fetch_once(&search_url, &mut state.recorder.captcha).await {
                if let Some(link) = find_product_link(&page.url, &page.body) {
                    debug!("{} product page: {}", name, link);
                    products.push((name, link));
                }
            }
            tokio::time::sleep(toolkit.settings.politeness_delay()).await;
        }

        products.truncate(cap);
        products
    }
}

#[async_trait]
impl AcquisitionMethod for RetailerScraping {
    fn name(&self) -> &'static str {
        "retailer_scraping"
    }

    fn scope(&self) -> MethodScope {
        MethodScope::PerQuery
    }

    async fn acquire(&self, queries: &[String], state: &mut CascadeState) -> Result<usize, SearchError> {
        let Some(query) = queries.first() else {
            return Ok(0);
        };
        let products = self.product_pages(query, state).await;
        if products.is_empty() {
            info!("No retailer product pages found");
            return Ok(0);
        }

        let toolkit = &self.toolkit;
        let mut added = 0;
        for (retailer, product_url) in products {
            if state.reached_target() {
                break;
            }
            if let Some(page) = toolkit.fetch_page(&product_url, &mut state.recorder.captcha).await {
                let extracted = toolkit.extractor.extract(&page.url, &page.body);
                added += toolkit.harvest(
                    extracted,
                    &retailer,
                    toolkit.settings.images_per_product,
                    state,
                );
            }
            tokio::time::sleep(toolkit.settings.politeness_delay()).await;
        }
        Ok(added)
    }
}

/// 方法 4：结构化数据发现
///
/// 用前几个站点过滤条件重新检索，逐个访问结果页只取高分辨率来源，
/// 第一个有收获的页面即结束。
pub struct StructuredDataSearch {
    toolkit: Arc<SearchToolkit>,
}

impl StructuredDataSearch {
    pub fn new(toolkit: Arc<SearchToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl AcquisitionMethod for StructuredDataSearch {
    fn name(&self) -> &'static str {
        "structured_data"
    }

    fn scope(&self) -> MethodScope {
        MethodScope::PerRun
    }

    async fn acquire(&self, queries: &[String], state: &mut CascadeState) -> Result<usize, SearchError> {
        let toolkit = &self.toolkit;
        for query in queries {
            for site in toolkit.settings.site_filters.iter().take(STRUCTURED_DATA_SITES) {
                let search_url = toolkit
                    .engine
                    .search_url(&format!("{} {}", query, site), SearchMode::Web);
                let Some(results) = toolkit.fetch_once(&search_url, &mut state.recorder.captcha).await
                else {
                    continue;
                };

                for link in GoogleSearchEngine::parse_result_links(&results.body) {
                    let Some(page) = toolkit.fetch_once(&link, &mut state.recorder.captcha).await else {
                        continue;
                    };
                    let extracted = toolkit.extractor.extract_highres(&link, &page.body);
                    let added = toolkit.harvest(extracted, "Structured Data", usize::MAX, state);
                    if added > 0 {
                        return Ok(added);
                    }
                }
                tokio::time::sleep(toolkit.settings.politeness_delay()).await;
            }
        }
        Ok(0)
    }
}

/// 方法 5：站内检索变体
pub struct SiteSpecificSearch {
    toolkit: Arc<SearchToolkit>,
}

impl SiteSpecificSearch {
    pub fn new(toolkit: Arc<SearchToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl AcquisitionMethod for SiteSpecificSearch {
    fn name(&self) -> &'static str {
        "site_specific_search"
    }

    fn scope(&self) -> MethodScope {
        MethodScope::PerRun
    }

    async fn acquire(&self, queries: &[String], state: &mut CascadeState) -> Result<usize, SearchError> {
        let toolkit = &self.toolkit;
        let mut found = 0;
        for query in queries.iter().take(SITE_SEARCH_QUERIES) {
            for site in &toolkit.settings.site_filters {
                if found >= SITE_SEARCH_CAP {
                    return Ok(found);
                }
                let search_url = toolkit
                    .engine
                    .search_url(&format!("{} {}", query, site), SearchMode::Images);
                let Some(page) = toolkit.fetch_once(&search_url, &mut state.recorder.captcha).await else {
                    continue;
                };
                let urls = GoogleSearchEngine::parse_images(&page.body);
                found += state.candidates.extend_capped(
                    urls.into_iter()
                        .map(|url| CandidateImage::new(url, "Site-Specific Search", site.clone())),
                    SITE_SEARCH_CAP - found,
                );
            }
        }
        Ok(found)
    }
}

/// 方法 6：移动端与 AMP 页面探测
pub struct MobileAmpProbe {
    toolkit: Arc<SearchToolkit>,
}

impl MobileAmpProbe {
    pub fn new(toolkit: Arc<SearchToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl AcquisitionMethod for MobileAmpProbe {
    fn name(&self) -> &'static str {
        "mobile_amp"
    }

    fn scope(&self) -> MethodScope {
        MethodScope::PerRun
    }

    async fn acquire(&self, _queries: &[String], state: &mut CascadeState) -> Result<usize, SearchError> {
        let toolkit = &self.toolkit;
        let mut found = 0;
        for source_page in state.candidates.source_pages(MOBILE_PAGES) {
            let variants = [
                (mobile_variant(&source_page), "Mobile Endpoint"),
                (amp_variant(&source_page), "AMP Endpoint"),
            ];
            for (variant, label) in variants {
                let Some(variant) = variant else {
                    continue;
                };
                let Some(page) = toolkit.fetch_once(&variant, &mut state.recorder.captcha).await else {
                    continue;
                };
                let extracted = toolkit.extractor.extract_generic(&variant, &page.body);
                found += toolkit.harvest(extracted, label, MOBILE_IMAGES_PER_VARIANT, state);
            }
        }
        Ok(found)
    }
}

/// 方法 7：地址改写并实时验证
///
/// 改写后签名仍是新的、且 HEAD 探测确认为图片时才收录
pub struct UrlManipulation {
    toolkit: Arc<SearchToolkit>,
}

impl UrlManipulation {
    pub fn new(toolkit: Arc<SearchToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl AcquisitionMethod for UrlManipulation {
    fn name(&self) -> &'static str {
        "url_manipulation"
    }

    fn scope(&self) -> MethodScope {
        MethodScope::PerRun
    }

    async fn acquire(&self, _queries: &[String], state: &mut CascadeState) -> Result<usize, SearchError> {
        let mut found = 0;
        for candidate in state.candidates.snapshot(UPGRADE_CANDIDATES) {
            let upgraded = upgrade_image_url(&candidate.url);
            if upgraded == candidate.url
                || state.candidates.contains(&ImageSignature::from_url(&upgraded))
            {
                continue;
            }
            match self.toolkit.fetcher.head(&upgraded).await {
                Ok(probe) if probe.is_live_image() => {
                    let accepted = CandidateImage::new(upgraded, "URL Manipulation", candidate.url.clone())
                        .with_page_title(candidate.page_title.clone())
                        .with_alt_text(candidate.alt_text.clone())
                        .with_surrounding_text(candidate.surrounding_text.clone());
                    if state.offer(accepted) {
                        state.recorder.record_upgraded(1);
                        found += 1;
                    }
                }
                Ok(probe) => debug!("Upgraded URL not live ({}): {}", probe.status, upgraded),
                Err(e) => debug!("HEAD probe failed for {}: {}", upgraded, e),
            }
        }
        Ok(found)
    }
}

/// 方法 8：无头浏览器兜底
///
/// 每次调用只启动一个浏览器，方法返回前一定关闭
pub struct BrowserFallback {
    toolkit: Arc<SearchToolkit>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl BrowserFallback {
    pub fn new(toolkit: Arc<SearchToolkit>, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self { toolkit, launcher }
    }

    async fn browse(
        &self,
        session: &mut dyn BrowserSession,
        queries: &[String],
        state: &mut CascadeState,
    ) -> usize {
        let mut found = 0;
        for query in queries.iter().take(BROWSER_QUERIES) {
            if found >= BROWSER_CAP {
                break;
            }
            let search_url = self.toolkit.engine.search_url(query, SearchMode::Images);
            let Some(html) = render(session, &search_url, 3, Duration::from_millis(500)).await else {
                continue;
            };

            found += state.candidates.extend_capped(
                search_page_images(&html)
                    .into_iter()
                    .map(|url| CandidateImage::new(url, "Browser (Google Images)", search_url.clone())),
                BROWSER_CAP - found,
            );

            let links = retailer_links(&html, &self.toolkit.reliable_retailers, BROWSER_LINK_SCAN);
            for product_url in links.into_iter().take(BROWSER_PRODUCT_PAGES) {
                if found >= BROWSER_CAP {
                    break;
                }
                let Some(html) = render(session, &product_url, 2, Duration::from_millis(300)).await
                else {
                    continue;
                };
                found += state.candidates.extend_capped(
                    product_page_images(&html)
                        .into_iter()
                        .map(|url| CandidateImage::new(url, "Browser (Retailer)", product_url.clone())),
                    BROWSER_CAP - found,
                );
            }
        }
        found
    }
}

#[async_trait]
impl AcquisitionMethod for BrowserFallback {
    fn name(&self) -> &'static str {
        "browser_automation"
    }

    fn scope(&self) -> MethodScope {
        MethodScope::PerRun
    }

    async fn acquire(&self, queries: &[String], state: &mut CascadeState) -> Result<usize, SearchError> {
        let mut session = self.launcher.launch().await?;
        let found = self.browse(session.as_mut(), queries, state).await;
        session.close().await;
        Ok(found)
    }
}

/// 打开页面、滚动若干次后取渲染结果，任何一步失败都返回 `None`
async fn render(
    session: &mut dyn BrowserSession,
    url: &str,
    scrolls: usize,
    pause: Duration,
) -> Option<String> {
    if let Err(e) = session.goto(url).await {
        debug!("Browser could not open {}: {}", url, e);
        return None;
    }
    for _ in 0..scrolls {
        if let Err(e) = session.scroll().await {
            debug!("Scroll failed on {}: {}", url, e);
            break;
        }
        tokio::time::sleep(pause).await;
    }
    match session.content().await {
        Ok(html) => Some(html),
        Err(e) => {
            debug!("Could not read rendered page {}: {}", url, e);
            None
        }
    }
}

fn skipped_format(url: &str) -> bool {
    let lower = url.to_lowercase();
    SKIPPED_EXTENSIONS.iter().any(|ext| lower.contains(ext))
}

fn too_small(width: Option<&str>, height: Option<&str>) -> bool {
    match (
        width.and_then(|w| w.trim().parse::<u32>().ok()),
        height.and_then(|h| h.trim().parse::<u32>().ok()),
    ) {
        (Some(w), Some(h)) => w < BROWSER_MIN_SIDE || h < BROWSER_MIN_SIDE,
        _ => false,
    }
}

/// 渲染后的图片检索页中的图片：排除搜索引擎自身资源、矢量/图标格式和小图
pub fn search_page_images(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&IMG)
        .filter_map(|img| {
            let element = img.value();
            let src = element
                .attr("data-src")
                .filter(|s| !s.is_empty())
                .or_else(|| element.attr("src"))?;
            if !src.starts_with("http")
                || src.contains("google")
                || src.contains("gstatic")
                || skipped_format(src)
                || too_small(element.attr("width"), element.attr("height"))
            {
                return None;
            }
            Some(src.to_string())
        })
        .collect()
}

/// 检索页前 `scan` 个链接中指向可信零售商的地址
pub fn retailer_links(html: &str, retailers: &[String], scan: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&LINK)
        .take(scan)
        .filter_map(|link| link.value().attr("href"))
        .filter(|href| href.starts_with("http"))
        .filter(|href| retailers.iter().any(|retailer| href.contains(retailer.as_str())))
        .map(str::to_string)
        .collect()
}

/// 渲染后的零售商商品页中的图片，优先取懒加载与放大图属性
pub fn product_page_images(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&IMG)
        .filter_map(|img| {
            let element = img.value();
            let src = PRODUCT_IMAGE_ATTRIBUTES
                .iter()
                .find_map(|attr| element.attr(attr).filter(|s| !s.is_empty()))
                .or_else(|| element.attr("src"))?;
            if !src.starts_with("http") || skipped_format(src) {
                return None;
            }
            Some(src.to_string())
        })
        .collect()
}
