// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SearchSettings;
use crate::domain::models::run_stats::CaptchaLog;
use crate::domain::search::engine::{AcquisitionMethod, CascadeState, MethodScope};
use crate::domain::services::extraction_service::{ExtractError, PageExtraction, PageExtractor};
use crate::engines::browser_engine::BrowserLauncher;
use crate::engines::fetcher::ResilientFetcher;
use crate::engines::traits::FetchedPage;
use crate::infrastructure::search::google::GoogleSearchEngine;
use crate::infrastructure::search::methods::{
    BrowserFallback, ImageSearch, MobileAmpProbe, RetailerScraping, ShoppingSearch,
    SiteSpecificSearch, StructuredDataSearch, UrlManipulation,
};
use crate::infrastructure::search::retailers::RetailerPanel;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 各检索方法共享的依赖
pub struct SearchToolkit {
    pub fetcher: Arc<ResilientFetcher>,
    pub extractor: PageExtractor,
    pub engine: GoogleSearchEngine,
    pub panel: RetailerPanel,
    pub settings: SearchSettings,
    /// 可信零售商域名，浏览器兜底据此挑选商品链接
    pub reliable_retailers: Vec<String>,
}

impl SearchToolkit {
    pub fn new(
        fetcher: Arc<ResilientFetcher>,
        settings: SearchSettings,
        reliable_retailers: Vec<String>,
    ) -> Self {
        let engine = GoogleSearchEngine::new(settings.engine_base_url.clone());
        Self {
            fetcher,
            extractor: PageExtractor::default(),
            engine,
            panel: RetailerPanel::default(),
            settings,
            reliable_retailers,
        }
    }

    pub fn with_panel(mut self, panel: RetailerPanel) -> Self {
        self.panel = panel;
        self
    }

    /// 使用配置的重试次数抓取，失败视为无结果
    pub async fn fetch_page(&self, url: &str, captcha: &mut CaptchaLog) -> Option<FetchedPage> {
        match self.fetcher.get(url, captcha).await {
            Ok(page) => Some(page),
            Err(e) => {
                debug!("No page from {}: {}", url, e);
                None
            }
        }
    }

    /// 单次尝试抓取，用于探测类请求
    pub async fn fetch_once(&self, url: &str, captcha: &mut CaptchaLog) -> Option<FetchedPage> {
        let timeout = self.fetcher.settings().timeout();
        match self.fetcher.fetch(url, timeout, 1, captcha).await {
            Ok(page) => Some(page),
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                None
            }
        }
    }

    /// 把一次页面抽取的结果并入候选集合，返回新加入的数量
    ///
    /// 抽取阶段识别出的拦截页记入验证码日志，不产出候选
    pub fn harvest(
        &self,
        extracted: Result<PageExtraction, ExtractError>,
        source_name: &str,
        limit: usize,
        state: &mut CascadeState,
    ) -> usize {
        let extraction = match extracted {
            Ok(extraction) => extraction,
            Err(ExtractError::Challenge { url, kind }) => {
                state.recorder.captcha.record(&url, kind);
                return 0;
            }
            Err(e) => {
                debug!("Extraction skipped: {}", e);
                return 0;
            }
        };
        if extraction.upgraded > 0 {
            state.recorder.record_upgraded(extraction.upgraded as u32);
        }
        state
            .candidates
            .extend(extraction.into_candidates(source_name, limit))
    }
}

/// 检索级联
///
/// 逐查询依次执行逐查询方法，达到目标数量即停止；所有查询跑完仍不足时，
/// 再把整次运行方法各执行一次。单个方法的错误只记入统计，不会中断级联。
pub struct SearchCascade {
    methods: Vec<Box<dyn AcquisitionMethod>>,
    query_delay: Duration,
}

impl SearchCascade {
    /// 标准的八步级联；没有浏览器启动器时省略浏览器兜底
    pub fn new(toolkit: Arc<SearchToolkit>, browser: Option<Arc<dyn BrowserLauncher>>) -> Self {
        let query_delay = toolkit.settings.query_delay();
        let mut methods: Vec<Box<dyn AcquisitionMethod>> = vec![
            Box::new(ShoppingSearch::new(toolkit.clone())),
            Box::new(ImageSearch::new(toolkit.clone())),
            Box::new(RetailerScraping::new(toolkit.clone())),
            Box::new(StructuredDataSearch::new(toolkit.clone())),
            Box::new(SiteSpecificSearch::new(toolkit.clone())),
            Box::new(MobileAmpProbe::new(toolkit.clone())),
            Box::new(UrlManipulation::new(toolkit.clone())),
        ];
        if let Some(launcher) = browser {
            methods.push(Box::new(BrowserFallback::new(toolkit, launcher)));
        }
        Self::with_methods(methods, query_delay)
    }

    pub fn with_methods(methods: Vec<Box<dyn AcquisitionMethod>>, query_delay: Duration) -> Self {
        Self {
            methods,
            query_delay,
        }
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(|m| m.name()).collect()
    }

    /// 执行级联，返回包含候选集合与方法统计的状态
    pub async fn run(&self, queries: &[String], target: usize) -> CascadeState {
        let mut state = CascadeState::new(target);
        if target == 0 || queries.is_empty() {
            return state;
        }

        let (per_query, per_run): (Vec<&dyn AcquisitionMethod>, Vec<&dyn AcquisitionMethod>) = self
            .methods
            .iter()
            .map(|m| &**m)
            .partition(|m| m.scope() == MethodScope::PerQuery);

        'queries: for (index, query) in queries.iter().enumerate() {
            info!("Searching: {}", query);
            for method in per_query.iter().copied() {
                self.execute(method, std::slice::from_ref(query), &mut state)
                    .await;
                if state.reached_target() {
                    info!(
                        "Found enough candidates ({}), stopping search",
                        state.candidates.len()
                    );
                    break 'queries;
                }
            }
            if index + 1 < queries.len() {
                tokio::time::sleep(self.query_delay).await;
            }
        }

        for method in per_run {
            if state.reached_target() {
                break;
            }
            self.execute(method, queries, &mut state).await;
        }

        info!(
            "Cascade finished with {} unique candidates (target {})",
            state.candidates.len(),
            target
        );
        state
    }

    async fn execute(
        &self,
        method: &dyn AcquisitionMethod,
        queries: &[String],
        state: &mut CascadeState,
    ) {
        let name = method.name();
        debug!("Method {} starting with {} candidates", name, state.candidates.len());
        let start = Instant::now();
        let found = match method.acquire(queries, state).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Method {} failed: {}", name, e);
                0
            }
        };
        state.recorder.record_method(name, found > 0, start.elapsed());
        info!(
            "Method {} found {} new (total unique: {})",
            name,
            found,
            state.candidates.len()
        );
    }
}
