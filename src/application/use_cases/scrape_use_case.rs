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

use crate::{
    config::settings::Settings,
    domain::{
        models::{
            candidate::{CandidateImage, Verdict, VerificationOutcome, VerifiedCandidate},
            item::{ItemDescriptor, ScrapeRequest},
            run_stats::RunRecorder,
            scrape_outcome::{DownloadReportEntry, ImageProvenance, ScrapeMetadata, ScrapeOutcome},
        },
        search::engine::CascadeState,
        services::{
            quality_gate::QualityGate,
            query_builder::build_search_queries,
            relevance_scorer::{OcrReview, RelevanceVerifier},
        },
    },
    engines::{
        browser_engine::{BrowserLauncher, ChromiumLauncher},
        fetcher::ResilientFetcher,
        traits::{CaptchaSolver, FetchError, NoopSolver},
    },
    infrastructure::{
        hashing::duplicate_index::DuplicateIndex,
        ocr::{NoopRecognizer, TesseractRecognizer, TextRecognizer},
        search::{
            cascade::{SearchCascade, SearchToolkit},
            retailers::RetailerPanel,
        },
    },
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 直接地址模式下候选的来源名称
pub const DIRECT_URL_SOURCE: &str = "Direct URL";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Fetcher setup failed: {0}")]
    Fetcher(#[from] FetchError),
    #[error("Download directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// 商品图片抓取器
///
/// 每次 `scrape_and_download` 调用严格串行地完成：构造查询 → 检索级联 →
/// 预下载验证 → 下载（去重、质量检查、OCR 复核）→ 汇总统计。
/// 普通的抓取失败只体现为空结果加完整统计，不会返回错误。
pub struct ImageScraper {
    settings: Settings,
    fetcher: Arc<ResilientFetcher>,
    panel: RetailerPanel,
    recognizer: Arc<dyn TextRecognizer>,
    browser: Option<Arc<dyn BrowserLauncher>>,
    quality: QualityGate,
    index: DuplicateIndex,
    download_dir: PathBuf,
    report: Vec<DownloadReportEntry>,
}

impl ImageScraper {
    /// 使用默认（不求解）的验证码策略创建抓取器
    pub fn new(settings: Settings) -> Result<Self, ScrapeError> {
        Self::with_solver(settings, Arc::new(NoopSolver))
    }

    /// 创建抓取器，并把验证码求解器注入抓取器
    ///
    /// 按配置选择 OCR 引擎与浏览器兜底，打开（或新建）去重索引
    pub fn with_solver(settings: Settings, solver: Arc<dyn CaptchaSolver>) -> Result<Self, ScrapeError> {
        let download_dir = PathBuf::from(&settings.storage.download_path);
        std::fs::create_dir_all(&download_dir)?;

        let fetcher = Arc::new(ResilientFetcher::new(&settings.fetcher)?.with_solver(solver));
        let recognizer: Arc<dyn TextRecognizer> = if settings.verification.ocr_enabled {
            Arc::new(TesseractRecognizer::new(&settings.ocr))
        } else {
            Arc::new(NoopRecognizer)
        };
        let browser: Option<Arc<dyn BrowserLauncher>> = if settings.browser.enabled {
            Some(Arc::new(ChromiumLauncher::new(&settings.browser)))
        } else {
            None
        };
        let index = DuplicateIndex::open(settings.index_path(), settings.hashing.similarity_threshold);
        let quality = QualityGate::new(&settings.quality);

        Ok(Self {
            settings,
            fetcher,
            panel: RetailerPanel::default(),
            recognizer,
            browser,
            quality,
            index,
            download_dir,
            report: Vec::new(),
        })
    }

    pub fn with_retailer_panel(mut self, panel: RetailerPanel) -> Self {
        self.panel = panel;
        self
    }

    pub fn with_text_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    /// 替换（或用 `None` 关闭）浏览器兜底
    pub fn with_browser(mut self, browser: Option<Arc<dyn BrowserLauncher>>) -> Self {
        self.browser = browser;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn duplicate_index(&self) -> &DuplicateIndex {
        &self.index
    }

    /// 每次调用一条的下载报告
    pub fn download_report(&self) -> &[DownloadReportEntry] {
        &self.report
    }

    fn toolkit(&self) -> Arc<SearchToolkit> {
        Arc::new(
            SearchToolkit::new(
                self.fetcher.clone(),
                self.settings.search.clone(),
                self.settings.verification.reliable_retailers.clone(),
            )
            .with_panel(self.panel.clone()),
        )
    }

    /// 抓取并下载一个商品的图片
    ///
    /// # 参数
    ///
    /// * `request` - 商品描述或直接地址，以及最多保存的图片数
    ///
    /// # 返回值
    ///
    /// * `Ok(ScrapeOutcome)` - 保存的文件、来源元数据与运行摘要；没有任何标识符也没有地址时为空结果，且不发起网络请求
    /// * `Err(ScrapeError)` - 下载目录不可用
    pub async fn scrape_and_download(&mut self, request: &ScrapeRequest) -> Result<ScrapeOutcome, ScrapeError> {
        let mut recorder = RunRecorder::new();
        let mut metadata = ScrapeMetadata::default();

        if !request.is_actionable() {
            warn!("No valid search parameters provided");
            return Ok(self.finish(request, Vec::new(), metadata, recorder));
        }
        std::fs::create_dir_all(&self.download_dir)?;

        let toolkit = self.toolkit();
        let state = match request.target_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                info!("Scraping specific URL: {}", url);
                self.collect_direct(&toolkit, url).await
            }
            None => {
                let queries = build_search_queries(&request.item);
                if queries.is_empty() {
                    warn!("Descriptor produced no search queries");
                    return Ok(self.finish(request, Vec::new(), metadata, recorder));
                }
                info!("Search queries: {:?}", queries);
                metadata.search_terms = queries.clone();
                SearchCascade::new(toolkit, self.browser.clone())
                    .run(&queries, request.max_images)
                    .await
            }
        };

        let CascadeState {
            candidates,
            recorder: cascade_recorder,
            ..
        } = state;
        recorder.merge(cascade_recorder);
        metadata.candidate_urls = candidates.urls();

        if candidates.is_empty() {
            info!("No images found");
            return Ok(self.finish(request, Vec::new(), metadata, recorder));
        }

        let ocr_available =
            self.settings.verification.ocr_enabled && self.recognizer.is_available().await;
        let verifier = RelevanceVerifier::new(&request.item, &self.settings.verification, ocr_available);
        let queue = verify_candidates(&verifier, candidates.into_vec(), &mut recorder);
        info!("Downloading up to {} of {} verified images", request.max_images, queue.len());

        let mut saved = Vec::new();
        for verified in queue {
            if saved.len() >= request.max_images {
                break;
            }
            if let Some(provenance) = self
                .download_candidate(&request.item, &verified, &verifier, saved.len(), &mut recorder)
                .await
            {
                saved.push(provenance);
            }
            tokio::time::sleep(self.settings.search.politeness_delay()).await;
        }

        metadata.sources = saved.clone();
        Ok(self.finish(request, saved, metadata, recorder))
    }

    async fn collect_direct(&self, toolkit: &SearchToolkit, url: &str) -> CascadeState {
        let mut state = CascadeState::new(usize::MAX);
        match toolkit.fetch_page(url, &mut state.recorder.captcha).await {
            Some(page) => {
                let extracted = toolkit.extractor.extract(url, &page.body);
                let found = toolkit.harvest(extracted, DIRECT_URL_SOURCE, usize::MAX, &mut state);
                info!("Extracted {} images from {}", found, url);
            }
            None => warn!("Could not fetch {}", url),
        }
        state
    }

    /// 下载单个候选；返回 `None` 表示未保留
    async fn download_candidate(
        &mut self,
        item: &ItemDescriptor,
        verified: &VerifiedCandidate,
        verifier: &RelevanceVerifier,
        kept: usize,
        recorder: &mut RunRecorder,
    ) -> Option<ImageProvenance> {
        let candidate = &verified.candidate;
        let (filename, path) = self.next_file(item, kept + 1);

        if let Err(e) = self.fetcher.download(&candidate.url, &path).await {
            debug!("Download failed for {}: {}", candidate.url, e);
            return None;
        }

        if let Some(found) = self.index.is_duplicate(&path) {
            info!(
                "Duplicate detected ({}): {} matches {}",
                found.kind, filename, found.original
            );
            recorder.record_duplicate(&candidate.url, &found);
            remove_file(&path);
            return None;
        }
        if let Err(e) = self.index.add_image(&path, &item.label()) {
            warn!("Could not index {}: {}", path.display(), e);
        }

        let quality = self.quality.check(&path);
        recorder.record_quality(quality.passed);
        if !quality.passed {
            info!("Low quality image kept: {} ({:?})", filename, quality.dimensions);
        }

        let text = self.recognizer.recognize(&path).await.unwrap_or_default();
        match verifier.review_with_ocr(&verified.outcome, &text) {
            OcrReview::Rescued { score, matched } => {
                info!(
                    "OCR rescued {} (score {:.2}): matched {:?}",
                    filename, score, matched
                );
                recorder.record_accepted();
                recorder.record_ocr_rescued();
            }
            OcrReview::Discarded { score } => {
                info!("OCR could not rescue (score={:.2}): {}", score, candidate.url);
                let mut reasons = verified.outcome.reasons.clone();
                if verifier.ocr_matches(&text).is_empty() {
                    reasons.push("ocr_no_match".to_string());
                }
                recorder.record_rejected(
                    &candidate.url,
                    &VerificationOutcome {
                        verdict: Verdict::Rejected,
                        score,
                        reasons,
                    },
                );
                remove_file(&path);
                if let Err(e) = self.index.remove_image(&path) {
                    warn!("Could not purge {} from hash index: {}", path.display(), e);
                }
                return None;
            }
            OcrReview::Confirmed { matched } => {
                debug!("OCR confirmed {}: {:?}", filename, matched);
                recorder.record_ocr_confirmed();
            }
            OcrReview::Unconfirmed => {}
        }

        recorder.record_download();
        info!("Downloaded: {}", path.display());
        Some(ImageProvenance {
            filename,
            path,
            image_url: candidate.url.clone(),
            source_name: candidate.source_name.clone(),
            source_url: candidate.source_page_url.clone(),
        })
    }

    /// 第一个未被占用的文件名，从 `number` 开始
    fn next_file(&self, item: &ItemDescriptor, mut number: usize) -> (String, PathBuf) {
        loop {
            let filename = item.file_name(number);
            let path = self.download_dir.join(&filename);
            if !path.exists() {
                return (filename, path);
            }
            number += 1;
        }
    }

    fn finish(
        &mut self,
        request: &ScrapeRequest,
        saved: Vec<ImageProvenance>,
        metadata: ScrapeMetadata,
        recorder: RunRecorder,
    ) -> ScrapeOutcome {
        self.report.push(DownloadReportEntry::new(
            request.item.clone(),
            request.target_url.clone(),
            saved.clone(),
        ));
        ScrapeOutcome {
            files: saved.into_iter().map(|p| p.path).collect(),
            metadata,
            summary: recorder.into_summary(self.index.duplicate_report()),
        }
    }
}

/// 预下载验证：返回下载顺序（接受的在前，临界的在后），拒绝的只记入统计
pub fn verify_candidates(
    verifier: &RelevanceVerifier,
    candidates: Vec<CandidateImage>,
    recorder: &mut RunRecorder,
) -> Vec<VerifiedCandidate> {
    let mut accepted = Vec::new();
    let mut borderline = Vec::new();

    for candidate in candidates {
        let outcome = verifier.verify(&candidate);
        match outcome.verdict {
            Verdict::Accepted => {
                recorder.record_accepted();
                accepted.push(VerifiedCandidate { candidate, outcome });
            }
            Verdict::Borderline => borderline.push(VerifiedCandidate { candidate, outcome }),
            Verdict::Rejected => {
                debug!("Rejected (score={:.2}): {}", outcome.score, candidate.url);
                recorder.record_rejected(&candidate.url, &outcome);
            }
        }
    }

    info!(
        "Verification: {} accepted, {} rejected, {} borderline",
        accepted.len(),
        recorder.verification.rejected,
        borderline.len()
    );
    accepted.extend(borderline);
    accepted
}

fn remove_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!("Could not remove {}: {}", path.display(), e);
    }
}
