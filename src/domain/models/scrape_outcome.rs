// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::item::ItemDescriptor;
use crate::domain::models::run_stats::RunSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 单张已保存图片的来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProvenance {
    pub filename: String,
    pub path: PathBuf,
    pub image_url: String,
    pub source_name: String,
    pub source_url: String,
}

/// 一次抓取的元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeMetadata {
    /// 实际使用的检索词
    pub search_terms: Vec<String>,
    /// 按保存顺序排列的图片来源
    pub sources: Vec<ImageProvenance>,
    /// 级联找到的全部候选地址
    pub candidate_urls: Vec<String>,
}

/// `scrape_and_download` 的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub files: Vec<PathBuf>,
    pub metadata: ScrapeMetadata,
    pub summary: RunSummary,
}

impl ScrapeOutcome {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// 下载报告条目，每次调用一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadReportEntry {
    pub item: ItemDescriptor,
    pub target_url: Option<String>,
    pub success: bool,
    pub image_count: usize,
    pub images: Vec<ImageProvenance>,
    pub timestamp: DateTime<Utc>,
}

impl DownloadReportEntry {
    pub fn new(item: ItemDescriptor, target_url: Option<String>, images: Vec<ImageProvenance>) -> Self {
        Self {
            item,
            target_url,
            success: !images.is_empty(),
            image_count: images.len(),
            images,
            timestamp: Utc::now(),
        }
    }
}
